//! Configuration management for the gateway.
//!
//! Configuration is read from `MCP_`-prefixed environment variables (a
//! `.env` file is honoured) on top of built-in defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::transport::TransportConfig;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server identification and metadata.
    pub server: ServerConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Transport configuration.
    pub transport: TransportConfig,

    /// Mounted servers and shutdown behaviour.
    pub gateway: GatewayConfig,

    /// News server upstream settings.
    pub news: NewsConfig,
}

/// Server identification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The name reported to clients.
    pub name: String,

    /// The version reported to clients.
    pub version: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    pub level: String,
}

/// Gateway assembly configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Server ids to mount, in mount order. Each is mounted at `/<id>`.
    pub mounts: Vec<String>,

    /// Upper bound on draining in-flight requests at shutdown.
    pub drain_timeout_secs: u64,
}

impl GatewayConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

/// Settings for the news server's upstream API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsConfig {
    /// Base URL of the news API.
    pub base_url: String,

    /// Per-request timeout.
    pub timeout_secs: u64,

    /// Name of the environment variable holding the API key. The key itself
    /// is read when the server's scope opens, never stored here.
    pub api_key_var: String,
}

impl NewsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            mounts: vec!["docs".to_string(), "email".to_string()],
            drain_timeout_secs: 30,
        }
    }
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://gnews.io/api/v4".to_string(),
            timeout_secs: 10,
            api_key_var: "GNEWS_API_KEY".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "mcp-gateway".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
            transport: TransportConfig::default(),
            gateway: GatewayConfig::default(),
            news: NewsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Recognised variables: `MCP_SERVER_NAME`, `MCP_LOG_LEVEL`,
    /// `MCP_GATEWAY_MOUNTS` (comma separated), `MCP_DRAIN_TIMEOUT_SECS`,
    /// `MCP_NEWS_BASE_URL`, `MCP_NEWS_TIMEOUT_SECS`, `MCP_NEWS_API_KEY_VAR`
    /// and the transport variables read by [`TransportConfig::from_env`].
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(name) = std::env::var("MCP_SERVER_NAME") {
            config.server.name = name;
        }

        if let Ok(level) = std::env::var("MCP_LOG_LEVEL") {
            config.logging.level = level;
        }

        config.transport = TransportConfig::from_env();

        if let Ok(mounts) = std::env::var("MCP_GATEWAY_MOUNTS") {
            config.gateway.mounts = mounts
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(secs) = parse_secs("MCP_DRAIN_TIMEOUT_SECS") {
            config.gateway.drain_timeout_secs = secs;
        }

        if let Ok(url) = std::env::var("MCP_NEWS_BASE_URL") {
            config.news.base_url = url;
        }

        if let Some(secs) = parse_secs("MCP_NEWS_TIMEOUT_SECS") {
            config.news.timeout_secs = secs;
        }

        if let Ok(var) = std::env::var("MCP_NEWS_API_KEY_VAR") {
            config.news.api_key_var = var;
        }

        config
    }
}

fn parse_secs(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(secs) => Some(secs),
        Err(_) => {
            warn!("Ignoring {}={:?}: expected a number of seconds", name, raw);
            None
        }
    }
}
