//! Transport configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Transport configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// A single tool server over standard input/output.
    #[cfg(feature = "stdio")]
    Stdio(StdioConfig),

    /// The gateway: every mounted server behind one HTTP listener.
    Http(HttpConfig),
}

/// STDIO transport configuration.
#[cfg(feature = "stdio")]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StdioConfig {
    /// Identifier of the server to expose.
    #[serde(default = "default_stdio_server")]
    pub server: String,
}

/// HTTP transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Port number to listen on.
    pub port: u16,

    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Enable permissive CORS for browser clients.
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Treat every request independently. When false, `initialize` issues a
    /// session id that later MCP requests must carry.
    #[serde(default = "default_true")]
    pub stateless: bool,

    /// Idle seconds after which an issued session id expires.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Upper bound on live session ids per server.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_true() -> bool {
    true
}

fn default_session_ttl_secs() -> u64 {
    3600
}

fn default_max_sessions() -> usize {
    1024
}

#[cfg(feature = "stdio")]
fn default_stdio_server() -> String {
    "docs".to_string()
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Http(HttpConfig::default())
    }
}

#[cfg(feature = "stdio")]
impl Default for StdioConfig {
    fn default() -> Self {
        Self {
            server: default_stdio_server(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 10000,
            host: default_host(),
            enable_cors: true,
            stateless: true,
            session_ttl_secs: default_session_ttl_secs(),
            max_sessions: default_max_sessions(),
        }
    }
}

impl HttpConfig {
    /// Get the bind address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Idle timeout of issued session ids.
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

impl TransportConfig {
    /// Create a STDIO transport config for `server`.
    #[cfg(feature = "stdio")]
    pub fn stdio(server: impl Into<String>) -> Self {
        Self::Stdio(StdioConfig {
            server: server.into(),
        })
    }

    /// Create an HTTP transport config.
    pub fn http(port: u16, host: impl Into<String>) -> Self {
        Self::Http(HttpConfig {
            port,
            host: host.into(),
            ..Default::default()
        })
    }

    /// Load transport config from environment variables.
    pub fn from_env() -> Self {
        let transport = std::env::var("MCP_TRANSPORT")
            .unwrap_or_default()
            .to_lowercase();

        match transport.as_str() {
            #[cfg(feature = "stdio")]
            "stdio" => {
                let server =
                    std::env::var("MCP_STDIO_SERVER").unwrap_or_else(|_| default_stdio_server());
                Self::Stdio(StdioConfig { server })
            }
            _ => {
                let port = std::env::var("MCP_HTTP_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(10000);
                let host = std::env::var("MCP_HTTP_HOST").unwrap_or_else(|_| default_host());
                let enable_cors = env_flag("MCP_HTTP_CORS").unwrap_or(true);
                let stateless = env_flag("MCP_HTTP_STATELESS").unwrap_or(true);
                let session_ttl_secs = env_parse("MCP_HTTP_SESSION_TTL_SECS")
                    .unwrap_or_else(default_session_ttl_secs);
                let max_sessions =
                    env_parse("MCP_HTTP_MAX_SESSIONS").unwrap_or_else(default_max_sessions);
                Self::Http(HttpConfig {
                    port,
                    host,
                    enable_cors,
                    stateless,
                    session_ttl_secs,
                    max_sessions,
                })
            }
        }
    }

    /// Get a description of this transport for logging.
    pub fn description(&self) -> String {
        match self {
            #[cfg(feature = "stdio")]
            Self::Stdio(cfg) => format!("STDIO (server '{}')", cfg.server),
            Self::Http(cfg) => format!(
                "HTTP gateway on {} ({})",
                cfg.address(),
                if cfg.stateless { "stateless" } else { "session affinity" }
            ),
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| v.to_lowercase() != "false" && v != "0")
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
