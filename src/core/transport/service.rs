//! Transport service - assembles servers and runs the configured transport.

use std::sync::Arc;

use tracing::{info, warn};

use super::TransportConfig;
use crate::core::config::Config;
use crate::core::gateway::Gateway;
use crate::core::{Error, Result};
use crate::domains::servers;

#[cfg(feature = "stdio")]
use super::stdio::StdioTransport;

/// Builds the configured tool servers and runs them on the configured
/// transport until shutdown.
pub struct TransportService {
    config: Config,
}

impl TransportService {
    /// Create a new transport service with the given configuration.
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Log information about the configured transport.
    pub fn log_info(&self) {
        info!("Starting transport: {}", self.config.transport.description());
    }

    /// Assemble the gateway from the configured mounts. Each server id is
    /// mounted at `/<id>`.
    pub fn build_gateway(&self) -> Result<Gateway> {
        let TransportConfig::Http(http) = &self.config.transport else {
            return Err(Error::config("gateway requires the HTTP transport"));
        };
        if self.config.gateway.mounts.is_empty() {
            return Err(Error::config("no servers to mount (MCP_GATEWAY_MOUNTS is empty)"));
        }

        let mut gateway = Gateway::new(http.clone(), self.config.gateway.drain_timeout());
        for id in &self.config.gateway.mounts {
            let server = servers::build(id, &self.config)?;
            gateway.mount(id, server)?;
        }
        Ok(gateway)
    }

    /// Run until the transport finishes or a shutdown signal arrives.
    pub async fn run(self) -> Result<()> {
        self.log_info();

        match &self.config.transport {
            #[cfg(feature = "stdio")]
            TransportConfig::Stdio(cfg) => {
                let server = servers::build(&cfg.server, &self.config)?;
                StdioTransport::run(Arc::new(server)).await?;
                Ok(())
            }
            TransportConfig::Http(_) => {
                let gateway = self.build_gateway()?;
                gateway.run(shutdown_signal()).await?;
                Ok(())
            }
        }
    }
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Ctrl+C received, initiating shutdown"),
        () = terminate => info!("SIGTERM received, initiating shutdown"),
    }
}
