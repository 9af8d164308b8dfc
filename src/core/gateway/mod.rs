//! Gateway: several tool servers behind one HTTP listener.
//!
//! The gateway owns the mount table and drives every server's lifespan
//! scope as one unit:
//!
//! ```text
//! Idle ─▶ Starting ─▶ Ready ─▶ Draining ─▶ Stopped
//!            └──────── any open() fails ───────▶ Stopped
//! ```
//!
//! Startup is all-or-nothing: if one scope fails to open, the scopes opened
//! before it are closed in reverse order and no listener is bound. Shutdown
//! stops accepting, drains in-flight requests for at most the drain
//! timeout, then closes every scope in reverse mount order.

mod error;
mod mount;

use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tracing::{error, info, instrument, warn};

pub use error::GatewayError;
pub use mount::{Mount, MountTable};

use super::server::ToolServer;
use super::transport::{HttpConfig, TransportError, http};

/// Lifecycle state of the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayState {
    Idle,
    Starting,
    Ready,
    Draining,
    Stopped,
}

/// Owns N tool servers and serves them under distinct path prefixes.
pub struct Gateway {
    mounts: MountTable,
    http: HttpConfig,
    drain_timeout: Duration,
    state: Arc<watch::Sender<GatewayState>>,
}

impl Gateway {
    /// Create an idle gateway with no mounts.
    pub fn new(http: HttpConfig, drain_timeout: Duration) -> Self {
        let (state, _) = watch::channel(GatewayState::Idle);
        Self {
            mounts: MountTable::new(),
            http,
            drain_timeout,
            state: Arc::new(state),
        }
    }

    /// Mount `server` under `prefix`. Only allowed before startup.
    pub fn mount(&mut self, prefix: &str, server: ToolServer) -> Result<(), GatewayError> {
        self.expect_state(GatewayState::Idle)?;
        info!(prefix, server = server.id(), "Mounting tool server");
        self.mounts.insert(prefix, Arc::new(server))
    }

    pub fn mounts(&self) -> &MountTable {
        &self.mounts
    }

    pub fn http_config(&self) -> &HttpConfig {
        &self.http
    }

    /// Current lifecycle state.
    pub fn state(&self) -> GatewayState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<GatewayState> {
        self.state.subscribe()
    }

    /// Open every mounted server's lifespan scope, all or nothing.
    #[instrument(skip(self), fields(servers = self.mounts.len()))]
    pub async fn start(&self) -> Result<(), GatewayError> {
        self.expect_state(GatewayState::Idle)?;
        self.transition(GatewayState::Starting);

        for (index, mount) in self.mounts.iter().enumerate() {
            let server = mount.server();
            if let Err(source) = server.open().await {
                error!(
                    server = server.id(),
                    kind = source.kind(),
                    "Startup aborted: {}", source
                );
                for opened in self.mounts.iter().take(index).rev() {
                    if let Err(e) = opened.server().close().await {
                        warn!(server = opened.server().id(), "Failed to close scope: {}", e);
                    }
                }
                self.transition(GatewayState::Stopped);
                return Err(GatewayError::Startup {
                    server: server.id().to_string(),
                    source,
                });
            }
        }

        self.transition(GatewayState::Ready);
        Ok(())
    }

    /// The HTTP router for all mounts.
    pub fn router(&self) -> Router {
        http::gateway_router(&self.mounts, &self.http, self.subscribe())
    }

    /// Serve requests on `listener` until `shutdown` resolves, then drain and
    /// close every scope. The gateway must be [`GatewayState::Ready`].
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.expect_state(GatewayState::Ready)?;

        if let Ok(addr) = listener.local_addr() {
            info!("Ready - listening on {} ({} tool servers)", addr, self.mounts.len());
            for mount in self.mounts.iter() {
                info!("  → {}  ({})", mount.prefix(), mount.server().id());
            }
        }

        let state = self.state.clone();
        let (drain_tx, drain_rx) = oneshot::channel::<()>();
        let graceful = async move {
            shutdown.await;
            info!("Shutdown requested, draining in-flight requests");
            state.send_replace(GatewayState::Draining);
            let _ = drain_tx.send(());
        };

        let drain_timeout = self.drain_timeout;
        let drain_deadline = async move {
            if drain_rx.await.is_err() {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(drain_timeout).await;
        };

        let server = axum::serve(listener, self.router())
            .with_graceful_shutdown(graceful)
            .into_future();

        let result = tokio::select! {
            res = server => res.map_err(|e| TransportError::http(e.to_string())),
            () = drain_deadline => {
                warn!(
                    "Drain timeout of {:?} elapsed, cancelling in-flight invocations",
                    drain_timeout
                );
                Ok(())
            }
        };

        self.shutdown().await;
        result.map_err(GatewayError::from)
    }

    /// Start, bind the configured address and serve until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.start().await?;

        let addr = self.http.address();
        let listener = match TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.shutdown().await;
                return Err(TransportError::bind(&addr, e).into());
            }
        };

        self.serve(listener, shutdown).await
    }

    /// Close every scope in reverse mount order, best effort.
    pub async fn shutdown(&self) {
        if self.state() == GatewayState::Stopped {
            return;
        }
        self.transition(GatewayState::Draining);

        for mount in self.mounts.iter().rev() {
            if let Err(e) = mount.server().close().await {
                error!(server = mount.server().id(), "Failed to close scope: {}", e);
            }
        }

        self.transition(GatewayState::Stopped);
        info!("Gateway stopped");
    }

    fn transition(&self, next: GatewayState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!("Gateway state: {:?} -> {:?}", previous, next);
        }
    }

    fn expect_state(&self, expected: GatewayState) -> Result<(), GatewayError> {
        let actual = self.state();
        if actual == expected {
            Ok(())
        } else {
            Err(GatewayError::InvalidState { expected, actual })
        }
    }
}
