//! Gateway error types.

use thiserror::Error;

use super::GatewayState;
use crate::core::lifespan::LifespanError;
use crate::core::transport::TransportError;

/// Errors raised while assembling, starting or serving the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No mounted server matches the request path.
    #[error("No tool server mounted for path: {0}")]
    NotFound(String),

    /// The mount prefix is not a single path segment.
    #[error("Invalid mount prefix '{0}': expected a single path segment such as /docs")]
    InvalidPrefix(String),

    /// The prefix is already taken by another server.
    #[error("Prefix already mounted: {0}")]
    DuplicateMount(String),

    /// A server's lifespan scope failed to open; the gateway never became ready.
    #[error("Server '{server}' failed to start: {source}")]
    Startup {
        server: String,
        #[source]
        source: LifespanError,
    },

    /// The operation is not allowed in the current state.
    #[error("Gateway is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: GatewayState,
        actual: GatewayState,
    },

    /// Listener or HTTP serving failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl GatewayError {
    /// Create a "not found" error.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    /// Stable error kind reported to callers and in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NotFoundError",
            Self::InvalidPrefix(_) | Self::DuplicateMount(_) => "InvalidMountError",
            Self::Startup { source, .. } => source.kind(),
            Self::InvalidState { .. } => "GatewayStateError",
            Self::Transport(e) => e.kind(),
        }
    }
}
