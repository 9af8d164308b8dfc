//! Error types and handling for the gateway.
//!
//! A unified error type wrapping every domain and layer error, used at the
//! application boundary.

use thiserror::Error;

/// A specialized Result type for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Error raised by a tool invocation.
    #[error("Tool error: {0}")]
    Tool(#[from] crate::domains::tools::ToolError),

    /// Error raised while building a tool registry.
    #[error("Registry error: {0}")]
    Registry(#[from] crate::domains::tools::RegistryError),

    /// Error raised by a lifespan scope.
    #[error("Lifespan error: {0}")]
    Lifespan(#[from] super::lifespan::LifespanError),

    /// Error raised by the gateway.
    #[error("Gateway error: {0}")]
    Gateway(#[from] super::gateway::GatewayError),

    /// Error raised by a transport.
    #[error("Transport error: {0}")]
    Transport(#[from] super::transport::TransportError),

    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Stable error kind reported in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Tool(e) => e.kind(),
            Self::Registry(e) => e.kind(),
            Self::Lifespan(e) => e.kind(),
            Self::Gateway(e) => e.kind(),
            Self::Transport(e) => e.kind(),
            Self::Config(_) => "ConfigurationError",
        }
    }
}
