//! Transport error types.

use thiserror::Error;

use crate::core::lifespan::LifespanError;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors that can occur in transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Failed to bind to address.
    #[error("Failed to bind to {address}: {source}")]
    BindError {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The served tool server's lifespan failed to open.
    #[error("Server '{server}' failed to start: {source}")]
    Startup {
        server: String,
        #[source]
        source: LifespanError,
    },

    /// Server initialization error.
    #[error("Server initialization error: {0}")]
    InitError(String),

    /// HTTP-specific error.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Service error from rmcp.
    #[error("Service error: {0}")]
    ServiceError(String),
}

impl TransportError {
    /// Create a bind error.
    pub fn bind(address: impl Into<String>, source: std::io::Error) -> Self {
        Self::BindError {
            address: address.into(),
            source,
        }
    }

    /// Create a startup error for `server`.
    pub fn startup(server: impl Into<String>, source: LifespanError) -> Self {
        Self::Startup {
            server: server.into(),
            source,
        }
    }

    /// Create an initialization error.
    pub fn init(msg: impl Into<String>) -> Self {
        Self::InitError(msg.into())
    }

    /// Create an HTTP error.
    pub fn http(msg: impl Into<String>) -> Self {
        Self::HttpError(msg.into())
    }

    /// Stable error kind. A startup failure reports the lifespan's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Startup { source, .. } => source.kind(),
            _ => "TransportError",
        }
    }
}
