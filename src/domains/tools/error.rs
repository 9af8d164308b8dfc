//! Tool-specific error types.

use thiserror::Error;

/// Errors that can occur while invoking a tool.
///
/// Every variant is recoverable: the transport turns it into a structured
/// `{kind, message}` response and the server keeps serving.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    /// The requested tool is not registered on this server.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The input did not match the tool's input schema.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The handler returned a value that does not match its output schema.
    #[error("Invalid output: {0}")]
    InvalidOutput(String),

    /// An outbound call made by the handler failed or timed out.
    #[error("Upstream call failed: {0}")]
    Upstream(String),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ToolError {
    /// Create a new "unknown tool" error.
    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool(name.into())
    }

    /// Create a new "invalid input" error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new "invalid output" error.
    pub fn invalid_output(msg: impl Into<String>) -> Self {
        Self::InvalidOutput(msg.into())
    }

    /// Create a new "upstream" error.
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    /// Create a new "internal" error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable error kind reported to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTool(_) => "UnknownToolError",
            Self::InvalidInput(_) => "InvalidInputError",
            Self::InvalidOutput(_) => "InvalidOutputError",
            Self::Upstream(_) => "UpstreamCallError",
            Self::Internal(_) => "InternalError",
        }
    }

    /// Whether the caller is at fault (as opposed to the server or upstream).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::UnknownTool(_) | Self::InvalidInput(_))
    }
}

impl From<reqwest::Error> for ToolError {
    /// The request URL is dropped from the message: its query string carries
    /// credentials.
    fn from(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            Self::Upstream(format!("request timed out: {err}"))
        } else if let Some(status) = err.status() {
            Self::Upstream(format!("upstream answered {status}"))
        } else {
            Self::Upstream(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(ToolError::unknown_tool("x").kind(), "UnknownToolError");
        assert_eq!(ToolError::invalid_input("x").kind(), "InvalidInputError");
        assert_eq!(ToolError::invalid_output("x").kind(), "InvalidOutputError");
        assert_eq!(ToolError::upstream("x").kind(), "UpstreamCallError");
        assert_eq!(ToolError::internal("x").kind(), "InternalError");
    }

    #[test]
    fn test_client_errors() {
        assert!(ToolError::unknown_tool("x").is_client_error());
        assert!(ToolError::invalid_input("x").is_client_error());
        assert!(!ToolError::invalid_output("x").is_client_error());
        assert!(!ToolError::upstream("x").is_client_error());
    }
}
