use thiserror::Error;

/// Errors raised while talking to a tool-providing process
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Unsupported endpoint kind: {0}")]
    UnsupportedEndpointKind(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool '{tool}' failed: {message}")]
    ToolExecutionError { tool: String, message: String },

    #[error("Invalid schema for tool '{tool}': {reason}")]
    InvalidToolSchema { tool: String, reason: String },
}

impl McpError {
    pub(crate) fn transport(message: impl Into<String>) -> Self {
        McpError::TransportError(message.into())
    }
}

/// Result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;
