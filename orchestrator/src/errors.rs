use gemini_core::GeminiError;
use gemini_mcp::McpError;
use thiserror::Error;

/// Why a query (or the client around it) failed.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error(transparent)]
    Gateway(#[from] GeminiError),

    #[error(transparent)]
    Tool(#[from] McpError),
}

pub type QueryResult<T> = Result<T, QueryError>;
