use thiserror::Error;

/// Gemini gateway errors
#[derive(Error, Debug)]
pub enum GeminiError {
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Gateway unavailable{}: {message}", status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    GatewayUnavailable {
        status: Option<u16>,
        message: String,
    },

    #[error("Gateway timed out after {0}s")]
    GatewayTimeout(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration Error: {0}")]
    ConfigError(String),
}

impl GeminiError {
    pub(crate) fn unavailable(message: impl Into<String>) -> Self {
        GeminiError::GatewayUnavailable {
            status: None,
            message: message.into(),
        }
    }
}

/// Result type for Gemini operations
pub type GeminiResult<T> = Result<T, GeminiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_display_includes_status() {
        let err = GeminiError::GatewayUnavailable {
            status: Some(503),
            message: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "Gateway unavailable (HTTP 503): overloaded");

        let err = GeminiError::unavailable("connection refused");
        assert_eq!(err.to_string(), "Gateway unavailable: connection refused");
    }
}
