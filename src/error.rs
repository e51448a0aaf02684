//! Mimir error types

use std::time::Duration;

/// Mimir error types
#[derive(Debug, thiserror::Error)]
pub enum MimirError {
    // Backend/network errors
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("model not found: {0}")]
    ModelNotFound(String),

    // Streaming errors
    #[error("stream error: {0}")]
    Stream(String),

    // Data errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Document could not be decoded as text.
    #[error("unsupported document '{name}': {reason}")]
    UnsupportedDocument { name: String, reason: String },

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Retrieval mode was entered without any uploaded documents.
    #[error("no uploaded files")]
    NoDocuments,

    // Soft errors
    #[error("empty response from model")]
    EmptyResponse,

    // Wrapped llm crate error
    #[error("LLM error: {0}")]
    Llm(String),
}

impl From<llm::error::LLMError> for MimirError {
    fn from(err: llm::error::LLMError) -> Self {
        // Map llm errors to our error types
        let msg = err.to_string();
        if msg.contains("rate limit") || msg.contains("429") {
            MimirError::RateLimited { retry_after: None }
        } else if msg.contains("authentication")
            || msg.contains("401")
            || msg.contains("invalid api key")
        {
            MimirError::AuthenticationFailed
        } else if msg.contains("not found") || msg.contains("404") {
            MimirError::ModelNotFound(msg)
        } else {
            MimirError::Llm(msg)
        }
    }
}

/// Result type alias for Mimir operations
pub type Result<T> = std::result::Result<T, MimirError>;
