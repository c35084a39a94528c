//! SDK Error Types

use thiserror::Error;

/// SDK Result type
pub type Result<T> = std::result::Result<T, SdkError>;

/// SDK Error
#[derive(Debug, Error)]
pub enum SdkError {
    #[error("Connection error: {0}")]
    Connection(String),

    /// Non-2xx response; `message` is the server's `error` field when present
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The server refused an identical guarded submission (HTTP 409)
    #[error("Duplicate request: {0}")]
    Duplicate(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for SdkError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            SdkError::Connection(e.to_string())
        } else if e.is_decode() {
            SdkError::Transport(format!("Invalid response body: {}", e))
        } else {
            SdkError::Transport(e.to_string())
        }
    }
}
