//! HTTP Error Types
//!
//! Maps application errors to HTTP status codes and a JSON body
//! `{ "error": message, "code": CODE }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use stella_core::error::AppError;

/// Error codes carried in the `code` field
pub mod code {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const CONFLICT: &str = "CONFLICT";
    pub const DUPLICATE: &str = "DUPLICATE";
    pub const LOCK_STORE_UNAVAILABLE: &str = "LOCK_STORE_UNAVAILABLE";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    pub const DB_ERROR: &str = "DB_ERROR";
}

/// Handler error
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    App(#[from] AppError),

    /// Malformed request that never reached the core (bad JSON, missing query)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A guarded submission is already in flight
    #[error("Duplicate request: {lock_key}")]
    Duplicate { lock_key: String },
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, code::VALIDATION_ERROR, msg.clone())
            }
            ApiError::Duplicate { lock_key } => {
                tracing::info!(lock_key = %lock_key, "Rejecting duplicate submission");
                let body = json!({
                    "error": "Duplicate request: an identical job was submitted recently",
                    "code": code::DUPLICATE,
                    "duplicate": true,
                });
                return (StatusCode::CONFLICT, Json(body)).into_response();
            }
            ApiError::App(app) => classify_app_error(app),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}

fn classify_app_error(err: &AppError) -> (StatusCode, &'static str, String) {
    match err {
        AppError::Validation(msg) => (StatusCode::BAD_REQUEST, code::VALIDATION_ERROR, msg.clone()),
        AppError::Domain(e) => (StatusCode::BAD_REQUEST, code::VALIDATION_ERROR, e.to_string()),
        AppError::Serialization(e) => {
            (StatusCode::BAD_REQUEST, code::VALIDATION_ERROR, e.to_string())
        }
        AppError::NotFound(msg) => (StatusCode::NOT_FOUND, code::NOT_FOUND, msg.clone()),
        AppError::Conflict(msg) => (StatusCode::CONFLICT, code::CONFLICT, msg.clone()),
        AppError::LockStore(msg) => {
            tracing::error!(error = %msg, "Lock store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                code::LOCK_STORE_UNAVAILABLE,
                "Lock store unavailable, try again later".to_string(),
            )
        }
        AppError::Database(msg) => {
            tracing::error!(error = %msg, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                code::DB_ERROR,
                "Failed to enqueue job".to_string(),
            )
        }
        other => {
            tracing::error!(error = %other, "Internal error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                code::INTERNAL_ERROR,
                "An internal error occurred".to_string(),
            )
        }
    }
}
