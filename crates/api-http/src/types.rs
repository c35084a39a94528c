//! HTTP Request/Response Types
//!
//! Request bodies are the core `EnqueueRequest`; status responses are the
//! core `JobStatus`. Only the envelopes specific to HTTP live here.

use serde::{Deserialize, Serialize};

pub use stella_core::application::jobs::EnqueueRequest;
pub use stella_core::domain::JobStatus;

/// POST /enqueue - accepted response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResponse {
    pub accepted: bool,
    pub job_id: String,
}

/// GET /job-status?id=
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub id: Option<String>,
}

/// GET /health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
