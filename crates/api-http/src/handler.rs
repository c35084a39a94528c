//! HTTP Route Handlers

use crate::error::{ApiError, ApiResult};
use crate::types::{EnqueueRequest, EnqueueResponse, HealthResponse, JobStatus, StatusQuery};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use stella_core::application::jobs::EnqueueOutcome;
use stella_core::application::JobService;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<JobService>,
}

impl AppState {
    pub fn new(service: Arc<JobService>) -> Self {
        Self { service }
    }
}

/// Build the application router with request tracing
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/enqueue", post(enqueue))
        .route("/job-status", get(job_status))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST /enqueue
async fn enqueue(
    State(state): State<AppState>,
    body: Result<Json<EnqueueRequest>, JsonRejection>,
) -> ApiResult<Json<EnqueueResponse>> {
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    match state.service.enqueue(req).await? {
        EnqueueOutcome::Accepted { job_id } => Ok(Json(EnqueueResponse {
            accepted: true,
            job_id,
        })),
        EnqueueOutcome::Duplicate { lock_key } => Err(ApiError::Duplicate { lock_key }),
    }
}

/// GET /job-status?id=<jobId>
async fn job_status(
    State(state): State<AppState>,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> ApiResult<Json<JobStatus>> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let id = query
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing id".to_string()))?;

    let status = state.service.status(&id).await?;
    debug!(job_id = %id, state = %status.state, "Job status");
    Ok(Json(status))
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: stella_core::VERSION.to_string(),
    })
}
