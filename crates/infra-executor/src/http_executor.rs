// HTTP executor: forwards a job to the LLM gateway and validates its answer

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use stella_core::domain::{unwrap_result_envelope, AskAnswer, Job, JobKind, JobPayload, MissionPlan};
use stella_core::port::{ExecutionError, JobExecutor};
use tracing::{debug, warn};

/// Upstream error bodies are cut to this many characters before being stored
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Clone)]
pub struct HttpExecutorConfig {
    /// Gateway endpoint receiving `POST { id, kind, payload }`
    pub url: String,
    pub timeout: Duration,
}

impl Default for HttpExecutorConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8788/run".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Serialize)]
struct RunRequest<'a> {
    id: &'a str,
    kind: JobKind,
    payload: &'a JobPayload,
}

/// Executes jobs by calling the LLM gateway over HTTP
pub struct HttpJobExecutor {
    client: reqwest::Client,
    config: HttpExecutorConfig,
}

impl HttpJobExecutor {
    pub fn new(config: HttpExecutorConfig) -> Result<Self, ExecutionError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExecutionError::Transport(format!("Failed to build client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn map_send_error(&self, err: reqwest::Error) -> ExecutionError {
        if err.is_timeout() {
            ExecutionError::Timeout(self.config.timeout.as_millis() as u64)
        } else if err.is_decode() {
            ExecutionError::InvalidResult(err.to_string())
        } else {
            ExecutionError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl JobExecutor for HttpJobExecutor {
    async fn execute(&self, job: &Job) -> Result<serde_json::Value, ExecutionError> {
        let body = RunRequest {
            id: &job.id,
            kind: job.kind(),
            payload: &job.payload,
        };

        debug!(job_id = %job.id, url = %self.config.url, "Calling gateway");

        let response = self
            .client
            .post(&self.config.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = upstream_message(&text);
            warn!(job_id = %job.id, status = status.as_u16(), "Gateway rejected job");
            return Err(ExecutionError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| self.map_send_error(e))?;

        validate_result(job.kind(), unwrap_result_envelope(value))
    }
}

/// Check the gateway answer has the shape pollers expect for `kind`
fn validate_result(
    kind: JobKind,
    value: serde_json::Value,
) -> Result<serde_json::Value, ExecutionError> {
    let checked = match kind {
        JobKind::Ask => serde_json::from_value::<AskAnswer>(value.clone()).map(|_| ()),
        JobKind::Mission => serde_json::from_value::<MissionPlan>(value.clone()).map(|_| ()),
    };
    checked
        .map(|_| value)
        .map_err(|e| ExecutionError::InvalidResult(format!("{} result: {}", kind, e)))
}

/// Prefer the gateway's `{ "error": "..." }` field over the raw body
fn upstream_message(body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string));

    match from_json {
        Some(message) => message,
        None if body.trim().is_empty() => "empty response body".to_string(),
        None => body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use chrono::NaiveDate;
    use serde_json::{json, Value};

    fn mission_job() -> Job {
        Job::new(
            "job-m",
            0,
            JobPayload::Mission {
                role: "explorer".to_string(),
                date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
            },
        )
    }

    fn ask_job() -> Job {
        Job::new(
            "job-a",
            0,
            JobPayload::Ask {
                prompt: "What is a pulsar?".to_string(),
                context: None,
                role: None,
                mission: None,
            },
        )
    }

    /// Start a stub gateway on an ephemeral port, return its `/run` URL
    async fn spawn_gateway(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/run", addr)
    }

    fn executor(url: String) -> HttpJobExecutor {
        HttpJobExecutor::new(HttpExecutorConfig {
            url,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_ask_result_is_unwrapped_and_returned() {
        let router = Router::new().route(
            "/run",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["kind"], "ask");
                assert_eq!(body["payload"]["prompt"], "What is a pulsar?");
                Json(json!({"result": {"answer": "A spinning neutron star"}}))
            }),
        );
        let url = spawn_gateway(router).await;

        let value = executor(url).execute(&ask_job()).await.unwrap();
        assert_eq!(value, json!({"answer": "A spinning neutron star"}));
    }

    #[tokio::test]
    async fn test_mission_result_shape_is_checked() {
        let router = Router::new().route(
            "/run",
            post(|| async { Json(json!({"missionTitle": "Orbit", "topics": []})) }),
        );
        let url = spawn_gateway(router).await;

        let err = executor(url).execute(&mission_job()).await.unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidResult(_)));
        assert!(err.to_string().contains("mission"));
    }

    #[tokio::test]
    async fn test_upstream_error_field_is_surfaced() {
        let router = Router::new().route(
            "/run",
            post(|| async {
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({"error": "model overloaded"})),
                )
            }),
        );
        let url = spawn_gateway(router).await;

        match executor(url).execute(&ask_job()).await.unwrap_err() {
            ExecutionError::Upstream { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "model overloaded");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_transport_error() {
        let err = executor("http://127.0.0.1:1/run".to_string())
            .execute(&ask_job())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Transport(_)));
    }

    #[test]
    fn test_upstream_message_falls_back_to_body() {
        assert_eq!(upstream_message("{\"error\":\"nope\"}"), "nope");
        assert_eq!(upstream_message("plain text"), "plain text");
        assert_eq!(upstream_message("  "), "empty response body");
        assert_eq!(
            upstream_message(&"x".repeat(1000)).len(),
            MAX_ERROR_BODY_CHARS
        );
    }
}
