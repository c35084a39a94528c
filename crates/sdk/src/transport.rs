//! Job Transport
//!
//! The two calls a poll client makes against the job API. `HttpTransport`
//! speaks to the daemon; `mocks::ScriptedTransport` replays canned statuses.

use crate::error::{Result, SdkError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use stella_core::application::jobs::EnqueueRequest;
use stella_core::domain::JobStatus;
use tracing::debug;

#[async_trait]
pub trait JobTransport: Send + Sync {
    /// Submit a job, returning its id
    async fn enqueue(&self, request: &EnqueueRequest) -> Result<String>;

    /// Current status of a job
    async fn status(&self, job_id: &str) -> Result<JobStatus>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcceptedBody {
    job_id: String,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    duplicate: bool,
}

/// HTTP transport against `POST /enqueue` and `GET /job-status`
///
/// # Example
///
/// ```no_run
/// # use stella_sdk::{HttpTransport, JobTransport};
/// # use stella_sdk::EnqueueRequest;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = HttpTransport::new("http://127.0.0.1:8787")?;
/// let job_id = transport.enqueue(&EnqueueRequest::ask("What is a comet?")).await?;
/// println!("Job ID: {}", job_id);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for `base_url` (e.g. `http://127.0.0.1:8787`)
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let base_url = base_url.as_ref().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(SdkError::InvalidUrl(base_url));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SdkError::Connection(format!("Failed to create client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn error_from(response: reqwest::Response) -> SdkError {
        let status = response.status().as_u16();
        let body: ErrorBody = response.json().await.unwrap_or_default();
        let message = body
            .error
            .unwrap_or_else(|| format!("Request failed with status {}", status));

        if status == 409 && body.duplicate {
            SdkError::Duplicate(message)
        } else {
            SdkError::Api { status, message }
        }
    }
}

#[async_trait]
impl JobTransport for HttpTransport {
    async fn enqueue(&self, request: &EnqueueRequest) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/enqueue", self.base_url))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        let body: AcceptedBody = response.json().await?;
        debug!(job_id = %body.job_id, "Job enqueued");
        Ok(body.job_id)
    }

    async fn status(&self, job_id: &str) -> Result<JobStatus> {
        let response = self
            .client
            .get(format!("{}/job-status", self.base_url))
            .query(&[("id", job_id)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }

        Ok(response.json().await?)
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use stella_core::domain::JobState;
    use tokio::time::Instant;

    /// Transport replaying a scripted sequence of status responses
    ///
    /// Each status call waits `status_delay` and then pops the next scripted
    /// response; a call dropped during the wait consumes nothing. Once the
    /// script is exhausted, the job reports `active`.
    #[derive(Default)]
    pub struct ScriptedTransport {
        statuses: Mutex<VecDeque<Result<JobStatus>>>,
        status_delay: Duration,
        enqueued: Mutex<Vec<EnqueueRequest>>,
        status_calls: Mutex<Vec<(String, Instant)>>,
        next_id: AtomicUsize,
        reject_as_duplicate: AtomicBool,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Delay applied to every status call before it answers
        pub fn with_status_delay(mut self, delay: Duration) -> Self {
            self.status_delay = delay;
            self
        }

        pub fn push_state(&self, state: JobState) {
            self.push_status(JobStatus {
                state,
                result: None,
                error: None,
            });
        }

        pub fn push_completed(&self, result: serde_json::Value) {
            self.push_status(JobStatus {
                state: JobState::Completed,
                result: Some(result),
                error: None,
            });
        }

        pub fn push_failed(&self, error: Option<&str>) {
            self.push_status(JobStatus {
                state: JobState::Failed,
                result: None,
                error: error.map(str::to_string),
            });
        }

        pub fn push_status(&self, status: JobStatus) {
            self.statuses.lock().unwrap().push_back(Ok(status));
        }

        pub fn push_error(&self, error: SdkError) {
            self.statuses.lock().unwrap().push_back(Err(error));
        }

        /// Make every enqueue fail as a 409 duplicate
        pub fn reject_as_duplicate(&self, reject: bool) {
            self.reject_as_duplicate.store(reject, Ordering::SeqCst);
        }

        pub fn enqueued(&self) -> Vec<EnqueueRequest> {
            self.enqueued.lock().unwrap().clone()
        }

        /// Job id and instant of every answered status call
        pub fn status_calls(&self) -> Vec<(String, Instant)> {
            self.status_calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JobTransport for ScriptedTransport {
        async fn enqueue(&self, request: &EnqueueRequest) -> Result<String> {
            if self.reject_as_duplicate.load(Ordering::SeqCst) {
                return Err(SdkError::Duplicate(
                    "Duplicate request: an identical job was submitted recently".to_string(),
                ));
            }
            self.enqueued.lock().unwrap().push(request.clone());
            let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("job-{}", n))
        }

        async fn status(&self, job_id: &str) -> Result<JobStatus> {
            if !self.status_delay.is_zero() {
                tokio::time::sleep(self.status_delay).await;
            }
            self.status_calls
                .lock()
                .unwrap()
                .push((job_id.to_string(), Instant::now()));

            self.statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(JobStatus {
                    state: JobState::Active,
                    result: None,
                    error: None,
                }))
        }
    }
}
