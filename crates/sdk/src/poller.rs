//! Job Poller
//!
//! Polls `status` until the job reaches a terminal state, waiting with
//! exponential backoff between non-terminal answers.

use crate::backoff::{Backoff, PollConfig};
use crate::transport::JobTransport;
use std::sync::Arc;
use stella_core::domain::{unwrap_result_envelope, JobState};
use tokio::sync::watch;
use tracing::debug;

/// Terminal result of a poll sequence
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Result payload, with one generic `result` wrapper removed
    Completed(serde_json::Value),
    Failed(String),
    Cancelled,
}

/// Cancels one poll sequence
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Observes cancellation of one poll sequence
#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled; never resolves if the handle is dropped uncancelled
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Create a cancellation pair for one poll sequence
pub fn cancel_channel() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx: Arc::new(tx) }, CancelToken { rx })
}

pub struct JobPoller {
    transport: Arc<dyn JobTransport>,
    config: PollConfig,
}

impl JobPoller {
    pub fn new(transport: Arc<dyn JobTransport>, config: PollConfig) -> Self {
        Self { transport, config }
    }

    /// Poll `job_id` until completed, failed or cancelled.
    ///
    /// `on_state` receives every non-terminal state observed. Transport and
    /// decode errors end the sequence as `Failed`. There is no deadline: a
    /// job stuck in a non-terminal state is polled until cancelled.
    pub async fn poll<F>(&self, job_id: &str, cancel: &CancelToken, mut on_state: F) -> PollOutcome
    where
        F: FnMut(JobState) + Send,
    {
        let mut backoff = Backoff::new(&self.config);

        loop {
            if cancel.is_cancelled() {
                return PollOutcome::Cancelled;
            }

            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => return PollOutcome::Cancelled,
                status = self.transport.status(job_id) => status,
            };

            if cancel.is_cancelled() {
                return PollOutcome::Cancelled;
            }

            let status = match status {
                Ok(status) => status,
                Err(e) => {
                    debug!(job_id = %job_id, error = %e, "Status query failed");
                    return PollOutcome::Failed(e.to_string());
                }
            };

            match status.state {
                JobState::Completed => {
                    let result = status.result.unwrap_or(serde_json::Value::Null);
                    return PollOutcome::Completed(unwrap_result_envelope(result));
                }
                JobState::Failed => {
                    return PollOutcome::Failed(
                        status.error.unwrap_or_else(|| "Job failed".to_string()),
                    );
                }
                state => {
                    on_state(state);
                    let delay = backoff.next_delay();
                    debug!(job_id = %job_id, state = %state, delay_ms = delay.as_millis() as u64, "Job not finished");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
