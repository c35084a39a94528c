// Worker - Job execution loop

pub mod constants;
mod shutdown;

use constants::*;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::retry::{RetryDecision, RetryPolicy};
use crate::domain::Job;
use crate::error::Result;
use crate::port::{ExecutionError, JobExecutor, JobQueue, TimeProvider};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Worker pulls jobs from the queue and runs them through the executor
pub struct Worker {
    job_queue: Arc<dyn JobQueue>,
    executor: Arc<dyn JobExecutor>,
    retry_policy: Arc<RetryPolicy>,
    time_provider: Arc<dyn TimeProvider>,
}

impl Worker {
    pub fn new(
        job_queue: Arc<dyn JobQueue>,
        executor: Arc<dyn JobExecutor>,
        retry_policy: Arc<RetryPolicy>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            job_queue,
            executor,
            retry_policy,
            time_provider,
        }
    }

    /// Run worker loop with graceful shutdown support
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!("Worker started");
        loop {
            if shutdown.is_shutdown() {
                info!("Worker shutting down");
                break;
            }
            match self.process_next_job().await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = sleep(IDLE_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!("Worker interrupted during idle");
                            break;
                        }
                    }
                }
                Err(e) => {
                    error!("Worker error: {}", e);
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!("Worker interrupted during error recovery");
                            break;
                        }
                    }
                }
            }
        }
        info!("Worker stopped");
        Ok(())
    }

    /// Process next job from queue (returns true if a job was processed)
    pub async fn process_next_job(&self) -> Result<bool> {
        let now = self.time_provider.now_millis();
        let mut job = match self.job_queue.pop_next(now).await? {
            Some(j) => j,
            None => return Ok(false),
        };

        info!(job_id = %job.id, kind = %job.kind(), attempt = job.attempts, "Processing job");

        // Spawned so that a panicking executor cannot take the worker down
        let executor = Arc::clone(&self.executor);
        let job_for_exec = job.clone();
        let handle = tokio::task::spawn(async move { executor.execute(&job_for_exec).await });

        match handle.await {
            Ok(Ok(result)) => {
                job.complete(self.time_provider.now_millis(), result)?;
                info!(job_id = %job.id, "Job completed");
            }
            Ok(Err(e)) => self.handle_failure(&mut job, e)?,
            Err(join_err) => {
                if join_err.is_panic() {
                    error!(job_id = %job.id, "Job panicked: {:?}", join_err);
                } else {
                    error!(job_id = %job.id, "Job cancelled: {:?}", join_err);
                }
                job.fail(self.time_provider.now_millis(), PANIC_ERROR_MESSAGE);
            }
        }

        self.job_queue.update(&job).await?;
        Ok(true)
    }

    fn handle_failure(&self, job: &mut Job, err: ExecutionError) -> Result<()> {
        match self.retry_policy.should_retry(job) {
            RetryDecision::Retry(delay_ms) => {
                warn!(
                    job_id = %job.id,
                    attempt = %job.attempts,
                    delay_ms = %delay_ms,
                    error = %err,
                    "Retrying job after failure"
                );
                let run_at = self.time_provider.now_millis() + delay_ms;
                job.delay(run_at, err.to_string())?;
            }
            RetryDecision::Failed => {
                error!(job_id = %job.id, error = %err, "Job failed after max retries");
                job.fail(self.time_provider.now_millis(), err.to_string());
            }
        }
        Ok(())
    }
}
