// Retry logic for failed job executions
use crate::domain::Job;
use tracing::{info, warn};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the job (with backoff delay in ms)
    Retry(i64),
    /// Do not retry, job has failed permanently
    Failed,
}

/// Retry policy
///
/// Determines if a job should be retried based on:
/// - Attempts made so far (counted when the job starts)
/// - Maximum attempts allowed on the job
/// - Exponential backoff from a base delay
pub struct RetryPolicy {
    base_delay_ms: i64,
    backoff_factor: f64,
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Arguments
    /// * `base_delay_ms` - Delay before the second attempt
    /// * `backoff_factor` - Multiplier applied per further attempt
    pub fn new(base_delay_ms: i64, backoff_factor: f64) -> Self {
        Self {
            base_delay_ms,
            backoff_factor,
        }
    }

    /// Determine if a failed job should be retried
    ///
    /// Backoff formula:
    /// delay = base_delay * (backoff_factor ^ (attempts - 1)) * jitter
    pub fn should_retry(&self, job: &Job) -> RetryDecision {
        if job.attempts >= job.max_attempts {
            warn!(
                job_id = %job.id,
                attempts = %job.attempts,
                max_attempts = %job.max_attempts,
                "Max retry attempts reached"
            );
            return RetryDecision::Failed;
        }

        let exponent = (job.attempts - 1).max(0);
        let base_delay_ms = self.base_delay_ms as f64 * self.backoff_factor.powi(exponent);

        // ±10% jitter, seeded by job id so the delay is deterministic per job
        let jitter_seed = job.id.chars().map(|c| c as u32).sum::<u32>();
        let jitter_factor = 0.9 + ((jitter_seed % 21) as f64 / 100.0);

        let delay_ms = (base_delay_ms * jitter_factor) as i64;

        info!(
            job_id = %job.id,
            attempt = %job.attempts,
            max_attempts = %job.max_attempts,
            delay_ms = %delay_ms,
            "Scheduling retry"
        );

        RetryDecision::Retry(delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            crate::application::worker::constants::DEFAULT_RETRY_BASE_DELAY_MS,
            2.0,
        )
    }
}
