// Crash recovery for jobs interrupted by a daemon stop
use crate::application::worker::constants::INTERRUPTED_ERROR_MESSAGE;
use crate::domain::JobState;
use crate::error::Result;
use crate::port::{JobQueue, TimeProvider};
use std::sync::Arc;
use tracing::{info, warn};

/// Crash recovery service
///
/// A job is `active` only while a worker runs it. Any job still active when
/// the daemon starts was orphaned by the previous process. Must run before
/// the worker is spawned, and assumes no other daemon shares the queue.
pub struct RecoveryService {
    queue: Arc<dyn JobQueue>,
    time_provider: Arc<dyn TimeProvider>,
}

impl RecoveryService {
    pub fn new(queue: Arc<dyn JobQueue>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            queue,
            time_provider,
        }
    }

    /// Put orphaned jobs back in line, or fail them when out of attempts
    ///
    /// # Returns
    /// Number of jobs recovered
    pub async fn recover_orphaned_jobs(&self) -> Result<usize> {
        let now = self.time_provider.now_millis();
        let orphaned = self.queue.find_by_state(JobState::Active).await?;

        for mut job in orphaned.iter().cloned() {
            if job.attempts < job.max_attempts {
                job.delay(now, INTERRUPTED_ERROR_MESSAGE)?;
                info!(job_id = %job.id, attempt = job.attempts, "Requeued orphaned job");
            } else {
                job.fail(now, INTERRUPTED_ERROR_MESSAGE);
                warn!(job_id = %job.id, "Orphaned job out of attempts, marked failed");
            }
            self.queue.update(&job).await?;
        }

        Ok(orphaned.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Job, JobPayload};
    use crate::port::job_queue::mocks::InMemoryJobQueue;
    use crate::port::time_provider::mocks::FixedTimeProvider;

    fn ask(id: &str) -> Job {
        Job::new(
            id,
            0,
            JobPayload::Ask {
                prompt: "Where is Voyager 1?".to_string(),
                context: None,
                role: None,
                mission: None,
            },
        )
    }

    #[tokio::test]
    async fn test_orphaned_jobs_are_requeued_or_failed() {
        let queue = Arc::new(InMemoryJobQueue::new());
        let clock = Arc::new(FixedTimeProvider::new(10_000));

        queue.submit(&ask("job-1")).await.unwrap();
        queue.submit(&ask("job-2").with_max_attempts(1)).await.unwrap();
        queue.submit(&ask("job-3")).await.unwrap();
        queue.pop_next(1_000).await.unwrap();
        queue.pop_next(1_000).await.unwrap();

        let service = RecoveryService::new(queue.clone(), clock);
        assert_eq!(service.recover_orphaned_jobs().await.unwrap(), 2);

        let jobs = queue.all();
        assert_eq!(jobs[0].state, JobState::Delayed);
        assert_eq!(jobs[0].run_at, Some(10_000));
        assert_eq!(jobs[1].state, JobState::Failed);
        assert_eq!(jobs[1].error.as_deref(), Some(INTERRUPTED_ERROR_MESSAGE));
        // Never started, left alone
        assert_eq!(jobs[2].state, JobState::Waiting);

        // Requeued job is runnable right away
        let next = queue.pop_next(10_000).await.unwrap().unwrap();
        assert_eq!(next.id, "job-1");
        assert_eq!(next.attempts, 2);
    }
}
