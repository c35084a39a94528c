// Job Service - Core use cases for the web tier (enqueue + status lookup)

pub mod enqueue;

pub use enqueue::{EnqueueConfig, EnqueueOutcome, EnqueueRequest};

use crate::application::locker::Locker;
use crate::domain::{JobId, JobStatus};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobQueue, TimeProvider};
use std::sync::Arc;

/// Job Service
pub struct JobService {
    queue: Arc<dyn JobQueue>,
    locker: Arc<Locker>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    config: EnqueueConfig,
}

impl JobService {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        locker: Arc<Locker>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        config: EnqueueConfig,
    ) -> Self {
        Self {
            queue,
            locker,
            id_provider,
            time_provider,
            config,
        }
    }

    /// Enqueue a new job (never waits for it to run)
    pub async fn enqueue(&self, req: EnqueueRequest) -> Result<EnqueueOutcome> {
        enqueue::execute(
            self.queue.as_ref(),
            self.locker.as_ref(),
            self.id_provider.as_ref(),
            self.time_provider.as_ref(),
            &self.config,
            req,
        )
        .await
    }

    /// Current status of a job
    ///
    /// # Errors
    /// `AppError::NotFound` if no job has this id
    pub async fn status(&self, job_id: &JobId) -> Result<JobStatus> {
        self.queue
            .find_by_id(job_id)
            .await?
            .map(|job| job.status())
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", job_id)))
    }
}
