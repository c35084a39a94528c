// Job Queue Port (Interface)

use crate::domain::{Job, JobId, JobKind, JobState};
use crate::error::Result;
use async_trait::async_trait;

/// Queue interface: job submission, status lookup and result storage
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Submit a new job
    ///
    /// At most one live (not failed) job exists per kind and cache key; a
    /// second one is rejected with `AppError::Conflict`.
    async fn submit(&self, job: &Job) -> Result<()>;

    /// Find job by ID
    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>>;

    /// Most recent job of `kind` carrying `cache_key` that has not failed
    async fn find_by_cache_key(&self, kind: JobKind, cache_key: &str) -> Result<Option<Job>>;

    /// Pop the oldest runnable job (waiting, or delayed past its `run_at`),
    /// atomically marking it active
    async fn pop_next(&self, now_millis: i64) -> Result<Option<Job>>;

    /// Persist state, result and retry bookkeeping of a job
    async fn update(&self, job: &Job) -> Result<()>;

    /// All jobs in `state`, oldest first
    async fn find_by_state(&self, state: JobState) -> Result<Vec<Job>>;

    /// Count jobs by state
    async fn count_by_state(&self, state: JobState) -> Result<i64>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory queue preserving submission order
    #[derive(Default)]
    pub struct InMemoryJobQueue {
        jobs: Mutex<Vec<Job>>,
        reject_submissions: AtomicBool,
    }

    impl InMemoryJobQueue {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make `submit` fail as if the backing store were down
        pub fn set_reject_submissions(&self, reject: bool) {
            self.reject_submissions.store(reject, Ordering::SeqCst);
        }

        pub fn len(&self) -> usize {
            self.jobs.lock().unwrap().len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        pub fn all(&self) -> Vec<Job> {
            self.jobs.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JobQueue for InMemoryJobQueue {
        async fn submit(&self, job: &Job) -> Result<()> {
            if self.reject_submissions.load(Ordering::SeqCst) {
                return Err(AppError::Database("queue unavailable".to_string()));
            }
            let mut jobs = self.jobs.lock().unwrap();
            if jobs.iter().any(|j| j.id == job.id) {
                return Err(AppError::Conflict(format!("Job {} already exists", job.id)));
            }
            if job.cache_key.is_some()
                && jobs.iter().any(|j| {
                    j.kind() == job.kind()
                        && j.cache_key == job.cache_key
                        && j.state != JobState::Failed
                })
            {
                return Err(AppError::Conflict("Live job for cache key exists".to_string()));
            }
            jobs.push(job.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
            let jobs = self.jobs.lock().unwrap();
            Ok(jobs.iter().find(|j| &j.id == id).cloned())
        }

        async fn find_by_cache_key(&self, kind: JobKind, cache_key: &str) -> Result<Option<Job>> {
            let jobs = self.jobs.lock().unwrap();
            Ok(jobs
                .iter()
                .rev()
                .find(|j| {
                    j.kind() == kind
                        && j.cache_key.as_deref() == Some(cache_key)
                        && j.state != JobState::Failed
                })
                .cloned())
        }

        async fn pop_next(&self, now_millis: i64) -> Result<Option<Job>> {
            let mut jobs = self.jobs.lock().unwrap();
            let next = jobs.iter_mut().find(|j| match j.state {
                JobState::Waiting => true,
                JobState::Delayed => j.run_at.map_or(true, |at| at <= now_millis),
                _ => false,
            });
            match next {
                Some(job) => {
                    job.start(now_millis)?;
                    Ok(Some(job.clone()))
                }
                None => Ok(None),
            }
        }

        async fn update(&self, job: &Job) -> Result<()> {
            let mut jobs = self.jobs.lock().unwrap();
            match jobs.iter_mut().find(|j| j.id == job.id) {
                Some(existing) => {
                    *existing = job.clone();
                    Ok(())
                }
                None => Err(AppError::NotFound(format!("Job {} not found", job.id))),
            }
        }

        async fn find_by_state(&self, state: JobState) -> Result<Vec<Job>> {
            let jobs = self.jobs.lock().unwrap();
            Ok(jobs.iter().filter(|j| j.state == state).cloned().collect())
        }

        async fn count_by_state(&self, state: JobState) -> Result<i64> {
            let jobs = self.jobs.lock().unwrap();
            Ok(jobs.iter().filter(|j| j.state == state).count() as i64)
        }
    }
}
