// Enqueue Use Case

use crate::application::locker::Locker;
use crate::domain::{mission_lock_key, Job, JobId, JobKind, JobPayload};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobQueue, TimeProvider};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Maximum accepted prompt length (characters)
pub const MAX_PROMPT_CHARS: usize = 8_000;

/// Enqueue request, as posted by clients to `/enqueue`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    /// Defaults to `ask` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<JobKind>,
    #[serde(default, alias = "promptOrPayload", skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mission: Option<String>,
    /// Logical date (`YYYY-MM-DD`) of a mission; today when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
}

impl EnqueueRequest {
    pub fn ask(prompt: impl Into<String>) -> Self {
        Self {
            kind: Some(JobKind::Ask),
            prompt: Some(prompt.into()),
            ..Default::default()
        }
    }

    pub fn mission(role: impl Into<String>) -> Self {
        Self {
            kind: Some(JobKind::Mission),
            role: Some(role.into()),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date.format("%Y-%m-%d").to_string());
        self
    }

    pub fn with_cache_key(mut self, cache_key: impl Into<String>) -> Self {
        self.cache_key = Some(cache_key.into());
        self
    }

    pub fn kind(&self) -> JobKind {
        self.kind.unwrap_or(JobKind::Ask)
    }
}

/// Enqueue settings
#[derive(Debug, Clone)]
pub struct EnqueueConfig {
    /// TTL of the submission guard for idempotency-sensitive kinds.
    /// Also the minimum interval between two guarded submissions.
    pub mission_lock_ttl_ms: u64,
    /// Attempts granted to each new job
    pub max_attempts: i32,
}

impl Default for EnqueueConfig {
    fn default() -> Self {
        Self {
            mission_lock_ttl_ms: 10 * 60 * 1000,
            max_attempts: 3,
        }
    }
}

/// Outcome of an enqueue call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// A job exists for this request (new, or reused by cache key)
    Accepted { job_id: JobId },
    /// An identical guarded submission is already in flight
    Duplicate { lock_key: String },
}

/// Validate a request and turn it into a typed payload
///
/// # Errors
/// `AppError::Validation` when a required field is missing or malformed
pub fn validate_request(req: &EnqueueRequest, today: NaiveDate) -> Result<JobPayload> {
    match req.kind() {
        JobKind::Ask => {
            let prompt = non_blank(req.prompt.as_deref())
                .ok_or_else(|| AppError::Validation("Missing prompt".to_string()))?;
            if prompt.chars().count() > MAX_PROMPT_CHARS {
                return Err(AppError::Validation(format!(
                    "Prompt too long (max {} characters)",
                    MAX_PROMPT_CHARS
                )));
            }
            Ok(JobPayload::Ask {
                prompt: prompt.to_string(),
                context: non_blank(req.context.as_deref()).map(str::to_string),
                role: non_blank(req.role.as_deref()).map(str::to_string),
                mission: non_blank(req.mission.as_deref()).map(str::to_string),
            })
        }
        JobKind::Mission => {
            let role = non_blank(req.role.as_deref())
                .ok_or_else(|| AppError::Validation("Missing role".to_string()))?;
            let date = match non_blank(req.date.as_deref()) {
                Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                    AppError::Validation(format!("Invalid date '{}', expected YYYY-MM-DD", raw))
                })?,
                None => today,
            };
            Ok(JobPayload::Mission {
                role: role.to_string(),
                date,
            })
        }
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Key of the submission guard for `payload`, if its kind is guarded
fn guard_key(payload: &JobPayload) -> Option<String> {
    match payload {
        JobPayload::Mission { role, date } if payload.kind().is_idempotency_sensitive() => {
            Some(mission_lock_key(role, *date))
        }
        _ => None,
    }
}

/// Live job of the same kind already filed under `cache_key`
///
/// A guarded job is only reused by a request with the same guard key; a
/// cache key already naming another mission is a conflict.
async fn reusable_job(
    queue: &dyn JobQueue,
    kind: JobKind,
    cache_key: &str,
    guard: Option<&str>,
) -> Result<Option<Job>> {
    let Some(existing) = queue.find_by_cache_key(kind, cache_key).await? else {
        return Ok(None);
    };
    if guard.is_some() && guard_key(&existing.payload).as_deref() != guard {
        return Err(AppError::Conflict(format!(
            "Cache key '{}' is already used by another {} job",
            cache_key, kind
        )));
    }
    Ok(Some(existing))
}

/// Execute enqueue use case
///
/// Order: validate, reuse by cache key, take the submission guard (guarded
/// kinds only), submit. The guard is left to expire after a successful
/// submission; it is released only when the submission itself fails.
///
/// Reuse is scoped to the request's kind. The queue keeps at most one live
/// job per kind and cache key, so a request losing the insert race is
/// answered with the winner's id.
///
/// # Arguments
///
/// * `queue` - Job queue
/// * `locker` - Distributed locker guarding non-idempotent submissions
/// * `id_provider` - ID generator (injected for determinism)
/// * `time_provider` - Time provider (injected for determinism)
/// * `config` - Enqueue settings
/// * `req` - Enqueue request
pub async fn execute(
    queue: &dyn JobQueue,
    locker: &Locker,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    config: &EnqueueConfig,
    req: EnqueueRequest,
) -> Result<EnqueueOutcome> {
    let payload = validate_request(&req, time_provider.today())?;
    let kind = payload.kind();
    let cache_key = non_blank(req.cache_key.as_deref()).map(str::to_string);
    let guard_key = guard_key(&payload);

    if let Some(key) = &cache_key {
        if let Some(existing) = reusable_job(queue, kind, key, guard_key.as_deref()).await? {
            info!(job_id = %existing.id, cache_key = %key, "Reusing job for cache key");
            return Ok(EnqueueOutcome::Accepted {
                job_id: existing.id,
            });
        }
    }

    if let Some(lock_key) = &guard_key {
        if !locker.acquire(lock_key, config.mission_lock_ttl_ms).await? {
            info!(lock_key = %lock_key, "Duplicate submission suppressed");
            return Ok(EnqueueOutcome::Duplicate {
                lock_key: lock_key.clone(),
            });
        }
    }

    let job = Job::new(id_provider.generate_id(), time_provider.now_millis(), payload)
        .with_cache_key(cache_key.clone())
        .with_max_attempts(config.max_attempts);

    if let Err(e) = queue.submit(&job).await {
        if let Some(lock_key) = &guard_key {
            warn!(lock_key = %lock_key, error = %e, "Submission failed, releasing guard");
            locker.release(lock_key).await;
        }
        if let (AppError::Conflict(_), Some(key)) = (&e, &cache_key) {
            if let Some(existing) = reusable_job(queue, kind, key, guard_key.as_deref()).await? {
                info!(job_id = %existing.id, cache_key = %key, "Cache key taken concurrently, reusing job");
                return Ok(EnqueueOutcome::Accepted {
                    job_id: existing.id,
                });
            }
        }
        return Err(e);
    }

    info!(job_id = %job.id, kind = %job.kind(), "Job enqueued");
    Ok(EnqueueOutcome::Accepted { job_id: job.id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::locker::LockerConfig;
    use crate::domain::JobState;
    use crate::port::id_provider::mocks::SequentialIdProvider;
    use crate::port::job_queue::mocks::InMemoryJobQueue;
    use crate::port::lock_store::mocks::InMemoryLockStore;
    use crate::port::time_provider::mocks::FixedTimeProvider;
    use serde_json::json;
    use std::sync::Arc;

    // 2026-10-19T12:00:00Z
    const NOON: i64 = 1_792_411_200_000;

    struct Fixture {
        queue: InMemoryJobQueue,
        store: Arc<InMemoryLockStore>,
        locker: Locker,
        ids: SequentialIdProvider,
        clock: FixedTimeProvider,
        config: EnqueueConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(InMemoryLockStore::new());
            Self {
                queue: InMemoryJobQueue::new(),
                locker: Locker::new(store.clone(), LockerConfig::default()),
                store,
                ids: SequentialIdProvider::new(),
                clock: FixedTimeProvider::new(NOON),
                config: EnqueueConfig::default(),
            }
        }

        async fn enqueue(&self, req: EnqueueRequest) -> Result<EnqueueOutcome> {
            execute(
                &self.queue,
                &self.locker,
                &self.ids,
                &self.clock,
                &self.config,
                req,
            )
            .await
        }
    }

    #[test]
    fn test_request_accepts_prompt_or_payload_alias() {
        let req: EnqueueRequest = serde_json::from_value(json!({
            "promptOrPayload": "What is a nebula?",
            "role": "cadet"
        }))
        .unwrap();
        assert_eq!(req.kind(), JobKind::Ask);
        assert_eq!(req.prompt.as_deref(), Some("What is a nebula?"));
    }

    #[test]
    fn test_validate_missing_prompt() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let err = validate_request(&EnqueueRequest::default(), today).unwrap_err();
        assert!(err.to_string().contains("Missing prompt"));

        let blank = EnqueueRequest::ask("   ");
        assert!(validate_request(&blank, today).is_err());
    }

    #[test]
    fn test_validate_prompt_too_long() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let req = EnqueueRequest::ask("a".repeat(MAX_PROMPT_CHARS + 1));
        let err = validate_request(&req, today).unwrap_err();
        assert!(err.to_string().contains("too long"));
    }

    #[test]
    fn test_validate_mission_defaults_to_today() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let payload = validate_request(&EnqueueRequest::mission("explorer"), today).unwrap();
        assert_eq!(
            payload,
            JobPayload::Mission {
                role: "explorer".to_string(),
                date: today
            }
        );

        let missing_role = EnqueueRequest {
            kind: Some(JobKind::Mission),
            ..Default::default()
        };
        assert!(validate_request(&missing_role, today)
            .unwrap_err()
            .to_string()
            .contains("Missing role"));

        let bad_date = EnqueueRequest {
            date: Some("19/10/2026".to_string()),
            ..EnqueueRequest::mission("explorer")
        };
        assert!(validate_request(&bad_date, today)
            .unwrap_err()
            .to_string()
            .contains("YYYY-MM-DD"));
    }

    #[tokio::test]
    async fn test_enqueue_ask_creates_waiting_job() {
        let fx = Fixture::new();
        let outcome = fx
            .enqueue(EnqueueRequest::ask("Why do stars twinkle?").with_context("lesson 3"))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            EnqueueOutcome::Accepted {
                job_id: "job-1".to_string()
            }
        );
        let jobs = fx.queue.all();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].state, JobState::Waiting);
        assert_eq!(jobs[0].created_at, NOON);
        assert_eq!(jobs[0].max_attempts, 3);
        // Ask jobs are never lock-guarded
        assert_eq!(fx.store.set_calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_request_never_reaches_queue() {
        let fx = Fixture::new();
        let err = fx.enqueue(EnqueueRequest::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(fx.queue.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_mission_within_ttl_is_suppressed() {
        let fx = Fixture::new();

        let first = fx.enqueue(EnqueueRequest::mission("explorer")).await.unwrap();
        assert!(matches!(first, EnqueueOutcome::Accepted { .. }));

        let second = fx.enqueue(EnqueueRequest::mission("explorer")).await.unwrap();
        assert_eq!(
            second,
            EnqueueOutcome::Duplicate {
                lock_key: "lock:mission:explorer:2026-10-19".to_string()
            }
        );
        assert_eq!(fx.queue.len(), 1);

        // Guard is kept after a successful submission (expires via TTL)
        assert!(fx.store.get("lock:mission:explorer:2026-10-19").is_some());
    }

    #[tokio::test]
    async fn test_missions_for_other_role_or_date_are_independent() {
        let fx = Fixture::new();
        let tomorrow = NaiveDate::from_ymd_opt(2026, 10, 20).unwrap();

        fx.enqueue(EnqueueRequest::mission("explorer")).await.unwrap();
        let other_role = fx.enqueue(EnqueueRequest::mission("scholar")).await.unwrap();
        let other_day = fx
            .enqueue(EnqueueRequest::mission("explorer").with_date(tomorrow))
            .await
            .unwrap();

        assert!(matches!(other_role, EnqueueOutcome::Accepted { .. }));
        assert!(matches!(other_day, EnqueueOutcome::Accepted { .. }));
        assert_eq!(fx.queue.len(), 3);
    }

    #[tokio::test]
    async fn test_lock_store_outage_blocks_guarded_enqueue() {
        let fx = Fixture::new();
        fx.store.set_unavailable(true);

        let err = fx.enqueue(EnqueueRequest::mission("explorer")).await.unwrap_err();
        assert!(matches!(err, AppError::LockStore(_)));
        assert!(fx.queue.is_empty());

        // Unguarded kinds keep working
        assert!(fx.enqueue(EnqueueRequest::ask("hello")).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_submission_releases_guard() {
        let fx = Fixture::new();
        fx.queue.set_reject_submissions(true);

        let err = fx.enqueue(EnqueueRequest::mission("explorer")).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
        assert!(fx.store.get("lock:mission:explorer:2026-10-19").is_none());

        fx.queue.set_reject_submissions(false);
        let retry = fx.enqueue(EnqueueRequest::mission("explorer")).await.unwrap();
        assert!(matches!(retry, EnqueueOutcome::Accepted { .. }));
    }

    #[tokio::test]
    async fn test_cache_key_reuses_live_job() {
        let fx = Fixture::new();
        let req = EnqueueRequest::ask("Explain black holes").with_cache_key("bh-101");

        let first = fx.enqueue(req.clone()).await.unwrap();
        let second = fx.enqueue(req.clone()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(fx.queue.len(), 1);

        // A failed job is not reused
        let mut job = fx.queue.all().remove(0);
        job.fail(NOON, "boom");
        fx.queue.update(&job).await.unwrap();

        let third = fx.enqueue(req).await.unwrap();
        assert_ne!(third, first);
        assert_eq!(fx.queue.len(), 2);
    }

    #[tokio::test]
    async fn test_cache_key_reuse_is_scoped_to_kind() {
        let fx = Fixture::new();

        let ask = fx
            .enqueue(EnqueueRequest::ask("hi").with_cache_key("k"))
            .await
            .unwrap();
        let mission = fx
            .enqueue(EnqueueRequest::mission("explorer").with_cache_key("k"))
            .await
            .unwrap();

        assert_eq!(ask, EnqueueOutcome::Accepted { job_id: "job-1".to_string() });
        assert_eq!(mission, EnqueueOutcome::Accepted { job_id: "job-2".to_string() });
        let kinds: Vec<JobKind> = fx.queue.all().iter().map(|j| j.kind()).collect();
        assert_eq!(kinds, vec![JobKind::Ask, JobKind::Mission]);
        // The mission still went through its guard
        assert_eq!(fx.store.set_calls(), 1);
        assert!(fx.store.get("lock:mission:explorer:2026-10-19").is_some());
    }

    #[tokio::test]
    async fn test_cache_key_of_another_mission_is_conflict() {
        let fx = Fixture::new();
        fx.enqueue(EnqueueRequest::mission("explorer").with_cache_key("daily"))
            .await
            .unwrap();

        let err = fx
            .enqueue(EnqueueRequest::mission("scholar").with_cache_key("daily"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(fx.queue.len(), 1);
        assert!(fx.store.get("lock:mission:scholar:2026-10-19").is_none());

        // Same mission under the same key is the same job
        let again = fx
            .enqueue(EnqueueRequest::mission("explorer").with_cache_key("daily"))
            .await
            .unwrap();
        assert_eq!(again, EnqueueOutcome::Accepted { job_id: "job-1".to_string() });
    }
}
