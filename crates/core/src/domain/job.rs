// Job Domain Model

use crate::domain::error::{DomainError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Job ID (UUID v4)
pub type JobId = String;

/// Job State, as reported by the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Active,
    Delayed,
    Paused,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Active => "active",
            JobState::Delayed => "delayed",
            JobState::Paused => "paused",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    /// Completed and failed are the only states a job never leaves
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "waiting" => Ok(JobState::Waiting),
            "active" => Ok(JobState::Active),
            "delayed" => Ok(JobState::Delayed),
            "paused" => Ok(JobState::Paused),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            other => Err(DomainError::UnknownState(other.to_string())),
        }
    }
}

/// Job Kind (discriminates payload and result shapes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Ask,
    Mission,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Ask => "ask",
            JobKind::Mission => "mission",
        }
    }

    /// Kinds whose submission must be collapsed across concurrent requests
    pub fn is_idempotency_sensitive(&self) -> bool {
        matches!(self, JobKind::Mission)
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ask" => Ok(JobKind::Ask),
            "mission" => Ok(JobKind::Mission),
            other => Err(DomainError::UnknownKind(other.to_string())),
        }
    }
}

/// Job Payload (tagged by kind)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum JobPayload {
    Ask {
        prompt: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mission: Option<String>,
    },
    Mission {
        role: String,
        date: NaiveDate,
    },
}

impl JobPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            JobPayload::Ask { .. } => JobKind::Ask,
            JobPayload::Mission { .. } => JobKind::Mission,
        }
    }
}

/// Job Entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub payload: JobPayload,
    pub cache_key: Option<String>,
    pub state: JobState,

    pub result: Option<serde_json::Value>,
    pub error: Option<String>,

    // Retry bookkeeping
    pub attempts: i32,
    pub max_attempts: i32,
    pub run_at: Option<i64>, // epoch ms, set while delayed

    pub created_at: i64, // epoch ms
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
}

impl Job {
    /// Create a new waiting job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `payload` - Kind-tagged payload
    pub fn new(id: impl Into<String>, created_at: i64, payload: JobPayload) -> Self {
        Self {
            id: id.into(),
            payload,
            cache_key: None,
            state: JobState::Waiting,
            result: None,
            error: None,
            attempts: 0,
            max_attempts: 3,
            run_at: None,
            created_at,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn with_cache_key(mut self, cache_key: Option<String>) -> Self {
        self.cache_key = cache_key;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn kind(&self) -> JobKind {
        self.payload.kind()
    }

    /// Transition to Active; counts one more attempt
    pub fn start(&mut self, now_millis: i64) -> Result<()> {
        match self.state {
            JobState::Waiting => {}
            JobState::Delayed if self.run_at.map_or(true, |at| at <= now_millis) => {}
            _ => return Err(self.invalid_transition(JobState::Active)),
        }
        self.state = JobState::Active;
        self.attempts += 1;
        self.run_at = None;
        self.started_at = Some(now_millis);
        Ok(())
    }

    /// Transition to Completed, storing the result payload
    pub fn complete(&mut self, now_millis: i64, result: serde_json::Value) -> Result<()> {
        if self.state != JobState::Active {
            return Err(self.invalid_transition(JobState::Completed));
        }
        self.state = JobState::Completed;
        self.result = Some(result);
        self.error = None;
        self.finished_at = Some(now_millis);
        Ok(())
    }

    /// Park an active job until `run_at` for another attempt
    pub fn delay(&mut self, run_at: i64, error: impl Into<String>) -> Result<()> {
        if self.state != JobState::Active {
            return Err(self.invalid_transition(JobState::Delayed));
        }
        self.state = JobState::Delayed;
        self.run_at = Some(run_at);
        self.error = Some(error.into());
        self.started_at = None;
        Ok(())
    }

    /// Mark as Failed with explicit timestamp
    pub fn fail(&mut self, now_millis: i64, error: impl Into<String>) {
        self.state = JobState::Failed;
        self.error = Some(error.into());
        self.run_at = None;
        self.finished_at = Some(now_millis);
    }

    /// Read-only view handed to pollers
    pub fn status(&self) -> JobStatus {
        JobStatus {
            state: self.state,
            result: match self.state {
                JobState::Completed => self.result.clone(),
                _ => None,
            },
            error: match self.state {
                JobState::Failed => self.error.clone(),
                _ => None,
            },
        }
    }

    fn invalid_transition(&self, to: JobState) -> DomainError {
        DomainError::InvalidStateTransition {
            from: self.state.to_string(),
            to: to.to_string(),
        }
    }
}

/// Job status as seen by pollers (`GET /job-status`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub state: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
