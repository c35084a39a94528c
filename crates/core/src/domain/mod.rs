// Domain Layer - Pure business logic and entities

pub mod error;
pub mod job;
pub mod lock;
pub mod result;

// Re-exports
pub use error::DomainError;
pub use job::{Job, JobId, JobKind, JobPayload, JobState, JobStatus};
pub use lock::mission_lock_key;
pub use result::{unwrap_result_envelope, AskAnswer, MissionPlan, MissionTopic, TokenUsage, TopicImage};
