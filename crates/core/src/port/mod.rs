// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod job_executor;
pub mod job_queue;
pub mod lock_store;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use job_executor::{ExecutionError, JobExecutor};
pub use job_queue::JobQueue;
pub use lock_store::LockStore;
pub use time_provider::TimeProvider;
