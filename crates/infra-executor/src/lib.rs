// Stella Infrastructure - Executor Adapter
// Implements: JobExecutor

mod http_executor;

pub use http_executor::{HttpExecutorConfig, HttpJobExecutor};
