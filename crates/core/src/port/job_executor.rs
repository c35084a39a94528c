// Job Executor Port
// Narrow interface to the LLM / NASA clients that actually run a job

use crate::domain::Job;
use async_trait::async_trait;
use thiserror::Error;

/// Execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid result: {0}")]
    InvalidResult(String),
}

/// Job Executor trait
///
/// Returns the kind-specific result payload that is stored on the job.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, job: &Job) -> Result<serde_json::Value, ExecutionError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock executor behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Always succeed with this result
        Succeed(serde_json::Value),
        /// Always fail with message
        Fail(String),
        /// Fail the first N calls, then succeed
        FailTimes(usize, serde_json::Value),
        /// Panic with message (for panic isolation testing)
        Panic(String),
    }

    /// Mock Job Executor for testing
    pub struct MockJobExecutor {
        behavior: Arc<Mutex<MockBehavior>>,
        call_count: Arc<Mutex<usize>>,
    }

    impl MockJobExecutor {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Arc::new(Mutex::new(behavior)),
                call_count: Arc::new(Mutex::new(0)),
            }
        }

        pub fn new_success(result: serde_json::Value) -> Self {
            Self::new(MockBehavior::Succeed(result))
        }

        pub fn new_fail(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Fail(message.into()))
        }

        pub fn new_panic_inducing(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Panic(message.into()))
        }

        pub fn call_count(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl JobExecutor for MockJobExecutor {
        async fn execute(&self, _job: &Job) -> Result<serde_json::Value, ExecutionError> {
            let call = {
                let mut count = self.call_count.lock().unwrap();
                *count += 1;
                *count
            };

            let behavior = self.behavior.lock().unwrap().clone();

            match behavior {
                MockBehavior::Succeed(result) => Ok(result),
                MockBehavior::Fail(msg) => Err(ExecutionError::Upstream {
                    status: 500,
                    message: msg,
                }),
                MockBehavior::FailTimes(n, result) => {
                    if call <= n {
                        Err(ExecutionError::Transport(format!("attempt {} failed", call)))
                    } else {
                        Ok(result)
                    }
                }
                MockBehavior::Panic(msg) => {
                    panic!("{}", msg); // Actually panic for panic isolation testing
                }
            }
        }
    }
}
