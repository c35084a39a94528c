// Worker constants (no magic values)
use std::time::Duration;

/// Sleep duration when no jobs are available (100ms)
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_millis(100);

/// Sleep duration after worker error before retry (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Default retry base delay (1000ms = 1s)
pub const DEFAULT_RETRY_BASE_DELAY_MS: i64 = 1000;

/// Error stored on a job whose execution panicked
pub const PANIC_ERROR_MESSAGE: &str = "Job execution panicked";

/// Error recorded on jobs found active at startup
pub const INTERRUPTED_ERROR_MESSAGE: &str = "Job interrupted by daemon restart";
