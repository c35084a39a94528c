//! Poll backoff

use std::time::Duration;

/// Poll timing
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Wait after the first non-terminal status
    pub initial_delay: Duration,
    /// Growth per non-terminal status
    pub factor: f64,
    /// Upper bound of a single wait
    pub max_delay: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(400),
            factor: 1.5,
            max_delay: Duration::from_millis(2000),
        }
    }
}

/// Exponential backoff, capped
///
/// Tracked in whole milliseconds so repeated growth does not drift.
#[derive(Debug, Clone)]
pub struct Backoff {
    current_ms: f64,
    factor: f64,
    max_ms: f64,
}

impl Backoff {
    pub fn new(config: &PollConfig) -> Self {
        let max_ms = config.max_delay.as_millis() as f64;
        Self {
            current_ms: (config.initial_delay.as_millis() as f64).min(max_ms),
            factor: config.factor,
            max_ms,
        }
    }

    /// Delay to wait now; the following call returns the grown delay
    pub fn next_delay(&mut self) -> Duration {
        let delay = Duration::from_millis(self.current_ms as u64);
        self.current_ms = (self.current_ms * self.factor).round().min(self.max_ms);
        delay
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(&PollConfig::default())
    }
}
