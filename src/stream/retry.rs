//! Reconnection timing after transport failures.

use crate::config::StreamingConfig;
use std::time::Duration;

/// Fixed-delay, unbounded reconnection schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    delay: Duration,
}

impl RetryPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait before reconnection attempt `attempt` (0-based). The delay does
    /// not grow and attempts are never exhausted.
    pub fn delay_for(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(20))
    }
}

impl From<&StreamingConfig> for RetryPolicy {
    fn from(config: &StreamingConfig) -> Self {
        Self::fixed(config.retry_delay())
    }
}
