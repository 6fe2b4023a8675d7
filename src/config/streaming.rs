//! Stream connection tuning

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and lifecycle settings for stream connections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Silence after which a log stream reads as offline
    pub heartbeat_timeout_seconds: u64,
    /// Fixed wait before reconnecting after a transport error
    pub retry_delay_seconds: u64,
    /// "No logs" notifications tolerated before no-logs-frequent
    pub no_logs_threshold: u32,
    /// Highlight window after each content line
    pub blink_millis: u64,
    /// Close a connection when its last subscriber goes away
    pub close_when_idle: bool,
    pub connect_timeout_seconds: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_seconds: 10,
            retry_delay_seconds: 20,
            no_logs_threshold: 3,
            blink_millis: 1000,
            close_when_idle: true,
            connect_timeout_seconds: 10,
        }
    }
}

impl StreamingConfig {
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }

    pub fn blink(&self) -> Duration {
        Duration::from_millis(self.blink_millis)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}
