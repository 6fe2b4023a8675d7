//! Heartbeat-based liveness tracking for log streams.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Perceived state of a log stream's server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LivenessState {
    /// Nothing heard within the deadline
    #[default]
    Offline,
    /// Heartbeats arriving
    Online,
    /// Content lines arriving
    Streaming,
    /// Server keeps reporting it has no logs
    NoLogsFrequent,
}

/// Debounced deadline over heartbeat and content events.
///
/// Every heartbeat or content event restarts a single deadline; when it
/// passes without renewal the state drops to offline once and the deadline
/// disarms until the next renewal.
#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    state: LivenessState,
    timeout: Duration,
    deadline: Option<Instant>,
    no_logs_count: u32,
    no_logs_threshold: u32,
}

impl LivenessMonitor {
    pub fn new(timeout: Duration, no_logs_threshold: u32) -> Self {
        Self {
            state: LivenessState::Offline,
            timeout,
            deadline: None,
            no_logs_count: 0,
            no_logs_threshold,
        }
    }

    pub fn state(&self) -> LivenessState {
        self.state
    }

    /// When the state will drop to offline absent renewal.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consecutive "no logs" notifications since the last heartbeat or content.
    pub fn no_logs_count(&self) -> u32 {
        self.no_logs_count
    }

    pub fn heartbeat(&mut self, now: Instant) {
        self.state = LivenessState::Online;
        self.renew(now);
    }

    pub fn content(&mut self, now: Instant) {
        self.state = LivenessState::Streaming;
        self.renew(now);
    }

    // A timeout too large to represent as an instant never fires.
    fn renew(&mut self, now: Instant) {
        self.no_logs_count = 0;
        self.deadline = now.checked_add(self.timeout);
    }

    /// A "no logs" notification: online, or no-logs-frequent once the
    /// counter exceeds the threshold. Does not renew the deadline.
    pub fn no_logs(&mut self) {
        self.no_logs_count = self.no_logs_count.saturating_add(1);
        self.state = if self.no_logs_count > self.no_logs_threshold {
            LivenessState::NoLogsFrequent
        } else {
            LivenessState::Online
        };
    }

    /// Fire the deadline if it has passed. Returns true when the state changed.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                let changed = self.state != LivenessState::Offline;
                self.state = LivenessState::Offline;
                changed
            }
            _ => false,
        }
    }

    /// Disarm the deadline (connection teardown).
    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}
