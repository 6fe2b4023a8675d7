//! Per-key session state machines driven by a connection task.

use super::classify::{classify_log, classify_status, LogEvent};
use super::{
    JobStatus, LivenessMonitor, LogEntry, LogSnapshot, StatusSnapshot, StreamSnapshot,
    TransportError,
};
use crate::registry::StreamKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of applying one event payload to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Malformed or unrecognised payload; state untouched
    Ignored,
    /// State changed and should be published
    Updated,
    /// Terminal update: publish, then close the connection
    Completed,
}

impl Dispatch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dispatch::Ignored => "ignored",
            Dispatch::Updated => "updated",
            Dispatch::Completed => "completed",
        }
    }
}

/// State fed by one stream key, surviving reconnections.
///
/// Every method returning `bool` reports whether the published snapshot
/// changed.
pub trait StreamSession: Send + 'static {
    fn kind(&self) -> StreamKind;

    fn on_message(&mut self, data: &str, now: Instant) -> Dispatch;

    /// A (re)connection succeeded.
    fn on_open(&mut self) -> bool;

    fn on_transport_error(&mut self, error: &TransportError, now: Instant) -> bool;

    /// A timer returned by [`next_deadline`](Self::next_deadline) fired.
    fn on_timer(&mut self, now: Instant) -> bool;

    /// Earliest pending timer, if any.
    fn next_deadline(&self) -> Option<Instant>;

    /// The connection is being torn down; cancel timers.
    fn on_close(&mut self);

    fn snapshot(&self) -> StreamSnapshot;
}

/// Log stream session: liveness, the append-only log and the blink window.
#[derive(Debug)]
pub struct LogSession {
    liveness: LivenessMonitor,
    entries: Arc<Vec<LogEntry>>,
    blink: Duration,
    blink_until: Option<Instant>,
    error_logged: bool,
}

impl LogSession {
    pub fn new(heartbeat_timeout: Duration, no_logs_threshold: u32, blink: Duration) -> Self {
        Self {
            liveness: LivenessMonitor::new(heartbeat_timeout, no_logs_threshold),
            entries: Arc::new(Vec::new()),
            blink,
            blink_until: None,
            error_logged: false,
        }
    }

    pub fn liveness(&self) -> &LivenessMonitor {
        &self.liveness
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    fn push(&mut self, entry: LogEntry) {
        Arc::make_mut(&mut self.entries).push(entry);
    }
}

impl StreamSession for LogSession {
    fn kind(&self) -> StreamKind {
        StreamKind::Log
    }

    fn on_message(&mut self, data: &str, now: Instant) -> Dispatch {
        let Some(event) = classify_log(data) else {
            return Dispatch::Ignored;
        };
        match event {
            LogEvent::Heartbeat => self.liveness.heartbeat(now),
            LogEvent::NoLogs => self.liveness.no_logs(),
            LogEvent::Entry {
                level,
                label,
                message,
            } => {
                self.push(LogEntry::labelled(level, &label, &message));
                self.liveness.content(now);
                self.blink_until = now.checked_add(self.blink);
            }
        }
        Dispatch::Updated
    }

    fn on_open(&mut self) -> bool {
        self.error_logged = false;
        false
    }

    fn on_transport_error(&mut self, _error: &TransportError, _now: Instant) -> bool {
        if self.error_logged {
            return false;
        }
        self.error_logged = true;
        self.push(LogEntry::connection_error());
        true
    }

    fn on_timer(&mut self, now: Instant) -> bool {
        let mut changed = self.liveness.expire(now);
        if self.blink_until.is_some_and(|until| now >= until) {
            self.blink_until = None;
            changed = true;
        }
        changed
    }

    fn next_deadline(&self) -> Option<Instant> {
        match (self.liveness.deadline(), self.blink_until) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn on_close(&mut self) {
        self.liveness.cancel();
        self.blink_until = None;
    }

    fn snapshot(&self) -> StreamSnapshot {
        StreamSnapshot::Log(LogSnapshot {
            liveness: self.liveness.state(),
            entries: Arc::clone(&self.entries),
            blink: self.blink_until.is_some(),
        })
    }
}

/// Job status stream session.
#[derive(Debug)]
pub struct StatusSession {
    status: JobStatus,
}

impl StatusSession {
    pub fn new(initial: JobStatus) -> Self {
        Self { status: initial }
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }
}

impl StreamSession for StatusSession {
    fn kind(&self) -> StreamKind {
        StreamKind::Status
    }

    fn on_message(&mut self, data: &str, _now: Instant) -> Dispatch {
        match classify_status(data) {
            None => Dispatch::Ignored,
            Some(status) => {
                self.status = status;
                if status.is_terminal() {
                    Dispatch::Completed
                } else {
                    Dispatch::Updated
                }
            }
        }
    }

    fn on_open(&mut self) -> bool {
        false
    }

    fn on_transport_error(&mut self, _error: &TransportError, _now: Instant) -> bool {
        false
    }

    fn on_timer(&mut self, _now: Instant) -> bool {
        false
    }

    fn next_deadline(&self) -> Option<Instant> {
        None
    }

    fn on_close(&mut self) {}

    fn snapshot(&self) -> StreamSnapshot {
        StreamSnapshot::status(self.status)
    }
}
