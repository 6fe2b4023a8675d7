//! Event payload classification.

use super::{JobStatus, LogLevel};
use serde::Deserialize;

/// Sentinel message the log server sends as a liveness signal.
pub const HEARTBEAT_MESSAGE: &str = "heartbeat";

/// Sentinel message the log server sends when it has nothing to report.
pub const NO_LOGS_MESSAGE: &str = "No logs available at the moment";

/// A classified log stream payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEvent {
    Heartbeat,
    NoLogs,
    /// `label` is the uppercased level the server sent, or the canonical
    /// label for `level` when it sent none.
    Entry {
        level: LogLevel,
        label: String,
        message: String,
    },
}

#[derive(Deserialize)]
struct LogPayload {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    level: Option<String>,
}

#[derive(Deserialize)]
struct StatusPayload {
    #[serde(default)]
    status: Option<String>,
}

/// Classify one log stream payload. `None` means malformed: drop it.
pub fn classify_log(data: &str) -> Option<LogEvent> {
    let payload: LogPayload = serde_json::from_str(data).ok()?;
    let message = payload.message.filter(|m| !m.is_empty())?;

    let event = match message.as_str() {
        HEARTBEAT_MESSAGE => LogEvent::Heartbeat,
        NO_LOGS_MESSAGE => LogEvent::NoLogs,
        _ => {
            let raw = payload
                .level
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty());
            let level = raw.map(LogLevel::parse_lenient).unwrap_or_default();
            let label = raw
                .map(str::to_uppercase)
                .unwrap_or_else(|| level.as_upper().to_string());
            LogEvent::Entry {
                level,
                label,
                message,
            }
        }
    };
    Some(event)
}

/// Classify one status stream payload. `None` means malformed or an
/// unrecognised status: drop it.
pub fn classify_status(data: &str) -> Option<JobStatus> {
    let payload: StatusPayload = serde_json::from_str(data).ok()?;
    payload.status?.parse().ok()
}
