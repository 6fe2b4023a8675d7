//! Stream data model: log entries, job statuses, published snapshots.

use super::LivenessState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Line shown when the log stream transport fails.
pub const CONNECTION_ERROR_MESSAGE: &str =
    "Error: Unable to connect to log stream. Please check your server.";

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Lenient parse of the `level` field; unrecognised levels read as info.
    pub fn parse_lenient(level: &str) -> Self {
        match level.trim().to_lowercase().as_str() {
            "warn" | "warning" => LogLevel::Warn,
            "error" | "err" | "critical" | "fatal" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }

    pub fn as_upper(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

/// One line in a log stream session. Appended, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Rendered line, e.g. `"WARN : hello"`
    pub message: String,
    pub level: LogLevel,
    /// When the line was received locally
    pub received_at: DateTime<Utc>,
}

impl LogEntry {
    /// A content line pushed by the server, prefixed with the canonical
    /// label for `level`.
    pub fn content(level: LogLevel, message: &str) -> Self {
        Self::labelled(level, level.as_upper(), message)
    }

    /// A content line prefixed with the level label the server sent.
    /// `level` keeps the severity used for styling.
    pub fn labelled(level: LogLevel, label: &str, message: &str) -> Self {
        Self {
            message: format!("{} : {}", label, message),
            level,
            received_at: Utc::now(),
        }
    }

    /// The one-off line recorded when the transport fails.
    pub fn connection_error() -> Self {
        Self {
            message: CONNECTION_ERROR_MESSAGE.to_string(),
            level: LogLevel::Error,
            received_at: Utc::now(),
        }
    }
}

/// Server-side lifecycle of an execution job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Error,
    Retry,
    NoJobsActive,
}

impl JobStatus {
    /// `completed` is the only terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed)
    }

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
            JobStatus::Retry => "retry",
            JobStatus::NoJobsActive => "noJobsActive",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "error" => Ok(JobStatus::Error),
            "retry" => Ok(JobStatus::Retry),
            "noJobsActive" | "no-jobs-active" => Ok(JobStatus::NoJobsActive),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

/// Published state of a log stream session.
#[derive(Debug, Clone, PartialEq)]
pub struct LogSnapshot {
    pub liveness: LivenessState,
    pub entries: Arc<Vec<LogEntry>>,
    /// True for a short window after each content line
    pub blink: bool,
}

/// Published state of a status stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub status: JobStatus,
}

/// What subscribers of a connection observe.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamSnapshot {
    Log(LogSnapshot),
    Status(StatusSnapshot),
}

impl StreamSnapshot {
    /// Initial state of a fresh log session.
    pub fn log() -> Self {
        StreamSnapshot::Log(LogSnapshot {
            liveness: LivenessState::Offline,
            entries: Arc::new(Vec::new()),
            blink: false,
        })
    }

    pub fn status(status: JobStatus) -> Self {
        StreamSnapshot::Status(StatusSnapshot { status })
    }

    pub fn liveness(&self) -> Option<LivenessState> {
        match self {
            StreamSnapshot::Log(log) => Some(log.liveness),
            StreamSnapshot::Status(_) => None,
        }
    }

    pub fn job_status(&self) -> Option<JobStatus> {
        match self {
            StreamSnapshot::Log(_) => None,
            StreamSnapshot::Status(status) => Some(status.status),
        }
    }

    /// Log entries so far; empty for status streams.
    pub fn entries(&self) -> &[LogEntry] {
        match self {
            StreamSnapshot::Log(log) => log.entries.as_slice(),
            StreamSnapshot::Status(_) => &[],
        }
    }
}
