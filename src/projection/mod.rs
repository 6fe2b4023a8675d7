//! Status/Log Projection.
//!
//! Pure mapping from a published [`StreamSnapshot`] to what a renderer shows.

use crate::stream::{JobStatus, LivenessState, StreamSnapshot};
use serde::Serialize;
use std::fmt;

/// Display color of a status label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusColor {
    Green,
    Yellow,
    Gray,
    Orange,
    Blue,
    Red,
    Teal,
}

impl StatusColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusColor::Green => "green",
            StatusColor::Yellow => "yellow",
            StatusColor::Gray => "gray",
            StatusColor::Orange => "orange",
            StatusColor::Blue => "blue",
            StatusColor::Red => "red",
            StatusColor::Teal => "teal",
        }
    }
}

impl fmt::Display for StatusColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a renderer needs for one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayState {
    pub label: &'static str,
    pub color: StatusColor,
    /// Log lines in arrival order; empty for status streams
    pub lines: Vec<String>,
    pub blink: bool,
}

pub fn liveness_label(state: LivenessState) -> (&'static str, StatusColor) {
    match state {
        LivenessState::Streaming => ("Streaming", StatusColor::Green),
        LivenessState::Online => ("Online", StatusColor::Green),
        LivenessState::NoLogsFrequent => ("No Logs Available", StatusColor::Yellow),
        LivenessState::Offline => ("Offline", StatusColor::Gray),
    }
}

pub fn status_label(status: JobStatus) -> (&'static str, StatusColor) {
    match status {
        JobStatus::Pending => ("Pending", StatusColor::Orange),
        JobStatus::Processing => ("Processing", StatusColor::Blue),
        JobStatus::Completed => ("Completed", StatusColor::Green),
        JobStatus::Error => ("Error", StatusColor::Red),
        JobStatus::Retry => ("Entered Retry", StatusColor::Gray),
        JobStatus::NoJobsActive => ("No Jobs Active", StatusColor::Teal),
    }
}

/// Project a snapshot for display.
pub fn project(snapshot: &StreamSnapshot) -> DisplayState {
    match snapshot {
        StreamSnapshot::Log(log) => {
            let (label, color) = liveness_label(log.liveness);
            DisplayState {
                label,
                color,
                lines: log.entries.iter().map(|e| e.message.clone()).collect(),
                blink: log.blink,
            }
        }
        StreamSnapshot::Status(status) => {
            let (label, color) = status_label(status.status);
            DisplayState {
                label,
                color,
                lines: Vec::new(),
                blink: false,
            }
        }
    }
}
