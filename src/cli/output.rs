//! Output formatting helpers for CLI commands

use crate::entries::TestCase;
use crate::projection::{DisplayState, StatusColor};
use crate::registry::{ConnectionKey, StreamKind};
use colored::{ColoredString, Colorize};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde_json::json;

/// Paint a status label in its display color.
pub fn paint(label: &str, color: StatusColor) -> ColoredString {
    match color {
        StatusColor::Green => label.green(),
        StatusColor::Yellow => label.yellow(),
        StatusColor::Gray => label.bright_black(),
        StatusColor::Orange => label.truecolor(255, 165, 0),
        StatusColor::Blue => label.blue(),
        StatusColor::Red => label.red(),
        StatusColor::Teal => label.cyan(),
    }
}

/// Turns successive display states of one stream into printable lines:
/// the status label when it changes, then any log lines not yet printed.
#[derive(Debug, Default)]
pub struct StreamPrinter {
    label: Option<&'static str>,
    printed: usize,
}

impl StreamPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, display: &DisplayState) -> Vec<String> {
        let mut out = Vec::new();
        if self.label != Some(display.label) {
            self.label = Some(display.label);
            out.push(format!("[{}]", paint(display.label, display.color)));
        }

        // A fresh session after completion starts its log from zero.
        if display.lines.len() < self.printed {
            self.printed = 0;
        }
        let fresh = &display.lines[self.printed..];
        let last = fresh.len().saturating_sub(1);
        for (i, line) in fresh.iter().enumerate() {
            if display.blink && i == last {
                out.push(line.bold().to_string());
            } else {
                out.push(line.clone());
            }
        }
        self.printed = display.lines.len();
        out
    }
}

/// One JSON line per update, for `--json` output.
pub fn format_display_json(key: &ConnectionKey, kind: StreamKind, display: &DisplayState) -> String {
    json!({
        "key": key,
        "kind": kind,
        "label": display.label,
        "color": display.color,
        "lines": display.lines,
        "blink": display.blink,
    })
    .to_string()
}

/// Format test cases as a table
pub fn format_entries_table(cases: &[TestCase]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["ID", "Title", "Prompt Hash", "TC Hash"]);

    for case in cases {
        table.add_row(vec![
            Cell::new(case.case_id().unwrap_or_else(|| "-".to_string())),
            Cell::new(case.title().unwrap_or("-")),
            Cell::new(short_hash(&case.prompt_hash)),
            Cell::new(&case.tc_hash),
        ]);
    }

    table.to_string()
}

/// Format test cases as JSON
pub fn format_entries_json(cases: &[TestCase]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&json!({ "test_cases": cases }))
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}
