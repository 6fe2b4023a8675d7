//! Logging configuration

use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Levels accepted for the base filter and for each component.
const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Crate modules that accept a per-component level.
pub const COMPONENTS: [&str; 8] = [
    "cli",
    "client",
    "config",
    "entries",
    "logging",
    "projection",
    "registry",
    "stream",
];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Pretty-printed logs for humans
    #[default]
    Pretty,
    /// JSON logs for machine parsing
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    /// Per-module levels, e.g. `{"stream" = "debug", "client" = "warn"}`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_levels: Option<HashMap<String, String>>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            component_levels: None,
        }
    }
}

impl LoggingConfig {
    /// Reject unknown levels and components, naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_level(&self.level) {
            return Err(ConfigError::invalid(
                "logging.level",
                format!("unknown level '{}'", self.level),
            ));
        }

        if let Some(component_levels) = &self.component_levels {
            for (component, level) in component_levels {
                let field = format!("logging.component_levels.{}", component);
                if !COMPONENTS.contains(&component.as_str()) {
                    return Err(ConfigError::invalid(
                        field,
                        format!("unknown component (expected one of {})", COMPONENTS.join(", ")),
                    ));
                }
                if !is_level(level) {
                    return Err(ConfigError::invalid(field, format!("unknown level '{}'", level)));
                }
            }
        }

        Ok(())
    }
}

fn is_level(level: &str) -> bool {
    LEVELS.contains(&level.trim().to_lowercase().as_str())
}
