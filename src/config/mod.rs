//! Configuration module
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`OPTIM_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use optim::config::OptimConfig;
//!
//! let config = OptimConfig::default();
//! assert_eq!(config.streaming.retry_delay_seconds, 20);
//!
//! let toml = r#"
//! [streaming]
//! retry_delay_seconds = 5
//! "#;
//! let config: OptimConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.streaming.retry_delay_seconds, 5);
//! assert_eq!(config.streaming.heartbeat_timeout_seconds, 10);
//! ```

pub mod client;
pub mod endpoints;
pub mod error;
pub mod logging;
pub mod streaming;

pub use client::ClientConfig;
pub use endpoints::EndpointsConfig;
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use streaming::StreamingConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound for every timeout and delay given in seconds (one day).
pub const MAX_TIMEOUT_SECONDS: u64 = 86_400;

/// Upper bound for the blink window.
pub const MAX_BLINK_MILLIS: u64 = 60_000;

/// Unified configuration for the workbench client.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OptimConfig {
    /// Service base URLs
    pub endpoints: EndpointsConfig,
    /// Stream connection tuning
    pub streaming: StreamingConfig,
    /// Collaborator HTTP client
    pub client: ClientConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl OptimConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Invalid values are silently ignored (the file or default value is kept).
    pub fn with_env_overrides(mut self) -> Self {
        let urls = [
            ("OPTIM_AI_BACKEND_URL", &mut self.endpoints.backend_url),
            ("OPTIM_AI_JOBS_BACKEND_URL", &mut self.endpoints.jobs_url),
            ("OPTIM_AI_STREAM_URL", &mut self.endpoints.status_stream_url),
            ("OPTIM_AI_LOG_STREAM_URL", &mut self.endpoints.log_stream_url),
            ("OPTIM_AI_CHAT_URL", &mut self.endpoints.chat_url),
        ];
        for (var, slot) in urls {
            if let Ok(url) = std::env::var(var) {
                if !url.is_empty() {
                    *slot = url;
                }
            }
        }

        if let Ok(level) = std::env::var("OPTIM_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("OPTIM_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, url) in self.endpoints.entries() {
            if url.is_empty() {
                return Err(ConfigError::invalid(field, "URL cannot be empty"));
            }
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::invalid(
                    field,
                    format!("'{}' must start with http:// or https://", url),
                ));
            }
        }

        let durations = [
            (
                "streaming.heartbeat_timeout_seconds",
                self.streaming.heartbeat_timeout_seconds,
                MAX_TIMEOUT_SECONDS,
            ),
            (
                "streaming.retry_delay_seconds",
                self.streaming.retry_delay_seconds,
                MAX_TIMEOUT_SECONDS,
            ),
            (
                "streaming.blink_millis",
                self.streaming.blink_millis,
                MAX_BLINK_MILLIS,
            ),
            (
                "streaming.connect_timeout_seconds",
                self.streaming.connect_timeout_seconds,
                MAX_TIMEOUT_SECONDS,
            ),
            (
                "client.request_timeout_seconds",
                self.client.request_timeout_seconds,
                MAX_TIMEOUT_SECONDS,
            ),
        ];
        for (field, value, max) in durations {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be non-zero"));
            }
            if value > max {
                return Err(ConfigError::invalid(
                    field,
                    format!("{} exceeds the maximum of {}", value, max),
                ));
            }
        }

        self.logging.validate()
    }
}
