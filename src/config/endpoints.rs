//! Collaborator and stream base URLs

use serde::{Deserialize, Serialize};

/// Base URLs of every service the workbench talks to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    /// AI generation and entry storage
    pub backend_url: String,
    /// Job creation
    pub jobs_url: String,
    /// Job status event stream
    pub status_stream_url: String,
    /// Execution log event stream
    pub log_stream_url: String,
    /// Log-analysis chat
    pub chat_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:5000".to_string(),
            jobs_url: "http://127.0.0.1:5001".to_string(),
            status_stream_url: "http://127.0.0.1:5003".to_string(),
            log_stream_url: "http://127.0.0.1:5004".to_string(),
            chat_url: "http://localhost:5007".to_string(),
        }
    }
}

impl EndpointsConfig {
    /// `(field, url)` pairs, for validation and display.
    pub fn entries(&self) -> [(&'static str, &str); 5] {
        [
            ("endpoints.backend_url", &self.backend_url),
            ("endpoints.jobs_url", &self.jobs_url),
            ("endpoints.status_stream_url", &self.status_stream_url),
            ("endpoints.log_stream_url", &self.log_stream_url),
            ("endpoints.chat_url", &self.chat_url),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_defaults() {
        let config = EndpointsConfig::default();
        assert_eq!(config.backend_url, "http://127.0.0.1:5000");
        assert_eq!(config.jobs_url, "http://127.0.0.1:5001");
        assert_eq!(config.status_stream_url, "http://127.0.0.1:5003");
        assert_eq!(config.log_stream_url, "http://127.0.0.1:5004");
        assert_eq!(config.chat_url, "http://localhost:5007");
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: EndpointsConfig =
            toml::from_str(r#"log_stream_url = "http://logs:9000""#).unwrap();
        assert_eq!(config.log_stream_url, "http://logs:9000");
        assert_eq!(config.status_stream_url, "http://127.0.0.1:5003");
    }
}
