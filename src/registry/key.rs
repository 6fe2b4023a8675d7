use serde::{Deserialize, Serialize};
use std::fmt;

/// Which server-push endpoint a connection subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Execution log lines for one test case
    Log,
    /// Job lifecycle status for one test case
    Status,
}

impl StreamKind {
    /// Path segment appended to the stream base URL.
    pub fn endpoint(&self) -> &'static str {
        match self {
            StreamKind::Log => "log_stream",
            StreamKind::Status => "job_status_stream",
        }
    }

    /// Short label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Log => "log",
            StreamKind::Status => "status",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The pair of identifiers naming one observed test case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    /// Hash of the generation prompt the test case came from
    pub prompt_hash: String,
    /// Content hash of the test case itself
    pub tc_hash: String,
}

impl ResourceId {
    pub fn new(prompt_hash: impl Into<String>, tc_hash: impl Into<String>) -> Self {
        Self {
            prompt_hash: prompt_hash.into(),
            tc_hash: tc_hash.into(),
        }
    }

    /// Full subscription URL for `kind` under `base`.
    ///
    /// # Examples
    ///
    /// ```
    /// use optim::registry::{ResourceId, StreamKind};
    ///
    /// let id = ResourceId::new("p1", "tc1");
    /// assert_eq!(
    ///     id.stream_url("http://127.0.0.1:5004/", StreamKind::Log),
    ///     "http://127.0.0.1:5004/log_stream?prompt_hash=p1&tc_hash=tc1"
    /// );
    /// ```
    pub fn stream_url(&self, base: &str, kind: StreamKind) -> String {
        let endpoint = format!("{}/{}", base.trim_end_matches('/'), kind.endpoint());
        let params = [
            ("prompt_hash", self.prompt_hash.as_str()),
            ("tc_hash", self.tc_hash.as_str()),
        ];
        match reqwest::Url::parse_with_params(&endpoint, &params) {
            Ok(url) => url.into(),
            // Unparseable bases fail at open time and go through the retry path.
            Err(_) => format!(
                "{}?prompt_hash={}&tc_hash={}",
                endpoint, self.prompt_hash, self.tc_hash
            ),
        }
    }
}

/// Registry key for one subscription target.
///
/// Log streams and status streams for the same test case use distinct keys,
/// so both can be live at once.
///
/// # Examples
///
/// ```
/// use optim::registry::{ConnectionKey, ResourceId, StreamKind};
///
/// let id = ResourceId::new("p1", "tc1");
/// assert_eq!(ConnectionKey::new(StreamKind::Log, &id).as_str(), "log_p1_tc1");
/// assert_eq!(ConnectionKey::new(StreamKind::Status, &id).as_str(), "p1_tc1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionKey(String);

impl ConnectionKey {
    pub fn new(kind: StreamKind, resource: &ResourceId) -> Self {
        let key = match kind {
            StreamKind::Log => format!("log_{}_{}", resource.prompt_hash, resource.tc_hash),
            StreamKind::Status => format!("{}_{}", resource.prompt_hash, resource.tc_hash),
        };
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
