//! Stored test-case entries and their identity hashes.
//!
//! The backend stores each generation run as an [`Entry`] whose `response`
//! holds the generated test cases as JSON text. Every test case is identified
//! by the prompt hash of its entry plus a content hash of its own fields; the
//! pair names its log and status streams.

use crate::registry::ResourceId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Fields covered by the test-case hash, in hashing order.
pub const HASHED_FIELDS: [&str; 6] = [
    "test_case_title",
    "test_case_id",
    "description",
    "test_steps",
    "expected_results",
    "validations",
];

#[derive(Error, Debug, PartialEq)]
pub enum EntryError {
    #[error("entry {prompt_hash}: response is not valid JSON: {message}")]
    InvalidJson { prompt_hash: String, message: String },

    #[error("entry {prompt_hash}: response is not a list of test cases")]
    NotAList { prompt_hash: String },
}

/// One stored generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub prompt_hash: String,
    /// JSON text (or an already-decoded value) holding the test cases
    pub response: Value,
}

/// A generated test case with its stream identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default)]
    pub prompt_hash: String,
    #[serde(default)]
    pub tc_hash: String,
    /// Every other field exactly as generated
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TestCase {
    /// Build from a raw generated object, computing its hash.
    pub fn from_fields(prompt_hash: impl Into<String>, mut fields: Map<String, Value>) -> Self {
        fields.remove("prompt_hash");
        fields.remove("tc_hash");
        let tc_hash = compute_tc_hash(&fields);
        Self {
            prompt_hash: prompt_hash.into(),
            tc_hash,
            fields,
        }
    }

    /// Fill in `tc_hash` if it is missing.
    pub fn ensure_hash(&mut self) {
        if self.tc_hash.is_empty() {
            self.tc_hash = compute_tc_hash(&self.fields);
        }
    }

    pub fn resource_id(&self) -> ResourceId {
        ResourceId::new(self.prompt_hash.clone(), self.tc_hash.clone())
    }

    pub fn title(&self) -> Option<&str> {
        self.fields.get("test_case_title").and_then(Value::as_str)
    }

    pub fn description(&self) -> Option<&str> {
        self.fields.get("description").and_then(Value::as_str)
    }

    /// The generator's own id, rendered whether it is a number or a string.
    pub fn case_id(&self) -> Option<String> {
        match self.fields.get("test_case_id")? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Lowercase hex SHA-256 of the compact JSON of the hashed fields.
///
/// Absent fields are omitted; present ones (including `null`) keep their
/// nested key order.
///
/// # Examples
///
/// ```
/// use optim::entries::compute_tc_hash;
/// use serde_json::json;
///
/// let fields = json!({"test_case_id": 1, "status": "ignored"});
/// let hash = compute_tc_hash(fields.as_object().unwrap());
/// assert_eq!(hash.len(), 64);
/// assert_eq!(hash, compute_tc_hash(json!({"test_case_id": 1}).as_object().unwrap()));
/// ```
pub fn compute_tc_hash(fields: &Map<String, Value>) -> String {
    let mut hashed = Map::new();
    for name in HASHED_FIELDS {
        if let Some(value) = fields.get(name) {
            hashed.insert(name.to_string(), value.clone());
        }
    }
    let canonical = Value::Object(hashed).to_string();
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Test cases of one entry, flattened one level.
pub fn parse_entry(entry: &Entry) -> Result<Vec<TestCase>, EntryError> {
    let decoded = match &entry.response {
        Value::String(text) => {
            serde_json::from_str(text).map_err(|e| EntryError::InvalidJson {
                prompt_hash: entry.prompt_hash.clone(),
                message: e.to_string(),
            })?
        }
        other => other.clone(),
    };

    let Value::Array(groups) = decoded else {
        return Err(EntryError::NotAList {
            prompt_hash: entry.prompt_hash.clone(),
        });
    };

    let mut cases = Vec::new();
    for group in groups {
        match group {
            Value::Array(items) => cases.extend(items),
            Value::Object(mut object) => match object.remove("test_cases") {
                Some(Value::Array(items)) => cases.extend(items),
                Some(other) => {
                    object.insert("test_cases".to_string(), other);
                    cases.push(Value::Object(object));
                }
                None => cases.push(Value::Object(object)),
            },
            Value::Null => {}
            other => tracing::debug!(
                prompt_hash = %entry.prompt_hash,
                value = %other,
                "Skipping non-object test case group"
            ),
        }
    }

    Ok(cases
        .into_iter()
        .filter_map(|case| match case {
            Value::Object(fields) => {
                let prompt_hash = fields
                    .get("prompt_hash")
                    .and_then(Value::as_str)
                    .unwrap_or(entry.prompt_hash.as_str())
                    .to_string();
                Some(TestCase::from_fields(prompt_hash, fields))
            }
            _ => None,
        })
        .collect())
}

/// Test cases of every entry. Malformed entries are skipped with a warning.
pub fn parse_entries(entries: &[Entry]) -> Vec<TestCase> {
    entries
        .iter()
        .flat_map(|entry| match parse_entry(entry) {
            Ok(cases) => cases,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed entry");
                Vec::new()
            }
        })
        .collect()
}
