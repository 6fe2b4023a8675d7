//! Request and response shapes of the collaborator services.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message the generation service sends when it answers from its cache.
pub const CACHE_HIT_MESSAGE: &str = "Prompt found in cache.";

/// `prompt_type` marking a chat reply as a full system analysis.
pub const SYSTEM_ANALYSIS: &str = "system_analysis";

#[derive(Debug, Serialize)]
pub(crate) struct ProcessRequest<'a> {
    pub prompt: &'a str,
    pub model: &'a str,
}

/// Result of a generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessResponse {
    /// Served from the generation cache
    pub cached: bool,
    /// Generated test cases
    pub data: Value,
}

impl ProcessResponse {
    pub(crate) fn from_body(body: Value) -> Self {
        let cached = body.get("message").and_then(Value::as_str) == Some(CACHE_HIT_MESSAGE);
        if cached {
            let data = body.get("response").cloned().unwrap_or(Value::Null);
            Self { cached, data }
        } else {
            Self { cached, data: body }
        }
    }

    pub fn is_cached(&self) -> bool {
        self.cached
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateJobResponse {
    pub job_id: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JobErrorBody {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EntriesResponse {
    #[serde(default)]
    pub entries: Vec<crate::entries::Entry>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub prompt: &'a str,
    #[serde(rename = "user_promptHashforSystem")]
    pub prompt_hash: String,
}

/// A reply from the log-analysis chat.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub prompt_type: String,
    /// Text to show in the conversation
    pub text: String,
    /// Raw analysis payload for `system_analysis` replies
    pub analysis: Option<Value>,
}

impl ChatReply {
    pub fn is_system_analysis(&self) -> bool {
        self.prompt_type == SYSTEM_ANALYSIS
    }

    pub(crate) fn from_body(body: &Value) -> Self {
        let nested = body.get("response");
        let prompt_type = nested
            .and_then(|r| r.get("prompt_type"))
            .filter(|v| truthy(v))
            .or_else(|| body.get("prompt_type").filter(|v| truthy(v)))
            .map(display_value)
            .unwrap_or_else(|| "unknown".to_string());

        let fallback = Value::String("Unexpected response format".to_string());
        let response = nested
            .and_then(|r| r.get("response"))
            .filter(|v| truthy(v))
            .or_else(|| nested.filter(|v| truthy(v)))
            .unwrap_or(&fallback);

        if prompt_type == SYSTEM_ANALYSIS {
            return Self {
                prompt_type,
                text: "System analysis received.".to_string(),
                analysis: Some(response.clone()),
            };
        }

        Self {
            prompt_type,
            text: flatten_chat_response(response),
            analysis: None,
        }
    }
}

/// Render a chat payload as conversation text.
///
/// Lists of `{description, Result}` become `"description: Result"` blocks
/// separated by blank lines; a single such object renders the same way with
/// placeholders for missing parts.
pub fn flatten_chat_response(response: &Value) -> String {
    match response {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                match (
                    item.get("description").filter(|v| truthy(v)),
                    item.get("Result").filter(|v| truthy(v)),
                ) {
                    (Some(description), Some(result)) => {
                        format!("{}: {}", display_value(description), display_value(result))
                    }
                    _ => "Invalid response format.".to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n"),
        Value::String(text) => text.clone(),
        Value::Object(object) => {
            let description = object
                .get("description")
                .filter(|v| truthy(v))
                .map(display_value)
                .unwrap_or_else(|| "No description".to_string());
            let result = object
                .get("Result")
                .filter(|v| truthy(v))
                .map(display_value)
                .unwrap_or_else(|| "No result".to_string());
            format!("{}: {}", description, result)
        }
        _ => "Unexpected response format.".to_string(),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
