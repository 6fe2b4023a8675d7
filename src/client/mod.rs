//! Collaborator client.
//!
//! Thin JSON calls to the generation, jobs and chat services. Results are
//! passed through largely opaque; only the fields the workbench acts on are
//! interpreted.

mod error;
mod types;

pub use error::ClientError;
pub use types::{flatten_chat_response, ChatReply, ProcessResponse, CACHE_HIT_MESSAGE};

use crate::config::{ClientConfig, EndpointsConfig};
use crate::entries::{Entry, TestCase};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::time::Duration;
use types::{
    ChatRequest, CreateJobResponse, EntriesResponse, JobErrorBody, ProcessRequest,
};

/// HTTP client for the workbench's REST collaborators.
pub struct ApiClient {
    client: Client,
    endpoints: EndpointsConfig,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(endpoints: EndpointsConfig, config: &ClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;
        Ok(Self::with_client(client, endpoints, config.request_timeout()))
    }

    /// Create a client with a custom HTTP client (for testing).
    pub fn with_client(client: Client, endpoints: EndpointsConfig, timeout: Duration) -> Self {
        Self {
            client,
            endpoints,
            timeout,
        }
    }

    /// Generate test cases for `prompt` with `model`.
    pub async fn process(&self, prompt: &str, model: &str) -> Result<ProcessResponse, ClientError> {
        let url = endpoint(&self.endpoints.backend_url, "process");
        let request = self
            .client
            .post(&url)
            .json(&ProcessRequest { prompt, model });
        let response = self.send(request).await?;
        let body: Value = read_json(ensure_success(response).await?).await?;
        Ok(ProcessResponse::from_body(body))
    }

    /// Create an execution job for `case`, returning the job id.
    pub async fn create_job(&self, case: &TestCase) -> Result<String, ClientError> {
        let url = endpoint(&self.endpoints.jobs_url, "create_job");
        let response = self.send(self.client.post(&url).json(case)).await?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(match serde_json::from_str::<JobErrorBody>(&text) {
                Ok(body) => ClientError::Rejected(body.error),
                Err(_) => ClientError::Upstream {
                    status: status.as_u16(),
                    message: text,
                },
            });
        }

        let created: CreateJobResponse = read_json(response).await?;
        let job_id = match created.job_id {
            Value::String(id) => id,
            Value::Null => {
                return Err(ClientError::InvalidResponse(
                    "job_id missing from create_job response".to_string(),
                ))
            }
            other => other.to_string(),
        };
        tracing::info!(job_id = %job_id, tc_hash = %case.tc_hash, "Execution job created");
        Ok(job_id)
    }

    /// Every stored generation run.
    pub async fn get_all_entries(&self) -> Result<Vec<Entry>, ClientError> {
        let url = endpoint(&self.endpoints.backend_url, "get_all_entries");
        let response = self.send(self.client.get(&url)).await?;
        let body: EntriesResponse = read_json(ensure_success(response).await?).await?;
        Ok(body.entries)
    }

    /// Ask the log-analysis chat about `prompt`.
    pub async fn test_prompt(&self, prompt: &str) -> Result<ChatReply, ClientError> {
        let url = endpoint(&self.endpoints.chat_url, "testPrompt");
        let request = ChatRequest {
            prompt,
            prompt_hash: hex::encode(Sha256::digest(prompt.as_bytes())),
        };
        let response = self.send(self.client.post(&url).json(&request)).await?;
        let body: Value = read_json(ensure_success(response).await?).await?;
        Ok(ChatReply::from_body(&body))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let timeout_seconds = self.timeout.as_secs();
        request.timeout(self.timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout(timeout_seconds)
            } else {
                ClientError::Network(e.to_string())
            }
        })
    }
}

fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

async fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(ClientError::Upstream {
        status: status.as_u16(),
        message,
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    response
        .json()
        .await
        .map_err(|e| ClientError::InvalidResponse(format!("Failed to parse response: {}", e)))
}
