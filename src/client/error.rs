//! Error types for collaborator requests.

use thiserror::Error;

/// Errors returned by [`ApiClient`](super::ApiClient) calls.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network connectivity error (DNS, connection refused, etc.).
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded deadline.
    #[error("Request timeout after {0}s")]
    Timeout(u64),

    /// Service returned an error response (4xx, 5xx).
    #[error("Service error {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Response doesn't match the expected format.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Service refused the request and said why.
    #[error("Request rejected: {0}")]
    Rejected(String),
}
