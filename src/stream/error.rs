//! Error types for stream transports.

use thiserror::Error;

/// Transport-level failures of a server-push subscription.
///
/// Every variant is recovered by the retry policy; none is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection could not be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// No response headers within the connect timeout
    #[error("connect timeout after {0}s")]
    Timeout(u64),

    /// Server answered with a non-success status
    #[error("HTTP error: {0}")]
    HttpStatus(u16),

    /// Server answered with something other than an event stream
    #[error("unexpected content type: {0}")]
    ContentType(String),

    /// Reading the body failed mid-stream
    #[error("stream read failed: {0}")]
    Read(String),

    /// Server ended the stream
    #[error("stream closed by server")]
    Closed,
}
