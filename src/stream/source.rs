//! Server-push subscription primitive.

use super::sse::{SseDecoder, SseMessage};
use super::TransportError;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;

/// Stream of decoded events; ends after yielding one error.
pub type SseStream = BoxStream<'static, Result<SseMessage, TransportError>>;

/// Opens server-push subscriptions.
///
/// Implementations yield decoded events until the transport fails, then
/// yield a single `Err` (a server-side end of stream is
/// `TransportError::Closed`). Dropping the stream closes the transport.
#[async_trait]
pub trait EventSource: Send + Sync + 'static {
    async fn open(&self, url: &str) -> Result<SseStream, TransportError>;
}

/// `text/event-stream` over HTTP via reqwest.
pub struct HttpEventSource {
    client: Client,
    connect_timeout: Duration,
}

impl HttpEventSource {
    /// Create an event source with its own connection pool.
    pub fn new(connect_timeout: Duration) -> Result<Self, TransportError> {
        // Only the connect phase is bounded; streams stay open indefinitely.
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Self {
            client,
            connect_timeout,
        })
    }

    /// Create an event source with a custom HTTP client (for testing).
    pub fn with_client(client: Client, connect_timeout: Duration) -> Self {
        Self {
            client,
            connect_timeout,
        }
    }

    fn classify_error(e: reqwest::Error, timeout_seconds: u64) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(timeout_seconds)
        } else {
            TransportError::Connect(e.to_string())
        }
    }
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn open(&self, url: &str) -> Result<SseStream, TransportError> {
        let timeout_seconds = self.connect_timeout.as_secs();
        let request = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");

        let response = tokio::time::timeout(self.connect_timeout, request.send())
            .await
            .map_err(|_| TransportError::Timeout(timeout_seconds))?
            .map_err(|e| Self::classify_error(e, timeout_seconds))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus(status.as_u16()));
        }

        if let Some(content_type) = response.headers().get(CONTENT_TYPE) {
            let content_type = content_type.to_str().unwrap_or_default();
            if !content_type.starts_with("text/event-stream") {
                return Err(TransportError::ContentType(content_type.to_string()));
            }
        }

        let mut body = response.bytes_stream();
        let stream = async_stream::stream! {
            let mut decoder = SseDecoder::new();
            while let Some(chunk) = body.next().await {
                match chunk {
                    Ok(bytes) => match decoder.feed(&bytes) {
                        Ok(messages) => {
                            for message in messages {
                                yield Ok(message);
                            }
                        }
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    },
                    Err(e) => {
                        yield Err(TransportError::Read(e.to_string()));
                        return;
                    }
                }
            }
            yield Err(TransportError::Closed);
        };

        Ok(stream.boxed())
    }
}
