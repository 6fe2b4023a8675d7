//! The task driving one stream key: open, read, classify, retry.

use super::session::{Dispatch, StreamSession};
use super::source::{EventSource, SseStream};
use super::sse::SseMessage;
use super::{RetryPolicy, StreamSnapshot, TransportError};
use crate::registry::{ConnectionHandle, ConnectionRegistry};
use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Instant, Sleep};

/// Where the transport currently is.
enum Phase {
    Opening(BoxFuture<'static, Result<SseStream, TransportError>>),
    Streaming(SseStream),
    Waiting(Pin<Box<Sleep>>),
}

/// What woke the task up.
enum Step {
    Timer,
    Opened(Result<SseStream, TransportError>),
    Message(SseMessage),
    Failed(TransportError),
    RetryDue,
}

/// Owns one session for its whole life; every state change for the key
/// happens on this task, in transport order.
pub(crate) struct ConnectionTask<S: StreamSession> {
    handle: ConnectionHandle,
    session: S,
    sender: watch::Sender<StreamSnapshot>,
    source: Arc<dyn EventSource>,
    registry: Arc<ConnectionRegistry>,
    retry: RetryPolicy,
    url: String,
}

impl<S: StreamSession> ConnectionTask<S> {
    pub(crate) fn new(
        handle: ConnectionHandle,
        session: S,
        sender: watch::Sender<StreamSnapshot>,
        source: Arc<dyn EventSource>,
        registry: Arc<ConnectionRegistry>,
        retry: RetryPolicy,
        url: String,
    ) -> Self {
        Self {
            handle,
            session,
            sender,
            source,
            registry,
            retry,
            url,
        }
    }

    pub(crate) async fn run(mut self) {
        let cancel = self.handle.cancellation();
        let kind = self.session.kind().as_str();
        let mut attempt: u32 = 0;
        let mut phase = self.open();

        metrics::gauge!("optim_stream_connections").increment(1.0);
        tracing::info!(
            key = %self.handle.key,
            connection_id = %self.handle.connection_id,
            url = %self.url,
            "Stream connection started"
        );

        loop {
            let deadline = self.session.next_deadline();
            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(key = %self.handle.key, "Stream connection closed");
                    break;
                }
                _ = sleep_until_opt(deadline) => Step::Timer,
                step = next_step(&mut phase) => step,
            };

            match step {
                Step::Timer => {
                    if self.session.on_timer(Instant::now()) {
                        self.publish();
                    }
                }
                Step::Opened(Ok(stream)) => {
                    tracing::debug!(
                        key = %self.handle.key,
                        connection_id = %self.handle.connection_id,
                        "Stream opened"
                    );
                    attempt = 0;
                    if self.session.on_open() {
                        self.publish();
                    }
                    phase = Phase::Streaming(stream);
                }
                Step::Opened(Err(error)) | Step::Failed(error) => {
                    let delay = self.retry.delay_for(attempt);
                    attempt = attempt.saturating_add(1);
                    tracing::warn!(
                        key = %self.handle.key,
                        connection_id = %self.handle.connection_id,
                        error = %error,
                        retry_in_seconds = delay.as_secs(),
                        "Stream transport failed"
                    );
                    if self.session.on_transport_error(&error, Instant::now()) {
                        self.publish();
                    }
                    phase = Phase::Waiting(Box::pin(tokio::time::sleep(delay)));
                }
                Step::Message(message) => {
                    if !message.is_message() {
                        tracing::debug!(
                            key = %self.handle.key,
                            event = ?message.event,
                            "Ignoring non-message event"
                        );
                        continue;
                    }
                    let dispatch = self.session.on_message(&message.data, Instant::now());
                    metrics::counter!(
                        "optim_stream_events_total",
                        "kind" => kind,
                        "class" => dispatch.as_str()
                    )
                    .increment(1);

                    match dispatch {
                        Dispatch::Ignored => {
                            tracing::debug!(
                                key = %self.handle.key,
                                data = %message.data,
                                "Dropped malformed payload"
                            );
                        }
                        Dispatch::Updated => self.publish(),
                        Dispatch::Completed => {
                            self.publish();
                            self.registry
                                .remove_session(&self.handle.key, self.handle.session_id);
                            self.handle.close();
                            tracing::info!(key = %self.handle.key, "Job completed, stream closed");
                            break;
                        }
                    }
                }
                Step::RetryDue => {
                    let next = self.handle.reconnected();
                    match self.registry.replace(next.clone()) {
                        Ok(previous) => {
                            tracing::info!(
                                key = %next.key,
                                previous_connection_id = %previous.connection_id,
                                connection_id = %next.connection_id,
                                "Reconnecting stream"
                            );
                            metrics::counter!("optim_stream_reconnects_total", "kind" => kind)
                                .increment(1);
                            self.handle = next;
                            phase = self.open();
                        }
                        Err(error) => {
                            tracing::debug!(
                                key = %self.handle.key,
                                error = %error,
                                "Session gone before reconnect"
                            );
                            break;
                        }
                    }
                }
            }
        }

        self.session.on_close();
        self.registry
            .remove_session(&self.handle.key, self.handle.session_id);
        metrics::gauge!("optim_stream_connections").decrement(1.0);
    }

    fn open(&self) -> Phase {
        let source = Arc::clone(&self.source);
        let url = self.url.clone();
        Phase::Opening(Box::pin(async move { source.open(&url).await }))
    }

    fn publish(&self) {
        self.sender.send_replace(self.session.snapshot());
    }
}

async fn next_step(phase: &mut Phase) -> Step {
    match phase {
        Phase::Opening(open) => Step::Opened(open.await),
        Phase::Streaming(stream) => match stream.next().await {
            Some(Ok(message)) => Step::Message(message),
            Some(Err(error)) => Step::Failed(error),
            None => Step::Failed(TransportError::Closed),
        },
        Phase::Waiting(delay) => {
            delay.as_mut().await;
            Step::RetryDue
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
