//! Stream Connection module.
//!
//! [`StreamManager`] hands out [`Subscription`]s to the log and status
//! streams of a test case. Subscribers of the same key share one connection,
//! driven by a single task that classifies events, tracks liveness and
//! reconnects after transport failures.

mod classify;
mod connection;
mod error;
mod liveness;
mod retry;
mod session;
mod source;
mod sse;
#[cfg(test)]
mod tests;
mod types;

pub use classify::*;
pub use error::*;
pub use liveness::*;
pub use retry::*;
pub use session::*;
pub use source::*;
pub use sse::*;
pub use types::*;

use crate::config::{EndpointsConfig, OptimConfig, StreamingConfig};
use crate::projection::{project, DisplayState};
use crate::registry::{ConnectionHandle, ConnectionKey, ConnectionRegistry, ResourceId, StreamKind};
use connection::ConnectionTask;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

/// Creates, shares and tears down stream connections.
pub struct StreamManager {
    registry: Arc<ConnectionRegistry>,
    source: Arc<dyn EventSource>,
    config: StreamingConfig,
    endpoints: EndpointsConfig,
    tracker: TaskTracker,
}

impl StreamManager {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        source: Arc<dyn EventSource>,
        config: StreamingConfig,
        endpoints: EndpointsConfig,
    ) -> Self {
        Self {
            registry,
            source,
            config,
            endpoints,
            tracker: TaskTracker::new(),
        }
    }

    /// Build a manager with an HTTP event source from loaded configuration.
    pub fn from_config(
        registry: Arc<ConnectionRegistry>,
        config: &OptimConfig,
    ) -> Result<Self, TransportError> {
        let source = HttpEventSource::new(config.streaming.connect_timeout())?;
        Ok(Self::new(
            registry,
            Arc::new(source),
            config.streaming.clone(),
            config.endpoints.clone(),
        ))
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Subscribe to the execution log of a test case.
    ///
    /// Must be called inside a tokio runtime: the first subscriber for a key
    /// spawns its connection task.
    pub fn subscribe_logs(&self, id: &ResourceId) -> Subscription {
        let url = id.stream_url(&self.endpoints.log_stream_url, StreamKind::Log);
        let config = &self.config;
        self.subscribe(
            StreamKind::Log,
            id,
            StreamSnapshot::log(),
            url,
            || {
                LogSession::new(
                    config.heartbeat_timeout(),
                    config.no_logs_threshold,
                    config.blink(),
                )
            },
        )
    }

    /// Subscribe to the job status of a test case. `initial` is what
    /// subscribers see until the server reports a status; it only applies
    /// when this call creates the connection.
    pub fn subscribe_status(&self, id: &ResourceId, initial: JobStatus) -> Subscription {
        let url = id.stream_url(&self.endpoints.status_stream_url, StreamKind::Status);
        self.subscribe(
            StreamKind::Status,
            id,
            StreamSnapshot::status(initial),
            url,
            || StatusSession::new(initial),
        )
    }

    fn subscribe<S, F>(
        &self,
        kind: StreamKind,
        id: &ResourceId,
        initial: StreamSnapshot,
        url: String,
        make_session: F,
    ) -> Subscription
    where
        S: StreamSession,
        F: FnOnce() -> S,
    {
        let key = ConnectionKey::new(kind, id);
        let mut launch = None;
        let handle = self.registry.acquire(&key, || {
            let (handle, sender) = ConnectionHandle::new(key.clone(), kind, initial);
            launch = Some((handle.clone(), sender));
            handle
        });

        if let Some((created, sender)) = launch {
            tracing::debug!(key = %key, url = %url, "Creating stream connection");
            let task = ConnectionTask::new(
                created,
                make_session(),
                sender,
                Arc::clone(&self.source),
                Arc::clone(&self.registry),
                RetryPolicy::from(&self.config),
                url,
            );
            self.tracker.spawn(task.run());
        }

        Subscription::new(handle, Arc::clone(&self.registry), self.config.close_when_idle)
    }

    /// Close and remove the connection for `key`, whoever subscribed to it.
    pub fn close(&self, key: &ConnectionKey) -> bool {
        match self.registry.remove(key) {
            Some(handle) => {
                handle.close();
                tracing::info!(key = %key, "Stream closed on request");
                true
            }
            None => false,
        }
    }

    /// Close every connection and wait for their tasks to finish.
    pub async fn shutdown(&self) {
        let handles = self.registry.drain();
        tracing::info!(connections = handles.len(), "Shutting down stream connections");
        for handle in handles {
            handle.close();
        }
        self.tracker.close();
        self.tracker.wait().await;
    }
}

/// A consumer's interest in one stream key.
///
/// Dropping the last subscription of a key closes its connection when
/// `close_when_idle` is enabled.
pub struct Subscription {
    handle: ConnectionHandle,
    receiver: watch::Receiver<StreamSnapshot>,
    registry: Arc<ConnectionRegistry>,
    close_when_idle: bool,
}

impl Subscription {
    fn new(handle: ConnectionHandle, registry: Arc<ConnectionRegistry>, close_when_idle: bool) -> Self {
        let receiver = handle.watch();
        Self {
            handle,
            receiver,
            registry,
            close_when_idle,
        }
    }

    pub fn key(&self) -> &ConnectionKey {
        &self.handle.key
    }

    pub fn kind(&self) -> StreamKind {
        self.handle.kind
    }

    pub fn session_id(&self) -> Uuid {
        self.handle.session_id
    }

    /// Latest published state.
    pub fn snapshot(&self) -> StreamSnapshot {
        self.receiver.borrow().clone()
    }

    /// Latest state projected for display.
    pub fn display(&self) -> DisplayState {
        project(&self.receiver.borrow())
    }

    /// Wait for the next published update. Returns `false` once the
    /// connection has ended (completed, closed or shut down).
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Whether an update arrived that [`changed`](Self::changed) has not
    /// yet returned for.
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    pub fn receiver(&self) -> watch::Receiver<StreamSnapshot> {
        self.receiver.clone()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(idle) =
            self.registry
                .release(&self.handle.key, self.handle.session_id, self.close_when_idle)
        {
            tracing::debug!(key = %idle.key, "Last subscriber released, closing stream");
            idle.close();
        }
    }
}
