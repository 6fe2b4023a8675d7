use super::{ConnectionKey, StreamKind};
use crate::stream::StreamSnapshot;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Registry-side view of one live stream connection.
///
/// Cloning is cheap: every clone shares the cancellation token, the
/// subscriber counter and the published state of the same session.
///
/// A *session* spans every reconnection under one key and keeps the
/// accumulated state; a *connection* is one transport subscription inside
/// it. `connection_id` changes on every retry, `session_id` never does.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    /// Key this connection is registered under
    pub key: ConnectionKey,
    /// Endpoint family
    pub kind: StreamKind,
    /// Stable across reconnections
    pub session_id: Uuid,
    /// Fresh for every (re)created transport subscription
    pub connection_id: Uuid,
    /// When this transport subscription was created
    pub opened_at: DateTime<Utc>,
    cancel: CancellationToken,
    subscribers: Arc<AtomicUsize>,
    state: watch::Receiver<StreamSnapshot>,
}

impl ConnectionHandle {
    /// Create a handle for a brand-new session, returning the sender that the
    /// connection task publishes through.
    pub fn new(
        key: ConnectionKey,
        kind: StreamKind,
        initial: StreamSnapshot,
    ) -> (Self, watch::Sender<StreamSnapshot>) {
        let (sender, state) = watch::channel(initial);
        let handle = Self {
            key,
            kind,
            session_id: Uuid::new_v4(),
            connection_id: Uuid::new_v4(),
            opened_at: Utc::now(),
            cancel: CancellationToken::new(),
            subscribers: Arc::new(AtomicUsize::new(0)),
            state,
        };
        (handle, sender)
    }

    /// The handle for the replacement connection created by a retry.
    pub fn reconnected(&self) -> Self {
        Self {
            connection_id: Uuid::new_v4(),
            opened_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Number of live subscriptions sharing this session.
    pub fn subscribers(&self) -> usize {
        self.subscribers.load(Ordering::SeqCst)
    }

    pub(crate) fn add_subscriber(&self) -> usize {
        self.subscribers.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Saturating decrement; returns the remaining count.
    pub(crate) fn release_subscriber(&self) -> usize {
        loop {
            let current = self.subscribers.load(Ordering::SeqCst);
            if current == 0 {
                tracing::warn!(key = %self.key, "Released a subscriber when none were held");
                return 0;
            }
            if self
                .subscribers
                .compare_exchange(current, current - 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return current - 1;
            }
        }
    }

    /// Stop the connection task. Callers remove the handle from the registry first.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Latest published state.
    pub fn snapshot(&self) -> StreamSnapshot {
        self.state.borrow().clone()
    }

    /// A fresh receiver for state updates.
    pub fn watch(&self) -> watch::Receiver<StreamSnapshot> {
        self.state.clone()
    }

    pub(crate) fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }
}
