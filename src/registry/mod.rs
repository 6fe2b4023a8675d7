//! Connection Registry module.
//!
//! Process-wide map from [`ConnectionKey`] to the live stream connection
//! serving it. The registry is constructed once and shared by `Arc`; it holds
//! at most one connection per key.

mod error;
mod handle;
mod key;

pub use error::*;
pub use handle::*;
pub use key::*;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

/// The Connection Registry stores every live stream connection.
///
/// Thread-safe: per-key operations that must be atomic (get-or-create,
/// release, retry replacement) run under the map's entry lock, so concurrent
/// subscribers to one key never create two connections.
///
/// # Examples
///
/// ```
/// use optim::registry::{ConnectionHandle, ConnectionKey, ConnectionRegistry, ResourceId, StreamKind};
/// use optim::stream::{JobStatus, StreamSnapshot};
///
/// let registry = ConnectionRegistry::new();
/// let key = ConnectionKey::new(StreamKind::Status, &ResourceId::new("p1", "tc1"));
/// let (handle, _sender) = ConnectionHandle::new(
///     key.clone(),
///     StreamKind::Status,
///     StreamSnapshot::status(JobStatus::Pending),
/// );
///
/// registry.put(handle).unwrap();
/// assert!(registry.get(&key).is_some());
/// assert_eq!(registry.len(), 1);
/// ```
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionKey, ConnectionHandle>,
}

impl ConnectionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Look up the live connection for a key.
    pub fn get(&self, key: &ConnectionKey) -> Option<ConnectionHandle> {
        self.connections.get(key).map(|entry| entry.value().clone())
    }

    /// Register a connection.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateKey` if the key already has a live connection.
    pub fn put(&self, handle: ConnectionHandle) -> Result<(), RegistryError> {
        match self.connections.entry(handle.key.clone()) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateKey(handle.key)),
            Entry::Vacant(slot) => {
                slot.insert(handle);
                Ok(())
            }
        }
    }

    /// Remove whatever connection is registered under `key`.
    pub fn remove(&self, key: &ConnectionKey) -> Option<ConnectionHandle> {
        self.connections.remove(key).map(|(_, handle)| handle)
    }

    /// Get the connection for `key`, creating it with `create` if none is
    /// live, and count one more subscriber against it.
    ///
    /// `create` runs under the entry lock and must not touch the registry.
    pub fn acquire<F>(&self, key: &ConnectionKey, create: F) -> ConnectionHandle
    where
        F: FnOnce() -> ConnectionHandle,
    {
        let entry = self.connections.entry(key.clone()).or_insert_with(create);
        entry.add_subscriber();
        entry.value().clone()
    }

    /// Drop one subscriber from `session_id`.
    ///
    /// When `remove_when_idle` is set and this was the last subscriber, the
    /// connection is removed and returned so the caller can close it.
    pub fn release(
        &self,
        key: &ConnectionKey,
        session_id: Uuid,
        remove_when_idle: bool,
    ) -> Option<ConnectionHandle> {
        match self.connections.entry(key.clone()) {
            Entry::Occupied(entry) if entry.get().session_id == session_id => {
                let remaining = entry.get().release_subscriber();
                if remaining == 0 && remove_when_idle {
                    Some(entry.remove())
                } else {
                    None
                }
            }
            // Session already gone (completed, closed, or superseded)
            _ => None,
        }
    }

    /// Swap in the replacement connection created by a retry.
    ///
    /// The old entry is removed and the new one registered under the same key
    /// in a single step. Fails if the session was closed in the meantime.
    pub fn replace(&self, handle: ConnectionHandle) -> Result<ConnectionHandle, RegistryError> {
        match self.connections.entry(handle.key.clone()) {
            Entry::Occupied(mut entry) if entry.get().session_id == handle.session_id => {
                Ok(entry.insert(handle))
            }
            _ => Err(RegistryError::NotFound(handle.key)),
        }
    }

    /// Remove the entry for `key` only if it still belongs to `session_id`.
    pub fn remove_session(&self, key: &ConnectionKey, session_id: Uuid) -> Option<ConnectionHandle> {
        self.connections
            .remove_if(key, |_, handle| handle.session_id == session_id)
            .map(|(_, handle)| handle)
    }

    /// Whether `key` currently has a live connection.
    pub fn contains(&self, key: &ConnectionKey) -> bool {
        self.connections.contains_key(key)
    }

    /// Get the number of live connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// All registered keys, sorted.
    pub fn keys(&self) -> Vec<ConnectionKey> {
        let mut keys: Vec<_> = self
            .connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();
        keys
    }

    /// Remove and return every connection (used at shutdown).
    pub fn drain(&self) -> Vec<ConnectionHandle> {
        self.keys()
            .iter()
            .filter_map(|key| self.remove(key))
            .collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
