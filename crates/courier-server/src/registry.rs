//! Client id to live connection mapping.
//!
//! The registry holds at most one handle per [`ClientId`]. Entries are
//! created and removed by whatever code owns the client handshake (see
//! [`crate::handler::ConnectionHandler`]); the dispatcher and the lifecycle
//! manager only read it.

use std::sync::Arc;

use courier_core::{ClientId, ConnectionId};
use dashmap::DashMap;
use metrics::gauge;
use tracing::debug;

use crate::connection::ConnectionHandle;
use crate::metrics::REGISTRY_ENTRIES;

/// Concurrent map from client id to connection handle.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: DashMap<ClientId, ConnectionHandle>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry behind an `Arc`.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Bind `client_id` to `handle`, replacing any previous binding.
    ///
    /// Returns the replaced handle. Concurrent registrations for the same id
    /// leave exactly one of the submitted handles in place.
    pub fn register(&self, client_id: ClientId, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        let connection_id = handle.id();
        let previous = self.entries.insert(client_id, handle);
        match &previous {
            Some(old) => debug!(
                %client_id,
                %connection_id,
                replaced = %old.id(),
                "client re-registered"
            ),
            None => {
                gauge!(REGISTRY_ENTRIES).increment(1.0);
                debug!(%client_id, %connection_id, "client registered");
            }
        }
        previous
    }

    /// The handle currently bound to `client_id`.
    pub fn lookup(&self, client_id: ClientId) -> Option<ConnectionHandle> {
        self.entries.get(&client_id).map(|entry| entry.value().clone())
    }

    /// Whether `client_id` has a binding.
    pub fn contains(&self, client_id: ClientId) -> bool {
        self.entries.contains_key(&client_id)
    }

    /// Remove the binding for `client_id`.
    pub fn deregister(&self, client_id: ClientId) -> Option<ConnectionHandle> {
        let removed = self.entries.remove(&client_id).map(|(_, handle)| handle);
        if removed.is_some() {
            gauge!(REGISTRY_ENTRIES).decrement(1.0);
            debug!(%client_id, "client deregistered");
        }
        removed
    }

    /// Remove the binding for `client_id` only if it still points at
    /// `connection_id`.
    ///
    /// A connection tearing down calls this so it cannot evict a newer
    /// connection that re-registered the same id.
    pub fn deregister_if(&self, client_id: ClientId, connection_id: ConnectionId) -> bool {
        let removed = self
            .entries
            .remove_if(&client_id, |_, handle| handle.id() == connection_id)
            .is_some();
        if removed {
            gauge!(REGISTRY_ENTRIES).decrement(1.0);
            debug!(%client_id, %connection_id, "client deregistered");
        }
        removed
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no client is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of registered client ids.
    pub fn client_ids(&self) -> Vec<ClientId> {
        self.entries.iter().map(|entry| *entry.key()).collect()
    }
}
