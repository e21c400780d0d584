//! # Chat Client Registry
//!
//! The only mutable state shared across connection handlers. One mutex, one
//! map from connection id to that connection's outbound queue. The lock
//! covers map operations and the non-blocking queue sends of a broadcast,
//! never a network write; actual delivery goes through unbounded channels
//! drained by each connection's own writer loop, so a slow recipient can
//! never stall the sender or the registry.

use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// Identifies one accepted connection for the lifetime of the server.
pub type ConnectionId = u64;

/// Registry of connections that receive chat broadcasts.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<ConnectionId, mpsc::UnboundedSender<Vec<u8>>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection's broadcast queue.
    pub fn register(&self, id: ConnectionId, sender: mpsc::UnboundedSender<Vec<u8>>) {
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        clients.insert(id, sender);
        debug!(conn = id, total = clients.len(), "registered chat client");
    }

    /// Remove a connection. Safe to call on every exit path, registered or not.
    pub fn unregister(&self, id: ConnectionId) {
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        if clients.remove(&id).is_some() {
            debug!(conn = id, total = clients.len(), "unregistered chat client");
        }
    }

    /// Number of currently registered connections.
    pub fn len(&self) -> usize {
        self.clients.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue `payload` for every registered connection except `from`.
    ///
    /// Returns how many peers the message was queued for. Peers whose
    /// receiving side is already gone are skipped; they unregister themselves
    /// on their own exit path.
    ///
    /// The queue sends happen while the lock is held. They never block, and
    /// serializing them this way means every recipient observes concurrent
    /// broadcasts in one and the same order.
    pub fn broadcast(&self, from: ConnectionId, payload: &[u8]) -> usize {
        let clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        let mut delivered = 0;
        for (id, tx) in clients.iter() {
            if *id == from {
                continue;
            }
            if tx.send(payload.to_vec()).is_ok() {
                delivered += 1;
            } else {
                debug!(conn = id, "skipping departed chat client");
            }
        }
        delivered
    }
}
