//! Connection registry.
//!
//! One mutex guards the map. Lookups and the non-blocking hand-off to a
//! connection's outbound queue happen under that lock, so a message can
//! never be queued on a connection that has already deregistered. No
//! storage call is made while the lock is held.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};

use super::frame::ServerFrame;
use crate::mailbox::Envelope;

/// Identifies one connection, so a replaced connection cannot remove its
/// successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

#[derive(Debug)]
struct Slot {
    id: ConnectionId,
    outbound: mpsc::Sender<ServerFrame>,
    evict: oneshot::Sender<()>,
}

/// Live connections by subject.
#[derive(Debug, Default)]
pub struct Registry {
    slots: Mutex<HashMap<String, Slot>>,
    next_id: AtomicU64,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for `subject`.
    ///
    /// An existing connection for the subject is replaced and told to close
    /// through its eviction channel.
    pub fn register(
        &self,
        subject: &str,
        outbound: mpsc::Sender<ServerFrame>,
        evict: oneshot::Sender<()>,
    ) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let previous = self
            .slots
            .lock()
            .insert(subject.to_string(), Slot { id, outbound, evict });

        if let Some(previous) = previous {
            tracing::warn!(subject = %subject, "Replacing existing connection");
            // The old connection may already be closing.
            let _ = previous.evict.send(());
        }
        id
    }

    /// Remove `subject` if it is still registered to `id`.
    pub fn deregister(&self, subject: &str, id: ConnectionId) -> bool {
        let mut slots = self.slots.lock();
        if slots.get(subject).is_some_and(|slot| slot.id == id) {
            slots.remove(subject);
            return true;
        }
        false
    }

    /// Queue `envelope` on the recipient's connection without waiting.
    ///
    /// Hands the envelope back if the recipient is not connected or its
    /// queue is full or closed.
    pub fn try_deliver(&self, envelope: Envelope) -> Result<(), Envelope> {
        let slots = self.slots.lock();
        let Some(slot) = slots.get(&envelope.recipient) else {
            return Err(envelope);
        };
        match slot.outbound.try_reserve() {
            Ok(permit) => {
                permit.send(ServerFrame::Deliver(envelope));
                Ok(())
            }
            Err(_) => Err(envelope),
        }
    }

    /// Whether `subject` has a live connection.
    #[must_use]
    pub fn is_connected(&self, subject: &str) -> bool {
        self.slots.lock().contains_key(subject)
    }

    /// Number of live connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Whether no connection is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}
