//! Durable fallback queue for recipients who are not connected.
//!
//! Entries for one recipient come back in insertion order on a best-effort
//! basis; callers must not rely on it.

mod memory;
mod redis;

pub use self::memory::MemoryMailbox;
pub use self::redis::RedisMailbox;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use squeak_common::StoreError;
use std::fmt::Debug;

/// A message as submitted by a client. The sender is implied by the
/// authenticated connection or token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outgoing {
    /// Recipient subject
    pub recipient: String,
    /// Opaque ciphertext
    pub payload: String,
    /// Prekey used to establish the session
    pub key_id: String,
}

/// A routed message with its authenticated sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Recipient subject
    pub recipient: String,
    /// Opaque ciphertext
    pub payload: String,
    /// Prekey used to establish the session
    pub key_id: String,
    /// Authenticated sender subject
    pub sender: String,
}

impl Envelope {
    /// Stamp `message` with its authenticated sender.
    #[must_use]
    pub fn from_sender(sender: impl Into<String>, message: Outgoing) -> Self {
        Self {
            recipient: message.recipient,
            payload: message.payload,
            key_id: message.key_id,
            sender: sender.into(),
        }
    }
}

/// Per-recipient mailbox.
#[async_trait]
pub trait MailboxStore: Send + Sync + Debug {
    /// Queue `envelope` for `recipient`.
    async fn append(&self, recipient: &str, envelope: Envelope) -> Result<(), StoreError>;

    /// Queue every envelope for its own recipient, all or nothing.
    async fn append_many(&self, envelopes: Vec<Envelope>) -> Result<(), StoreError>;

    /// Remove and return everything queued for `recipient`.
    ///
    /// Appends racing with a drain land in this batch or the next, never
    /// both and never neither.
    async fn drain_all(&self, recipient: &str) -> Result<Vec<Envelope>, StoreError>;
}
