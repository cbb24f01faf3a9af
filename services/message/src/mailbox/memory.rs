use async_trait::async_trait;
use parking_lot::Mutex;
use squeak_common::StoreError;
use std::collections::HashMap;

use super::{Envelope, MailboxStore};

/// In-process mailbox.
#[derive(Debug, Default)]
pub struct MemoryMailbox {
    boxes: Mutex<HashMap<String, Vec<Envelope>>>,
}

impl MemoryMailbox {
    /// Create an empty mailbox.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries queued for `recipient`.
    #[must_use]
    pub fn pending(&self, recipient: &str) -> usize {
        self.boxes.lock().get(recipient).map_or(0, Vec::len)
    }
}

#[async_trait]
impl MailboxStore for MemoryMailbox {
    async fn append(&self, recipient: &str, envelope: Envelope) -> Result<(), StoreError> {
        self.boxes
            .lock()
            .entry(recipient.to_string())
            .or_default()
            .push(envelope);
        Ok(())
    }

    async fn append_many(&self, envelopes: Vec<Envelope>) -> Result<(), StoreError> {
        let mut boxes = self.boxes.lock();
        for envelope in envelopes {
            boxes
                .entry(envelope.recipient.clone())
                .or_default()
                .push(envelope);
        }
        Ok(())
    }

    async fn drain_all(&self, recipient: &str) -> Result<Vec<Envelope>, StoreError> {
        Ok(self.boxes.lock().remove(recipient).unwrap_or_default())
    }
}
