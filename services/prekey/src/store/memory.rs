use async_trait::async_trait;
use parking_lot::Mutex;
use squeak_common::StoreError;
use std::collections::{HashMap, VecDeque};

use super::{Prekey, PrekeyStore};

/// In-process prekey store.
#[derive(Debug, Default)]
pub struct MemoryPrekeyStore {
    queues: Mutex<HashMap<String, VecDeque<Prekey>>>,
}

impl MemoryPrekeyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PrekeyStore for MemoryPrekeyStore {
    async fn upload(&self, owner: &str, keys: Vec<Prekey>) -> Result<(), StoreError> {
        self.queues
            .lock()
            .entry(owner.to_string())
            .or_default()
            .extend(keys);
        Ok(())
    }

    async fn consume_one(&self, owner: &str) -> Result<Option<Prekey>, StoreError> {
        let mut queues = self.queues.lock();
        let Some(queue) = queues.get_mut(owner) else {
            return Ok(None);
        };
        let key = queue.pop_front();
        if queue.is_empty() {
            queues.remove(owner);
        }
        Ok(key)
    }

    async fn count(&self, owner: &str) -> Result<usize, StoreError> {
        Ok(self.queues.lock().get(owner).map_or(0, VecDeque::len))
    }
}
