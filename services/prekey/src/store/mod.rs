//! One-time prekey storage.

mod memory;
mod redis;

pub use self::memory::MemoryPrekeyStore;
pub use self::redis::RedisPrekeyStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use squeak_common::StoreError;
use std::fmt::Debug;

/// A single-use public key published by its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prekey {
    /// Owning subject
    pub owner_id: String,
    /// Opaque key material
    pub key_material: String,
    /// Key identifier, referenced by messages encrypted with it
    pub key_id: String,
}

impl Prekey {
    /// Create a prekey record.
    #[must_use]
    pub fn new(
        owner_id: impl Into<String>,
        key_id: impl Into<String>,
        key_material: impl Into<String>,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            key_material: key_material.into(),
            key_id: key_id.into(),
        }
    }
}

/// Per-owner prekey queue.
///
/// Ownership is enforced by the caller; the store only stores.
#[async_trait]
pub trait PrekeyStore: Send + Sync + Debug {
    /// Append `keys` for `owner`. Duplicate key ids are not detected.
    async fn upload(&self, owner: &str, keys: Vec<Prekey>) -> Result<(), StoreError>;

    /// Atomically remove and return one prekey for `owner`, oldest first.
    /// Concurrent callers never receive the same key.
    async fn consume_one(&self, owner: &str) -> Result<Option<Prekey>, StoreError>;

    /// Number of prekeys left for `owner`.
    async fn count(&self, owner: &str) -> Result<usize, StoreError>;
}
