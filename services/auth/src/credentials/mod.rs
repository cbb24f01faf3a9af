//! Refresh-token revocation state.
//!
//! At most one refresh token is live per subject. The store is the single
//! source of truth: a signature-valid refresh token that the store does not
//! hold is not honoured.

mod memory;
mod redis;

pub use self::memory::MemoryCredentialStore;
pub use self::redis::RedisCredentialStore;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use squeak_common::StoreError;
use std::fmt::Debug;

/// Per-subject refresh-token store.
#[async_trait]
pub trait CredentialStore: Send + Sync + Debug {
    /// Make `token` the live refresh token for `subject`, superseding any
    /// previous one.
    async fn put(&self, subject: &str, token: &str) -> Result<(), StoreError>;

    /// Whether `token` is exactly the live refresh token for `subject`.
    async fn is_current(&self, subject: &str, token: &str) -> Result<bool, StoreError>;

    /// Clear `token` from whichever subject holds it. Unknown or already
    /// revoked tokens are a no-op.
    async fn revoke(&self, token: &str) -> Result<(), StoreError>;
}

/// SHA-256 of a wire token, base64url without padding.
#[must_use]
pub fn token_fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}
