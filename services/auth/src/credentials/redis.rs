use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use squeak_common::StoreError;
use std::time::Duration;
use subtle::ConstantTimeEq;

use super::{CredentialStore, token_fingerprint};

const SUBJECT_PREFIX: &str = "refresh:";
const OWNER_PREFIX: &str = "refresh_owner:";

// KEYS[1] = refresh:{subject}
// ARGV = new fingerprint, subject, ttl secs, owner prefix
const PUT_SCRIPT: &str = r"
local old = redis.call('GET', KEYS[1])
if old then
  redis.call('DEL', ARGV[4] .. old)
end
redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[3])
redis.call('SET', ARGV[4] .. ARGV[1], ARGV[2], 'EX', ARGV[3])
return 1
";

// KEYS[1] = refresh_owner:{fingerprint}
// ARGV = fingerprint, subject prefix
const REVOKE_SCRIPT: &str = r"
local subject = redis.call('GET', KEYS[1])
if not subject then
  return 0
end
redis.call('DEL', KEYS[1])
local key = ARGV[2] .. subject
if redis.call('GET', key) == ARGV[1] then
  redis.call('DEL', key)
end
return 1
";

/// Redis-backed credential store.
///
/// Only token fingerprints are stored. `refresh:{subject}` holds the live
/// fingerprint and `refresh_owner:{fingerprint}` maps back to the subject;
/// both expire with the refresh token.
#[derive(Clone)]
pub struct RedisCredentialStore {
    conn: ConnectionManager,
    ttl: Duration,
}

impl std::fmt::Debug for RedisCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCredentialStore")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl RedisCredentialStore {
    /// Create a store whose entries live for `ttl` (the refresh-token lifetime).
    #[must_use]
    pub const fn new(conn: ConnectionManager, ttl: Duration) -> Self {
        Self { conn, ttl }
    }
}

#[async_trait]
impl CredentialStore for RedisCredentialStore {
    async fn put(&self, subject: &str, token: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::Script::new(PUT_SCRIPT)
            .key(format!("{SUBJECT_PREFIX}{subject}"))
            .arg(token_fingerprint(token))
            .arg(subject)
            .arg(self.ttl.as_secs().max(1))
            .arg(OWNER_PREFIX)
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn is_current(&self, subject: &str, token: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let stored: Option<String> = conn.get(format!("{SUBJECT_PREFIX}{subject}")).await?;
        let presented = token_fingerprint(token);
        Ok(stored.is_some_and(|s| bool::from(s.as_bytes().ct_eq(presented.as_bytes()))))
    }

    async fn revoke(&self, token: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let fingerprint = token_fingerprint(token);
        let removed: i64 = redis::Script::new(REVOKE_SCRIPT)
            .key(format!("{OWNER_PREFIX}{fingerprint}"))
            .arg(&fingerprint)
            .arg(SUBJECT_PREFIX)
            .invoke_async(&mut conn)
            .await?;
        tracing::debug!(removed, "Refresh token revoke applied");
        Ok(())
    }
}
