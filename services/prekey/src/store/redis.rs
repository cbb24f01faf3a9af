use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use squeak_common::StoreError;

use super::{Prekey, PrekeyStore};

/// Redis-backed prekey store.
///
/// Each owner has a list at `prekeys:{owner}` holding JSON records. `LPOP`
/// is atomic, so two consumers never see the same record.
#[derive(Clone)]
pub struct RedisPrekeyStore {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisPrekeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPrekeyStore").finish_non_exhaustive()
    }
}

impl RedisPrekeyStore {
    /// Wrap a managed connection.
    #[must_use]
    pub const fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

fn list_key(owner: &str) -> String {
    format!("prekeys:{owner}")
}

#[async_trait]
impl PrekeyStore for RedisPrekeyStore {
    async fn upload(&self, owner: &str, keys: Vec<Prekey>) -> Result<(), StoreError> {
        if keys.is_empty() {
            return Ok(());
        }
        let records = keys
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;

        let mut conn = self.conn.clone();
        let _: i64 = conn.rpush(list_key(owner), records).await?;
        Ok(())
    }

    async fn consume_one(&self, owner: &str) -> Result<Option<Prekey>, StoreError> {
        let mut conn = self.conn.clone();
        let record: Option<String> = conn.lpop(list_key(owner), None).await?;
        record
            .map(|r| serde_json::from_str(&r).map_err(StoreError::from))
            .transpose()
    }

    async fn count(&self, owner: &str) -> Result<usize, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.llen(list_key(owner)).await?)
    }
}
