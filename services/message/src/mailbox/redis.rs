use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use squeak_common::StoreError;

use super::{Envelope, MailboxStore};

/// Redis-backed mailbox.
///
/// Entries are JSON records in a list at `mailbox:{recipient}`. A batch
/// append and a drain each run in one `MULTI` block.
#[derive(Clone)]
pub struct RedisMailbox {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisMailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisMailbox").finish_non_exhaustive()
    }
}

impl RedisMailbox {
    /// Wrap a managed connection.
    #[must_use]
    pub const fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

fn mailbox_key(recipient: &str) -> String {
    format!("mailbox:{recipient}")
}

#[async_trait]
impl MailboxStore for RedisMailbox {
    async fn append(&self, recipient: &str, envelope: Envelope) -> Result<(), StoreError> {
        let record = serde_json::to_string(&envelope)?;
        let mut conn = self.conn.clone();
        let _: i64 = conn.rpush(mailbox_key(recipient), record).await?;
        Ok(())
    }

    async fn append_many(&self, envelopes: Vec<Envelope>) -> Result<(), StoreError> {
        if envelopes.is_empty() {
            return Ok(());
        }
        let mut pipe = redis::pipe();
        pipe.atomic();
        for envelope in &envelopes {
            let record = serde_json::to_string(envelope)?;
            pipe.rpush(mailbox_key(&envelope.recipient), record).ignore();
        }
        let mut conn = self.conn.clone();
        let () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn drain_all(&self, recipient: &str) -> Result<Vec<Envelope>, StoreError> {
        let key = mailbox_key(recipient);
        let mut conn = self.conn.clone();
        let (records,): (Vec<String>,) = redis::pipe()
            .atomic()
            .lrange(&key, 0, -1)
            .del(&key)
            .ignore()
            .query_async(&mut conn)
            .await?;

        // The list is already gone; a corrupt record cannot be retried.
        Ok(records
            .iter()
            .filter_map(|r| match serde_json::from_str(r) {
                Ok(envelope) => Some(envelope),
                Err(e) => {
                    tracing::error!(recipient = %recipient, error = %e, "Dropping corrupt mailbox record");
                    None
                }
            })
            .collect())
    }
}
