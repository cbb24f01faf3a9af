//! Storage plumbing shared by the redis-backed stores.

use crate::error::StoreError;
use redis::aio::ConnectionManager;
use std::future::Future;
use std::time::Duration;

/// Run a storage future under a deadline.
///
/// # Errors
///
/// Returns [`StoreError::Timeout`] if the deadline passes first, otherwise
/// whatever the future returned.
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| StoreError::Timeout(deadline))?
}

/// Open a managed redis connection.
///
/// # Errors
///
/// Returns [`StoreError::Backend`] if the URL is invalid or the server is
/// unreachable.
pub async fn connect_redis(url: &str) -> Result<ConnectionManager, StoreError> {
    let client = redis::Client::open(url)?;
    let manager = ConnectionManager::new(client).await?;
    tracing::info!("Connected to redis");
    Ok(manager)
}
