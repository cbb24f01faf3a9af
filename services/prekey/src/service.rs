//! Authorized prekey upload and handout.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use squeak_common::{ApiError, StorageBackend, StoreError, connect_redis, with_deadline};
use squeak_token::{Accepted, Token, Verifier, fetch_public_key};
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::store::{MemoryPrekeyStore, Prekey, PrekeyStore, RedisPrekeyStore};

/// Prekey resource service.
#[derive(Debug)]
pub struct PrekeyService {
    verifier: Verifier,
    store: Arc<dyn PrekeyStore>,
    store_timeout: Duration,
}

impl PrekeyService {
    /// Assemble a service from its parts.
    #[must_use]
    pub fn new(verifier: Verifier, store: Arc<dyn PrekeyStore>, store_timeout: Duration) -> Self {
        Self {
            verifier,
            store,
            store_timeout,
        }
    }

    /// Build from configuration: fetch the issuer key once and connect the
    /// store.
    ///
    /// # Errors
    ///
    /// Returns an error if the key fetch fails or redis is unreachable.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::new();
        let key = fetch_public_key(&client, &config.issuer_public_key_url)
            .await
            .context("fetching issuer public key")?;
        let verifier =
            Verifier::new(config.audience_id.clone(), key).with_leeway(config.clock_leeway);

        let store: Arc<dyn PrekeyStore> = match &config.storage {
            StorageBackend::Memory => Arc::new(MemoryPrekeyStore::new()),
            StorageBackend::Redis { url } => Arc::new(RedisPrekeyStore::new(
                connect_redis(url).await.context("connecting prekey store")?,
            )),
        };

        info!(audience = %config.audience_id, "Prekey service initialized");
        Ok(Self::new(verifier, store, config.store_timeout))
    }

    /// Publish prekeys for the authenticated subject.
    ///
    /// Every record must name the caller as owner.
    ///
    /// # Errors
    ///
    /// `Unauthorized` for a bad token or a foreign owner, `BadRequest` for
    /// an empty batch, `Internal` on store failure.
    #[instrument(skip_all, fields(count = keys.len()))]
    pub async fn upload(&self, access: &str, keys: Vec<Prekey>) -> Result<usize, ApiError> {
        let token = self.authenticate(access)?;
        let subject = token.subject();

        if keys.is_empty() {
            return Err(ApiError::bad_request("no prekeys supplied"));
        }
        if let Some(foreign) = keys.iter().find(|k| k.owner_id != subject) {
            warn!(subject = %subject, owner = %foreign.owner_id, "Prekey upload for another subject");
            return Err(ApiError::Unauthorized);
        }

        let count = keys.len();
        self.bounded(self.store.upload(subject, keys)).await?;
        info!(subject = %subject, count, "Prekeys uploaded");
        Ok(count)
    }

    /// Take one prekey belonging to `owner`.
    ///
    /// `None` means the owner has no session-establishment material left.
    ///
    /// # Errors
    ///
    /// `Unauthorized` for a bad token, `BadRequest` for an empty owner,
    /// `Internal` on store failure.
    #[instrument(skip(self, access))]
    pub async fn consume(&self, access: &str, owner: &str) -> Result<Option<Prekey>, ApiError> {
        let token = self.authenticate(access)?;
        if owner.is_empty() {
            return Err(ApiError::bad_request("owner is required"));
        }

        let key = self.bounded(self.store.consume_one(owner)).await?;
        match &key {
            Some(k) => debug!(requester = %token.subject(), key_id = %k.key_id, "Prekey handed out"),
            None => info!(requester = %token.subject(), owner = %owner, "No prekeys left"),
        }
        Ok(key)
    }

    /// Prekeys the caller has left, so clients know when to replenish.
    ///
    /// # Errors
    ///
    /// `Unauthorized` for a bad token, `Internal` on store failure.
    pub async fn remaining(&self, access: &str) -> Result<usize, ApiError> {
        let token = self.authenticate(access)?;
        self.bounded(self.store.count(token.subject())).await
    }

    fn authenticate(&self, access: &str) -> Result<Token<Accepted>, ApiError> {
        Ok(self.verifier.verify_wire(access)?)
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        Ok(with_deadline(self.store_timeout, op).await?)
    }
}
