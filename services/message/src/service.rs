//! Store-and-forward API and service assembly.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use squeak_common::{ApiError, StorageBackend, connect_redis, with_deadline};
use squeak_token::{Accepted, Token, Verifier, fetch_public_key};
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::mailbox::{Envelope, MailboxStore, MemoryMailbox, Outgoing, RedisMailbox};
use crate::relay::{Relay, RelaySettings};

/// Message service: mailbox API plus the relay sharing it.
#[derive(Debug)]
pub struct MessageService {
    verifier: Arc<Verifier>,
    mailbox: Arc<dyn MailboxStore>,
    relay: Arc<Relay>,
    store_timeout: Duration,
}

impl MessageService {
    /// Assemble a service; the relay is built over the same mailbox.
    #[must_use]
    pub fn new(verifier: Verifier, mailbox: Arc<dyn MailboxStore>, settings: RelaySettings) -> Self {
        let store_timeout = settings.store_timeout;
        Self {
            verifier: Arc::new(verifier),
            relay: Arc::new(Relay::new(Arc::clone(&mailbox), settings)),
            mailbox,
            store_timeout,
        }
    }

    /// Build from configuration: fetch the issuer key once and connect the
    /// mailbox.
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

        let mailbox: Arc<dyn MailboxStore> = match &config.storage {
            StorageBackend::Memory => Arc::new(MemoryMailbox::new()),
            StorageBackend::Redis { url } => Arc::new(RedisMailbox::new(
                connect_redis(url).await.context("connecting mailbox store")?,
            )),
        };

        info!(audience = %config.audience_id, "Message service initialized");
        Ok(Self::new(verifier, mailbox, config.relay.clone()))
    }

    /// The relay sharing this service's mailbox.
    #[must_use]
    pub fn relay(&self) -> Arc<Relay> {
        Arc::clone(&self.relay)
    }

    /// Verifier used for the API and relay handshakes.
    #[must_use]
    pub fn verifier(&self) -> Arc<Verifier> {
        Arc::clone(&self.verifier)
    }

    /// Queue messages from the authenticated subject.
    ///
    /// The sender on every stored envelope is the token subject. The batch
    /// is stored as a whole or not at all.
    ///
    /// # Errors
    ///
    /// `Unauthorized` for a bad token, `BadRequest` for an empty batch or a
    /// message without recipient, `Internal` on store failure.
    #[instrument(skip_all, fields(count = messages.len()))]
    pub async fn post(&self, access: &str, messages: Vec<Outgoing>) -> Result<usize, ApiError> {
        let token = self.authenticate(access)?;
        let sender = token.subject();

        if messages.is_empty() {
            return Err(ApiError::bad_request("no messages supplied"));
        }
        if messages.iter().any(|m| m.recipient.is_empty()) {
            return Err(ApiError::bad_request("recipient is required"));
        }

        let count = messages.len();
        let envelopes = messages
            .into_iter()
            .map(|message| Envelope::from_sender(sender, message))
            .collect();
        with_deadline(self.store_timeout, self.mailbox.append_many(envelopes)).await?;
        debug!(sender = %sender, count, "Messages stored");
        Ok(count)
    }

    /// Remove and return everything queued for the caller.
    ///
    /// # Errors
    ///
    /// `Unauthorized` for a bad token, `Internal` on store failure.
    pub async fn fetch(&self, access: &str) -> Result<Vec<Envelope>, ApiError> {
        let token = self.authenticate(access)?;
        let messages =
            with_deadline(self.store_timeout, self.mailbox.drain_all(token.subject())).await?;
        debug!(subject = %token.subject(), count = messages.len(), "Mailbox drained");
        Ok(messages)
    }

    fn authenticate(&self, access: &str) -> Result<Token<Accepted>, ApiError> {
        self.verifier.verify_wire(access).map_err(|e| {
            warn!(reason = e.reason(), "Access token rejected");
            ApiError::from(e)
        })
    }
}
