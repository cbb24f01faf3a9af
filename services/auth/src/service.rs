//! Refresh-token lifecycle.
//!
//! The login flow (password check) happens elsewhere and then calls
//! [`AuthService::issue_refresh_token`]. Clients trade the refresh token for
//! short-lived access tokens scoped to one audience, and log out by revoking
//! it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use squeak_common::{ApiError, StorageBackend, StoreError, connect_redis, with_deadline};
use squeak_token::{
    Clock, Issuer, SignatureChecked, SigningKey, SystemClock, Token, TokenError, Verifier,
    VerifyingKey,
};
use tracing::{info, instrument, warn};

use crate::config::{AuthSettings, Config};
use crate::credentials::{CredentialStore, MemoryCredentialStore, RedisCredentialStore};
use crate::metrics;

/// Issuer plus refresh-token revocation state.
#[derive(Debug)]
pub struct AuthService {
    issuer: Issuer,
    verifier: Verifier,
    store: Arc<dyn CredentialStore>,
    settings: AuthSettings,
}

impl AuthService {
    /// Assemble a service from its parts.
    ///
    /// Refresh tokens are checked against this issuer's own key and
    /// identifier, on the same clock that mints them.
    #[must_use]
    pub fn new(
        key: SigningKey,
        store: Arc<dyn CredentialStore>,
        settings: AuthSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let verifier = Verifier::new(settings.issuer_id.clone(), key.verifying_key())
            .with_clock(clock.clone())
            .with_leeway(settings.clock_leeway);
        let issuer = Issuer::with_clock(settings.issuer_id.clone(), key, clock);
        Self {
            issuer,
            verifier,
            store,
            settings,
        }
    }

    /// Build from configuration: load the signing key and connect the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be loaded or redis is unreachable.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let key = SigningKey::load(&config.signing_key_path).with_context(|| {
            format!(
                "loading signing key from {}",
                config.signing_key_path.display()
            )
        })?;

        let store: Arc<dyn CredentialStore> = match &config.storage {
            StorageBackend::Memory => Arc::new(MemoryCredentialStore::new()),
            StorageBackend::Redis { url } => {
                let conn = connect_redis(url)
                    .await
                    .context("connecting credential store")?;
                Arc::new(RedisCredentialStore::new(conn, config.auth.refresh_token_ttl))
            }
        };

        info!(
            issuer = %config.auth.issuer_id,
            modulus_bits = key.modulus_bits(),
            "Auth service initialized"
        );
        Ok(Self::new(
            key,
            store,
            config.auth.clone(),
            Arc::new(SystemClock),
        ))
    }

    /// Issuer identifier.
    #[must_use]
    pub fn issuer_id(&self) -> &str {
        self.issuer.identifier()
    }

    /// Public key for resource services.
    #[must_use]
    pub fn public_key(&self) -> VerifyingKey {
        self.issuer.public_key()
    }

    /// DER bytes served on the well-known public key endpoint.
    #[must_use]
    pub fn public_key_der(&self) -> Vec<u8> {
        self.issuer.public_key().as_der().to_vec()
    }

    /// Mint and record a refresh token for an authenticated subject.
    ///
    /// Any earlier refresh token for the subject stops working.
    ///
    /// # Errors
    ///
    /// `BadRequest` for an empty subject, `Internal` on signing or store
    /// failure.
    #[instrument(skip(self))]
    pub async fn issue_refresh_token(&self, subject: &str) -> Result<String, ApiError> {
        if subject.is_empty() {
            return Err(ApiError::bad_request("subject is required"));
        }

        let token = self.issuer.mint(
            subject,
            self.issuer.identifier(),
            self.settings.refresh_token_ttl,
        )?;
        let wire = self.issuer.stringify(&token)?;
        self.bounded(self.store.put(subject, &wire)).await?;

        metrics::record_issued("refresh");
        info!(subject = %subject, "Issued refresh token");
        Ok(wire)
    }

    /// Trade a refresh token for an access token addressed to `audience`.
    ///
    /// An expired refresh token is revoked on sight.
    ///
    /// # Errors
    ///
    /// `Unauthorized` for any refresh-token failure, `BadRequest` for an
    /// empty audience, `Internal` on signing or store failure.
    #[instrument(skip(self, refresh))]
    pub async fn exchange(&self, refresh: &str, audience: &str) -> Result<String, ApiError> {
        let checked = self.check_signature(refresh)?;

        if self.verifier.expired(&checked) {
            self.bounded(self.store.revoke(refresh)).await?;
            metrics::record_revoked("expired");
            return Err(self.reject(TokenError::Expired));
        }

        let accepted = checked
            .check_audience(self.issuer.identifier())
            .map_err(|e| self.reject(e))?;
        let subject = accepted.subject();

        if !self.bounded(self.store.is_current(subject, refresh)).await? {
            metrics::record_rejected("revoked");
            warn!(subject = %subject, "Refresh token is not current");
            return Err(ApiError::Unauthorized);
        }

        if audience.is_empty() {
            return Err(ApiError::bad_request("audience is required"));
        }

        let access = self
            .issuer
            .mint(subject, audience, self.settings.access_token_ttl)?;
        let wire = self.issuer.stringify(&access)?;

        metrics::record_issued("access");
        info!(subject = %subject, audience = %audience, "Issued access token");
        Ok(wire)
    }

    /// Revoke a refresh token.
    ///
    /// The token must carry this issuer's signature and audience; it may be
    /// expired. Revoking twice is not an error.
    ///
    /// # Errors
    ///
    /// `Unauthorized` if the token is not ours, `Internal` on store failure.
    #[instrument(skip(self, refresh))]
    pub async fn logout(&self, refresh: &str) -> Result<(), ApiError> {
        let accepted = self
            .check_signature(refresh)?
            .check_audience(self.issuer.identifier())
            .map_err(|e| self.reject(e))?;

        self.bounded(self.store.revoke(refresh)).await?;

        metrics::record_revoked("logout");
        info!(subject = %accepted.subject(), "Refresh token revoked");
        Ok(())
    }

    fn check_signature(&self, refresh: &str) -> Result<Token<SignatureChecked>, ApiError> {
        let token = Token::parse(refresh).map_err(|e| self.reject(e.into()))?;
        self.verifier
            .check_signature(token)
            .map_err(|e| self.reject(e))
    }

    fn reject(&self, err: TokenError) -> ApiError {
        metrics::record_rejected(err.reason());
        warn!(issuer = %self.issuer.identifier(), reason = err.reason(), "Refresh token rejected");
        err.into()
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        Ok(with_deadline(self.settings.store_timeout, op).await?)
    }

    /// Upper bound applied to credential-store calls.
    #[must_use]
    pub const fn store_timeout(&self) -> Duration {
        self.settings.store_timeout
    }
}
