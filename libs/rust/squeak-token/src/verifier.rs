//! Audience-side token verification.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::error::TokenError;
use crate::keys::VerifyingKey;
use crate::token::{Accepted, SignatureChecked, Token, TokenState, Unchecked};

/// Accepts tokens signed by one trusted issuer and addressed to this
/// verifier's identifier.
///
/// Verification is pure computation: no storage, no network.
#[derive(Debug, Clone)]
pub struct Verifier {
    identifier: String,
    key: VerifyingKey,
    leeway_secs: i64,
    clock: Arc<dyn Clock>,
}

impl Verifier {
    /// Create a verifier on the wall clock with zero leeway.
    #[must_use]
    pub fn new(identifier: impl Into<String>, key: VerifyingKey) -> Self {
        Self {
            identifier: identifier.into(),
            key,
            leeway_secs: 0,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Tolerate clock skew: tokens stay valid until `exp + leeway`.
    #[must_use]
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway_secs = i64::try_from(leeway.as_secs()).unwrap_or(i64::MAX);
        self
    }

    /// This verifier's audience identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Trusted issuer public key.
    #[must_use]
    pub const fn public_key(&self) -> &VerifyingKey {
        &self.key
    }

    /// Run signature, expiry and audience checks in order.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    pub fn verify(&self, token: Token<Unchecked>) -> Result<Token<Accepted>, TokenError> {
        self.check_signature(token)?
            .check_expiry(self.clock.now_unix(), self.leeway_secs)?
            .check_audience(&self.identifier)
    }

    /// Parse then [`Verifier::verify`] a bearer string.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Parse`] for malformed input, otherwise as
    /// [`Verifier::verify`].
    pub fn verify_wire(&self, wire: &str) -> Result<Token<Accepted>, TokenError> {
        self.verify(Token::parse(wire)?)
    }

    /// Signature check only, for callers that handle expiry themselves.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::SignatureInvalid`].
    pub fn check_signature(
        &self,
        token: Token<Unchecked>,
    ) -> Result<Token<SignatureChecked>, TokenError> {
        token.check_signature(&self.key)
    }

    /// Whether `token` passes every check.
    #[must_use]
    pub fn accept(&self, token: &Token<Unchecked>) -> bool {
        self.verify(token.clone()).is_ok()
    }

    /// Whether `token` is at or past its expiry, allowing for leeway.
    #[must_use]
    pub fn expired<S: TokenState>(&self, token: &Token<S>) -> bool {
        token.is_expired_at(self.clock.now_unix(), self.leeway_secs)
    }
}
