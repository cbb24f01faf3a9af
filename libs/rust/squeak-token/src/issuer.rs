//! Token issuer.

use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;
use rand::rngs::OsRng;
use tracing::instrument;

use crate::claims::{Claims, Header};
use crate::clock::{Clock, SystemClock};
use crate::codec;
use crate::error::TokenError;
use crate::keys::{SigningKey, VerifyingKey};
use crate::token::{Token, Unchecked};

/// Mints signed tokens under a fixed identifier.
#[derive(Debug)]
pub struct Issuer {
    id: String,
    key: SigningKey,
    clock: Arc<dyn Clock>,
}

impl Issuer {
    /// Create an issuer on the wall clock.
    #[must_use]
    pub fn new(id: impl Into<String>, key: SigningKey) -> Self {
        Self::with_clock(id, key, Arc::new(SystemClock))
    }

    /// Create an issuer with an explicit clock.
    #[must_use]
    pub fn with_clock(id: impl Into<String>, key: SigningKey, clock: Arc<dyn Clock>) -> Self {
        Self {
            id: id.into(),
            key,
            clock,
        }
    }

    /// Issuer identifier, written into every `iss` claim.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.id
    }

    /// Mint a token for `subject` addressed to `audience`, valid for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Signing`] if the token cannot be signed.
    #[instrument(skip(self), fields(issuer = %self.id))]
    pub fn mint(
        &self,
        subject: &str,
        audience: &str,
        ttl: Duration,
    ) -> Result<Token<Unchecked>, TokenError> {
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: subject.to_string(),
            aud: audience.to_string(),
            iss: self.id.clone(),
            exp: self.clock.now_unix().saturating_add(ttl_secs),
            jti: generate_token_id(),
        };
        let header = Header::default();

        let signed = codec::encode(&header, &claims)?;
        let signature = codec::sign(&signed, &self.key)?;
        Ok(Token::from_parts(header, claims, signature))
    }

    /// Public key for distribution to verifiers.
    #[must_use]
    pub fn public_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    /// Bearer wire string for `token`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Signing`] if serialization fails.
    pub fn stringify<S: crate::token::TokenState>(
        &self,
        token: &Token<S>,
    ) -> Result<String, TokenError> {
        token.to_wire()
    }
}

/// 128 bits from the OS CSPRNG, as 32 lowercase hex digits.
fn generate_token_id() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    format!("{:032x}", u128::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const ISSUER_A: &str = include_str!("../../test-utils/fixtures/issuer_a.pem");

    #[derive(Debug)]
    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn now_unix(&self) -> i64 {
            self.0
        }
    }

    fn issuer() -> Issuer {
        let key = SigningKey::from_pem(ISSUER_A).unwrap();
        Issuer::with_clock("AUTH", key, Arc::new(FixedClock(1_000)))
    }

    #[test]
    fn test_mint_claims() {
        let issuer = issuer();
        let token = issuer.mint("u1", "MESSAGE", Duration::from_secs(5)).unwrap();
        let claims = token.peek_claims();

        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.aud, "MESSAGE");
        assert_eq!(claims.iss, "AUTH");
        assert_eq!(claims.exp, 1_005);
        assert_eq!(claims.jti.len(), 32);
        assert!(claims.jti.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_token_ids_are_unique() {
        let ids: HashSet<String> = (0..256).map(|_| generate_token_id()).collect();
        assert_eq!(ids.len(), 256);
    }

    #[test]
    fn test_minted_token_verifies_with_public_key() {
        let issuer = issuer();
        let token = issuer.mint("u1", "X", Duration::from_secs(60)).unwrap();
        let wire = issuer.stringify(&token).unwrap();
        let parsed = Token::parse(&wire).unwrap();
        assert_eq!(parsed, token);
        assert!(parsed.check_signature(&issuer.public_key()).is_ok());
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let token = issuer().mint("u1", "X", Duration::MAX).unwrap();
        assert_eq!(token.peek_claims().exp, i64::MAX);
    }
}
