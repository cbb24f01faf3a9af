//! Type-state bearer token.
//!
//! A [`Token`] moves through `Unchecked -> SignatureChecked -> Accepted`.
//! Claims can be peeked in any state, but the trusted accessors exist only
//! on `Token<Accepted>`, so code holding an identity has necessarily run
//! every check.

use std::marker::PhantomData;

use crate::claims::{Claims, Header};
use crate::codec;
use crate::error::{ParseError, TokenError};
use crate::keys::VerifyingKey;

mod private {
    pub trait Sealed {}
}

/// Marker trait for token validation states.
pub trait TokenState: private::Sealed {
    /// Human-readable state name for debugging
    fn state_name() -> &'static str;
}

/// Parsed or freshly minted; nothing verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unchecked;
impl private::Sealed for Unchecked {}
impl TokenState for Unchecked {
    fn state_name() -> &'static str {
        "Unchecked"
    }
}

/// Header and signature verified against a public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureChecked;
impl private::Sealed for SignatureChecked {}
impl TokenState for SignatureChecked {
    fn state_name() -> &'static str {
        "SignatureChecked"
    }
}

/// Signature, expiry and audience verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted;
impl private::Sealed for Accepted {}
impl TokenState for Accepted {
    fn state_name() -> &'static str {
        "Accepted"
    }
}

/// Immutable token value in a given validation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<State: TokenState> {
    header: Header,
    claims: Claims,
    signature: Vec<u8>,
    _state: PhantomData<State>,
}

impl<S: TokenState> Token<S> {
    fn transition<T: TokenState>(self) -> Token<T> {
        Token {
            header: self.header,
            claims: self.claims,
            signature: self.signature,
            _state: PhantomData,
        }
    }

    /// Claims as carried, without any trust implied.
    #[must_use]
    pub const fn peek_claims(&self) -> &Claims {
        &self.claims
    }

    /// Header as carried.
    #[must_use]
    pub const fn header(&self) -> &Header {
        &self.header
    }

    /// Signature bytes.
    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Bearer wire string.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Signing`] if serialization fails.
    pub fn to_wire(&self) -> Result<String, TokenError> {
        codec::to_wire(&self.header, &self.claims, &self.signature)
    }

    /// Whether `now` is at or past expiry plus `leeway_secs`.
    #[must_use]
    pub const fn is_expired_at(&self, now: i64, leeway_secs: i64) -> bool {
        now >= self.claims.exp.saturating_add(leeway_secs)
    }

    /// Current state name.
    #[must_use]
    pub fn state_name(&self) -> &'static str {
        S::state_name()
    }
}

impl Token<Unchecked> {
    pub(crate) const fn from_parts(header: Header, claims: Claims, signature: Vec<u8>) -> Self {
        Self {
            header,
            claims,
            signature,
            _state: PhantomData,
        }
    }

    /// Parse a bearer string.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] for anything that is not three well-formed
    /// segments.
    pub fn parse(wire: &str) -> Result<Self, ParseError> {
        let (header, claims, signature) = codec::parse_wire(wire)?;
        Ok(Self::from_parts(header, claims, signature))
    }

    /// Verify header and signature against `key`.
    ///
    /// The signed bytes are re-encoded from the parsed parts, so the
    /// signature covers exactly the decoded values.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::SignatureInvalid`] on any mismatch.
    pub fn check_signature(self, key: &VerifyingKey) -> Result<Token<SignatureChecked>, TokenError> {
        if !self.header.is_supported() {
            return Err(TokenError::SignatureInvalid);
        }
        let signed = codec::encode(&self.header, &self.claims)
            .map_err(|_| TokenError::SignatureInvalid)?;
        if !codec::verify(&signed, &self.signature, key) {
            return Err(TokenError::SignatureInvalid);
        }
        Ok(self.transition())
    }
}

impl Token<SignatureChecked> {
    /// Reject the token if it is expired at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Expired`].
    pub fn check_expiry(self, now: i64, leeway_secs: i64) -> Result<Self, TokenError> {
        if self.is_expired_at(now, leeway_secs) {
            return Err(TokenError::Expired);
        }
        Ok(self)
    }

    /// Accept the token if it is addressed to `audience`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::AudienceMismatch`].
    pub fn check_audience(self, audience: &str) -> Result<Token<Accepted>, TokenError> {
        if self.claims.aud != audience {
            return Err(TokenError::AudienceMismatch);
        }
        Ok(self.transition())
    }
}

impl Token<Accepted> {
    /// Verified claims.
    #[must_use]
    pub const fn claims(&self) -> &Claims {
        &self.claims
    }

    /// Authenticated subject.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.claims.sub
    }

    /// Audience the token was accepted for.
    #[must_use]
    pub fn audience(&self) -> &str {
        &self.claims.aud
    }

    /// Issuer identifier.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.claims.iss
    }

    /// Expiry in Unix seconds.
    #[must_use]
    pub const fn expires_at(&self) -> i64 {
        self.claims.exp
    }

    /// Token id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.claims.jti
    }
}
