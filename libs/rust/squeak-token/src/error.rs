//! Token, parse and key errors.

use squeak_common::ApiError;
use std::fmt;
use thiserror::Error;

/// Which part of a wire token failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// First segment
    Header,
    /// Second segment
    Claims,
    /// Third segment
    Signature,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Header => "header",
            Self::Claims => "claims",
            Self::Signature => "signature",
        })
    }
}

/// A wire token that could not be taken apart.
///
/// Parsing never implies validity; these errors only describe shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The string did not split into exactly three segments.
    #[error("expected 3 segments, found {0}")]
    SegmentCount(usize),

    /// A segment was empty.
    #[error("{0} segment is empty")]
    EmptySegment(Segment),

    /// A segment was not unpadded base64url.
    #[error("{segment} segment is not base64url: {reason}")]
    Base64 {
        /// Offending segment
        segment: Segment,
        /// Decoder message
        reason: String,
    },

    /// A segment decoded but did not have the expected structure.
    #[error("{segment} segment has invalid structure: {reason}")]
    Structure {
        /// Offending segment
        segment: Segment,
        /// Decoder message
        reason: String,
    },
}

/// Token validation or minting failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// The presented string is not a token.
    #[error("malformed token: {0}")]
    Parse(#[from] ParseError),

    /// The signature does not verify, or the header is not ours.
    #[error("signature invalid")]
    SignatureInvalid,

    /// The token is past its expiry.
    #[error("token expired")]
    Expired,

    /// The token is addressed to a different audience.
    #[error("audience mismatch")]
    AudienceMismatch,

    /// The issuer could not produce a token.
    #[error("signing failed: {0}")]
    Signing(String),
}

impl TokenError {
    /// Short label for metrics and logs.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Parse(_) => "malformed",
            Self::SignatureInvalid => "signature",
            Self::Expired => "expired",
            Self::AudienceMismatch => "audience",
            Self::Signing(_) => "signing",
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(reason) => {
                tracing::error!(reason = %reason, "Token signing failed");
                Self::Internal(reason)
            }
            other => {
                tracing::debug!(reason = other.reason(), "Token rejected");
                Self::Unauthorized
            }
        }
    }
}

/// Key loading, import or distribution failure.
#[derive(Error, Debug)]
pub enum KeyError {
    /// The key file could not be read.
    #[error("failed to read key file {path}: {reason}")]
    Io {
        /// File path
        path: String,
        /// OS error
        reason: String,
    },

    /// The PEM envelope is malformed.
    #[error("invalid PEM: {0}")]
    Pem(String),

    /// The PEM label names a key format we do not load.
    #[error("unsupported PEM label {0}")]
    UnsupportedFormat(String),

    /// The key bytes were rejected by the crypto backend.
    #[error("key rejected: {0}")]
    Rejected(String),

    /// Public key bytes are not a DER `RSAPublicKey`.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// The issuer's public key could not be fetched.
    #[error("failed to fetch public key: {0}")]
    Fetch(String),
}
