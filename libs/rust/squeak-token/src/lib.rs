//! Signed bearer tokens for squeak services.
//!
//! An [`Issuer`] holds the RSA private key and mints tokens; each resource
//! service holds a [`Verifier`] built from the issuer's public key and its
//! own audience identifier, and checks tokens offline.
//!
//! Tokens are RSASSA-PSS/SHA-256 signed and travel as three base64url
//! segments joined by `.`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod claims;
pub mod clock;
pub mod codec;
pub mod error;
pub mod issuer;
pub mod keys;
pub mod token;
pub mod verifier;

pub use claims::{ALG, Claims, Header, TYP};
pub use clock::{Clock, SystemClock};
pub use error::{KeyError, ParseError, Segment, TokenError};
pub use issuer::Issuer;
pub use keys::{SigningKey, VerifyingKey, fetch_public_key};
pub use token::{Accepted, SignatureChecked, Token, TokenState, Unchecked};
pub use verifier::Verifier;
