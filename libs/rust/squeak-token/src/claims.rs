//! Token header and claims.
//!
//! Field declaration order is the canonical encoding order; do not reorder.

use serde::{Deserialize, Serialize};

/// Signature scheme marker: RSASSA-PSS with SHA-256.
pub const ALG: &str = "PS256";

/// Token type marker.
pub const TYP: &str = "JWT";

/// Token header.
///
/// Parsed headers may carry any strings; anything other than [`ALG`] and
/// [`TYP`] fails the signature check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Header {
    /// Algorithm identifier
    pub alg: String,
    /// Type identifier
    pub typ: String,
}

impl Header {
    /// Whether this header carries the fixed algorithm and type.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.alg == ALG && self.typ == TYP
    }
}

impl Default for Header {
    fn default() -> Self {
        Self {
            alg: ALG.to_string(),
            typ: TYP.to_string(),
        }
    }
}

/// Token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,
    /// Audience identifier
    pub aud: String,
    /// Issuer identifier
    pub iss: String,
    /// Expiry in Unix seconds, carried as a decimal string on the wire
    #[serde(with = "unix_string")]
    pub exp: i64,
    /// Token id, 128 random bits as hex
    pub jti: String,
}

mod unix_string {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<i64>()
            .map_err(|e| D::Error::custom(format!("exp is not Unix seconds: {e}")))
    }
}
