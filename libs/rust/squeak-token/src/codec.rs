//! Wire codec for bearer tokens.
//!
//! The signing input is the JSON header immediately followed by the JSON
//! claims. The wire form is the three parts, each base64url without padding,
//! joined by `.`.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::de::DeserializeOwned;

use crate::claims::{Claims, Header};
use crate::error::{ParseError, Segment, TokenError};
use crate::keys::{SigningKey, VerifyingKey};

/// Canonical bytes covered by the signature.
///
/// # Errors
///
/// Returns [`TokenError::Signing`] if serialization fails.
pub fn encode(header: &Header, claims: &Claims) -> Result<Vec<u8>, TokenError> {
    let mut bytes = to_json(header)?;
    bytes.extend(to_json(claims)?);
    Ok(bytes)
}

/// Sign canonical bytes with RSASSA-PSS over SHA-256.
///
/// # Errors
///
/// Returns [`TokenError::Signing`] if the crypto backend fails.
pub fn sign(bytes: &[u8], key: &SigningKey) -> Result<Vec<u8>, TokenError> {
    key.sign(bytes)
}

/// Check a signature over canonical bytes.
#[must_use]
pub fn verify(bytes: &[u8], signature: &[u8], key: &VerifyingKey) -> bool {
    key.verify(bytes, signature)
}

/// Render the three parts as a bearer string.
///
/// # Errors
///
/// Returns [`TokenError::Signing`] if serialization fails.
pub fn to_wire(header: &Header, claims: &Claims, signature: &[u8]) -> Result<String, TokenError> {
    Ok(format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(to_json(header)?),
        URL_SAFE_NO_PAD.encode(to_json(claims)?),
        URL_SAFE_NO_PAD.encode(signature)
    ))
}

/// Split a bearer string into its parts.
///
/// # Errors
///
/// Returns [`ParseError`] unless the string has exactly three non-empty
/// base64url segments whose first two decode as header and claims.
pub fn parse_wire(wire: &str) -> Result<(Header, Claims, Vec<u8>), ParseError> {
    let segments: Vec<&str> = wire.split('.').collect();
    let [header, claims, signature] = segments.as_slice() else {
        return Err(ParseError::SegmentCount(segments.len()));
    };

    let header = decode_json(Segment::Header, header)?;
    let claims = decode_json(Segment::Claims, claims)?;
    let signature = decode_segment(Segment::Signature, signature)?;
    Ok((header, claims, signature))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, TokenError> {
    serde_json::to_vec(value).map_err(|e| TokenError::Signing(e.to_string()))
}

fn decode_segment(segment: Segment, text: &str) -> Result<Vec<u8>, ParseError> {
    if text.is_empty() {
        return Err(ParseError::EmptySegment(segment));
    }
    URL_SAFE_NO_PAD
        .decode(text)
        .map_err(|e| ParseError::Base64 {
            segment,
            reason: e.to_string(),
        })
}

fn decode_json<T: DeserializeOwned>(segment: Segment, text: &str) -> Result<T, ParseError> {
    let bytes = decode_segment(segment, text)?;
    serde_json::from_slice(&bytes).map_err(|e| ParseError::Structure {
        segment,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> Claims {
        Claims {
            sub: "alice".to_string(),
            aud: "MESSAGE".to_string(),
            iss: "AUTH".to_string(),
            exp: 42,
            jti: "abcd".to_string(),
        }
    }

    #[test]
    fn test_encode_is_header_then_claims() {
        let bytes = encode(&Header::default(), &claims()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with(r#"{"alg":"PS256","typ":"JWT"}{"sub":"alice""#));
    }

    #[test]
    fn test_wire_round_trip() {
        let wire = to_wire(&Header::default(), &claims(), &[1, 2, 3, 250]).unwrap();
        assert_eq!(wire.split('.').count(), 3);
        assert!(!wire.contains('='));

        let (header, parsed, signature) = parse_wire(&wire).unwrap();
        assert_eq!(header, Header::default());
        assert_eq!(parsed, claims());
        assert_eq!(signature, vec![1, 2, 3, 250]);
    }

    #[test]
    fn test_segment_count() {
        assert_eq!(parse_wire("a.b"), Err(ParseError::SegmentCount(2)));
        assert_eq!(parse_wire("a.b.c.d"), Err(ParseError::SegmentCount(4)));
        assert_eq!(parse_wire(""), Err(ParseError::SegmentCount(1)));
    }

    #[test]
    fn test_empty_and_bad_segments() {
        let wire = to_wire(&Header::default(), &claims(), b"sig").unwrap();
        let parts: Vec<&str> = wire.split('.').collect();

        let empty_sig = format!("{}.{}.", parts[0], parts[1]);
        assert_eq!(
            parse_wire(&empty_sig),
            Err(ParseError::EmptySegment(Segment::Signature))
        );

        let bad_b64 = format!("{}.{}.*!", parts[0], parts[1]);
        assert!(matches!(
            parse_wire(&bad_b64),
            Err(ParseError::Base64 { segment: Segment::Signature, .. })
        ));

        let padded = format!("{}.{}.{}=", parts[0], parts[1], parts[2]);
        assert!(parse_wire(&padded).is_err());

        let not_claims = format!("{}.{}.{}", parts[0], URL_SAFE_NO_PAD.encode("[]"), parts[2]);
        assert!(matches!(
            parse_wire(&not_claims),
            Err(ParseError::Structure { segment: Segment::Claims, .. })
        ));
    }
}
