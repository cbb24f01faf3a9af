//! Property-based tests for minting, wire encoding and verification.
//!
//! Property 1: freshly minted tokens are accepted by their audience
//! Property 2: tokens expire exactly at `ttl`
//! Property 3: another issuer's key never verifies a token
//! Property 4: a different audience never accepts a token
//! Property 5: wire round-trip preserves every part
//! Property 6: malformed wire strings always fail to parse

use std::sync::Arc;

use proptest::prelude::*;
use squeak_token::{Issuer, Token, TokenError, Verifier, codec};
use test_utils::{
    ManualClock, audience_strategy, malformed_wire_strategy, other_signing_key, signing_key,
    subject_strategy, ttl_strategy,
};

const START: i64 = 1_700_000_000;

fn setup() -> (Issuer, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::at(START));
    (Issuer::with_clock("AUTH", signing_key(), clock.clone()), clock)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_fresh_token_accepted(
        subject in subject_strategy(),
        audience in audience_strategy(),
        ttl in ttl_strategy(),
    ) {
        let (issuer, clock) = setup();
        let verifier = Verifier::new(audience.clone(), issuer.public_key()).with_clock(clock);
        let token = issuer.mint(&subject, &audience, ttl).unwrap();

        let accepted = verifier.verify(token).unwrap();
        prop_assert_eq!(accepted.subject(), subject.as_str());
        prop_assert_eq!(accepted.issuer(), "AUTH");
    }

    #[test]
    fn prop_token_expires_after_ttl(
        subject in subject_strategy(),
        audience in audience_strategy(),
        ttl in ttl_strategy(),
    ) {
        let (issuer, clock) = setup();
        let verifier = Verifier::new(audience.clone(), issuer.public_key()).with_clock(clock.clone());
        let token = issuer.mint(&subject, &audience, ttl).unwrap();

        clock.set(START + i64::try_from(ttl.as_secs()).unwrap() - 1);
        prop_assert!(verifier.accept(&token));

        clock.advance(std::time::Duration::from_secs(1));
        prop_assert!(!verifier.accept(&token));
        prop_assert_eq!(verifier.verify(token).unwrap_err(), TokenError::Expired);
    }

    #[test]
    fn prop_other_issuer_key_rejects(
        subject in subject_strategy(),
        audience in audience_strategy(),
    ) {
        let (issuer, clock) = setup();
        let verifier = Verifier::new(audience.clone(), other_signing_key().verifying_key())
            .with_clock(clock);
        let token = issuer.mint(&subject, &audience, std::time::Duration::from_secs(60)).unwrap();

        prop_assert_eq!(verifier.verify(token).unwrap_err(), TokenError::SignatureInvalid);
    }

    #[test]
    fn prop_other_audience_rejects(
        subject in subject_strategy(),
        audience in audience_strategy(),
        other in audience_strategy(),
    ) {
        prop_assume!(audience != other);
        let (issuer, clock) = setup();
        let verifier = Verifier::new(other, issuer.public_key()).with_clock(clock);
        let token = issuer.mint(&subject, &audience, std::time::Duration::from_secs(60)).unwrap();

        prop_assert_eq!(verifier.verify(token).unwrap_err(), TokenError::AudienceMismatch);
    }

    #[test]
    fn prop_wire_round_trip(
        subject in subject_strategy(),
        audience in audience_strategy(),
        ttl in ttl_strategy(),
    ) {
        let (issuer, _) = setup();
        let token = issuer.mint(&subject, &audience, ttl).unwrap();
        let wire = issuer.stringify(&token).unwrap();

        let (header, claims, signature) = codec::parse_wire(&wire).unwrap();
        prop_assert_eq!(&header, token.header());
        prop_assert_eq!(&claims, token.peek_claims());
        prop_assert_eq!(signature.as_slice(), token.signature());
        prop_assert_eq!(codec::to_wire(&header, &claims, &signature).unwrap(), wire);
    }

    #[test]
    fn prop_malformed_wire_fails_to_parse(wire in malformed_wire_strategy()) {
        prop_assert!(Token::parse(&wire).is_err());
    }
}

#[test]
fn test_altered_body_rejected() {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    let (issuer, clock) = setup();
    let verifier = Verifier::new("X", issuer.public_key()).with_clock(clock);
    let wire = issuer
        .stringify(&issuer.mint("u1", "X", std::time::Duration::from_secs(60)).unwrap())
        .unwrap();
    let parts: Vec<&str> = wire.split('.').collect();

    let body = URL_SAFE_NO_PAD.decode(parts[1]).unwrap();
    let mut extended: serde_json::Value = serde_json::from_slice(&body).unwrap();
    extended["admin"] = serde_json::Value::Bool(true);
    let forged = format!(
        "{}.{}.{}",
        parts[0],
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&extended).unwrap()),
        parts[2]
    );

    assert!(matches!(
        verifier.verify_wire(&forged),
        Err(TokenError::Parse(_))
    ));

    let reordered = format!(
        r#"{{"aud":"X","sub":"mallory","iss":"AUTH","exp":"{}","jti":"00"}}"#,
        START + 60
    );
    let forged = format!(
        "{}.{}.{}",
        parts[0],
        URL_SAFE_NO_PAD.encode(reordered),
        parts[2]
    );
    assert_eq!(
        verifier.verify_wire(&forged).unwrap_err(),
        TokenError::SignatureInvalid
    );
}
