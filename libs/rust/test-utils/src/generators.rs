//! Shared proptest generators.

use proptest::prelude::*;
use std::time::Duration;

/// Subject (user) identifiers.
pub fn subject_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,15}"
}

/// Audience identifiers.
pub fn audience_strategy() -> impl Strategy<Value = String> {
    "[A-Z]{2,10}"
}

/// Token lifetimes between one second and thirty days.
pub fn ttl_strategy() -> impl Strategy<Value = Duration> {
    (1u64..=2_592_000).prop_map(Duration::from_secs)
}

/// Opaque ciphertext as clients send it, base64 text.
pub fn payload_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9+/]{0,64}={0,2}"
}

/// Prekey identifiers.
pub fn key_id_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9]{8,16}"
}

/// Strings that can never parse as a bearer token.
pub fn malformed_wire_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        // Wrong segment count
        "[A-Za-z0-9_-]{0,20}",
        "[A-Za-z0-9_-]{1,20}\\.[A-Za-z0-9_-]{1,20}",
        "[A-Za-z0-9_-]{1,10}(\\.[A-Za-z0-9_-]{1,10}){3,5}",
        // Empty segment
        "\\.[A-Za-z0-9_-]{1,20}\\.[A-Za-z0-9_-]{1,20}",
        "[A-Za-z0-9_-]{1,20}\\.\\.[A-Za-z0-9_-]{1,20}",
        "[A-Za-z0-9_-]{1,20}\\.[A-Za-z0-9_-]{1,20}\\.",
        // Characters outside the base64url alphabet
        "[A-Za-z0-9_-]{0,8}[*!@ ][A-Za-z0-9_-]{0,8}\\.[A-Za-z0-9_-]{1,8}\\.[A-Za-z0-9_-]{1,8}",
    ]
}
