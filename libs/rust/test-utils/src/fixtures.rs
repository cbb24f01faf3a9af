//! Fixed key material for tests.
//!
//! Generating RSA keys per test is slow; these were generated once with
//! `openssl genpkey -algorithm RSA -pkeyopt rsa_keygen_bits:2048`.

use std::path::PathBuf;

use squeak_token::SigningKey;

/// Primary issuer key, PKCS#8 PEM.
pub const ISSUER_A_PEM: &str = include_str!("../fixtures/issuer_a.pem");

/// Same key as [`ISSUER_A_PEM`], PKCS#1 PEM.
pub const ISSUER_A_PKCS1_PEM: &str = include_str!("../fixtures/issuer_a_pkcs1.pem");

/// An unrelated issuer key, PKCS#8 PEM.
pub const ISSUER_B_PEM: &str = include_str!("../fixtures/issuer_b.pem");

/// Path of the primary key file, for config-driven construction.
#[must_use]
pub fn issuer_a_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/issuer_a.pem")
}

/// Primary issuer signing key.
///
/// # Panics
///
/// Panics if the bundled fixture fails to load.
#[must_use]
#[allow(clippy::expect_used)]
pub fn signing_key() -> SigningKey {
    SigningKey::from_pem(ISSUER_A_PEM).expect("bundled fixture key must load")
}

/// The unrelated issuer signing key.
///
/// # Panics
///
/// Panics if the bundled fixture fails to load.
#[must_use]
#[allow(clippy::expect_used)]
pub fn other_signing_key() -> SigningKey {
    SigningKey::from_pem(ISSUER_B_PEM).expect("bundled fixture key must load")
}
