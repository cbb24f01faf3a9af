//! Prometheus metrics for the auth service.

use once_cell::sync::Lazy;
use prometheus::{CounterVec, register_counter_vec};

/// Tokens issued, by `token_type` (`refresh` or `access`).
pub static TOKENS_ISSUED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "auth_tokens_issued_total",
        "Total number of tokens issued",
        &["token_type"]
    )
    .expect("Failed to register tokens_issued metric")
});

/// Refresh tokens refused at exchange or logout, by `reason`.
pub static REFRESH_REJECTED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "auth_refresh_rejected_total",
        "Total number of refresh tokens rejected",
        &["reason"]
    )
    .expect("Failed to register refresh_rejected metric")
});

/// Refresh tokens revoked, by `reason` (`logout` or `expired`).
pub static REFRESH_REVOKED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "auth_refresh_revoked_total",
        "Total number of refresh tokens revoked",
        &["reason"]
    )
    .expect("Failed to register refresh_revoked metric")
});

/// Record an issued token.
pub fn record_issued(token_type: &str) {
    TOKENS_ISSUED.with_label_values(&[token_type]).inc();
}

/// Record a refused refresh token.
pub fn record_rejected(reason: &str) {
    REFRESH_REJECTED.with_label_values(&[reason]).inc();
}

/// Record a revocation.
pub fn record_revoked(reason: &str) {
    REFRESH_REVOKED.with_label_values(&[reason]).inc();
}
