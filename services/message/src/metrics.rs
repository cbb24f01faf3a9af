//! Prometheus metrics for the relay.

use once_cell::sync::Lazy;
use prometheus::{CounterVec, IntGauge, register_counter_vec, register_int_gauge};

/// Messages routed, by `outcome` (`live`, `stored` or `dropped`).
pub static MESSAGES_ROUTED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "relay_messages_routed_total",
        "Total number of messages routed by the relay",
        &["outcome"]
    )
    .expect("Failed to register messages_routed metric")
});

/// Connections currently registered.
pub static CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "relay_connections_active",
        "Number of live relay connections"
    )
    .expect("Failed to register connections_active metric")
});
