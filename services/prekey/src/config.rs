//! Prekey service configuration.

use squeak_common::config::{
    env_or, env_required, load_dotenv, parse_millis_env, parse_secs_env, require_nonzero,
};
use squeak_common::{ConfigError, StorageBackend, TracingConfig};
use std::time::Duration;

/// Prekey service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Audience identifier this service accepts tokens for
    pub audience_id: String,
    /// Issuer endpoint serving the DER public key
    pub issuer_public_key_url: String,
    /// Clock skew tolerated on access-token expiry
    pub clock_leeway: Duration,
    /// Upper bound on each store call
    pub store_timeout: Duration,
    /// Prekey store backend
    pub storage: StorageBackend,
    /// Logging
    pub tracing: TracingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();
        Self::from_lookup(&|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            audience_id: env_or(lookup, "AUDIENCE_ID", "PREKEY"),
            issuer_public_key_url: env_required(lookup, "ISSUER_PUBLIC_KEY_URL")?,
            clock_leeway: parse_secs_env(lookup, "CLOCK_LEEWAY_SECS", 0)?,
            store_timeout: parse_millis_env(lookup, "STORE_TIMEOUT_MS", 2_000)?,
            storage: StorageBackend::from_lookup(lookup)?,
            tracing: TracingConfig::from_lookup("prekey-service", lookup)?,
        };
        if config.audience_id.trim().is_empty() {
            return Err(ConfigError::invalid("AUDIENCE_ID", "must not be empty"));
        }
        require_nonzero("STORE_TIMEOUT_MS", config.store_timeout)?;
        Ok(config)
    }
}
