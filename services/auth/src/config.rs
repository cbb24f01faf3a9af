//! Auth service configuration.
//!
//! Loaded from environment variables and validated at startup.

use squeak_common::config::{
    env_or, env_required, load_dotenv, parse_millis_env, parse_secs_env, require_nonzero,
};
use squeak_common::{ConfigError, StorageBackend, TracingConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Token lifetimes and identity of the issuer.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Issuer identifier; also the audience of refresh tokens
    pub issuer_id: String,
    /// Refresh token lifetime
    pub refresh_token_ttl: Duration,
    /// Access token lifetime
    pub access_token_ttl: Duration,
    /// Clock skew tolerated when checking refresh-token expiry
    pub clock_leeway: Duration,
    /// Upper bound on each credential-store call
    pub store_timeout: Duration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            issuer_id: "AUTH".to_string(),
            refresh_token_ttl: Duration::from_secs(604_800),
            access_token_ttl: Duration::from_secs(5),
            clock_leeway: Duration::ZERO,
            store_timeout: Duration::from_millis(2_000),
        }
    }
}

/// Auth service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Issuer settings
    pub auth: AuthSettings,
    /// PEM file holding the RSA signing key
    pub signing_key_path: PathBuf,
    /// Credential store backend
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
            auth: AuthSettings {
                issuer_id: env_or(lookup, "ISSUER_ID", "AUTH"),
                refresh_token_ttl: parse_secs_env(lookup, "REFRESH_TOKEN_TTL_SECS", 604_800)?,
                access_token_ttl: parse_secs_env(lookup, "ACCESS_TOKEN_TTL_SECS", 5)?,
                clock_leeway: parse_secs_env(lookup, "CLOCK_LEEWAY_SECS", 0)?,
                store_timeout: parse_millis_env(lookup, "STORE_TIMEOUT_MS", 2_000)?,
            },
            signing_key_path: PathBuf::from(env_required(lookup, "SIGNING_KEY_PATH")?),
            storage: StorageBackend::from_lookup(lookup)?,
            tracing: TracingConfig::from_lookup("auth-service", lookup)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.issuer_id.trim().is_empty() {
            return Err(ConfigError::invalid("ISSUER_ID", "must not be empty"));
        }
        require_nonzero("REFRESH_TOKEN_TTL_SECS", self.auth.refresh_token_ttl)?;
        require_nonzero("ACCESS_TOKEN_TTL_SECS", self.auth.access_token_ttl)?;
        require_nonzero("STORE_TIMEOUT_MS", self.auth.store_timeout)?;
        if self.auth.access_token_ttl > self.auth.refresh_token_ttl {
            return Err(ConfigError::invalid(
                "ACCESS_TOKEN_TTL_SECS",
                "must not exceed the refresh token lifetime",
            ));
        }
        Ok(())
    }
}
