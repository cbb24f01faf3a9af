//! Message service configuration.

use squeak_common::config::{
    env_or, env_required, load_dotenv, parse_env, parse_millis_env, parse_secs_env,
    require_nonzero,
};
use squeak_common::{ConfigError, StorageBackend, TracingConfig};
use std::net::SocketAddr;
use std::time::Duration;

use crate::relay::RelaySettings;
use crate::relay::server::ServerSettings;

/// Message service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Audience identifier this service accepts tokens for
    pub audience_id: String,
    /// Issuer endpoint serving the DER public key
    pub issuer_public_key_url: String,
    /// Relay listen address
    pub listen_addr: SocketAddr,
    /// Clock skew tolerated on access-token expiry
    pub clock_leeway: Duration,
    /// Relay queueing and timeouts
    pub relay: RelaySettings,
    /// Accept loop timeouts
    pub server: ServerSettings,
    /// Mailbox backend
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
            audience_id: env_or(lookup, "AUDIENCE_ID", "MESSAGE"),
            issuer_public_key_url: env_required(lookup, "ISSUER_PUBLIC_KEY_URL")?,
            listen_addr: parse_env(lookup, "LISTEN_ADDR", SocketAddr::from(([127, 0, 0, 1], 8082)))?,
            clock_leeway: parse_secs_env(lookup, "CLOCK_LEEWAY_SECS", 0)?,
            relay: RelaySettings {
                outbound_buffer: parse_env(lookup, "OUTBOUND_BUFFER", 64)?,
                max_frame_bytes: parse_env(lookup, "MAX_FRAME_BYTES", 64 * 1024)?,
                write_timeout: parse_millis_env(lookup, "WRITE_TIMEOUT_MS", 5_000)?,
                store_timeout: parse_millis_env(lookup, "STORE_TIMEOUT_MS", 2_000)?,
            },
            server: ServerSettings {
                handshake_timeout: parse_millis_env(lookup, "HANDSHAKE_TIMEOUT_MS", 10_000)?,
                shutdown_timeout: parse_millis_env(lookup, "SHUTDOWN_TIMEOUT_MS", 5_000)?,
            },
            storage: StorageBackend::from_lookup(lookup)?,
            tracing: TracingConfig::from_lookup("message-service", lookup)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.audience_id.trim().is_empty() {
            return Err(ConfigError::invalid("AUDIENCE_ID", "must not be empty"));
        }
        if self.relay.outbound_buffer == 0 {
            return Err(ConfigError::invalid("OUTBOUND_BUFFER", "must be greater than 0"));
        }
        if self.relay.max_frame_bytes == 0 {
            return Err(ConfigError::invalid("MAX_FRAME_BYTES", "must be greater than 0"));
        }
        require_nonzero("WRITE_TIMEOUT_MS", self.relay.write_timeout)?;
        require_nonzero("STORE_TIMEOUT_MS", self.relay.store_timeout)?;
        require_nonzero("HANDSHAKE_TIMEOUT_MS", self.server.handshake_timeout)?;
        Ok(())
    }
}
