//! Environment configuration helpers.
//!
//! Services read their settings through a lookup function so that tests can
//! supply a map instead of mutating the process environment.

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Parser message
        reason: String,
    },

    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// A value parsed but is out of range
    #[error("Invalid value for {name}: {reason}")]
    Invalid {
        /// Variable name
        name: String,
        /// Why the value was rejected
        reason: String,
    },
}

impl ConfigError {
    /// Create an invalid-value error.
    #[must_use]
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Load a `.env` file into the process environment if one exists.
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Read a string variable with a default value.
pub fn env_or<F>(lookup: &F, name: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).unwrap_or_else(|| default.to_string())
}

/// Read a required string variable.
///
/// # Errors
///
/// Returns [`ConfigError::MissingRequired`] if the variable is unset or blank.
pub fn env_required<F>(lookup: &F, name: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingRequired(name.to_string())),
    }
}

/// Parse a variable with a default value.
///
/// # Errors
///
/// Returns [`ConfigError::ParseError`] if the variable is set but unparsable.
pub fn parse_env<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(val) => val.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Parse a duration given in whole seconds.
///
/// # Errors
///
/// Returns [`ConfigError::ParseError`] if the variable is set but unparsable.
pub fn parse_secs_env<F>(lookup: &F, name: &str, default_secs: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    parse_env(lookup, name, default_secs).map(Duration::from_secs)
}

/// Parse a duration given in milliseconds.
///
/// # Errors
///
/// Returns [`ConfigError::ParseError`] if the variable is set but unparsable.
pub fn parse_millis_env<F>(lookup: &F, name: &str, default_ms: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    parse_env(lookup, name, default_ms).map(Duration::from_millis)
}

/// Which backend holds a service's durable state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// In-process maps; state is lost on restart
    Memory,
    /// Redis server
    Redis {
        /// Connection URL
        url: String,
    },
}

impl StorageBackend {
    /// Read `STORAGE_BACKEND` and, for redis, `REDIS_URL`.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown backends or a missing redis URL.
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        match env_or(lookup, "STORAGE_BACKEND", "memory")
            .to_lowercase()
            .as_str()
        {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis {
                url: env_required(lookup, "REDIS_URL")?,
            }),
            other => Err(ConfigError::invalid(
                "STORAGE_BACKEND",
                format!("unknown backend {other}"),
            )),
        }
    }
}

/// Require a duration to be non-zero.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] for a zero duration.
pub fn require_nonzero(name: &str, value: Duration) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::invalid(name, "must be greater than 0"));
    }
    Ok(())
}
