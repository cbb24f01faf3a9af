//! Auth service library.
//!
//! Mints refresh and access tokens, tracks the live refresh token per
//! subject, and exports the issuer public key for resource services.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod credentials;
pub mod metrics;
pub mod service;

pub use config::{AuthSettings, Config};
pub use credentials::{CredentialStore, MemoryCredentialStore, RedisCredentialStore};
pub use service::AuthService;
