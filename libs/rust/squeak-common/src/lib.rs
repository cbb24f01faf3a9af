//! Shared library for cross-cutting concerns in squeak services.
//!
//! This crate provides:
//! - Error types for storage backends and the caller-facing boundary
//! - Environment configuration helpers
//! - Storage deadlines and redis connection setup
//! - Structured logging initialization

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod storage;
pub mod tracing_config;

pub use config::{ConfigError, StorageBackend};
pub use error::{ApiError, ErrorCode, ErrorResponse, StoreError};
pub use storage::{connect_redis, with_deadline};
pub use tracing_config::{TracingConfig, init_tracing};
