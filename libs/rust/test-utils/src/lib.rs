//! Shared test utilities for squeak Rust crates.
//!
//! This crate provides:
//! - Fixed RSA-2048 issuer keys
//! - A manually driven clock
//! - Proptest generators for identities, tokens and payloads

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use fixtures::*;
pub use generators::*;
pub use mocks::ManualClock;
