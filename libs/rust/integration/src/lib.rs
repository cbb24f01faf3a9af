//! Cross-service integration tests for squeak.
//!
//! The tests live under `tests/`; this crate has no library surface.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
