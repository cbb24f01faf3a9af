//! Prekey service library.
//!
//! Owners publish batches of one-time prekeys; any authenticated client may
//! take one to start a session with the owner. Each prekey is handed out at
//! most once.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod service;
pub mod store;

pub use config::Config;
pub use service::PrekeyService;
pub use store::{MemoryPrekeyStore, Prekey, PrekeyStore, RedisPrekeyStore};
