//! Message service library.
//!
//! Routes opaque ciphertext between subjects: live over relay connections
//! when the recipient is online, through a per-recipient mailbox otherwise.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod mailbox;
pub mod metrics;
pub mod relay;
pub mod service;

pub use config::Config;
pub use mailbox::{Envelope, MailboxStore, MemoryMailbox, Outgoing, RedisMailbox};
pub use relay::server::{ServerSettings, serve};
pub use relay::{Disconnect, Relay, RelaySettings, RouteOutcome};
pub use service::MessageService;
