//! Time source for expiry decisions.

use std::fmt::Debug;

/// Source of the current time in Unix seconds.
pub trait Clock: Send + Sync + Debug {
    /// Current time in whole seconds since the Unix epoch.
    fn now_unix(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}
