//! Test doubles.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use squeak_token::Clock;

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Start at `now` Unix seconds.
    #[must_use]
    pub const fn at(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    /// Start at the current wall-clock time.
    #[must_use]
    pub fn starting_now() -> Self {
        Self::at(chrono::Utc::now().timestamp())
    }

    /// Move forward by `by`, rounded down to whole seconds.
    pub fn advance(&self, by: Duration) {
        let secs = i64::try_from(by.as_secs()).unwrap_or(i64::MAX);
        self.now.fetch_add(secs, Ordering::SeqCst);
    }

    /// Jump to `now` Unix seconds.
    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_now()
    }
}

impl Clock for ManualClock {
    fn now_unix(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::at(100);
        assert_eq!(clock.now_unix(), 100);
        clock.advance(Duration::from_millis(6_900));
        assert_eq!(clock.now_unix(), 106);
        clock.set(5);
        assert_eq!(clock.now_unix(), 5);
    }
}
