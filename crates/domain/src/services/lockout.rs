//! Failed sign-in lockout policy.

use chrono::{DateTime, Duration, Utc};

/// Locks an account once it accumulates `threshold` failures inside `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub threshold: u32,
    pub window: Duration,
    pub duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            threshold: 10,
            window: Duration::minutes(15),
            duration: Duration::hours(1),
        }
    }
}

impl LockoutPolicy {
    /// Decides whether the failure being recorded now triggers a lock.
    ///
    /// `prior_failures` is the count inside the window before this failure.
    pub fn should_lock(&self, prior_failures: i64) -> bool {
        prior_failures + 1 >= i64::from(self.threshold)
    }

    /// Start of the counting window ending at `now`.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window
    }

    pub fn locked_until(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.duration
    }
}

/// Whole minutes left on a lock, rounded up.
pub fn minutes_remaining(locked_until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let secs = (locked_until - now).num_seconds().max(0);
    (secs + 59) / 60
}

/// Seconds left on a lock, never negative.
pub fn seconds_remaining(locked_until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (locked_until - now).num_seconds().max(0)
}
