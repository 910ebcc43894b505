//! Wall-clock abstraction (seconds since the Unix epoch).

use chrono::Utc;

/// Source of "now" for records submitted without a timestamp.
pub trait Clock: Send + Sync {
    /// Current time in whole seconds since the Unix epoch.
    fn now_unix(&self) -> u64;
}

/// Reads the system clock through `chrono`.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> u64 {
        // Pre-epoch system clocks clamp to 0.
        u64::try_from(Utc::now().timestamp()).unwrap_or(0)
    }
}

/// Always returns the same instant. Intended for tests and replay tooling.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_unix(&self) -> u64 {
        self.0
    }
}
