//! Capped exponential backoff for device reconnects.

use std::time::Duration;

/// Reconnect delay that doubles after each failure up to a ceiling.
///
/// `current()` is the wait before the next attempt. A failed attempt calls
/// `advance()`; a successful connect calls `reset()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
    failures: u32,
}

impl Backoff {
    /// Create a backoff starting at `base` and never exceeding `max`
    pub fn new(base: Duration, max: Duration) -> Self {
        let max = max.max(base);
        Self {
            base,
            max,
            current: base,
            failures: 0,
        }
    }

    /// Delay before the next attempt
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Consecutive failures since the last reset
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Record a failed attempt and return the new delay
    pub fn advance(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.current = self.current.saturating_mul(2).min(self.max);
        self.current
    }

    /// Record a successful connect
    pub fn reset(&mut self) {
        self.current = self.base;
        self.failures = 0;
    }
}
