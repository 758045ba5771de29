//! Exponential backoff for transient upload failures.

use std::time::Duration;

/// Exponential backoff calculator.
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    attempt: u32,
}

impl Backoff {
    /// Create a new backoff starting at `base_ms` with a cap of `max_ms`.
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms,
            attempt: 0,
        }
    }

    /// Get the next delay duration and increment the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let exp = self.base_ms.saturating_mul(1u64.wrapping_shl(self.attempt));
        let capped = exp.min(self.max_ms);
        self.attempt = self.attempt.saturating_add(1);
        Duration::from_millis(capped)
    }

    /// Reset the backoff (e.g. after a successful write).
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
