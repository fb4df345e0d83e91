//! Nonce manager for signed actions with monotonic guarantees.
//!
//! Nonces are wall-clock milliseconds. If the clock does not advance (two
//! publishes in the same millisecond) or regresses, the nonce is bumped to
//! `last + 1` so it stays strictly increasing for the key.

use std::sync::atomic::{AtomicU64, Ordering};

/// Issues strictly increasing nonces.
///
/// Thread-safe via CAS loop.
#[derive(Debug, Default)]
pub struct NonceManager {
    /// Last issued nonce (0 before the first).
    counter: AtomicU64,
}

impl NonceManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `max(last_nonce + 1, now_ms)`.
    ///
    /// Negative timestamps are treated as 0.
    pub fn next(&self, now_ms: i64) -> u64 {
        let target = u64::try_from(now_ms).unwrap_or(0);

        loop {
            let current = self.counter.load(Ordering::Acquire);
            let next_val = current.saturating_add(1).max(target);

            match self.counter.compare_exchange_weak(
                current,
                next_val,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next_val,
                Err(_) => continue,
            }
        }
    }

    /// Last issued nonce, or `None` before the first call to [`Self::next`].
    #[must_use]
    pub fn last(&self) -> Option<u64> {
        match self.counter.load(Ordering::Acquire) {
            0 => None,
            n => Some(n),
        }
    }
}
