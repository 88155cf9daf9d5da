//! Sliding-window rate limiting for the login endpoint.
//!
//! Keyed by client address, independent of account identity: the per-account
//! lockout catches repeated guesses against one account, this catches many
//! accounts probed from one address.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

pub trait RateLimiter: Send + Sync {
    /// Returns `true` if the key already reached the ceiling within the
    /// trailing window; otherwise records the current attempt and returns
    /// `false`. Check and record are a single decision so two concurrent
    /// requests from the same address cannot both observe "not yet limited".
    fn is_limited(&self, key: &str) -> bool;

    /// Read-only projection of capacity left; records nothing.
    fn remaining(&self, key: &str) -> u32;

    /// How long a limited client should wait. Fixed at the window length.
    fn retry_after(&self) -> Duration;
}

/// In-process sliding window over a lock-protected map of attempt timestamps.
///
/// Expired timestamps are pruned lazily on each access to a key, so memory is
/// bounded by "keys seen within the last window" without a background sweep.
pub struct SlidingWindowLimiter {
    max_attempts: u32,
    window: Duration,
    attempts: Mutex<HashMap<String, Vec<Instant>>>,
}

impl SlidingWindowLimiter {
    #[must_use]
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    fn is_limited_at(&self, key: &str, now: Instant) -> bool {
        let mut attempts = self
            .attempts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let entry = attempts.entry(key.to_string()).or_default();

        entry.retain(|&t| now.duration_since(t) < self.window);

        if entry.len() >= self.max_attempts as usize {
            return true;
        }

        entry.push(now);
        false
    }

    fn remaining_at(&self, key: &str, now: Instant) -> u32 {
        let attempts = self
            .attempts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let in_window = attempts
            .get(key)
            .map(|entry| {
                entry
                    .iter()
                    .filter(|&&t| now.duration_since(t) < self.window)
                    .count()
            })
            .unwrap_or(0);
        self.max_attempts.saturating_sub(in_window as u32)
    }
}

impl Default for SlidingWindowLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW)
    }
}

impl RateLimiter for SlidingWindowLimiter {
    fn is_limited(&self, key: &str) -> bool {
        self.is_limited_at(key, Instant::now())
    }

    fn remaining(&self, key: &str) -> u32 {
        self.remaining_at(key, Instant::now())
    }

    fn retry_after(&self) -> Duration {
        self.window
    }
}

/// Limiter that never limits; used in tests and wiring that opts out.
#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn is_limited(&self, _key: &str) -> bool {
        false
    }

    fn remaining(&self, _key: &str) -> u32 {
        u32::MAX
    }

    fn retry_after(&self) -> Duration {
        Duration::ZERO
    }
}
