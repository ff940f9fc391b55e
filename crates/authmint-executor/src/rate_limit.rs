//! Sliding-window rate manager for platform calls.
//!
//! Tracks request instants over the trailing hour. When the budget is
//! exhausted the operation fails fast — the executor surfaces a fatal
//! failure rather than blocking the caller.

use std::collections::VecDeque;

use authmint_types::constants;
use chrono::{DateTime, Duration, Utc};

/// Sliding one-hour window over platform requests.
#[derive(Debug)]
pub struct RateLimitManager {
    requests_per_hour: u32,
    /// Request instants, oldest first.
    requests: VecDeque<DateTime<Utc>>,
}

impl RateLimitManager {
    #[must_use]
    pub fn new(requests_per_hour: u32) -> Self {
        Self {
            requests_per_hour,
            requests: VecDeque::new(),
        }
    }

    /// The configured hourly budget.
    #[must_use]
    pub fn requests_per_hour(&self) -> u32 {
        self.requests_per_hour
    }

    /// Whether another request fits in the window ending at `now`.
    pub fn can_make_request(&mut self, now: DateTime<Utc>) -> bool {
        self.prune(now);
        (self.requests.len() as u64) < u64::from(self.requests_per_hour)
    }

    /// Record a request at `now`.
    pub fn record_request(&mut self, now: DateTime<Utc>) {
        self.requests.push_back(now);
    }

    /// Requests currently inside the window ending at `now`.
    pub fn window_len(&mut self, now: DateTime<Utc>) -> usize {
        self.prune(now);
        self.requests.len()
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::hours(1);
        while self.requests.front().is_some_and(|&t| t <= cutoff) {
            self.requests.pop_front();
        }
    }
}

impl Default for RateLimitManager {
    fn default() -> Self {
        Self::new(constants::DEFAULT_REQUESTS_PER_HOUR)
    }
}
