//! Injectable wall clock.
//!
//! Every time check in the kernel (expiry, staleness, rate windows, ledger
//! stamps) goes through [`Clock`] so tests can advance time without
//! sleeping. Production code uses [`SystemClock`].

use chrono::{DateTime, Utc};

/// Source of the current UTC instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(any(test, feature = "test-helpers"))]
impl ManualClock {
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().expect("clock lock poisoned") = now;
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now += delta;
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock poisoned")
    }
}
