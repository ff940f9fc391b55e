//! Recovery strategy for transient platform failures.
//!
//! Retries apply only to the four transient error codes; everything else
//! fails immediately. Backoff is exponential (`base ^ attempt` seconds),
//! with up to [`constants::MAX_RETRIES`] retries after the first attempt.

use std::time::Duration;

use authmint_types::constants;

/// Error codes that warrant a retry.
pub const TRANSIENT_ERROR_CODES: [&str; 4] = [
    "timeout",
    "connection_error",
    "rate_limited",
    "service_unavailable",
];

/// Retry policy with exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RecoveryStrategy {
    max_retries: u32,
    backoff_base_secs: u64,
}

impl RecoveryStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_retries: constants::MAX_RETRIES,
            backoff_base_secs: constants::BACKOFF_BASE_SECS,
        }
    }

    /// Custom retry budget and backoff base. A base of zero disables the
    /// pause entirely, which is what tests want.
    #[must_use]
    pub fn with_params(max_retries: u32, backoff_base_secs: u64) -> Self {
        Self {
            max_retries,
            backoff_base_secs,
        }
    }

    /// Whether `code` names a transient failure.
    #[must_use]
    pub fn is_transient(code: &str) -> bool {
        TRANSIENT_ERROR_CODES.contains(&code)
    }

    /// Whether to retry after the failure of attempt number `attempt`
    /// (zero-based).
    #[must_use]
    pub fn should_retry(&self, code: &str, attempt: u32) -> bool {
        attempt < self.max_retries && Self::is_transient(code)
    }

    /// Backoff before attempt number `attempt`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.backoff_base_secs.saturating_pow(attempt))
    }

    /// Sleep out the backoff before attempt number `attempt`.
    pub fn pause(&self, attempt: u32) {
        let backoff = self.backoff(attempt);
        if !backoff.is_zero() {
            std::thread::sleep(backoff);
        }
    }
}

impl Default for RecoveryStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_codes_recognized() {
        for code in TRANSIENT_ERROR_CODES {
            assert!(RecoveryStrategy::is_transient(code), "{code} is transient");
        }
        assert!(!RecoveryStrategy::is_transient("not_found"));
        assert!(!RecoveryStrategy::is_transient("unauthorized"));
    }

    #[test]
    fn retry_budget_is_bounded() {
        let recovery = RecoveryStrategy::new();
        assert!(recovery.should_retry("timeout", 0));
        assert!(recovery.should_retry("timeout", 2));
        assert!(!recovery.should_retry("timeout", 3));
    }

    #[test]
    fn fatal_codes_never_retry() {
        let recovery = RecoveryStrategy::new();
        assert!(!recovery.should_retry("not_found", 0));
    }

    #[test]
    fn backoff_is_exponential() {
        let recovery = RecoveryStrategy::new();
        assert_eq!(recovery.backoff(1), Duration::from_secs(2));
        assert_eq!(recovery.backoff(2), Duration::from_secs(4));
        assert_eq!(recovery.backoff(3), Duration::from_secs(8));
    }

    #[test]
    fn zero_base_pauses_nothing() {
        let recovery = RecoveryStrategy::with_params(3, 0);
        assert!(recovery.backoff(3).is_zero());
    }
}
