//! System-wide limits and defaults.

/// How long a freshly minted receipt stays valid.
pub const RECEIPT_TTL_SECS: i64 = 3600;

/// Hard staleness cutoff from `issued_at`, regardless of `expires_at`.
/// Defends against clock drift and long-hoarded receipts.
pub const MAX_RECEIPT_AGE_HOURS: i64 = 24;

/// Maximum retries after the first platform attempt.
pub const MAX_RETRIES: u32 = 3;

/// Exponential backoff base: `BACKOFF_BASE_SECS ^ attempt` seconds.
pub const BACKOFF_BASE_SECS: u64 = 2;

/// Default sliding-window budget for platform calls.
pub const DEFAULT_REQUESTS_PER_HOUR: u32 = 5000;

/// Default issuer identifier for a Receipt Authority.
pub const DEFAULT_ISSUER: &str = "receipt-authority";

/// Default audience identifier for the executor.
pub const DEFAULT_AUDIENCE: &str = "platform-executor";

/// Sentinel receipt id on audit records when no receipt was supplied.
pub const NO_RECEIPT: &str = "NONE";

/// Recommended minimum signing-secret length in bytes.
pub const MIN_SECRET_BYTES: usize = 32;
