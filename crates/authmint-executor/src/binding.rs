//! Binding validator — six ordered checks on a presented receipt.
//!
//! Each failure names the specific binding that was violated, so the audit
//! trail tells an investigator which invariant the attacker tried to break:
//!
//! 1. `run_id` equality — else `cross_run_replay`
//! 2. `operation_kind` equality — else `cross_operation_replay`
//! 3. enforceable — else `advisory_rejected`
//! 4. not consumed — else `already_consumed_replay`
//! 5. not expired — else `expired`
//! 6. not stale (24h from issue, regardless of expiry) — else `stale`
//!
//! Signature verification is the authority's job at consume time; this
//! validator covers the in-process binding, and the consume-time MAC check
//! closes the synthesized-receipt gap.

use std::collections::BTreeMap;

use authmint_types::{
    AuthmintError, OperationKind, Receipt, ReceiptId, Result, RunId, canonical, constants,
};
use chrono::{DateTime, Utc};

/// Validates receipt bindings and remembers which receipts this executor
/// has consumed.
#[derive(Debug, Default)]
pub struct BindingValidator {
    /// Receipts consumed through this executor, by id.
    consumed: BTreeMap<ReceiptId, DateTime<Utc>>,
}

impl BindingValidator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the six binding checks, in order. The first failure wins.
    ///
    /// # Errors
    /// One of the 3xx binding errors naming the violated invariant.
    pub fn validate(
        &self,
        receipt: &Receipt,
        expected_run: &RunId,
        expected_kind: OperationKind,
        now: DateTime<Utc>,
    ) -> Result<()> {
        // 1. Bound to this run
        if receipt.run_id != *expected_run {
            return Err(AuthmintError::CrossRunReplay {
                expected: expected_run.clone(),
                actual: receipt.run_id.clone(),
            });
        }

        // 2. Bound to this operation
        if receipt.operation_kind != expected_kind {
            return Err(AuthmintError::CrossOperationReplay {
                expected: expected_kind,
                actual: receipt.operation_kind,
            });
        }

        // 3. Enforceable, not advisory
        if !receipt.enforceable {
            return Err(AuthmintError::AdvisoryRejected {
                receipt_id: receipt.receipt_id.clone(),
            });
        }

        // 4. One-time use. The local registry also catches clones taken
        // before the original was consumed.
        if receipt.consumed || self.consumed.contains_key(&receipt.receipt_id) {
            let consumed_at = receipt
                .consumed_at
                .or_else(|| self.consumed.get(&receipt.receipt_id).copied());
            return Err(AuthmintError::AlreadyConsumedReplay {
                receipt_id: receipt.receipt_id.clone(),
                consumed_at: consumed_at
                    .map_or_else(|| "unknown".to_string(), |at| canonical::iso8601::format(&at)),
            });
        }

        // 5. Within the expiry window
        if receipt.is_expired(now) {
            return Err(AuthmintError::ReceiptExpired {
                receipt_id: receipt.receipt_id.clone(),
                expires_at: receipt.expires_at,
            });
        }

        // 6. Not stale, even if expiry was extended
        if receipt.is_stale(now) {
            return Err(AuthmintError::ReceiptStale {
                receipt_id: receipt.receipt_id.clone(),
                age_hours: receipt.age(now).num_hours(),
                max_hours: constants::MAX_RECEIPT_AGE_HOURS,
            });
        }

        Ok(())
    }

    /// Record that this executor consumed a receipt.
    pub fn mark_consumed(&mut self, receipt_id: ReceiptId, at: DateTime<Utc>) {
        self.consumed.insert(receipt_id, at);
    }

    /// Receipts consumed through this executor, for audit.
    #[must_use]
    pub fn consumed_receipts(&self) -> &BTreeMap<ReceiptId, DateTime<Utc>> {
        &self.consumed
    }
}
