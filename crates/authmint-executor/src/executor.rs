//! The receipt-enforcing executor.
//!
//! One entry point per operation kind, all funneled through the same state
//! machine: mode gate → binding validation → rate window → platform call
//! with recovery → receipt consumption → audit.
//!
//! Two properties the rest of the system leans on:
//!
//! - **Fail-closed**: anything other than prod mode with a valid receipt
//!   is a rejection, and a missing receipt never reaches the platform.
//! - **Every terminal transition audits**: success, failure, or rejection,
//!   exactly one [`AuditRecord`] is appended, always referencing a
//!   receipt id (`"NONE"` when absent).
//!
//! Consumption happens after the platform call succeeds and before the
//! audit record is emitted. A successful call whose consumption then fails
//! is an invariant violation: the record gets status `failed` with code
//! `consume_after_success` so an operator can reconcile by hand.

use std::collections::BTreeMap;
use std::sync::Arc;

use authmint_types::{
    AuditRecord, AuditStatus, AuthmintError, Clock, Mode, OperationId, OperationKind, PrSpec,
    Receipt, ReceiptConsumer, ReceiptId, ReleaseSpec, RepoSlug, Result, RunId, SystemClock,
    TagSpec, constants,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::binding::BindingValidator;
use crate::platform::{PlatformClient, PlatformResult};
use crate::rate_limit::RateLimitManager;
use crate::recovery::RecoveryStrategy;

/// Executor for receipt-gated platform operations.
pub struct Executor<C: PlatformClient> {
    client: C,
    consumer: Arc<dyn ReceiptConsumer>,
    mode: Mode,
    enable_recovery: bool,
    binding: BindingValidator,
    rate: RateLimitManager,
    recovery: RecoveryStrategy,
    clock: Arc<dyn Clock>,
    audit: Vec<AuditRecord>,
}

impl<C: PlatformClient> Executor<C> {
    /// Construct an executor. Fails immediately on any mode string that is
    /// not exactly `prod` or `dry_run`.
    ///
    /// # Errors
    /// [`AuthmintError::ModeViolation`] for an invalid mode.
    pub fn new(
        client: C,
        consumer: Arc<dyn ReceiptConsumer>,
        mode: &str,
        enable_recovery: bool,
    ) -> Result<Self> {
        Self::with_clock(client, consumer, mode, enable_recovery, Arc::new(SystemClock))
    }

    /// Construct with an injected clock.
    ///
    /// # Errors
    /// [`AuthmintError::ModeViolation`] for an invalid mode.
    pub fn with_clock(
        client: C,
        consumer: Arc<dyn ReceiptConsumer>,
        mode: &str,
        enable_recovery: bool,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let mode: Mode = mode.parse()?;
        Ok(Self {
            client,
            consumer,
            mode,
            enable_recovery,
            binding: BindingValidator::new(),
            rate: RateLimitManager::default(),
            recovery: RecoveryStrategy::new(),
            clock,
            audit: Vec::new(),
        })
    }

    /// Replace the retry policy.
    #[must_use]
    pub fn with_recovery_strategy(mut self, recovery: RecoveryStrategy) -> Self {
        self.recovery = recovery;
        self
    }

    /// Replace the hourly rate budget.
    #[must_use]
    pub fn with_rate_budget(mut self, requests_per_hour: u32) -> Self {
        self.rate = RateLimitManager::new(requests_per_hour);
        self
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Every audit record this executor has produced, in start order.
    #[must_use]
    pub fn audit_trail(&self) -> &[AuditRecord] {
        &self.audit
    }

    /// Receipts consumed through this executor, for audit.
    #[must_use]
    pub fn consumed_receipts(&self) -> &BTreeMap<ReceiptId, DateTime<Utc>> {
        self.binding.consumed_receipts()
    }

    // -----------------------------------------------------------------
    // Entry points — one per operation kind
    // -----------------------------------------------------------------

    /// Publish a release. Requires prod mode and an enforceable receipt
    /// bound to `(run_id, publish_release)`.
    ///
    /// # Errors
    /// The terminal error; an audit record has already been appended.
    pub fn publish_release(
        &mut self,
        run_id: &RunId,
        receipt: Option<&mut Receipt>,
        repository: &RepoSlug,
        spec: &ReleaseSpec,
    ) -> Result<AuditRecord> {
        self.execute(OperationKind::PublishRelease, run_id, receipt, repository, |client| {
            client.create_release(&repository.owner, &repository.name, spec)
        })
    }

    /// Create an annotated tag. Requires prod mode and an enforceable
    /// receipt bound to `(run_id, tag_repo)`.
    ///
    /// # Errors
    /// The terminal error; an audit record has already been appended.
    pub fn tag_repo(
        &mut self,
        run_id: &RunId,
        receipt: Option<&mut Receipt>,
        repository: &RepoSlug,
        spec: &TagSpec,
    ) -> Result<AuditRecord> {
        self.execute(OperationKind::TagRepo, run_id, receipt, repository, |client| {
            client.create_tag(&repository.owner, &repository.name, spec)
        })
    }

    /// Open a pull request. Requires prod mode and an enforceable receipt
    /// bound to `(run_id, open_pr)`.
    ///
    /// # Errors
    /// The terminal error; an audit record has already been appended.
    pub fn open_pr(
        &mut self,
        run_id: &RunId,
        receipt: Option<&mut Receipt>,
        repository: &RepoSlug,
        spec: &PrSpec,
    ) -> Result<AuditRecord> {
        self.execute(OperationKind::OpenPr, run_id, receipt, repository, |client| {
            client.create_pull_request(&repository.owner, &repository.name, spec)
        })
    }

    // -----------------------------------------------------------------
    // The unified state machine
    // -----------------------------------------------------------------

    fn execute<R: Serialize>(
        &mut self,
        kind: OperationKind,
        run_id: &RunId,
        receipt: Option<&mut Receipt>,
        repository: &RepoSlug,
        call: impl Fn(&C) -> PlatformResult<R>,
    ) -> Result<AuditRecord> {
        let started_at = self.clock.now();
        let operation_id = OperationId::derive(kind, run_id, started_at);
        let receipt_label = receipt
            .as_ref()
            .map_or_else(|| constants::NO_RECEIPT.to_string(), |r| r.receipt_id.to_string());

        let mut retries = 0u32;
        let mut platform_response: Option<Value> = None;

        let outcome: Result<Value> = (|| {
            // Mode gate — the fail-closed property the system rests on.
            if self.mode != Mode::Prod {
                return Err(AuthmintError::ModeNotProd {
                    kind,
                    mode: self.mode,
                });
            }

            // Binding: no receipt, no action.
            let receipt = receipt.ok_or(AuthmintError::ReceiptMissing)?;
            self.binding.validate(receipt, run_id, kind, self.clock.now())?;

            // Rate window: exhaustion is a fatal failure, not a block.
            if !self.rate.can_make_request(self.clock.now()) {
                return Err(AuthmintError::RateLimitExhausted {
                    limit: self.rate.requests_per_hour(),
                });
            }

            // Platform call, retrying only transient codes.
            let response = loop {
                match call(&self.client) {
                    Ok(response) => break serde_json::to_value(response)?,
                    Err(platform_err) => {
                        if self.enable_recovery
                            && self.recovery.should_retry(&platform_err.code, retries)
                        {
                            retries += 1;
                            tracing::warn!(
                                operation_id = %operation_id,
                                code = %platform_err.code,
                                attempt = retries,
                                "transient platform failure, retrying"
                            );
                            self.recovery.pause(retries);
                        } else {
                            return Err(platform_err.into());
                        }
                    }
                }
            };
            self.rate.record_request(self.clock.now());
            platform_response = Some(response.clone());

            // Consume after success, before audit. A failure here is a
            // ledger inconsistency the operator must reconcile.
            let consumed_at =
                self.consumer
                    .verify_and_consume(receipt)
                    .map_err(|err| AuthmintError::LedgerInconsistency {
                        reason: format!(
                            "receipt consumption failed after successful platform call: {err}"
                        ),
                    })?;
            self.binding.mark_consumed(receipt.receipt_id.clone(), consumed_at);

            Ok(response)
        })();

        let completed_at = self.clock.now();
        match outcome {
            Ok(response) => {
                let record = AuditRecord {
                    operation_id: operation_id.clone(),
                    run_id: run_id.clone(),
                    operation_kind: kind,
                    receipt_id: receipt_label,
                    repository: repository.clone(),
                    status: AuditStatus::Success,
                    mode: self.mode,
                    started_at,
                    completed_at,
                    result: Some(response),
                    error_code: None,
                    error_message: None,
                    platform_response,
                    retry_count: retries,
                };
                self.audit.push(record.clone());
                tracing::info!(
                    operation_id = %operation_id,
                    run_id = %run_id,
                    kind = %kind,
                    retries,
                    "operation succeeded"
                );
                Ok(record)
            }
            Err(err) => {
                let record = AuditRecord {
                    operation_id: operation_id.clone(),
                    run_id: run_id.clone(),
                    operation_kind: kind,
                    receipt_id: receipt_label,
                    repository: repository.clone(),
                    status: err.audit_status(),
                    mode: self.mode,
                    started_at,
                    completed_at,
                    result: None,
                    error_code: Some(err.error_code()),
                    error_message: Some(err.to_string()),
                    platform_response,
                    retry_count: retries,
                };
                self.audit.push(record);
                tracing::warn!(
                    operation_id = %operation_id,
                    run_id = %run_id,
                    kind = %kind,
                    status = %err.audit_status(),
                    code = %err.error_code(),
                    "operation did not succeed"
                );
                Err(err)
            }
        }
    }
}
