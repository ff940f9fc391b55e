//! Plan authorization and receipt-gated execution.

use std::collections::BTreeMap;
use std::sync::Arc;

use authmint_authority::ReceiptAuthority;
use authmint_executor::{Executor, PlatformClient};
use authmint_types::{
    AuditRecord, AuthmintError, AuthorizationDecision, AuthorizationEvidence, Clock, OperationId,
    OperationPayload, OperationRequest, OperationSpec, PublicationPlan, Receipt, Result, RunId,
    SystemClock,
};
use serde::{Deserialize, Serialize};

/// An operation the authority declined to authorize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedOperation {
    pub operation_id: OperationId,
    pub reason: String,
}

/// The outcome of authorizing a complete plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanAuthorization {
    pub run_id: RunId,
    /// Enforceable receipts, keyed by the planner's operation id.
    pub receipts: BTreeMap<OperationId, Receipt>,
    /// Operations that only earned advisory receipts.
    pub blocked_operations: Vec<BlockedOperation>,
    /// True iff nothing was blocked.
    pub execution_ready: bool,
    pub total_operations: usize,
    pub authorized_operations: usize,
}

/// Coordinates plan review, receipt issuance, and execution.
pub struct AuthorityBridge {
    authority: Arc<ReceiptAuthority>,
    clock: Arc<dyn Clock>,
}

impl AuthorityBridge {
    #[must_use]
    pub fn new(authority: Arc<ReceiptAuthority>) -> Self {
        Self::with_clock(authority, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(authority: Arc<ReceiptAuthority>, clock: Arc<dyn Clock>) -> Self {
        Self { authority, clock }
    }

    #[must_use]
    pub fn authority(&self) -> &Arc<ReceiptAuthority> {
        &self.authority
    }

    /// Authorize every operation in a plan.
    ///
    /// Each operation gets a receipt (dry-run plans included — the mode
    /// gate lives in the executor, not here). Operations whose receipts
    /// come back advisory land in `blocked_operations`.
    ///
    /// # Errors
    /// Only internal authority failures; denials are partitioned, not
    /// raised.
    pub fn authorize_plan(
        &self,
        plan: &PublicationPlan,
        approvers: &[String],
    ) -> Result<PlanAuthorization> {
        let mut receipts = BTreeMap::new();
        let mut blocked = Vec::new();

        for operation in &plan.operations {
            let request = OperationRequest {
                run_id: plan.run_id.clone(),
                repository: operation.repository.clone(),
                payload: operation.payload.clone(),
                evidence: BTreeMap::from([(
                    "approvers".to_string(),
                    serde_json::to_value(approvers)?,
                )]),
            };
            let evidence = AuthorizationEvidence {
                checked_at: self.clock.now(),
                policy_id: self.authority.policy().policy_id.clone(),
                decision: AuthorizationDecision::Approved,
                reason: "approved via batch authorization".to_string(),
                approvers: approvers.to_vec(),
                checks: BTreeMap::new(),
            };

            let receipt = self.authority.mint(&request, Some(evidence))?;
            if receipt.enforceable {
                receipts.insert(operation.operation_id.clone(), receipt);
            } else {
                blocked.push(BlockedOperation {
                    operation_id: operation.operation_id.clone(),
                    reason: "advisory receipt issued (not enforceable)".to_string(),
                });
            }
        }

        let authorized = receipts.len();
        tracing::info!(
            run_id = %plan.run_id,
            total = plan.operations.len(),
            authorized,
            blocked = blocked.len(),
            "plan authorization complete"
        );
        Ok(PlanAuthorization {
            run_id: plan.run_id.clone(),
            execution_ready: blocked.is_empty(),
            total_operations: plan.operations.len(),
            authorized_operations: authorized,
            receipts,
            blocked_operations: blocked,
        })
    }

    /// Dispatch one operation to the executor entry point matching its
    /// kind. The match is exhaustive: a new `OperationKind` variant fails
    /// compilation here until it gets an entry point.
    ///
    /// # Errors
    /// Whatever the executor surfaces; its audit record is already written.
    pub fn execute_operation<C: PlatformClient>(
        &self,
        executor: &mut Executor<C>,
        run_id: &RunId,
        operation: &OperationSpec,
        receipt: &mut Receipt,
    ) -> Result<AuditRecord> {
        match &operation.payload {
            OperationPayload::PublishRelease(spec) => {
                executor.publish_release(run_id, Some(receipt), &operation.repository, spec)
            }
            OperationPayload::TagRepo(spec) => {
                executor.tag_repo(run_id, Some(receipt), &operation.repository, spec)
            }
            OperationPayload::OpenPr(spec) => {
                executor.open_pr(run_id, Some(receipt), &operation.repository, spec)
            }
        }
    }

    /// Execute the authorized part of a plan.
    ///
    /// Operations flagged `blocked_by_mode` are never presented to the
    /// executor; operations without an enforceable receipt were already
    /// partitioned into `blocked_operations` at authorization time.
    ///
    /// # Errors
    /// Stops at the first executor failure and returns it; earlier audit
    /// records are preserved in the executor.
    pub fn execute_plan<C: PlatformClient>(
        &self,
        executor: &mut Executor<C>,
        plan: &PublicationPlan,
        authorization: &mut PlanAuthorization,
    ) -> Result<Vec<AuditRecord>> {
        if authorization.run_id != plan.run_id {
            return Err(AuthmintError::Internal(format!(
                "authorization for run '{}' cannot execute plan '{}'",
                authorization.run_id, plan.run_id
            )));
        }

        let mut records = Vec::new();
        for operation in plan.executable_operations() {
            let Some(receipt) = authorization.receipts.get_mut(&operation.operation_id) else {
                // Advisory at authorization time; already in blocked_operations.
                continue;
            };
            records.push(self.execute_operation(executor, &plan.run_id, operation, receipt)?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use authmint_executor::SimulatedPlatform;
    use authmint_types::{
        AuditStatus, AuthorizationPolicy, ManualClock, Mode, OperationKind, PrSpec, ReleaseSpec,
        RepoSlug, RuleSet, SigningSecret, TagSpec,
    };
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 10, 12, 0, 0).unwrap()
    }

    fn policy() -> AuthorizationPolicy {
        AuthorizationPolicy {
            policy_id: "release-policy".into(),
            version: "1.0".into(),
            rules: BTreeMap::from([
                (
                    OperationKind::PublishRelease,
                    RuleSet {
                        allowed_repositories: Some(vec!["omega/*".into()]),
                        require_evidence: Some(vec!["approval_count >= 1".into()]),
                        rate_limit: None,
                    },
                ),
                (
                    OperationKind::TagRepo,
                    RuleSet {
                        allowed_repositories: Some(vec!["omega/*".into()]),
                        ..RuleSet::default()
                    },
                ),
                (OperationKind::OpenPr, RuleSet::default()),
            ]),
        }
    }

    fn bridge(clock: Arc<ManualClock>) -> AuthorityBridge {
        let authority = Arc::new(
            ReceiptAuthority::with_clock(
                "authority-1",
                SigningSecret::from("authority-secret-key-0123456789abcdef"),
                policy(),
                "platform-executor",
                clock.clone(),
            )
            .unwrap(),
        );
        AuthorityBridge::with_clock(authority, clock)
    }

    fn plan(run: &str, mode: Mode, operations: Vec<OperationSpec>) -> PublicationPlan {
        PublicationPlan {
            run_id: RunId::from(run),
            mode,
            created_at: start(),
            operations,
        }
    }

    fn release_op(id: &str, repo: &str, blocked_by_mode: bool) -> OperationSpec {
        OperationSpec {
            operation_id: OperationId::from(id),
            repository: RepoSlug::parse(repo).unwrap(),
            payload: OperationPayload::PublishRelease(ReleaseSpec {
                tag_name: "v0.3.0".into(),
                release_name: "Release v0.3.0".into(),
                body: "notes".into(),
                draft: false,
                prerelease: false,
            }),
            blocked_by_mode,
            blocked_reason: blocked_by_mode.then(|| "Operation blocked: mode=dry_run".to_string()),
        }
    }

    fn tag_op(id: &str, repo: &str) -> OperationSpec {
        OperationSpec {
            operation_id: OperationId::from(id),
            repository: RepoSlug::parse(repo).unwrap(),
            payload: OperationPayload::TagRepo(TagSpec {
                tag_name: "v0.3.0".into(),
                target_sha: "abc123".into(),
                message: "release tag".into(),
            }),
            blocked_by_mode: false,
            blocked_reason: None,
        }
    }

    fn pr_op(id: &str, repo: &str) -> OperationSpec {
        OperationSpec {
            operation_id: OperationId::from(id),
            repository: RepoSlug::parse(repo).unwrap(),
            payload: OperationPayload::OpenPr(PrSpec {
                title: "Release PR".into(),
                body: "body".into(),
                head_branch: "release/v0.3.0".into(),
                base_branch: "main".into(),
            }),
            blocked_by_mode: false,
            blocked_reason: None,
        }
    }

    #[test]
    fn fully_allowed_plan_is_execution_ready() {
        let clock = Arc::new(ManualClock::at(start()));
        let bridge = bridge(clock);
        let plan = plan(
            "r-1",
            Mode::Prod,
            vec![
                release_op("op-release", "omega/app", false),
                tag_op("op-tag", "omega/app"),
            ],
        );

        let auth = bridge.authorize_plan(&plan, &["alice".to_string()]).unwrap();
        assert!(auth.execution_ready);
        assert_eq!(auth.total_operations, 2);
        assert_eq!(auth.authorized_operations, 2);
        assert!(auth.blocked_operations.is_empty());
        assert!(auth.receipts.values().all(|r| r.enforceable));
    }

    #[test]
    fn denied_operation_lands_in_blocked_list() {
        let clock = Arc::new(ManualClock::at(start()));
        let bridge = bridge(clock.clone());
        let plan = plan(
            "r-1",
            Mode::Prod,
            vec![
                release_op("op-ok", "omega/app", false),
                // Not in the tag allowlist.
                tag_op("op-denied", "random/x"),
            ],
        );

        let auth = bridge.authorize_plan(&plan, &["alice".to_string()]).unwrap();
        assert!(!auth.execution_ready);
        assert_eq!(auth.authorized_operations, 1);
        assert_eq!(auth.blocked_operations.len(), 1);
        assert_eq!(auth.blocked_operations[0].operation_id, OperationId::from("op-denied"));

        // The advisory receipt is in the ledger regardless.
        assert_eq!(bridge.authority().ledger().len(), 2);
    }

    #[test]
    fn execute_plan_dispatches_every_kind() {
        let clock = Arc::new(ManualClock::at(start()));
        let bridge = bridge(clock.clone());
        let plan = plan(
            "r-1",
            Mode::Prod,
            vec![
                release_op("op-1-release", "omega/app", false),
                tag_op("op-2-tag", "omega/app"),
                pr_op("op-3-pr", "omega/app"),
            ],
        );

        let mut auth = bridge.authorize_plan(&plan, &["alice".to_string()]).unwrap();
        assert!(auth.execution_ready);

        let client = SimulatedPlatform::new("token".into(), clock.clone());
        let mut executor = Executor::with_clock(
            client,
            bridge.authority().clone(),
            "prod",
            true,
            clock,
        )
        .unwrap();

        let records = bridge.execute_plan(&mut executor, &plan, &mut auth).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.status == AuditStatus::Success));

        let kinds: Vec<OperationKind> = records.iter().map(|r| r.operation_kind).collect();
        assert_eq!(
            kinds,
            vec![OperationKind::PublishRelease, OperationKind::TagRepo, OperationKind::OpenPr]
        );
    }

    #[test]
    fn blocked_by_mode_operations_never_reach_the_executor() {
        let clock = Arc::new(ManualClock::at(start()));
        let bridge = bridge(clock.clone());
        let plan = plan(
            "r-1",
            Mode::DryRun,
            vec![
                release_op("op-blocked", "omega/app", true),
                tag_op("op-tag", "omega/app"),
            ],
        );

        // The authority reviews the whole dry-run plan.
        let mut auth = bridge.authorize_plan(&plan, &["alice".to_string()]).unwrap();
        assert_eq!(auth.authorized_operations, 2);

        let client = SimulatedPlatform::new("token".into(), clock.clone());
        let mut executor =
            Executor::with_clock(client, bridge.authority().clone(), "prod", true, clock).unwrap();

        let records = bridge.execute_plan(&mut executor, &plan, &mut auth).unwrap();
        // Only the non-blocked operation executed.
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].operation_kind, OperationKind::TagRepo);
        assert_eq!(executor.audit_trail().len(), 1);
    }

    #[test]
    fn mismatched_authorization_refused() {
        let clock = Arc::new(ManualClock::at(start()));
        let bridge = bridge(clock.clone());
        let plan_a = plan("r-1", Mode::Prod, vec![tag_op("op-tag", "omega/app")]);
        let plan_b = plan("r-2", Mode::Prod, vec![tag_op("op-tag", "omega/app")]);

        let mut auth = bridge.authorize_plan(&plan_a, &[]).unwrap();

        let client = SimulatedPlatform::new("token".into(), clock.clone());
        let mut executor =
            Executor::with_clock(client, bridge.authority().clone(), "prod", true, clock).unwrap();

        let err = bridge.execute_plan(&mut executor, &plan_b, &mut auth).unwrap_err();
        assert!(matches!(err, AuthmintError::Internal(_)));
    }
}
