//! The Receipt Authority — sole mint and sole consumer of receipts.
//!
//! Minting runs the policy engine and **always** returns a signed receipt:
//! enforceable on approval, advisory on denial. Denial is a first-class
//! outcome, not an error — the downstream executor records the rejection
//! with the same audit shape as a success.
//!
//! Consumption (`verify_and_consume`) is the kernel's one-time-use gate:
//! constant-time signature check, ledger membership, then the atomic
//! `OPEN → CONSUMED` transition.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use authmint_types::{
    AuthorizationDecision, AuthorizationEvidence, AuthorizationPolicy, Clock, OperationRequest,
    Receipt, ReceiptConsumer, ReceiptId, Result, SigningSecret, SystemClock, constants,
};
use chrono::{DateTime, Duration, Utc};

use crate::ledger::{IssuanceLedger, LedgerEntry, TerminalState};
use crate::policy_engine::PolicyEngine;

/// The single minting point for enforceable receipts.
pub struct ReceiptAuthority {
    authority_id: String,
    secret: SigningSecret,
    engine: PolicyEngine,
    audience: String,
    ledger: IssuanceLedger,
    /// Every receipt ever minted, by id, for audit.
    issued: Mutex<HashMap<ReceiptId, Receipt>>,
    clock: Arc<dyn Clock>,
}

impl ReceiptAuthority {
    /// Construct an authority over the given policy.
    ///
    /// # Errors
    /// Returns a configuration error if the policy fails to compile.
    pub fn new(
        authority_id: impl Into<String>,
        secret: SigningSecret,
        policy: AuthorizationPolicy,
        audience: impl Into<String>,
    ) -> Result<Self> {
        Self::with_clock(authority_id, secret, policy, audience, Arc::new(SystemClock))
    }

    /// Construct with an injected clock (tests advance time without
    /// sleeping).
    ///
    /// # Errors
    /// Returns a configuration error if the policy fails to compile.
    pub fn with_clock(
        authority_id: impl Into<String>,
        secret: SigningSecret,
        policy: AuthorizationPolicy,
        audience: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Ok(Self {
            authority_id: authority_id.into(),
            secret,
            engine: PolicyEngine::new(policy)?,
            audience: audience.into(),
            ledger: IssuanceLedger::new(),
            issued: Mutex::new(HashMap::new()),
            clock,
        })
    }

    #[must_use]
    pub fn authority_id(&self) -> &str {
        &self.authority_id
    }

    /// The policy document this authority enforces.
    #[must_use]
    pub fn policy(&self) -> &AuthorizationPolicy {
        self.engine.policy()
    }

    /// The issuance ledger. Read access for audit and invariant checks;
    /// terminal-state transitions stay inside this crate.
    #[must_use]
    pub fn ledger(&self) -> &IssuanceLedger {
        &self.ledger
    }

    fn issued_lock(&self) -> MutexGuard<'_, HashMap<ReceiptId, Receipt>> {
        self.issued.lock().expect("issued-receipt registry lock poisoned")
    }

    /// Authorize one operation and mint its receipt.
    ///
    /// Always returns a signed receipt: `enforceable = true` iff the policy
    /// engine approved. When no evidence is supplied, deferred evidence is
    /// synthesized and the policy engine settles the decision.
    ///
    /// # Errors
    /// Only on internal failures (signing, ledger append). Policy denial is
    /// not an error.
    pub fn mint(
        &self,
        request: &OperationRequest,
        evidence: Option<AuthorizationEvidence>,
    ) -> Result<Receipt> {
        let now = self.clock.now();
        let kind = request.operation_kind();
        let receipt_id = ReceiptId::derive(&request.run_id, kind, now);
        let expires_at = now + Duration::seconds(constants::RECEIPT_TTL_SECS);

        let mut evidence = evidence.unwrap_or_else(|| {
            AuthorizationEvidence::deferred(now, &self.engine.policy().policy_id)
        });

        let enforceable = match self.engine.validate(request, &evidence) {
            Ok(()) => {
                evidence.decision = AuthorizationDecision::Approved;
                true
            }
            Err(violation) => {
                evidence.decision = AuthorizationDecision::Denied;
                evidence.reason = violation.to_string();
                false
            }
        };

        let mut receipt = Receipt {
            receipt_id: receipt_id.clone(),
            run_id: request.run_id.clone(),
            operation_kind: kind,
            enforceable,
            issued_at: now,
            expires_at,
            issuer: self.authority_id.clone(),
            audience: self.audience.clone(),
            evidence_hash: evidence.hash()?,
            signature: None,
            consumed: false,
            consumed_at: None,
        };
        receipt.sign(&self.secret)?;

        self.ledger.append(LedgerEntry {
            receipt_id: receipt_id.clone(),
            run_id: request.run_id.clone(),
            operation_kind: kind,
            enforceable,
            issued_at: now,
            expires_at,
            policy_id: self.engine.policy().policy_id.clone(),
            terminal_state: TerminalState::Open,
            consumed_at: None,
        })?;
        self.issued_lock().insert(receipt_id.clone(), receipt.clone());

        tracing::info!(
            receipt_id = %receipt_id,
            run_id = %request.run_id,
            kind = %kind,
            enforceable,
            "minted receipt"
        );
        Ok(receipt)
    }

    /// Every receipt ever minted, with its current consumption mirror.
    #[must_use]
    pub fn issued_receipts(&self) -> Vec<Receipt> {
        let mut receipts: Vec<Receipt> = self.issued_lock().values().cloned().collect();
        receipts.sort_by(|a, b| a.issued_at.cmp(&b.issued_at).then_with(|| a.receipt_id.cmp(&b.receipt_id)));
        receipts
    }

    /// The issuance ledger in mint order.
    #[must_use]
    pub fn issuance_audit(&self) -> Vec<LedgerEntry> {
        self.ledger.snapshot()
    }

    /// Retire open ledger entries whose receipts are past expiry. Returns
    /// how many entries transitioned to `EXPIRED`.
    pub fn sweep_expired(&self) -> usize {
        let swept = self.ledger.sweep_expired(self.clock.now());
        if swept > 0 {
            tracing::info!(swept, "expired open ledger entries");
        }
        swept
    }
}

impl ReceiptConsumer for ReceiptAuthority {
    /// Verify the receipt was issued here and consume it.
    ///
    /// Checks in order, any failure aborts: signature (constant-time),
    /// ledger membership, terminal state. On success both the ledger entry
    /// and the in-memory receipt transition, exactly once.
    fn verify_and_consume(&self, receipt: &mut Receipt) -> Result<DateTime<Utc>> {
        if !receipt.verify_signature(&self.secret) {
            return Err(authmint_types::AuthmintError::SignatureInvalid {
                receipt_id: receipt.receipt_id.clone(),
            });
        }

        let consumed_at = self.ledger.consume(&receipt.receipt_id, self.clock.now())?;
        receipt.mark_consumed(consumed_at);
        if let Some(stored) = self.issued_lock().get_mut(&receipt.receipt_id) {
            stored.mark_consumed(consumed_at);
        }

        tracing::info!(
            receipt_id = %receipt.receipt_id,
            run_id = %receipt.run_id,
            "receipt consumed"
        );
        Ok(consumed_at)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use authmint_types::{
        AuthmintError, ManualClock, OperationKind, OperationPayload, PrSpec, ReleaseSpec,
        RepoSlug, RuleSet, RunId,
    };
    use chrono::TimeZone;

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
                (OperationKind::OpenPr, RuleSet::default()),
            ]),
        }
    }

    fn authority(clock: Arc<ManualClock>) -> ReceiptAuthority {
        ReceiptAuthority::with_clock(
            "authority-1",
            SigningSecret::from("authority-secret-key-0123456789abcdef"),
            policy(),
            "platform-executor",
            clock,
        )
        .unwrap()
    }

    fn release_request(repo: &str) -> OperationRequest {
        OperationRequest {
            run_id: RunId::from("r-1"),
            repository: RepoSlug::parse(repo).unwrap(),
            payload: OperationPayload::PublishRelease(ReleaseSpec {
                tag_name: "v1.0.0".into(),
                release_name: "v1".into(),
                body: "notes".into(),
                draft: false,
                prerelease: false,
            }),
            evidence: BTreeMap::new(),
        }
    }

    fn approved_evidence(at: DateTime<Utc>) -> AuthorizationEvidence {
        AuthorizationEvidence {
            checked_at: at,
            policy_id: "release-policy".into(),
            decision: AuthorizationDecision::Approved,
            reason: "ok".into(),
            approvers: vec!["alice".into()],
            checks: BTreeMap::new(),
        }
    }

    #[test]
    fn approved_mint_is_enforceable() {
        let clock = Arc::new(ManualClock::at(start()));
        let authority = authority(clock);
        let receipt = authority
            .mint(&release_request("omega/app"), Some(approved_evidence(start())))
            .unwrap();

        assert!(receipt.enforceable);
        assert!(receipt.verify_signature(&SigningSecret::from(
            "authority-secret-key-0123456789abcdef"
        )));
        assert_eq!(receipt.issued_at, start());
        assert_eq!(receipt.expires_at, start() + Duration::hours(1));
        assert!(receipt.expires_at > receipt.issued_at);

        let entry = authority.ledger().entry(&receipt.receipt_id).unwrap();
        assert_eq!(entry.terminal_state, TerminalState::Open);
        assert!(entry.enforceable);
        assert_eq!(entry.policy_id, "release-policy");
    }

    #[test]
    fn denied_mint_is_advisory_not_error() {
        let clock = Arc::new(ManualClock::at(start()));
        let authority = authority(clock);
        let receipt = authority
            .mint(&release_request("random/x"), Some(approved_evidence(start())))
            .unwrap();

        assert!(!receipt.enforceable, "policy denial must downgrade, not raise");
        // Advisory receipts are still signed and still ledgered.
        assert!(receipt.verify_signature(&SigningSecret::from(
            "authority-secret-key-0123456789abcdef"
        )));
        let entry = authority.ledger().entry(&receipt.receipt_id).unwrap();
        assert!(!entry.enforceable);
    }

    #[test]
    fn missing_evidence_defers_then_policy_settles() {
        let clock = Arc::new(ManualClock::at(start()));
        let authority = authority(clock);

        // Evidence predicate requires 1 approver; deferred evidence has none.
        let receipt = authority.mint(&release_request("omega/app"), None).unwrap();
        assert!(!receipt.enforceable);

        // A kind with an open ruleset passes even with deferred evidence.
        let pr_request = OperationRequest {
            run_id: RunId::from("r-1"),
            repository: RepoSlug::parse("omega/app").unwrap(),
            payload: OperationPayload::OpenPr(PrSpec {
                title: "t".into(),
                body: "b".into(),
                head_branch: "feature/x".into(),
                base_branch: "main".into(),
            }),
            evidence: BTreeMap::new(),
        };
        let receipt = authority.mint(&pr_request, None).unwrap();
        assert!(receipt.enforceable);
    }

    #[test]
    fn consume_happy_path_updates_ledger_and_receipt() {
        let clock = Arc::new(ManualClock::at(start()));
        let authority = authority(clock.clone());
        let mut receipt = authority
            .mint(&release_request("omega/app"), Some(approved_evidence(start())))
            .unwrap();

        clock.advance(Duration::minutes(5));
        let consumed_at = authority.verify_and_consume(&mut receipt).unwrap();
        assert_eq!(consumed_at, start() + Duration::minutes(5));
        assert!(receipt.consumed);
        assert_eq!(receipt.consumed_at, Some(consumed_at));

        let entry = authority.ledger().entry(&receipt.receipt_id).unwrap();
        assert_eq!(entry.terminal_state, TerminalState::Consumed);
        assert_eq!(entry.consumed_at, Some(consumed_at));

        // The issued-receipt registry mirrors consumption.
        let issued = authority.issued_receipts();
        assert!(issued.iter().any(|r| r.receipt_id == receipt.receipt_id && r.consumed));
    }

    #[test]
    fn double_consume_rejected() {
        let clock = Arc::new(ManualClock::at(start()));
        let authority = authority(clock);
        let mut receipt = authority
            .mint(&release_request("omega/app"), Some(approved_evidence(start())))
            .unwrap();

        authority.verify_and_consume(&mut receipt).unwrap();
        let mut replay = receipt.clone();
        let err = authority.verify_and_consume(&mut replay).unwrap_err();
        assert!(matches!(err, AuthmintError::AlreadyConsumed { .. }));
    }

    #[test]
    fn concurrent_consume_has_one_winner() {
        let clock = Arc::new(ManualClock::at(start()));
        let authority = authority(clock);
        let receipt = authority
            .mint(&release_request("omega/app"), Some(approved_evidence(start())))
            .unwrap();

        let successes = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let authority = &authority;
                    let mut copy = receipt.clone();
                    scope.spawn(move || authority.verify_and_consume(&mut copy).is_ok())
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .filter(|ok| *ok)
                .count()
        });
        assert_eq!(successes, 1, "exactly one concurrent consume must win");
    }

    #[test]
    fn forged_receipt_rejected_before_ledger_lookup() {
        let clock = Arc::new(ManualClock::at(start()));
        let authority = authority(clock);

        // Attacker synthesizes an enforceable receipt under their own key.
        let mut forged = Receipt::dummy("r-1", OperationKind::PublishRelease, true, start());
        forged.sign(&SigningSecret::from("different-secret")).unwrap();

        let err = authority.verify_and_consume(&mut forged).unwrap_err();
        assert!(matches!(err, AuthmintError::SignatureInvalid { .. }));
        assert!(authority.ledger().entry(&forged.receipt_id).is_none());
    }

    #[test]
    fn tampered_receipt_fails_signature_check() {
        let clock = Arc::new(ManualClock::at(start()));
        let authority = authority(clock);
        let mut receipt = authority.mint(&release_request("random/x"), None).unwrap();
        assert!(!receipt.enforceable);

        // Flip the enforceable bit after minting.
        receipt.enforceable = true;
        let err = authority.verify_and_consume(&mut receipt).unwrap_err();
        assert!(matches!(err, AuthmintError::SignatureInvalid { .. }));

        // The ledger entry is untouched.
        let entry = authority.ledger().entry(&receipt.receipt_id).unwrap();
        assert_eq!(entry.terminal_state, TerminalState::Open);
    }

    #[test]
    fn mint_order_reflected_in_ledger() {
        let clock = Arc::new(ManualClock::at(start()));
        let authority = authority(clock.clone());
        let first = authority
            .mint(&release_request("omega/app"), Some(approved_evidence(start())))
            .unwrap();
        clock.advance(Duration::seconds(1));
        let second = authority
            .mint(&release_request("omega/lib"), Some(approved_evidence(start())))
            .unwrap();

        let audit = authority.issuance_audit();
        assert_eq!(audit.len(), 2);
        assert_eq!(audit[0].receipt_id, first.receipt_id);
        assert_eq!(audit[1].receipt_id, second.receipt_id);
    }

    #[test]
    fn sweep_expires_open_entries() {
        let clock = Arc::new(ManualClock::at(start()));
        let authority = authority(clock.clone());
        let receipt = authority
            .mint(&release_request("omega/app"), Some(approved_evidence(start())))
            .unwrap();

        clock.advance(Duration::hours(2));
        assert_eq!(authority.sweep_expired(), 1);
        let entry = authority.ledger().entry(&receipt.receipt_id).unwrap();
        assert_eq!(entry.terminal_state, TerminalState::Expired);
    }

    #[test]
    fn issued_receipts_sorted_by_mint_time() {
        let clock = Arc::new(ManualClock::at(start()));
        let authority = authority(clock.clone());
        let first = authority
            .mint(&release_request("omega/app"), Some(approved_evidence(start())))
            .unwrap();
        clock.advance(Duration::seconds(1));
        let second = authority.mint(&release_request("random/x"), None).unwrap();

        let issued = authority.issued_receipts();
        assert_eq!(issued.len(), 2);
        assert_eq!(issued[0].receipt_id, first.receipt_id);
        assert_eq!(issued[1].receipt_id, second.receipt_id);
    }
}
