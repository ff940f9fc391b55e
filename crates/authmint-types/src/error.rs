//! Error types for the AuthMint authorization kernel.
//!
//! All errors use the `AM_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Mode errors
//! - 2xx: Policy errors
//! - 3xx: Receipt binding errors
//! - 4xx: Authority / signature errors
//! - 5xx: Platform errors
//! - 9xx: General / internal errors
//!
//! Every error also carries a stable snake_case [`error_code`] so audit
//! records and log searches use a controlled vocabulary
//! (`cross_run_replay`, `advisory_rejected`, ...).
//!
//! [`error_code`]: AuthmintError::error_code

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{AuditStatus, Mode, OperationKind, ReceiptId, RunId};

/// Central error enum for all AuthMint operations.
#[derive(Debug, Error)]
pub enum AuthmintError {
    // =================================================================
    // Mode Errors (1xx)
    // =================================================================
    /// The mode string is not exactly `prod` or `dry_run`.
    #[error("AM_ERR_100: Invalid mode '{mode}': must be exactly 'prod' or 'dry_run'")]
    ModeViolation { mode: String },

    /// An operation was attempted while the executor is not in prod mode.
    #[error("AM_ERR_101: {kind} requires mode 'prod'; executor mode is '{mode}'")]
    ModeNotProd { kind: OperationKind, mode: Mode },

    // =================================================================
    // Policy Errors (2xx)
    // =================================================================
    /// No ruleset exists for the requested operation kind.
    #[error("AM_ERR_200: No policy defined for operation kind '{kind}'")]
    NoPolicyForKind { kind: OperationKind },

    /// The repository matched none of the allowlist patterns.
    #[error("AM_ERR_201: Repository '{repository}' not in allowed list")]
    RepositoryNotAllowed { repository: String },

    /// A required evidence predicate evaluated false.
    #[error("AM_ERR_202: Evidence requirement not met: {requirement}")]
    EvidenceRequirementNotMet { requirement: String },

    /// A policy predicate could not be parsed.
    #[error("AM_ERR_203: Invalid evidence predicate '{predicate}'")]
    InvalidPredicate { predicate: String },

    // =================================================================
    // Receipt Binding Errors (3xx)
    // =================================================================
    /// No receipt was supplied. Fail-closed: no receipt, no action.
    #[error("AM_ERR_300: No receipt provided (required for authorization)")]
    ReceiptMissing,

    /// The receipt is bound to a different run.
    #[error("AM_ERR_301: Receipt run_id '{actual}' does not match expected '{expected}' (cross-run replay)")]
    CrossRunReplay { expected: RunId, actual: RunId },

    /// The receipt is bound to a different operation kind.
    #[error("AM_ERR_302: Receipt operation_kind '{actual}' does not match expected '{expected}' (cross-operation replay)")]
    CrossOperationReplay {
        expected: OperationKind,
        actual: OperationKind,
    },

    /// The receipt is advisory. Advisory receipts never execute.
    #[error("AM_ERR_303: Receipt {receipt_id} is advisory (enforceable=false)")]
    AdvisoryRejected { receipt_id: ReceiptId },

    /// The receipt was presented again after being consumed.
    #[error("AM_ERR_304: Receipt {receipt_id} already consumed at {consumed_at} (replay attempt)")]
    AlreadyConsumedReplay {
        receipt_id: ReceiptId,
        consumed_at: String,
    },

    /// The receipt is past its expiry window.
    #[error("AM_ERR_305: Receipt {receipt_id} expired at {expires_at}")]
    ReceiptExpired {
        receipt_id: ReceiptId,
        expires_at: DateTime<Utc>,
    },

    /// The receipt is older than the hard staleness bound, regardless of
    /// its expiry field.
    #[error("AM_ERR_306: Receipt {receipt_id} is stale (issued {age_hours}h ago, max {max_hours}h)")]
    ReceiptStale {
        receipt_id: ReceiptId,
        age_hours: i64,
        max_hours: i64,
    },

    // =================================================================
    // Authority / Signature Errors (4xx)
    // =================================================================
    /// The HMAC signature did not verify under the authority's secret.
    #[error("AM_ERR_400: Receipt {receipt_id} has an invalid signature (not issued by this authority)")]
    SignatureInvalid { receipt_id: ReceiptId },

    /// The receipt is absent from the issuance ledger.
    #[error("AM_ERR_401: Receipt {receipt_id} was not issued by this authority instance")]
    UnknownReceipt { receipt_id: ReceiptId },

    /// The ledger entry is already in terminal state `consumed`.
    #[error("AM_ERR_402: Receipt {receipt_id} already consumed at {consumed_at}")]
    AlreadyConsumed {
        receipt_id: ReceiptId,
        consumed_at: String,
    },

    /// The ledger and the observed execution state disagree. Operator
    /// escalation path; never silently reported as success.
    #[error("AM_ERR_403: Ledger inconsistency: {reason}")]
    LedgerInconsistency { reason: String },

    /// A proof step's HMAC signature did not verify.
    #[error("AM_ERR_404: Proof step '{step_id}' failed signature verification")]
    ProofStepInvalid { step_id: String },

    /// The proof chain hash does not match its steps.
    #[error("AM_ERR_405: Proof chain hash mismatch: expected {expected}, got {actual}")]
    ProofChainMismatch { expected: String, actual: String },

    // =================================================================
    // Platform Errors (5xx)
    // =================================================================
    /// The platform client failed. Retryability is decided by `code`.
    #[error("AM_ERR_500: Platform error '{code}': {message}")]
    Platform { code: String, message: String },

    /// The local sliding-window rate budget is exhausted.
    #[error("AM_ERR_501: Rate limit exhausted: {limit} requests in the past hour")]
    RateLimitExhausted { limit: u32 },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("AM_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("AM_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (missing env var, bad policy file, etc.).
    #[error("AM_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// I/O error (policy file, ledger export).
    #[error("AM_ERR_903: I/O error: {0}")]
    Io(String),

    /// A repository string was not in `owner/name` form.
    #[error("AM_ERR_904: Invalid repository '{value}': expected 'owner/name'")]
    InvalidRepository { value: String },
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, AuthmintError>;

impl AuthmintError {
    /// Stable snake_case code for audit records and log searches.
    #[must_use]
    pub fn error_code(&self) -> String {
        match self {
            Self::ModeViolation { .. } | Self::ModeNotProd { .. } => "mode_violation".into(),
            Self::NoPolicyForKind { .. } => "no_policy_for_kind".into(),
            Self::RepositoryNotAllowed { .. } => "repository_not_allowed".into(),
            Self::EvidenceRequirementNotMet { .. } => "evidence_requirement_not_met".into(),
            Self::InvalidPredicate { .. } => "invalid_predicate".into(),
            Self::ReceiptMissing => "missing_receipt".into(),
            Self::CrossRunReplay { .. } => "cross_run_replay".into(),
            Self::CrossOperationReplay { .. } => "cross_operation_replay".into(),
            Self::AdvisoryRejected { .. } => "advisory_rejected".into(),
            Self::AlreadyConsumedReplay { .. } => "already_consumed_replay".into(),
            Self::ReceiptExpired { .. } => "expired".into(),
            Self::ReceiptStale { .. } => "stale".into(),
            Self::SignatureInvalid { .. } => "signature_invalid".into(),
            Self::UnknownReceipt { .. } => "unknown_receipt".into(),
            Self::AlreadyConsumed { .. } => "already_consumed".into(),
            Self::LedgerInconsistency { .. } => "consume_after_success".into(),
            Self::ProofStepInvalid { .. } => "proof_step_invalid".into(),
            Self::ProofChainMismatch { .. } => "proof_chain_mismatch".into(),
            Self::Platform { code, .. } => code.clone(),
            Self::RateLimitExhausted { .. } => "rate_limit_exhausted".into(),
            Self::Internal(_) => "internal".into(),
            Self::Serialization(_) => "serialization".into(),
            Self::Configuration(_) => "configuration".into(),
            Self::Io(_) => "io".into(),
            Self::InvalidRepository { .. } => "invalid_repository".into(),
        }
    }

    /// The audit status this error maps to when it terminates an executor
    /// operation. Each taxonomy kind maps to exactly one status.
    #[must_use]
    pub fn audit_status(&self) -> AuditStatus {
        match self {
            Self::ModeViolation { .. } | Self::ModeNotProd { .. } => AuditStatus::RejectedByMode,
            Self::NoPolicyForKind { .. }
            | Self::RepositoryNotAllowed { .. }
            | Self::EvidenceRequirementNotMet { .. }
            | Self::InvalidPredicate { .. }
            | Self::ReceiptMissing
            | Self::CrossRunReplay { .. }
            | Self::CrossOperationReplay { .. }
            | Self::AdvisoryRejected { .. }
            | Self::AlreadyConsumedReplay { .. }
            | Self::ReceiptExpired { .. }
            | Self::ReceiptStale { .. }
            | Self::SignatureInvalid { .. }
            | Self::UnknownReceipt { .. }
            | Self::AlreadyConsumed { .. } => AuditStatus::RejectedByAuth,
            Self::LedgerInconsistency { .. }
            | Self::ProofStepInvalid { .. }
            | Self::ProofChainMismatch { .. }
            | Self::Platform { .. }
            | Self::RateLimitExhausted { .. }
            | Self::Internal(_)
            | Self::Serialization(_)
            | Self::Configuration(_)
            | Self::Io(_)
            | Self::InvalidRepository { .. } => AuditStatus::Failed,
        }
    }
}

impl From<std::io::Error> for AuthmintError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AuthmintError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
