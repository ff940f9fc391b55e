//! Executor-side audit records.
//!
//! Every terminal transition of an executor operation — success, failure,
//! or rejection — produces exactly one [`AuditRecord`]. The shape is
//! constant: rejections reference a `receipt_id` too (the `"NONE"` sentinel
//! when no receipt was supplied) so audit queries never special-case.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Mode, OperationId, OperationKind, RepoSlug, RunId};

/// Terminal status of one executor operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// The platform call succeeded and the receipt was consumed.
    Success,
    /// The platform call failed, or the ledger became inconsistent.
    Failed,
    /// The binding validator or the authority refused the receipt.
    RejectedByAuth,
    /// The executor is not in prod mode.
    RejectedByMode,
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Failed => f.write_str("failed"),
            Self::RejectedByAuth => f.write_str("rejected_by_auth"),
            Self::RejectedByMode => f.write_str("rejected_by_mode"),
        }
    }
}

/// Complete record of one executor operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub operation_id: OperationId,
    pub run_id: RunId,
    pub operation_kind: OperationKind,
    /// The receipt presented, or `"NONE"` when none was supplied.
    pub receipt_id: String,
    pub repository: RepoSlug,
    pub status: AuditStatus,
    pub mode: Mode,
    #[serde(with = "crate::canonical::iso8601")]
    pub started_at: DateTime<Utc>,
    #[serde(with = "crate::canonical::iso8601")]
    pub completed_at: DateTime<Utc>,
    /// Operation result on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Controlled-vocabulary error code on failure or rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Raw platform response, when the platform was reached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_response: Option<Value>,
    /// Retries performed before the terminal transition.
    #[serde(default)]
    pub retry_count: u32,
}
