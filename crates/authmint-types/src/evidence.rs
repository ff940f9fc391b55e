//! Authorization evidence — the record of how a decision was reached.
//!
//! Evidence is hashed (canonical JSON, SHA-256) into the receipt it
//! supports, so tampering with the evidence after minting is detectable
//! through the receipt signature.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Result, canonical};

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationDecision {
    Approved,
    Denied,
    Deferred,
}

impl fmt::Display for AuthorizationDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approved => f.write_str("approved"),
            Self::Denied => f.write_str("denied"),
            Self::Deferred => f.write_str("deferred"),
        }
    }
}

/// Evidence supporting one authorization decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationEvidence {
    /// When the policy check ran.
    #[serde(with = "crate::canonical::iso8601")]
    pub checked_at: DateTime<Utc>,
    /// The policy document the check ran against.
    pub policy_id: String,
    /// The decision reached.
    pub decision: AuthorizationDecision,
    /// Human-readable reason; on denial this carries the policy failure.
    pub reason: String,
    /// Who approved the operation.
    #[serde(default)]
    pub approvers: Vec<String>,
    /// Named boolean checks that were evaluated.
    #[serde(default)]
    pub checks: BTreeMap<String, bool>,
}

impl AuthorizationEvidence {
    /// Evidence synthesized when the caller supplied none: the decision is
    /// deferred and the policy engine will settle it at mint time.
    #[must_use]
    pub fn deferred(checked_at: DateTime<Utc>, policy_id: impl Into<String>) -> Self {
        Self {
            checked_at,
            policy_id: policy_id.into(),
            decision: AuthorizationDecision::Deferred,
            reason: "no evidence provided".to_string(),
            approvers: Vec::new(),
            checks: BTreeMap::new(),
        }
    }

    /// Number of distinct approvers; the value of the `approval_count`
    /// predicate key.
    #[must_use]
    pub fn approval_count(&self) -> usize {
        self.approvers.len()
    }

    /// SHA-256 over the canonical rendering, bound into the receipt.
    ///
    /// # Errors
    /// Returns a serialization error if the evidence cannot be rendered.
    pub fn hash(&self) -> Result<String> {
        canonical::hash_of(self)
    }
}
