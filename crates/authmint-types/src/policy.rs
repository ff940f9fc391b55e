//! Authorization policy documents.
//!
//! A policy maps each operation kind to a [`RuleSet`]. Kinds with no entry
//! are denied (`no_policy_for_kind`) — the rules are an allowlist, not a
//! denylist. Rule evaluation itself lives in the authority crate; this
//! module holds the declarative data plus the pure predicate logic.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{AuthmintError, AuthorizationEvidence, OperationKind, Result};

/// Declarative policy governing when the authority issues enforceable
/// receipts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationPolicy {
    pub policy_id: String,
    pub version: String,
    /// Per-kind rules. Absent kind ⇒ deny.
    pub rules: BTreeMap<OperationKind, RuleSet>,
}

impl AuthorizationPolicy {
    /// Parse a policy document from JSON.
    ///
    /// # Errors
    /// Returns a serialization error for malformed documents.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    #[must_use]
    pub fn rule_for(&self, kind: OperationKind) -> Option<&RuleSet> {
        self.rules.get(&kind)
    }
}

/// Rules for one operation kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleSet {
    /// Glob patterns the repository must match (`*` wildcard, `?` any
    /// non-separator character). Absent ⇒ any repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_repositories: Option<Vec<String>>,
    /// Evidence predicates of the form `key OP value`, all of which must
    /// hold. Absent ⇒ no evidence requirements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_evidence: Option<Vec<String>>,
    /// Advisory rate limit. Documented, not enforced by the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitRule>,
}

/// Advisory rate limit attached to a ruleset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    pub per_hour: u32,
}

// ---------------------------------------------------------------------------
// Evidence predicates
// ---------------------------------------------------------------------------

/// Comparison operator in an evidence predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateOp {
    Ge,
    Le,
    Eq,
}

impl fmt::Display for PredicateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ge => f.write_str(">="),
            Self::Le => f.write_str("<="),
            Self::Eq => f.write_str("=="),
        }
    }
}

/// A parsed `key OP value` requirement, e.g. `approval_count >= 2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidencePredicate {
    pub key: String,
    pub op: PredicateOp,
    pub value: i64,
}

impl EvidencePredicate {
    /// Parse a predicate string.
    ///
    /// # Errors
    /// Returns [`AuthmintError::InvalidPredicate`] for anything that is not
    /// `key OP integer` with OP ∈ {`>=`, `<=`, `==`}.
    pub fn parse(raw: &str) -> Result<Self> {
        // ">=" and "<=" must be probed before "==" would ever match inside
        // them; none of the three overlaps, so first-found wins.
        let (op_str, op) = [(">=", PredicateOp::Ge), ("<=", PredicateOp::Le), ("==", PredicateOp::Eq)]
            .into_iter()
            .find(|(needle, _)| raw.contains(needle))
            .ok_or_else(|| AuthmintError::InvalidPredicate {
                predicate: raw.to_string(),
            })?;

        let (key, value) = raw.split_once(op_str).ok_or_else(|| AuthmintError::InvalidPredicate {
            predicate: raw.to_string(),
        })?;
        let key = key.trim();
        let value: i64 = value
            .trim()
            .parse()
            .map_err(|_| AuthmintError::InvalidPredicate {
                predicate: raw.to_string(),
            })?;
        if key.is_empty() {
            return Err(AuthmintError::InvalidPredicate {
                predicate: raw.to_string(),
            });
        }
        Ok(Self {
            key: key.to_string(),
            op,
            value,
        })
    }

    /// Evaluate against evidence. `approval_count` resolves to the number
    /// of approvers; any other key resolves through the boolean `checks`
    /// map (true=1, false=0). Unknown keys fail — deny on unknown.
    #[must_use]
    pub fn evaluate(&self, evidence: &AuthorizationEvidence) -> bool {
        let actual: i64 = match self.key.as_str() {
            "approval_count" => {
                i64::try_from(evidence.approval_count()).unwrap_or(i64::MAX)
            }
            other => match evidence.checks.get(other) {
                Some(flag) => i64::from(*flag),
                None => return false,
            },
        };
        match self.op {
            PredicateOp::Ge => actual >= self.value,
            PredicateOp::Le => actual <= self.value,
            PredicateOp::Eq => actual == self.value,
        }
    }
}

impl fmt::Display for EvidencePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.key, self.op, self.value)
    }
}
