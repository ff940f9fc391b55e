//! Identifiers used throughout AuthMint.
//!
//! `RunId` is an opaque caller-supplied handle. `ReceiptId` and
//! `OperationId` are content-derived SHA-256 prefixes so that independently
//! running authorities never collide and the id itself witnesses its inputs.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{AuthmintError, OperationKind, canonical};

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// Opaque identifier binding a receipt to one plan run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// ReceiptId
// ---------------------------------------------------------------------------

/// Unique handle for a receipt: `receipt-` + first 16 hex chars of
/// `SHA-256(run_id ":" operation_kind ":" mint_instant)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptId(pub String);

impl ReceiptId {
    /// Derive the id from the receipt's binding and mint instant.
    #[must_use]
    pub fn derive(run_id: &RunId, kind: OperationKind, minted_at: DateTime<Utc>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(run_id.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(kind.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(canonical::iso8601::format(&minted_at).as_bytes());
        let digest = hex::encode(hasher.finalize());
        Self(format!("receipt-{}", &digest[..16]))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReceiptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ReceiptId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// OperationId
// ---------------------------------------------------------------------------

/// Identifier for one executor invocation, present on every audit record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(pub String);

impl OperationId {
    /// Derive an id for an executor invocation started at `started_at`.
    #[must_use]
    pub fn derive(kind: OperationKind, run_id: &RunId, started_at: DateTime<Utc>) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(run_id.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(canonical::iso8601::format(&started_at).as_bytes());
        let digest = hex::encode(hasher.finalize());
        Self(format!("{}-{}", kind.operation_id_prefix(), &digest[..8]))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OperationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// RepoSlug
// ---------------------------------------------------------------------------

/// A repository in strict `owner/name` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl RepoSlug {
    /// Parse `owner/name`. Exactly one separator, both halves non-empty.
    ///
    /// # Errors
    /// Returns [`AuthmintError::InvalidRepository`] otherwise.
    pub fn parse(value: &str) -> crate::Result<Self> {
        match value.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(AuthmintError::InvalidRepository {
                value: value.to_string(),
            }),
        }
    }

    /// The full `owner/name` form, as used for policy matching and audit.
    #[must_use]
    pub fn full(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl std::str::FromStr for RepoSlug {
    type Err = AuthmintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RepoSlug {
    type Error = AuthmintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RepoSlug> for String {
    fn from(slug: RepoSlug) -> Self {
        slug.full()
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
