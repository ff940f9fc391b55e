//! Operation model: the closed set of side effects the kernel mediates.
//!
//! `OperationKind` is a closed sum type — receipts embed the snake_case tag,
//! so adding a variant is a breaking change and a compile-time obligation to
//! update every match site (the executor exposes one entry point per
//! variant, the bridge dispatches exhaustively).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{RepoSlug, RunId};

/// The operations that require an enforceable receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Publish a release on the hosting platform.
    PublishRelease,
    /// Create an annotated tag.
    TagRepo,
    /// Open a pull request.
    OpenPr,
}

impl OperationKind {
    /// The wire tag embedded in receipts and policy documents.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PublishRelease => "publish_release",
            Self::TagRepo => "tag_repo",
            Self::OpenPr => "open_pr",
        }
    }

    /// Prefix used when deriving operation ids for audit records.
    #[must_use]
    pub fn operation_id_prefix(&self) -> &'static str {
        match self {
            Self::PublishRelease => "pub-release",
            Self::TagRepo => "tag-repo",
            Self::OpenPr => "open-pr",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Per-kind payloads
// ---------------------------------------------------------------------------

/// Parameters for `publish_release`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseSpec {
    pub tag_name: String,
    pub release_name: String,
    pub body: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
}

/// Parameters for `tag_repo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSpec {
    pub tag_name: String,
    pub target_sha: String,
    pub message: String,
}

/// Parameters for `open_pr`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrSpec {
    pub title: String,
    pub body: String,
    pub head_branch: String,
    #[serde(default = "PrSpec::default_base")]
    pub base_branch: String,
}

impl PrSpec {
    fn default_base() -> String {
        "main".to_string()
    }
}

/// Structured parameters for one operation. The variant IS the operation
/// kind — a payload can never disagree with its tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation_kind", rename_all = "snake_case")]
pub enum OperationPayload {
    PublishRelease(ReleaseSpec),
    TagRepo(TagSpec),
    OpenPr(PrSpec),
}

impl OperationPayload {
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::PublishRelease(_) => OperationKind::PublishRelease,
            Self::TagRepo(_) => OperationKind::TagRepo,
            Self::OpenPr(_) => OperationKind::OpenPr,
        }
    }
}

// ---------------------------------------------------------------------------
// OperationRequest
// ---------------------------------------------------------------------------

/// One proposed operation, as submitted to the Receipt Authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    /// The plan run this operation belongs to.
    pub run_id: RunId,
    /// Target repository in `owner/name` form.
    pub repository: RepoSlug,
    /// Operation parameters; the variant determines the kind.
    pub payload: OperationPayload,
    /// Caller-supplied attestation (who requested, why, approvals).
    #[serde(default)]
    pub evidence: BTreeMap<String, Value>,
}

impl OperationRequest {
    #[must_use]
    pub fn operation_kind(&self) -> OperationKind {
        self.payload.kind()
    }
}
