//! Publication plans — the planner's output and the bridge's input.
//!
//! A plan created in `dry_run` mode carries `blocked_by_mode = true` on
//! every operation; those entries are reviewed by the authority but never
//! presented to the executor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Mode, OperationId, OperationKind, OperationPayload, RepoSlug, RunId};

/// One proposed operation inside a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSpec {
    /// Planner-assigned identifier, the key receipts are returned under.
    pub operation_id: OperationId,
    /// Target repository.
    pub repository: RepoSlug,
    /// Operation parameters; the variant determines the kind.
    #[serde(flatten)]
    pub payload: OperationPayload,
    /// Set when the plan was produced in `dry_run` mode.
    #[serde(default)]
    pub blocked_by_mode: bool,
    /// Why the operation is blocked, when it is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_reason: Option<String>,
}

impl OperationSpec {
    #[must_use]
    pub fn operation_kind(&self) -> OperationKind {
        self.payload.kind()
    }
}

/// A complete plan for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationPlan {
    pub run_id: RunId,
    pub mode: Mode,
    #[serde(with = "crate::canonical::iso8601")]
    pub created_at: DateTime<Utc>,
    pub operations: Vec<OperationSpec>,
}

impl PublicationPlan {
    /// Operations eligible for execution (not blocked by mode).
    pub fn executable_operations(&self) -> impl Iterator<Item = &OperationSpec> {
        self.operations.iter().filter(|op| !op.blocked_by_mode)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use crate::{PrSpec, ReleaseSpec};

    use super::*;

    fn plan() -> PublicationPlan {
        PublicationPlan {
            run_id: RunId::from("r-1"),
            mode: Mode::DryRun,
            created_at: Utc.with_ymd_and_hms(2024, 2, 10, 12, 0, 0).unwrap(),
            operations: vec![
                OperationSpec {
                    operation_id: OperationId::from("op-release-v1"),
                    repository: RepoSlug::parse("omega/app").unwrap(),
                    payload: OperationPayload::PublishRelease(ReleaseSpec {
                        tag_name: "v0.3.0".into(),
                        release_name: "Release".into(),
                        body: "notes".into(),
                        draft: false,
                        prerelease: false,
                    }),
                    blocked_by_mode: true,
                    blocked_reason: Some("Operation blocked: mode=dry_run".into()),
                },
                OperationSpec {
                    operation_id: OperationId::from("op-pr-1"),
                    repository: RepoSlug::parse("omega/app").unwrap(),
                    payload: OperationPayload::OpenPr(PrSpec {
                        title: "t".into(),
                        body: "b".into(),
                        head_branch: "feature/x".into(),
                        base_branch: "main".into(),
                    }),
                    blocked_by_mode: false,
                    blocked_reason: None,
                },
            ],
        }
    }

    #[test]
    fn executable_operations_skip_blocked() {
        let plan = plan();
        let executable: Vec<_> = plan.executable_operations().collect();
        assert_eq!(executable.len(), 1);
        assert_eq!(executable[0].operation_id, OperationId::from("op-pr-1"));
    }

    #[test]
    fn spec_kind_comes_from_payload() {
        let plan = plan();
        assert_eq!(
            plan.operations[0].operation_kind(),
            OperationKind::PublishRelease
        );
    }

    #[test]
    fn plan_serde_roundtrip() {
        let plan = plan();
        let json = serde_json::to_string(&plan).unwrap();
        let back: PublicationPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(plan, back);
    }

    #[test]
    fn operation_kind_flattens_into_spec() {
        let plan = plan();
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["operations"][0]["operation_kind"], "publish_release");
        assert_eq!(json["mode"], "dry_run");
    }
}
