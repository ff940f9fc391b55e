//! # authmint-types
//!
//! Shared types, errors, and configuration for the **AuthMint**
//! authorization kernel.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`RunId`], [`ReceiptId`], [`OperationId`], [`RepoSlug`]
//! - **Operation model**: [`OperationKind`], [`OperationPayload`], [`OperationRequest`]
//! - **Receipt model**: [`Receipt`], [`ReceiptConsumer`]
//! - **Evidence model**: [`AuthorizationEvidence`], [`AuthorizationDecision`]
//! - **Policy model**: [`AuthorizationPolicy`], [`RuleSet`], [`EvidencePredicate`]
//! - **Plan model**: [`PublicationPlan`], [`OperationSpec`]
//! - **Audit model**: [`AuditRecord`], [`AuditStatus`]
//! - **Mode**: [`Mode`] (strict `prod` / `dry_run`)
//! - **Canonical serialization**: [`canonical`] (sorted keys, `Z` timestamps)
//! - **Clock**: [`Clock`], [`SystemClock`]
//! - **Secrets**: [`SigningSecret`], [`PlatformToken`] (zeroized on drop)
//! - **Errors**: [`AuthmintError`] with `AM_ERR_` prefix codes
//! - **Configuration**: [`KernelConfig`]
//! - **Constants**: system-wide limits and defaults

pub mod audit;
pub mod canonical;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod evidence;
pub mod ids;
pub mod mode;
pub mod operation;
pub mod plan;
pub mod policy;
pub mod receipt;
pub mod secret;

// Re-export all primary types at crate root for ergonomic imports:
//   use authmint_types::{Receipt, OperationKind, Mode, ...};

pub use audit::*;
pub use clock::*;
pub use config::*;
pub use error::*;
pub use evidence::*;
pub use ids::*;
pub use mode::*;
pub use operation::*;
pub use plan::*;
pub use policy::*;
pub use receipt::*;
pub use secret::*;

// Constants are accessed via `authmint_types::constants::FOO`
// (not re-exported to avoid name collisions).
