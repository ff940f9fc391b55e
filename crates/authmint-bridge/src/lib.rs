//! # authmint-bridge
//!
//! The composition layer between the Receipt Authority and the executor —
//! the only component that knows both sides.
//!
//! Given a [`authmint_types::PublicationPlan`], the bridge mints one
//! receipt per operation, partitions the plan into authorized and blocked
//! operations, and walks the authorized receipts through the matching
//! executor entry point with an exhaustive dispatch on
//! [`authmint_types::OperationKind`].

pub mod bridge;

pub use bridge::{AuthorityBridge, BlockedOperation, PlanAuthorization};
