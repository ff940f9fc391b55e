//! # authmint-executor
//!
//! **Receipt-Enforcing Executor**: performs side effects against the
//! hosting platform, and refuses to act without a valid receipt.
//!
//! ## Unified state machine
//!
//! Every entry point runs the same gauntlet:
//!
//! ```text
//! Pending → ModeChecked → BindingChecked → RateChecked → PlatformCall{n}
//!          │              │                │              ├─ Success → Consumed → Audited[success]
//!          │              │                │              ├─ Retryable n<MAX → PlatformCall{n+1}
//!          │              │                │              └─ Fatal → Audited[failed]
//!          │              │                └─ RateLimited → Audited[failed]
//!          │              └─ BindingFailed → Audited[rejected_by_auth]
//!          └─ ModeNotProd → Audited[rejected_by_mode]
//! ```
//!
//! Fail-closed: anything other than `prod` mode plus an enforceable,
//! correctly bound, unconsumed, in-window receipt is a rejection, and every
//! terminal transition writes exactly one audit record.

pub mod binding;
pub mod executor;
pub mod platform;
pub mod rate_limit;
pub mod recovery;

pub use binding::BindingValidator;
pub use executor::Executor;
pub use platform::{
    BranchRef, PlatformClient, PlatformError, PlatformResult, PullRequestResponse,
    ReleaseResponse, SimulatedPlatform, TagObject, TagResponse, Tagger,
};
pub use rate_limit::RateLimitManager;
pub use recovery::RecoveryStrategy;

#[cfg(any(test, feature = "test-helpers"))]
pub use platform::ScriptedPlatform;
