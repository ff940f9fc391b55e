//! # authmint-authority
//!
//! **Receipt Authority**: the single minting point for enforceable
//! receipts.
//!
//! ## Architecture
//!
//! The authority receives an operation request and:
//! 1. Runs the declarative [`PolicyEngine`] (first failure wins)
//! 2. Mints a signed [`authmint_types::Receipt`] — enforceable on
//!    approval, advisory on denial (denial never raises)
//! 3. Appends an `open` entry to the [`IssuanceLedger`]
//! 4. Later verifies and consumes the receipt exactly once — the
//!    one-time-use linearization point for the whole kernel
//!
//! The ledger is the sole owner of receipt terminal state. The signing
//! secret never leaves this crate's [`ReceiptAuthority`].

pub mod authority;
pub mod ledger;
pub mod policy_engine;

pub use authority::ReceiptAuthority;
pub use ledger::{IssuanceLedger, LedgerEntry, TerminalState};
pub use policy_engine::PolicyEngine;
