//! # authmint-proof
//!
//! **Proof Chain Generator**: an append-only, content-addressed record of
//! the steps in one authorization flow (plan → mint → execute → ledger),
//! tamper-evident end to end.
//!
//! Each [`ProofStep`] is independently HMAC-signed, so altering one step
//! invalidates that step's signature even if the chain hash is recomputed.
//! The chain hash covers the steps in order, so reordering invalidates the
//! chain even though every individual signature still verifies.
//!
//! Recording never fails; verification is a separate, fallible API.

pub mod chain;
pub mod step;

pub use chain::{ProofChain, ProofChainGenerator};
pub use step::ProofStep;
