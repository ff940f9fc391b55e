//! Proof chain accumulation and finalization.

use std::sync::Arc;

use authmint_types::{
    AuthmintError, Clock, Result, SigningSecret, SystemClock, canonical,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::step::{ProofStep, hmac_hex};

/// Accumulates signed proof steps in insertion order.
///
/// Recording is infallible; this component never raises.
pub struct ProofChainGenerator {
    secret: SigningSecret,
    clock: Arc<dyn Clock>,
    steps: Vec<ProofStep>,
}

impl ProofChainGenerator {
    #[must_use]
    pub fn new(secret: SigningSecret) -> Self {
        Self::with_clock(secret, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(secret: SigningSecret, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret,
            clock,
            steps: Vec::new(),
        }
    }

    /// Record one step: hash the input and output, stamp, sign, append.
    pub fn record_step(
        &mut self,
        step_id: impl Into<String>,
        actor: impl Into<String>,
        description: impl Into<String>,
        input: &Value,
        output: &Value,
    ) -> &ProofStep {
        let mut step = ProofStep {
            step_id: step_id.into(),
            timestamp: self.clock.now(),
            actor: actor.into(),
            description: description.into(),
            input_hash: canonical::hash_value(input),
            output_hash: canonical::hash_value(output),
            signature: String::new(),
        };
        step.signature = hmac_hex(&self.secret, &step.signing_message());
        self.steps.push(step);
        self.steps.last().expect("step was just pushed")
    }

    /// Steps recorded so far, in insertion order.
    #[must_use]
    pub fn steps(&self) -> &[ProofStep] {
        &self.steps
    }

    /// Seal the chain: hash the ordered step list and wrap it with its
    /// content-derived proof id.
    #[must_use]
    pub fn finalize(&self) -> ProofChain {
        let chain_hash = chain_hash(&self.steps);
        ProofChain {
            proof_id: format!("proof-{}", &chain_hash[..16]),
            generated_at: self.clock.now(),
            total_steps: self.steps.len(),
            chain_hash,
            steps: self.steps.clone(),
        }
    }
}

/// SHA-256 over the canonical rendering of the ordered step list.
fn chain_hash(steps: &[ProofStep]) -> String {
    let value = serde_json::to_value(steps).expect("proof steps always serialize");
    canonical::hash_value(&value)
}

/// A sealed, verifiable proof chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofChain {
    /// `proof-` + first 16 hex chars of the chain hash.
    pub proof_id: String,
    #[serde(with = "authmint_types::canonical::iso8601")]
    pub generated_at: DateTime<Utc>,
    pub total_steps: usize,
    pub chain_hash: String,
    pub steps: Vec<ProofStep>,
}

impl ProofChain {
    /// Verify every step signature and the chain hash.
    ///
    /// # Errors
    /// - [`AuthmintError::ProofStepInvalid`] naming the first bad step
    /// - [`AuthmintError::ProofChainMismatch`] when steps were reordered,
    ///   added, or removed after sealing
    pub fn verify(&self, secret: &SigningSecret) -> Result<()> {
        for step in &self.steps {
            if !step.verify(secret) {
                return Err(AuthmintError::ProofStepInvalid {
                    step_id: step.step_id.clone(),
                });
            }
        }
        let actual = chain_hash(&self.steps);
        if actual != self.chain_hash {
            return Err(AuthmintError::ProofChainMismatch {
                expected: self.chain_hash.clone(),
                actual,
            });
        }
        Ok(())
    }
}
