//! A single signed step in a proof chain.

use authmint_types::{SigningSecret, canonical};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA-256 of a message, hex-encoded.
pub(crate) fn hmac_hex(secret: &SigningSecret, message: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// One step in the authorization chain: who did what, with hashed inputs
/// and outputs, and an HMAC proving the step came from the chain's owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofStep {
    pub step_id: String,
    #[serde(with = "authmint_types::canonical::iso8601")]
    pub timestamp: DateTime<Utc>,
    /// The component that performed the step (planner, authority,
    /// executor, ledger).
    pub actor: String,
    pub description: String,
    /// SHA-256 over the canonicalized input data.
    pub input_hash: String,
    /// SHA-256 over the canonicalized output data.
    pub output_hash: String,
    /// `HMAC(secret, "step_id:timestamp:actor:input_hash:output_hash")`.
    pub signature: String,
}

impl ProofStep {
    /// The exact byte string the signature covers.
    #[must_use]
    pub fn signing_message(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.step_id,
            canonical::iso8601::format(&self.timestamp),
            self.actor,
            self.input_hash,
            self.output_hash
        )
    }

    /// Verify this step's signature in constant time.
    #[must_use]
    pub fn verify(&self, secret: &SigningSecret) -> bool {
        let expected = hmac_hex(secret, &self.signing_message());
        expected.as_bytes().ct_eq(self.signature.as_bytes()).into()
    }
}
