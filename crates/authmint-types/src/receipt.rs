//! # Receipt — the single-use authorization capability
//!
//! A `Receipt` is the only artifact that carries authority from the Receipt
//! Authority to the executor. It is minted once, signed with the authority's
//! HMAC secret, and consumed at most once.
//!
//! ## State Machine
//!
//! ```text
//!   ┌────────┐  verify_and_consume   ┌──────────┐
//!   │  OPEN  ├──────────────────────▶│ CONSUMED │
//!   └───┬────┘                       └──────────┘
//!       │ expiry sweep
//!       ▼
//!   ┌─────────┐
//!   │ EXPIRED │
//!   └─────────┘
//! ```
//!
//! ## Security Properties
//!
//! - **Single mint point**: only the Receipt Authority signs receipts
//! - **Single-use**: OPEN → CONSUMED is irreversible in the issuance ledger
//! - **Binding-bound**: tied to one `(run_id, operation_kind)` pair
//! - **Signature-bound**: HMAC-SHA-256 over the canonical payload
//! - **Time-bound**: 1-hour expiry plus a hard 24-hour staleness cutoff
//!
//! The issuance ledger is the source of truth for terminal state; the
//! `consumed` / `consumed_at` fields here mirror it for serialization and
//! audit, and are written exactly once, inside the authority's
//! `verify_and_consume`.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::{
    AuthmintError, OperationKind, ReceiptId, Result, RunId, SigningSecret, canonical, constants,
};

type HmacSha256 = Hmac<Sha256>;

/// A receipt proving the authority reviewed one operation.
///
/// `enforceable = true` means the policy engine approved at mint time and
/// the executor may act; `enforceable = false` is advisory — a signed record
/// of a denial, never executable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// Unique handle, content-derived at mint time.
    pub receipt_id: ReceiptId,
    /// The plan run this receipt is bound to.
    pub run_id: RunId,
    /// The operation variant this receipt is bound to.
    pub operation_kind: OperationKind,
    /// Whether the authority approved execution.
    pub enforceable: bool,
    /// When the receipt was minted.
    #[serde(with = "crate::canonical::iso8601")]
    pub issued_at: DateTime<Utc>,
    /// When the receipt stops being valid.
    #[serde(with = "crate::canonical::iso8601")]
    pub expires_at: DateTime<Utc>,
    /// The authority that minted this receipt.
    pub issuer: String,
    /// The executor this receipt is intended for.
    pub audience: String,
    /// SHA-256 over the canonicalized authorization evidence.
    pub evidence_hash: String,
    /// HMAC-SHA-256 over the canonical payload, hex. `None` until signed.
    pub signature: Option<String>,
    /// Mirror of the ledger terminal state. Written exactly once.
    #[serde(default)]
    pub consumed: bool,
    /// When the receipt was consumed, if it has been.
    #[serde(default, with = "crate::canonical::iso8601::opt")]
    pub consumed_at: Option<DateTime<Utc>>,
}

impl Receipt {
    /// Canonical signing payload: every field except `signature`,
    /// `consumed`, and `consumed_at`, rendered with sorted keys.
    ///
    /// Consumption state is deliberately outside the MAC — consuming a
    /// receipt must not invalidate its signature.
    #[must_use]
    pub fn signing_payload(&self) -> String {
        let payload = serde_json::json!({
            "receipt_id": self.receipt_id.as_str(),
            "run_id": self.run_id.as_str(),
            "operation_kind": self.operation_kind.as_str(),
            "enforceable": self.enforceable,
            "issued_at": canonical::iso8601::format(&self.issued_at),
            "expires_at": canonical::iso8601::format(&self.expires_at),
            "issuer": self.issuer,
            "audience": self.audience,
            "evidence_hash": self.evidence_hash,
        });
        canonical::canonical_json(&payload)
    }

    /// Sign the receipt with the authority's secret.
    ///
    /// # Errors
    /// Returns [`AuthmintError::Internal`] if the MAC cannot be keyed.
    pub fn sign(&mut self, secret: &SigningSecret) -> Result<()> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| AuthmintError::Internal("HMAC key rejected".to_string()))?;
        mac.update(self.signing_payload().as_bytes());
        self.signature = Some(hex::encode(mac.finalize().into_bytes()));
        Ok(())
    }

    /// Verify the signature under `secret` in constant time.
    ///
    /// Returns `false` for unsigned receipts and for any payload that was
    /// altered after signing.
    #[must_use]
    pub fn verify_signature(&self, secret: &SigningSecret) -> bool {
        let Some(signature) = &self.signature else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(self.signing_payload().as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());
        expected.as_bytes().ct_eq(signature.as_bytes()).into()
    }

    /// Whether the expiry window has closed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whether the receipt is past the hard staleness bound, regardless of
    /// `expires_at`. Defends against clock drift and hoarded receipts.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now - self.issued_at > Duration::hours(constants::MAX_RECEIPT_AGE_HOURS)
    }

    /// Age of the receipt at `now`.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.issued_at
    }

    /// Record consumption. Called exactly once, by the authority, after the
    /// ledger entry has transitioned.
    pub fn mark_consumed(&mut self, at: DateTime<Utc>) {
        self.consumed = true;
        self.consumed_at = Some(at);
    }
}

/// The consume seam between the executor and the authority.
///
/// The executor performs the side effect but never owns terminal state; it
/// hands the receipt back through this trait, and the implementation (the
/// Receipt Authority) verifies the signature and performs the one-time
/// ledger transition.
pub trait ReceiptConsumer: Send + Sync {
    /// Verify the receipt was issued here and mark it consumed.
    ///
    /// # Errors
    /// - [`AuthmintError::SignatureInvalid`] if the MAC does not verify
    /// - [`AuthmintError::UnknownReceipt`] if the ledger has no entry
    /// - [`AuthmintError::AlreadyConsumed`] if the entry is terminal
    fn verify_and_consume(&self, receipt: &mut Receipt) -> Result<DateTime<Utc>>;
}

/// Dummy receipt for tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Receipt {
    /// Unsigned receipt with a 1-hour window starting at `now`.
    pub fn dummy(run_id: &str, kind: OperationKind, enforceable: bool, now: DateTime<Utc>) -> Self {
        let run_id = RunId::from(run_id);
        Self {
            receipt_id: ReceiptId::derive(&run_id, kind, now),
            run_id,
            operation_kind: kind,
            enforceable,
            issued_at: now,
            expires_at: now + Duration::hours(1),
            issuer: constants::DEFAULT_ISSUER.to_string(),
            audience: constants::DEFAULT_AUDIENCE.to_string(),
            evidence_hash: canonical::sha256_hex(b"dummy-evidence"),
            signature: None,
            consumed: false,
            consumed_at: None,
        }
    }
}
