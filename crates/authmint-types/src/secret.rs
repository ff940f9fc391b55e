//! Secret material: the authority's HMAC key and the platform token.
//!
//! Both wrappers zeroize their contents on drop, redact themselves from
//! `Debug` output, and deliberately do not implement `Serialize` — secrets
//! never appear in receipts, audit records, or logs.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// The Receipt Authority's HMAC-SHA-256 signing key.
///
/// Keys of at least 32 bytes are recommended; shorter keys weaken the MAC.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SigningSecret(String);

impl SigningSecret {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

impl From<&str> for SigningSecret {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Access token for the hosting-platform client. Required in prod mode.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PlatformToken(String);

impl PlatformToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for PlatformToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PlatformToken(<redacted>)")
    }
}

impl From<&str> for PlatformToken {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
