//! Environment-driven kernel configuration.
//!
//! Three variables wire a deployment together:
//!
//! | Variable | Meaning |
//! |---|---|
//! | `AUTHORITY_SECRET` | HMAC signing key (required, ≥32 bytes recommended) |
//! | `PLATFORM_TOKEN` | Hosting-platform token (required for prod mode) |
//! | `POLICY_FILE` | Path to the JSON policy document |
//!
//! `from_env` reads the process environment; `from_lookup` takes any
//! closure, so tests never mutate global state.

use std::path::PathBuf;

use crate::{AuthmintError, AuthorizationPolicy, Mode, PlatformToken, Result, SigningSecret};

/// Environment variable names.
pub const ENV_AUTHORITY_SECRET: &str = "AUTHORITY_SECRET";
pub const ENV_PLATFORM_TOKEN: &str = "PLATFORM_TOKEN";
pub const ENV_POLICY_FILE: &str = "POLICY_FILE";

/// Deployment configuration for one authority + executor pair.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    pub authority_secret: SigningSecret,
    pub platform_token: Option<PlatformToken>,
    pub policy_path: Option<PathBuf>,
}

impl KernelConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    /// Returns [`AuthmintError::Configuration`] if `AUTHORITY_SECRET` is
    /// missing or empty.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary lookup function.
    ///
    /// # Errors
    /// Returns [`AuthmintError::Configuration`] if `AUTHORITY_SECRET` is
    /// missing or empty.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let secret = lookup(ENV_AUTHORITY_SECRET)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                AuthmintError::Configuration(format!("{ENV_AUTHORITY_SECRET} is required"))
            })?;

        Ok(Self {
            authority_secret: SigningSecret::new(secret),
            platform_token: lookup(ENV_PLATFORM_TOKEN)
                .filter(|t| !t.is_empty())
                .map(PlatformToken::new),
            policy_path: lookup(ENV_POLICY_FILE).map(PathBuf::from),
        })
    }

    /// The platform token, which prod mode cannot run without.
    ///
    /// # Errors
    /// Returns [`AuthmintError::Configuration`] when `mode` is prod and no
    /// token is configured.
    pub fn platform_token_for(&self, mode: Mode) -> Result<Option<&PlatformToken>> {
        match (mode, &self.platform_token) {
            (Mode::Prod, None) => Err(AuthmintError::Configuration(format!(
                "{ENV_PLATFORM_TOKEN} is required in prod mode"
            ))),
            (_, token) => Ok(token.as_ref()),
        }
    }

    /// Load the policy document from `POLICY_FILE`.
    ///
    /// # Errors
    /// Returns a configuration error when no path is set, an I/O error when
    /// the file is unreadable, and a serialization error for bad JSON.
    pub fn load_policy(&self) -> Result<AuthorizationPolicy> {
        let path = self.policy_path.as_ref().ok_or_else(|| {
            AuthmintError::Configuration(format!("{ENV_POLICY_FILE} is not set"))
        })?;
        let raw = std::fs::read_to_string(path)?;
        AuthorizationPolicy::from_json(&raw)
    }
}
