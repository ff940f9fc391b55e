//! Operating mode for the executor. Strict, case-sensitive, fail-closed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::AuthmintError;

/// The two operating modes. Anything that is not exactly `prod` or
/// `dry_run` — including case variants like `Prod` — is a construction-time
/// failure, never a silent default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Side effects are performed against the real platform.
    Prod,
    /// Planning only. Every executor entry point refuses.
    DryRun,
}

impl Mode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prod => "prod",
            Self::DryRun => "dry_run",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = AuthmintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prod" => Ok(Self::Prod),
            "dry_run" => Ok(Self::DryRun),
            other => Err(AuthmintError::ModeViolation {
                mode: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_strings_parse() {
        assert_eq!("prod".parse::<Mode>().unwrap(), Mode::Prod);
        assert_eq!("dry_run".parse::<Mode>().unwrap(), Mode::DryRun);
    }

    #[test]
    fn case_variants_rejected() {
        for bad in ["Prod", "PROD", "Dry_Run", "DRY_RUN", "dry-run", "prod ", ""] {
            let err = bad.parse::<Mode>().unwrap_err();
            assert!(
                matches!(err, AuthmintError::ModeViolation { .. }),
                "'{bad}' must be a mode violation, got: {err}"
            );
        }
    }

    #[test]
    fn display_matches_wire_form() {
        assert_eq!(Mode::Prod.to_string(), "prod");
        assert_eq!(Mode::DryRun.to_string(), "dry_run");
    }

    #[test]
    fn serde_roundtrip() {
        let json = serde_json::to_string(&Mode::DryRun).unwrap();
        assert_eq!(json, r#""dry_run""#);
        let back: Mode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Mode::DryRun);
    }
}
