//! Policy engine — the declarative gate in front of receipt minting.
//!
//! Rules are evaluated in fixed order; the first failure wins:
//! 1. The operation kind has a ruleset (`no_policy_for_kind`)
//! 2. The repository matches the allowlist (`repository_not_allowed`)
//! 3. Every evidence predicate holds (`evidence_requirement_not_met`)
//! 4. Rate limits are advisory — logged, never enforced here
//!
//! A policy failure is not an error path for the authority: it downgrades
//! the receipt to advisory so the rejection is recorded with the same audit
//! shape as an approval.
//!
//! Globs and predicates are compiled once at construction, so a malformed
//! policy document fails fast instead of at first use.

use std::collections::BTreeMap;

use authmint_types::{
    AuthmintError, AuthorizationEvidence, AuthorizationPolicy, EvidencePredicate, OperationKind,
    OperationRequest, RateLimitRule, Result,
};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// A ruleset with its patterns and predicates pre-compiled.
#[derive(Debug)]
struct CompiledRuleSet {
    /// `None` means any repository is acceptable.
    repositories: Option<GlobSet>,
    predicates: Vec<EvidencePredicate>,
    rate_limit: Option<RateLimitRule>,
}

/// Validates operations against a compiled [`AuthorizationPolicy`].
#[derive(Debug)]
pub struct PolicyEngine {
    policy: AuthorizationPolicy,
    compiled: BTreeMap<OperationKind, CompiledRuleSet>,
}

impl PolicyEngine {
    /// Compile a policy document.
    ///
    /// # Errors
    /// Returns [`AuthmintError::Configuration`] for an invalid glob and
    /// [`AuthmintError::InvalidPredicate`] for an unparseable predicate.
    pub fn new(policy: AuthorizationPolicy) -> Result<Self> {
        let mut compiled = BTreeMap::new();
        for (kind, rules) in &policy.rules {
            let repositories = match &rules.allowed_repositories {
                Some(patterns) => Some(compile_globs(patterns)?),
                None => None,
            };
            let predicates = rules
                .require_evidence
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|raw| EvidencePredicate::parse(raw))
                .collect::<Result<Vec<_>>>()?;
            compiled.insert(
                *kind,
                CompiledRuleSet {
                    repositories,
                    predicates,
                    rate_limit: rules.rate_limit,
                },
            );
        }
        Ok(Self { policy, compiled })
    }

    /// The policy document this engine was compiled from.
    #[must_use]
    pub fn policy(&self) -> &AuthorizationPolicy {
        &self.policy
    }

    /// Validate one operation. Checks run in fixed order; the first
    /// failure is returned.
    ///
    /// # Errors
    /// One of the 2xx policy errors naming the failed check.
    pub fn validate(
        &self,
        request: &OperationRequest,
        evidence: &AuthorizationEvidence,
    ) -> Result<()> {
        let kind = request.operation_kind();

        // 1. Operation known
        let rules = self
            .compiled
            .get(&kind)
            .ok_or(AuthmintError::NoPolicyForKind { kind })?;

        // 2. Repository allowlist
        if let Some(repositories) = &rules.repositories {
            let repo = request.repository.full();
            if !repositories.is_match(&repo) {
                return Err(AuthmintError::RepositoryNotAllowed { repository: repo });
            }
        }

        // 3. Evidence predicates
        for predicate in &rules.predicates {
            if !predicate.evaluate(evidence) {
                return Err(AuthmintError::EvidenceRequirementNotMet {
                    requirement: predicate.to_string(),
                });
            }
        }

        // 4. Rate limit — advisory only
        if let Some(rate) = rules.rate_limit {
            tracing::debug!(
                kind = %kind,
                per_hour = rate.per_hour,
                "rate limit is advisory; not enforced by the policy engine"
            );
        }

        Ok(())
    }
}

/// Compile an allowlist. `literal_separator` keeps `?` and `*` from
/// crossing the `owner/name` boundary.
fn compile_globs(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|err| {
                AuthmintError::Configuration(format!("invalid repository pattern '{pattern}': {err}"))
            })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|err| AuthmintError::Configuration(format!("invalid repository allowlist: {err}")))
}
