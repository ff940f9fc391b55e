//! Hosting-platform client interface.
//!
//! The executor invokes exactly three methods, one per operation kind.
//! Errors carry a string code that is mapped by name to retryability (see
//! [`crate::recovery`]). The real network client lives outside the kernel;
//! [`SimulatedPlatform`] ships here so demos and the bridge tests run the
//! full flow deterministically.

use std::fmt;
use std::sync::Arc;

use authmint_types::{AuthmintError, Clock, PlatformToken, PrSpec, ReleaseSpec, TagSpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A platform-level failure. `code` decides retryability by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformError {
    pub code: String,
    pub message: String,
}

impl PlatformError {
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl From<PlatformError> for AuthmintError {
    fn from(err: PlatformError) -> Self {
        Self::Platform {
            code: err.code,
            message: err.message,
        }
    }
}

pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

/// Response from `create_release`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseResponse {
    pub id: u64,
    pub url: String,
    pub html_url: String,
    pub tag_name: String,
    pub name: String,
    pub draft: bool,
    pub prerelease: bool,
    #[serde(with = "authmint_types::canonical::iso8601")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "authmint_types::canonical::iso8601")]
    pub published_at: DateTime<Utc>,
}

/// Tagger identity on an annotated tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tagger {
    #[serde(with = "authmint_types::canonical::iso8601")]
    pub date: DateTime<Utc>,
    pub name: String,
    pub email: String,
}

/// The object an annotated tag points at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagObject {
    pub sha: String,
    #[serde(rename = "type")]
    pub object_type: String,
    pub url: String,
}

/// Response from `create_tag`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagResponse {
    pub node_id: String,
    pub tag: String,
    pub sha: String,
    pub url: String,
    pub tagger: Tagger,
    pub object: TagObject,
    pub message: String,
}

/// A branch reference on a pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchRef {
    #[serde(rename = "ref")]
    pub branch: String,
}

/// Response from `create_pull_request`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestResponse {
    pub id: u64,
    pub number: u64,
    pub state: String,
    pub title: String,
    pub body: String,
    pub url: String,
    pub html_url: String,
    pub head: BranchRef,
    pub base: BranchRef,
    #[serde(with = "authmint_types::canonical::iso8601")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "authmint_types::canonical::iso8601")]
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Client trait
// ---------------------------------------------------------------------------

/// The three side effects the executor can perform.
pub trait PlatformClient: Send + Sync {
    /// Publish a release.
    ///
    /// # Errors
    /// A [`PlatformError`] whose code decides retryability.
    fn create_release(
        &self,
        owner: &str,
        repo: &str,
        spec: &ReleaseSpec,
    ) -> PlatformResult<ReleaseResponse>;

    /// Create an annotated tag.
    ///
    /// # Errors
    /// A [`PlatformError`] whose code decides retryability.
    fn create_tag(&self, owner: &str, repo: &str, spec: &TagSpec) -> PlatformResult<TagResponse>;

    /// Open a pull request.
    ///
    /// # Errors
    /// A [`PlatformError`] whose code decides retryability.
    fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        spec: &PrSpec,
    ) -> PlatformResult<PullRequestResponse>;
}

// ---------------------------------------------------------------------------
// Simulated client
// ---------------------------------------------------------------------------

/// Deterministic in-process client that answers with the platform's
/// response shapes. Used by demos and integration tests; a real deployment
/// substitutes its network client.
pub struct SimulatedPlatform {
    #[allow(dead_code)]
    token: PlatformToken,
    clock: Arc<dyn Clock>,
}

impl SimulatedPlatform {
    #[must_use]
    pub fn new(token: PlatformToken, clock: Arc<dyn Clock>) -> Self {
        Self { token, clock }
    }
}

impl PlatformClient for SimulatedPlatform {
    fn create_release(
        &self,
        owner: &str,
        repo: &str,
        spec: &ReleaseSpec,
    ) -> PlatformResult<ReleaseResponse> {
        let now = self.clock.now();
        Ok(ReleaseResponse {
            id: 12345,
            url: format!("https://api.github.com/repos/{owner}/{repo}/releases/12345"),
            html_url: format!("https://github.com/{owner}/{repo}/releases/tag/{}", spec.tag_name),
            tag_name: spec.tag_name.clone(),
            name: spec.release_name.clone(),
            draft: spec.draft,
            prerelease: spec.prerelease,
            created_at: now,
            published_at: now,
        })
    }

    fn create_tag(&self, owner: &str, repo: &str, spec: &TagSpec) -> PlatformResult<TagResponse> {
        let now = self.clock.now();
        Ok(TagResponse {
            node_id: "MDM6VGFnXzEyMzQ1".to_string(),
            tag: spec.tag_name.clone(),
            sha: spec.target_sha.clone(),
            url: format!("https://api.github.com/repos/{owner}/{repo}/git/tags/{}", spec.target_sha),
            tagger: Tagger {
                date: now,
                name: "authmint".to_string(),
                email: "authmint@omega.io".to_string(),
            },
            object: TagObject {
                sha: spec.target_sha.clone(),
                object_type: "commit".to_string(),
                url: format!(
                    "https://api.github.com/repos/{owner}/{repo}/git/commits/{}",
                    spec.target_sha
                ),
            },
            message: spec.message.clone(),
        })
    }

    fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        spec: &PrSpec,
    ) -> PlatformResult<PullRequestResponse> {
        let now = self.clock.now();
        Ok(PullRequestResponse {
            id: 67890,
            number: 42,
            state: "open".to_string(),
            title: spec.title.clone(),
            body: spec.body.clone(),
            url: format!("https://api.github.com/repos/{owner}/{repo}/pulls/42"),
            html_url: format!("https://github.com/{owner}/{repo}/pull/42"),
            head: BranchRef {
                branch: spec.head_branch.clone(),
            },
            base: BranchRef {
                branch: spec.base_branch.clone(),
            },
            created_at: now,
            updated_at: now,
        })
    }
}

// ---------------------------------------------------------------------------
// Scripted client for failure-path tests
// ---------------------------------------------------------------------------

/// Client that replays a script of failures before delegating to
/// [`SimulatedPlatform`]. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
pub struct ScriptedPlatform {
    inner: SimulatedPlatform,
    script: std::sync::Mutex<std::collections::VecDeque<PlatformError>>,
    calls: std::sync::atomic::AtomicU32,
}

#[cfg(any(test, feature = "test-helpers"))]
impl ScriptedPlatform {
    /// Fail with each scripted error in turn, then succeed.
    #[must_use]
    pub fn failing_with(
        clock: Arc<dyn Clock>,
        failures: impl IntoIterator<Item = PlatformError>,
    ) -> Self {
        Self {
            inner: SimulatedPlatform::new(PlatformToken::from("scripted-token"), clock),
            script: std::sync::Mutex::new(failures.into_iter().collect()),
            calls: std::sync::atomic::AtomicU32::new(0),
        }
    }

    /// Total calls observed across all methods.
    pub fn calls(&self) -> u32 {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn next_failure(&self) -> Option<PlatformError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.script.lock().expect("script lock poisoned").pop_front()
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl PlatformClient for ScriptedPlatform {
    fn create_release(
        &self,
        owner: &str,
        repo: &str,
        spec: &ReleaseSpec,
    ) -> PlatformResult<ReleaseResponse> {
        match self.next_failure() {
            Some(err) => Err(err),
            None => self.inner.create_release(owner, repo, spec),
        }
    }

    fn create_tag(&self, owner: &str, repo: &str, spec: &TagSpec) -> PlatformResult<TagResponse> {
        match self.next_failure() {
            Some(err) => Err(err),
            None => self.inner.create_tag(owner, repo, spec),
        }
    }

    fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        spec: &PrSpec,
    ) -> PlatformResult<PullRequestResponse> {
        match self.next_failure() {
            Some(err) => Err(err),
            None => self.inner.create_pull_request(owner, repo, spec),
        }
    }
}
