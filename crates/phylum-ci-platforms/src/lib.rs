//! CI environment detection and pull request comments.
//!
//! Each supported provider implements [`CiPlatform`]. [`detect`] inspects an
//! [`EnvVars`] snapshot and picks the provider the process is running under,
//! falling back to pre-commit or a plain local run.

pub mod azure;
pub mod bitbucket;
pub mod context;
pub mod env;
pub mod github;
pub mod gitlab;
mod http;
pub mod local;

use async_trait::async_trait;
use phylum_ci_core::PhylumCiError;
use tracing::debug;

pub use azure::AzurePipelines;
pub use bitbucket::BitbucketPipelines;
pub use context::{ChangeContext, ChangeKind, CommentOutcome, RepoInfo, COMMENT_MARKER};
pub use env::EnvVars;
pub use github::{GitHubActions, GitHubComments};
pub use gitlab::GitLabCi;
pub use local::{Local, PreCommit};

/// A CI provider (or local environment) the analysis runs under.
///
/// # Examples
///
/// ```
/// use phylum_ci_platforms::{detect, EnvVars, RepoInfo};
///
/// let env = EnvVars::from_pairs([("GITLAB_CI", "true"), ("CI_MERGE_REQUEST_IID", "3")]);
/// let platform = detect(&env, &RepoInfo::default(), false).unwrap();
/// assert_eq!(platform.name(), "GitLab CI");
/// assert!(platform.context().is_pull_request());
/// ```
#[async_trait]
pub trait CiPlatform: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// The change under analysis.
    fn context(&self) -> ChangeContext;

    /// `true` when posting results needs a provider token.
    fn requires_token(&self) -> bool;

    /// `true` when a provider token was found.
    fn has_token(&self) -> bool;

    /// Environment variable expected to hold the provider token.
    fn token_env_var(&self) -> Option<&str> {
        None
    }

    /// Post `body` to the pull request, once.
    ///
    /// Skipped outside pull requests, and left alone when the latest comment
    /// from this tool already has the same body.
    ///
    /// # Errors
    ///
    /// Returns [`PhylumCiError::MissingCiToken`] without a token and
    /// [`PhylumCiError::Platform`] on API failures.
    async fn post_comment(&self, body: &str) -> Result<CommentOutcome, PhylumCiError>;
}

/// Pick the platform for this environment.
///
/// CI providers are checked first (GitHub, GitLab, Azure, Bitbucket). Outside
/// CI, `PRE_COMMIT=1` or staged file arguments select pre-commit; anything
/// else is a local run.
///
/// # Errors
///
/// Returns [`PhylumCiError::Platform`] when a provider is detected but its
/// environment is inconsistent, e.g. a GitHub pull request without a payload.
pub fn detect(
    env: &EnvVars,
    repo: &RepoInfo,
    staged_args: bool,
) -> Result<Box<dyn CiPlatform>, PhylumCiError> {
    let platform: Box<dyn CiPlatform> = if env.is("GITHUB_ACTIONS", "true") {
        Box::new(GitHubActions::from_env(env, repo)?)
    } else if env.is("GITLAB_CI", "true") {
        Box::new(GitLabCi::from_env(env, repo))
    } else if env.get("TF_BUILD").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
        Box::new(AzurePipelines::from_env(env, repo))
    } else if env.has("BITBUCKET_COMMIT") {
        Box::new(BitbucketPipelines::from_env(env, repo))
    } else if env.is("PRE_COMMIT", "1") || staged_args {
        Box::new(PreCommit::new(repo))
    } else {
        Box::new(Local::new(repo))
    };
    debug!(platform = platform.name(), "detected CI platform");
    Ok(platform)
}
