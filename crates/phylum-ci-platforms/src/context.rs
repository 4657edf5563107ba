//! The change a CI run is looking at, and how it is labeled.

use std::fmt;

use serde::Serialize;

/// Marker embedded in every comment this tool posts.
pub const COMMENT_MARKER: &str = "<!-- phylum-ci -->";

/// Kind of change under analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeKind {
    /// A pull/merge request.
    PullRequest {
        /// PR / MR number.
        number: u64,
    },
    /// A branch push.
    Branch,
    /// Changes staged for commit.
    Staged,
    /// A developer's local checkout.
    Local,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::PullRequest { number } => write!(f, "pull request #{number}"),
            ChangeKind::Branch => write!(f, "branch"),
            ChangeKind::Staged => write!(f, "staged changes"),
            ChangeKind::Local => write!(f, "local"),
        }
    }
}

/// What to diff and under which label to record the analysis.
///
/// # Examples
///
/// ```
/// use phylum_ci_platforms::{ChangeContext, ChangeKind};
///
/// let ctx = ChangeContext {
///     kind: ChangeKind::PullRequest { number: 7 },
///     base_ref: Some("abc123".into()),
///     head_ref: None,
///     label: "GitHub_PR#7_feature".into(),
/// };
/// assert!(ctx.is_pull_request());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeContext {
    /// Kind of change.
    pub kind: ChangeKind,
    /// Ref to compare against; `None` means the repository's default branch.
    pub base_ref: Option<String>,
    /// Ref under analysis; `None` means `HEAD`.
    pub head_ref: Option<String>,
    /// Label recorded with the analysis job.
    pub label: String,
}

impl ChangeContext {
    /// `true` for pull/merge requests, the only contexts that get comments.
    pub fn is_pull_request(&self) -> bool {
        matches!(self.kind, ChangeKind::PullRequest { .. })
    }
}

/// Result of [`CiPlatform::post_comment`](crate::CiPlatform::post_comment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentOutcome {
    /// A new comment was created.
    Posted,
    /// The latest comment from this tool already has the same body.
    Unchanged,
    /// The platform does not take comments in this context.
    Skipped,
}

/// Local repository facts needed to label branch and local runs.
#[derive(Debug, Clone, Default)]
pub struct RepoInfo {
    /// Checked-out branch.
    pub branch: Option<String>,
    /// `HEAD` commit SHA.
    pub head_sha: Option<String>,
}

pub(crate) fn pr_label(platform: &str, number: u64, source: &str) -> String {
    format!("{platform}_PR#{number}_{}", sanitize(source))
}

pub(crate) fn branch_label(platform: &str, branch: &str, sha: &str) -> String {
    format!("{platform}_{}_{}", sanitize(branch), short_sha(sha))
}

pub(crate) fn short_sha(sha: &str) -> &str {
    let end = sha.char_indices().nth(7).map_or(sha.len(), |(i, _)| i);
    &sha[..end]
}

/// Strip `refs/heads/` and replace whitespace so labels stay one token.
fn sanitize(name: &str) -> String {
    name.strip_prefix("refs/heads/")
        .unwrap_or(name)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// The most recent comment body posted by this tool, given bodies oldest
/// first.
pub(crate) fn latest_own_comment<'a>(bodies: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    bodies
        .into_iter()
        .filter(|body| body.contains(COMMENT_MARKER))
        .last()
}

/// `true` when `body` should be posted given the latest existing comment.
pub(crate) fn needs_post(latest: Option<&str>, body: &str) -> bool {
    latest.map_or(true, |existing| existing.trim() != body.trim())
}
