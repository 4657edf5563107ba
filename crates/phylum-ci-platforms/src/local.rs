//! Runs outside a CI provider: git pre-commit hooks and plain local checkouts.

use async_trait::async_trait;
use phylum_ci_core::PhylumCiError;

use crate::context::{short_sha, RepoInfo};
use crate::{ChangeContext, ChangeKind, CiPlatform, CommentOutcome};

/// A git pre-commit hook; analyzes what is staged against `HEAD`.
pub struct PreCommit {
    context: ChangeContext,
}

impl PreCommit {
    pub fn new(repo: &RepoInfo) -> Self {
        let branch = repo.branch.as_deref().unwrap_or("detached");
        Self {
            context: ChangeContext {
                kind: ChangeKind::Staged,
                base_ref: Some("HEAD".into()),
                head_ref: None,
                label: format!("pre-commit_{branch}"),
            },
        }
    }
}

#[async_trait]
impl CiPlatform for PreCommit {
    fn name(&self) -> &str {
        "pre-commit"
    }

    fn context(&self) -> ChangeContext {
        self.context.clone()
    }

    fn requires_token(&self) -> bool {
        false
    }

    fn has_token(&self) -> bool {
        false
    }

    async fn post_comment(&self, _body: &str) -> Result<CommentOutcome, PhylumCiError> {
        Ok(CommentOutcome::Skipped)
    }
}

/// No CI provider detected; compares `HEAD` with the default branch.
pub struct Local {
    context: ChangeContext,
}

impl Local {
    pub fn new(repo: &RepoInfo) -> Self {
        let branch = repo.branch.as_deref().unwrap_or("detached");
        let sha = repo.head_sha.as_deref().unwrap_or("unknown");
        Self {
            context: ChangeContext {
                kind: ChangeKind::Local,
                base_ref: None,
                head_ref: repo.head_sha.clone(),
                label: format!("local_{branch}_{}", short_sha(sha)),
            },
        }
    }
}

#[async_trait]
impl CiPlatform for Local {
    fn name(&self) -> &str {
        "none"
    }

    fn context(&self) -> ChangeContext {
        self.context.clone()
    }

    fn requires_token(&self) -> bool {
        false
    }

    fn has_token(&self) -> bool {
        false
    }

    async fn post_comment(&self, _body: &str) -> Result<CommentOutcome, PhylumCiError> {
        Ok(CommentOutcome::Skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> RepoInfo {
        RepoInfo {
            branch: Some("dev".into()),
            head_sha: Some("89abcdef01234567".into()),
        }
    }

    #[test]
    fn pre_commit_label_and_base() {
        let ctx = PreCommit::new(&repo()).context();
        assert_eq!(ctx.kind, ChangeKind::Staged);
        assert_eq!(ctx.base_ref.as_deref(), Some("HEAD"));
        assert_eq!(ctx.label, "pre-commit_dev");
    }

    #[test]
    fn local_label_uses_short_sha() {
        let ctx = Local::new(&repo()).context();
        assert_eq!(ctx.kind, ChangeKind::Local);
        assert_eq!(ctx.base_ref, None);
        assert_eq!(ctx.label, "local_dev_89abcde");
    }

    #[tokio::test]
    async fn local_platforms_never_comment() {
        assert_eq!(
            Local::new(&repo()).post_comment("x").await.unwrap(),
            CommentOutcome::Skipped
        );
        assert_eq!(
            PreCommit::new(&repo()).post_comment("x").await.unwrap(),
            CommentOutcome::Skipped
        );
    }
}
