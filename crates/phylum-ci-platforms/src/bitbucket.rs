//! Bitbucket Pipelines.

use async_trait::async_trait;
use phylum_ci_core::PhylumCiError;
use serde::Deserialize;
use tracing::{debug, info};

use crate::context::{branch_label, latest_own_comment, needs_post, pr_label, RepoInfo};
use crate::{http, ChangeContext, ChangeKind, CiPlatform, CommentOutcome, EnvVars};

const NAME: &str = "Bitbucket Pipelines";
const API_URL: &str = "https://api.bitbucket.org/2.0";

#[derive(Debug, Deserialize)]
struct CommentPage {
    #[serde(default)]
    values: Vec<PrComment>,
}

#[derive(Debug, Deserialize)]
struct PrComment {
    content: CommentContent,
}

#[derive(Debug, Deserialize)]
struct CommentContent {
    #[serde(default)]
    raw: String,
}

/// Bitbucket Pipelines step.
pub struct BitbucketPipelines {
    context: ChangeContext,
    token: Option<String>,
    api_url: String,
    workspace: Option<String>,
    repo_slug: Option<String>,
}

impl BitbucketPipelines {
    /// Detect the change from the step environment.
    pub fn from_env(env: &EnvVars, repo: &RepoInfo) -> Self {
        let sha = env
            .owned("BITBUCKET_COMMIT")
            .or_else(|| repo.head_sha.clone())
            .unwrap_or_default();
        let branch = env
            .owned("BITBUCKET_BRANCH")
            .or_else(|| env.owned("BITBUCKET_TAG"))
            .or_else(|| repo.branch.clone())
            .unwrap_or_else(|| "unknown".into());
        let pr_id = env
            .get("BITBUCKET_PR_ID")
            .and_then(|id| id.parse::<u64>().ok());

        let context = match pr_id {
            Some(number) => ChangeContext {
                kind: ChangeKind::PullRequest { number },
                base_ref: env.owned("BITBUCKET_PR_DESTINATION_BRANCH"),
                head_ref: (!sha.is_empty()).then(|| sha.clone()),
                label: pr_label("Bitbucket", number, &branch),
            },
            None => ChangeContext {
                kind: ChangeKind::Branch,
                base_ref: None,
                head_ref: (!sha.is_empty()).then(|| sha.clone()),
                label: branch_label("Bitbucket", &branch, &sha),
            },
        };

        Self {
            context,
            token: env.owned("BITBUCKET_TOKEN"),
            api_url: API_URL.to_string(),
            workspace: env.owned("BITBUCKET_WORKSPACE"),
            repo_slug: env.owned("BITBUCKET_REPO_SLUG"),
        }
    }

    /// Send API requests to `api_url` instead of Bitbucket Cloud.
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    fn comments_url(&self, pr_id: u64) -> Result<String, PhylumCiError> {
        let (Some(workspace), Some(slug)) = (&self.workspace, &self.repo_slug) else {
            return Err(PhylumCiError::platform(
                "Bitbucket",
                "BITBUCKET_WORKSPACE and BITBUCKET_REPO_SLUG must be set to post comments",
            ));
        };
        Ok(format!(
            "{}/repositories/{workspace}/{slug}/pullrequests/{pr_id}/comments",
            self.api_url
        ))
    }
}

#[async_trait]
impl CiPlatform for BitbucketPipelines {
    fn name(&self) -> &str {
        NAME
    }

    fn context(&self) -> ChangeContext {
        self.context.clone()
    }

    fn requires_token(&self) -> bool {
        self.context.is_pull_request()
    }

    fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn token_env_var(&self) -> Option<&str> {
        Some("BITBUCKET_TOKEN")
    }

    async fn post_comment(&self, body: &str) -> Result<CommentOutcome, PhylumCiError> {
        let ChangeKind::PullRequest { number } = self.context.kind else {
            return Ok(CommentOutcome::Skipped);
        };
        let Some(token) = &self.token else {
            return Err(PhylumCiError::MissingCiToken {
                platform: NAME.into(),
                env_var: "BITBUCKET_TOKEN".into(),
            });
        };
        let url = self.comments_url(number)?;
        let client = http::client("Bitbucket")?;

        let page: CommentPage = http::send_json(
            "Bitbucket",
            "list pull request comments",
            client
                .get(&url)
                .bearer_auth(token)
                .query(&[("sort", "-created_on"), ("pagelen", "50")]),
        )
        .await?;
        let latest = latest_own_comment(page.values.iter().rev().map(|c| c.content.raw.as_str()));
        if !needs_post(latest, body) {
            debug!(pr = number, "existing comment is up to date");
            return Ok(CommentOutcome::Unchanged);
        }

        let _created: serde_json::Value = http::send_json(
            "Bitbucket",
            "post pull request comment",
            client
                .post(&url)
                .bearer_auth(token)
                .json(&serde_json::json!({ "content": { "raw": body } })),
        )
        .await?;
        info!(pr = number, "posted pull request comment");
        Ok(CommentOutcome::Posted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_request_context() {
        let env = EnvVars::from_pairs([
            ("BITBUCKET_COMMIT", "c0ffee1234567"),
            ("BITBUCKET_BRANCH", "feature"),
            ("BITBUCKET_PR_ID", "5"),
            ("BITBUCKET_PR_DESTINATION_BRANCH", "main"),
            ("BITBUCKET_WORKSPACE", "acme"),
            ("BITBUCKET_REPO_SLUG", "api"),
            ("BITBUCKET_TOKEN", "tok"),
        ]);
        let platform = BitbucketPipelines::from_env(&env, &RepoInfo::default());
        let ctx = platform.context();
        assert_eq!(ctx.kind, ChangeKind::PullRequest { number: 5 });
        assert_eq!(ctx.base_ref.as_deref(), Some("main"));
        assert_eq!(ctx.label, "Bitbucket_PR#5_feature");
        assert!(platform.has_token());
        assert_eq!(
            platform.comments_url(5).unwrap(),
            "https://api.bitbucket.org/2.0/repositories/acme/api/pullrequests/5/comments"
        );
    }

    #[test]
    fn branch_context_has_default_base() {
        let env = EnvVars::from_pairs([
            ("BITBUCKET_COMMIT", "c0ffee1234567"),
            ("BITBUCKET_BRANCH", "main"),
        ]);
        let ctx = BitbucketPipelines::from_env(&env, &RepoInfo::default()).context();
        assert_eq!(ctx.kind, ChangeKind::Branch);
        assert_eq!(ctx.base_ref, None);
        assert_eq!(ctx.label, "Bitbucket_main_c0ffee1");
    }

    #[test]
    fn comment_page_parses_raw_content() {
        let page: CommentPage = serde_json::from_str(
            r#"{"values":[{"content":{"raw":"new"}},{"content":{"raw":"old"}}],"pagelen":50}"#,
        )
        .unwrap();
        assert_eq!(page.values.len(), 2);
        assert_eq!(page.values[0].content.raw, "new");
    }
}
