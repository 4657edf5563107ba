//! GitLab CI.

use async_trait::async_trait;
use phylum_ci_core::PhylumCiError;
use serde::Deserialize;
use tracing::{debug, info};

use crate::context::{branch_label, latest_own_comment, needs_post, pr_label, RepoInfo};
use crate::github::is_null_sha;
use crate::{http, ChangeContext, ChangeKind, CiPlatform, CommentOutcome, EnvVars};

const NAME: &str = "GitLab CI";

#[derive(Debug, Deserialize)]
struct Note {
    body: String,
}

/// GitLab CI pipeline job.
pub struct GitLabCi {
    context: ChangeContext,
    token: Option<String>,
    api_url: Option<String>,
    project_id: Option<String>,
}

impl GitLabCi {
    /// Detect the change from the job environment.
    pub fn from_env(env: &EnvVars, repo: &RepoInfo) -> Self {
        let sha = env
            .owned("CI_COMMIT_SHA")
            .or_else(|| repo.head_sha.clone())
            .unwrap_or_default();
        let base_ref = env
            .owned("CI_MERGE_REQUEST_DIFF_BASE_SHA")
            .or_else(|| env.owned("CI_COMMIT_BEFORE_SHA").filter(|s| !is_null_sha(s)))
            .or_else(|| env.owned("CI_DEFAULT_BRANCH"));
        let iid = env
            .get("CI_MERGE_REQUEST_IID")
            .and_then(|iid| iid.parse::<u64>().ok());

        let context = match iid {
            Some(number) => {
                let source = env
                    .owned("CI_MERGE_REQUEST_SOURCE_BRANCH_NAME")
                    .or_else(|| env.owned("CI_COMMIT_REF_NAME"))
                    .unwrap_or_else(|| "unknown".into());
                ChangeContext {
                    kind: ChangeKind::PullRequest { number },
                    base_ref,
                    head_ref: (!sha.is_empty()).then(|| sha.clone()),
                    label: pr_label("GitLab", number, &source),
                }
            }
            None => {
                let branch = env
                    .owned("CI_COMMIT_REF_NAME")
                    .or_else(|| repo.branch.clone())
                    .unwrap_or_else(|| "unknown".into());
                ChangeContext {
                    kind: ChangeKind::Branch,
                    base_ref,
                    head_ref: (!sha.is_empty()).then(|| sha.clone()),
                    label: branch_label("GitLab", &branch, &sha),
                }
            }
        };

        Self {
            context,
            token: env.owned("GITLAB_TOKEN"),
            api_url: env.owned("CI_API_V4_URL"),
            project_id: env.owned("CI_PROJECT_ID"),
        }
    }

    fn notes_url(&self, iid: u64) -> Result<String, PhylumCiError> {
        let (Some(api_url), Some(project_id)) = (&self.api_url, &self.project_id) else {
            return Err(PhylumCiError::platform(
                "GitLab",
                "CI_API_V4_URL and CI_PROJECT_ID must be set to post merge request notes",
            ));
        };
        Ok(format!(
            "{}/projects/{project_id}/merge_requests/{iid}/notes",
            api_url.trim_end_matches('/')
        ))
    }
}

#[async_trait]
impl CiPlatform for GitLabCi {
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
        Some("GITLAB_TOKEN")
    }

    async fn post_comment(&self, body: &str) -> Result<CommentOutcome, PhylumCiError> {
        let ChangeKind::PullRequest { number } = self.context.kind else {
            return Ok(CommentOutcome::Skipped);
        };
        let Some(token) = &self.token else {
            return Err(PhylumCiError::MissingCiToken {
                platform: NAME.into(),
                env_var: "GITLAB_TOKEN".into(),
            });
        };
        let url = self.notes_url(number)?;
        let client = http::client("GitLab")?;

        let mut notes: Vec<Note> = http::send_json(
            "GitLab",
            "list merge request notes",
            client
                .get(&url)
                .header("PRIVATE-TOKEN", token)
                .query(&[("sort", "desc"), ("order_by", "created_at"), ("per_page", "100")]),
        )
        .await?;
        notes.reverse();
        if !needs_post(latest_own_comment(notes.iter().map(|n| n.body.as_str())), body) {
            debug!(mr = number, "existing note is up to date");
            return Ok(CommentOutcome::Unchanged);
        }

        let _created: serde_json::Value = http::send_json(
            "GitLab",
            "post merge request note",
            client
                .post(&url)
                .header("PRIVATE-TOKEN", token)
                .json(&serde_json::json!({ "body": body })),
        )
        .await?;
        info!(mr = number, "posted merge request note");
        Ok(CommentOutcome::Posted)
    }
}
