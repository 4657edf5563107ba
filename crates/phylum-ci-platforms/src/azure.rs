//! Azure Pipelines.
//!
//! Builds of Azure Repos post pull request threads through the Azure DevOps
//! REST API. Builds of GitHub-hosted repositories post through GitHub.

use async_trait::async_trait;
use phylum_ci_core::PhylumCiError;
use serde::Deserialize;
use tracing::{debug, info};

use crate::context::{branch_label, latest_own_comment, needs_post, pr_label, RepoInfo};
use crate::github::GitHubComments;
use crate::{http, ChangeContext, ChangeKind, CiPlatform, CommentOutcome, EnvVars};

const NAME: &str = "Azure Pipelines";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RepoProvider {
    AzureRepos,
    GitHub,
}

#[derive(Debug, Deserialize)]
struct ThreadList {
    #[serde(default)]
    value: Vec<Thread>,
}

#[derive(Debug, Deserialize)]
struct Thread {
    #[serde(default)]
    comments: Vec<ThreadComment>,
}

#[derive(Debug, Deserialize)]
struct ThreadComment {
    #[serde(default)]
    content: Option<String>,
}

/// Azure Pipelines build.
pub struct AzurePipelines {
    context: ChangeContext,
    provider: RepoProvider,
    token: Option<String>,
    collection_uri: Option<String>,
    team_project: Option<String>,
    repository_id: Option<String>,
    repository_name: Option<String>,
}

impl AzurePipelines {
    /// Detect the change from the build environment.
    pub fn from_env(env: &EnvVars, repo: &RepoInfo) -> Self {
        let provider = if env.is("BUILD_REPOSITORY_PROVIDER", "GitHub") {
            RepoProvider::GitHub
        } else {
            RepoProvider::AzureRepos
        };
        let token = match provider {
            RepoProvider::AzureRepos => env.owned("AZURE_TOKEN"),
            RepoProvider::GitHub => env.owned("GITHUB_TOKEN"),
        };
        let sha = env
            .owned("BUILD_SOURCEVERSION")
            .or_else(|| repo.head_sha.clone())
            .unwrap_or_default();

        let pr_number = env
            .get("SYSTEM_PULLREQUEST_PULLREQUESTID")
            .or_else(|| env.get("SYSTEM_PULLREQUEST_PULLREQUESTNUMBER"))
            .and_then(|n| n.parse::<u64>().ok());
        // PR builds check out a merge commit; the source branch names the change.
        let context = match pr_number {
            Some(number) if env.is("BUILD_REASON", "PullRequest") => {
                let source = env
                    .owned("SYSTEM_PULLREQUEST_SOURCEBRANCH")
                    .unwrap_or_else(|| "unknown".into());
                ChangeContext {
                    kind: ChangeKind::PullRequest { number },
                    base_ref: env.owned("SYSTEM_PULLREQUEST_TARGETBRANCH"),
                    head_ref: (!sha.is_empty()).then(|| sha.clone()),
                    label: pr_label("AzurePipelines", number, &source),
                }
            }
            _ => {
                let branch = env
                    .owned("BUILD_SOURCEBRANCHNAME")
                    .or_else(|| repo.branch.clone())
                    .unwrap_or_else(|| "unknown".into());
                ChangeContext {
                    kind: ChangeKind::Branch,
                    base_ref: None,
                    head_ref: (!sha.is_empty()).then(|| sha.clone()),
                    label: branch_label("AzurePipelines", &branch, &sha),
                }
            }
        };

        Self {
            context,
            provider,
            token,
            collection_uri: env.owned("SYSTEM_COLLECTIONURI"),
            team_project: env.owned("SYSTEM_TEAMPROJECT"),
            repository_id: env.owned("BUILD_REPOSITORY_ID"),
            repository_name: env.owned("BUILD_REPOSITORY_NAME"),
        }
    }

    fn threads_url(&self, pr_id: u64) -> Result<String, PhylumCiError> {
        let (Some(collection), Some(project), Some(repo_id)) =
            (&self.collection_uri, &self.team_project, &self.repository_id)
        else {
            return Err(PhylumCiError::platform(
                "Azure",
                "SYSTEM_COLLECTIONURI, SYSTEM_TEAMPROJECT and BUILD_REPOSITORY_ID must be set to post comments",
            ));
        };
        let collection = if collection.ends_with('/') {
            collection.clone()
        } else {
            format!("{collection}/")
        };
        Ok(format!(
            "{collection}{project}/_apis/git/repositories/{repo_id}/pullRequests/{pr_id}/threads?api-version=7.0"
        ))
    }

    async fn post_thread(&self, number: u64, token: &str, body: &str) -> Result<CommentOutcome, PhylumCiError> {
        let url = self.threads_url(number)?;
        let client = http::client("Azure")?;

        let threads: ThreadList = http::send_json(
            "Azure",
            "list pull request threads",
            client.get(&url).basic_auth("", Some(token)),
        )
        .await?;
        let latest = latest_own_comment(
            threads
                .value
                .iter()
                .flat_map(|t| t.comments.iter())
                .filter_map(|c| c.content.as_deref()),
        );
        if !needs_post(latest, body) {
            debug!(pr = number, "existing thread is up to date");
            return Ok(CommentOutcome::Unchanged);
        }

        let thread = serde_json::json!({
            "comments": [{ "parentCommentId": 0, "content": body, "commentType": 1 }],
            "status": 1,
        });
        let _created: serde_json::Value = http::send_json(
            "Azure",
            "post pull request thread",
            client.post(&url).basic_auth("", Some(token)).json(&thread),
        )
        .await?;
        info!(pr = number, "posted pull request thread");
        Ok(CommentOutcome::Posted)
    }
}

#[async_trait]
impl CiPlatform for AzurePipelines {
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
        match self.provider {
            RepoProvider::AzureRepos => Some("AZURE_TOKEN"),
            RepoProvider::GitHub => Some("GITHUB_TOKEN"),
        }
    }

    async fn post_comment(&self, body: &str) -> Result<CommentOutcome, PhylumCiError> {
        let ChangeKind::PullRequest { number } = self.context.kind else {
            return Ok(CommentOutcome::Skipped);
        };
        let Some(token) = &self.token else {
            return Err(PhylumCiError::MissingCiToken {
                platform: NAME.into(),
                env_var: self.token_env_var().unwrap_or("AZURE_TOKEN").into(),
            });
        };
        match self.provider {
            RepoProvider::AzureRepos => self.post_thread(number, token, body).await,
            RepoProvider::GitHub => {
                let repository = self.repository_name.as_deref().ok_or_else(|| {
                    PhylumCiError::platform("Azure", "BUILD_REPOSITORY_NAME is not set")
                })?;
                GitHubComments::new(None, repository, number, token.clone())?
                    .post(body)
                    .await
            }
        }
    }
}
