//! GitHub Actions.

use async_trait::async_trait;
use phylum_ci_core::PhylumCiError;
use serde::Deserialize;
use tracing::{debug, info};

use crate::context::{branch_label, latest_own_comment, needs_post, pr_label, RepoInfo};
use crate::{ChangeContext, ChangeKind, CiPlatform, CommentOutcome, EnvVars};

const NAME: &str = "GitHub Actions";
const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct GitHubEvent {
    pull_request: Option<PullRequestEvent>,
    before: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PullRequestEvent {
    number: u64,
    base: EventRef,
    head: EventRef,
}

#[derive(Debug, Deserialize)]
struct EventRef {
    sha: String,
    #[serde(rename = "ref")]
    ref_name: String,
}

/// Issue-comment client for one pull request.
///
/// Also used by Azure Pipelines builds of GitHub-hosted repositories.
#[derive(Debug, Clone)]
pub struct GitHubComments {
    api_url: String,
    owner: String,
    repo: String,
    number: u64,
    token: String,
}

impl GitHubComments {
    /// Client for `owner/repo` pull request `number`.
    ///
    /// # Errors
    ///
    /// Returns [`PhylumCiError::Platform`] if `repository` is not `owner/repo`.
    pub fn new(
        api_url: Option<&str>,
        repository: &str,
        number: u64,
        token: String,
    ) -> Result<Self, PhylumCiError> {
        let Some((owner, repo)) = repository.split_once('/') else {
            return Err(PhylumCiError::platform(
                "GitHub",
                format!("invalid repository '{repository}', expected owner/repo"),
            ));
        };
        Ok(Self {
            api_url: api_url.unwrap_or(DEFAULT_API_URL).trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            number,
            token,
        })
    }

    /// Post `body` unless the latest comment from this tool matches it.
    ///
    /// # Errors
    ///
    /// Returns [`PhylumCiError::Platform`] on API errors.
    pub async fn post(&self, body: &str) -> Result<CommentOutcome, PhylumCiError> {
        let octocrab = octocrab::Octocrab::builder()
            .base_uri(self.api_url.as_str())
            .map_err(|e| PhylumCiError::platform("GitHub", format!("invalid API URL: {e}")))?
            .personal_token(self.token.clone())
            .build()
            .map_err(|e| {
                PhylumCiError::platform("GitHub", format!("failed to create GitHub client: {e}"))
            })?;
        let issues = octocrab.issues(&self.owner, &self.repo);

        let first_page = issues
            .list_comments(self.number)
            .per_page(100)
            .send()
            .await
            .map_err(|e| PhylumCiError::platform("GitHub", format!("failed to list comments: {e}")))?;
        let comments = octocrab
            .all_pages(first_page)
            .await
            .map_err(|e| PhylumCiError::platform("GitHub", format!("failed to list comments: {e}")))?;

        let latest = latest_own_comment(comments.iter().filter_map(|c| c.body.as_deref()));
        if !needs_post(latest, body) {
            debug!(pr = self.number, "existing comment is up to date");
            return Ok(CommentOutcome::Unchanged);
        }

        issues
            .create_comment(self.number, body)
            .await
            .map_err(|e| PhylumCiError::platform("GitHub", format!("failed to post comment: {e}")))?;
        info!(
            repo = format!("{}/{}", self.owner, self.repo),
            pr = self.number,
            "posted comment"
        );
        Ok(CommentOutcome::Posted)
    }
}

/// GitHub Actions workflow run.
pub struct GitHubActions {
    context: ChangeContext,
    token: Option<String>,
    comments: Option<GitHubComments>,
}

impl GitHubActions {
    /// Detect the change from the workflow environment.
    ///
    /// Pull request runs read the webhook payload at `GITHUB_EVENT_PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`PhylumCiError::Platform`] if a pull request event payload is
    /// missing or malformed.
    pub fn from_env(env: &EnvVars, repo: &RepoInfo) -> Result<Self, PhylumCiError> {
        let token = env.owned("GITHUB_TOKEN");
        let is_pr = matches!(
            env.get("GITHUB_EVENT_NAME"),
            Some("pull_request" | "pull_request_target")
        );
        let event = match env.get("GITHUB_EVENT_PATH") {
            Some(path) => Some(read_event(path)?),
            None if is_pr => {
                return Err(PhylumCiError::platform(
                    "GitHub",
                    "GITHUB_EVENT_PATH is not set for a pull request event",
                ))
            }
            None => None,
        };

        let pr = event.as_ref().and_then(|e| e.pull_request.as_ref());
        let (context, comments) = match pr {
            Some(pr) if is_pr => {
                let comments = match (&token, env.get("GITHUB_REPOSITORY")) {
                    (Some(token), Some(repository)) => Some(GitHubComments::new(
                        env.get("GITHUB_API_URL"),
                        repository,
                        pr.number,
                        token.clone(),
                    )?),
                    _ => None,
                };
                let context = ChangeContext {
                    kind: ChangeKind::PullRequest { number: pr.number },
                    base_ref: Some(pr.base.sha.clone()),
                    head_ref: Some(pr.head.sha.clone()),
                    label: pr_label("GitHub", pr.number, &pr.head.ref_name),
                };
                (context, comments)
            }
            Some(_) | None if is_pr => {
                return Err(PhylumCiError::platform(
                    "GitHub",
                    "pull request event payload has no pull_request object",
                ))
            }
            _ => {
                let sha = env
                    .owned("GITHUB_SHA")
                    .or_else(|| repo.head_sha.clone())
                    .unwrap_or_default();
                let branch = env
                    .owned("GITHUB_REF_NAME")
                    .or_else(|| repo.branch.clone())
                    .unwrap_or_else(|| "unknown".into());
                let before = event
                    .as_ref()
                    .and_then(|e| e.before.clone())
                    .filter(|sha| !is_null_sha(sha));
                let context = ChangeContext {
                    kind: ChangeKind::Branch,
                    base_ref: before,
                    head_ref: (!sha.is_empty()).then(|| sha.clone()),
                    label: branch_label("GitHub", &branch, &sha),
                };
                (context, None)
            }
        };

        Ok(Self {
            context,
            token,
            comments,
        })
    }
}

#[async_trait]
impl CiPlatform for GitHubActions {
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
        Some("GITHUB_TOKEN")
    }

    async fn post_comment(&self, body: &str) -> Result<CommentOutcome, PhylumCiError> {
        if !self.context.is_pull_request() {
            return Ok(CommentOutcome::Skipped);
        }
        match (&self.comments, &self.token) {
            (Some(comments), _) => comments.post(body).await,
            (None, Some(_)) => Err(PhylumCiError::Config(
                "GITHUB_REPOSITORY is not set; expected owner/repo to post the comment".into(),
            )),
            (None, None) => Err(PhylumCiError::MissingCiToken {
                platform: NAME.into(),
                env_var: "GITHUB_TOKEN".into(),
            }),
        }
    }
}

fn read_event(path: &str) -> Result<GitHubEvent, PhylumCiError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        PhylumCiError::platform("GitHub", format!("failed to read event payload {path}: {e}"))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        PhylumCiError::platform("GitHub", format!("failed to parse event payload {path}: {e}"))
    })
}

pub(crate) fn is_null_sha(sha: &str) -> bool {
    sha.chars().all(|c| c == '0')
}

#[cfg(test)]
mod tests {
    use phylum_ci_core::ReturnCode;

    use super::*;

    fn event_file(json: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), json).unwrap();
        file
    }

    const PR_EVENT: &str = r#"{
        "pull_request": {
            "number": 42,
            "base": { "sha": "1111111111111111", "ref": "main" },
            "head": { "sha": "2222222222222222", "ref": "bump-lodash" }
        }
    }"#;

    #[test]
    fn pull_request_context_from_event() {
        let event = event_file(PR_EVENT);
        let env = EnvVars::from_pairs([
            ("GITHUB_ACTIONS", "true"),
            ("GITHUB_EVENT_NAME", "pull_request"),
            ("GITHUB_REPOSITORY", "acme/web"),
            ("GITHUB_TOKEN", "ghs_x"),
        ])
        .with("GITHUB_EVENT_PATH", event.path().to_string_lossy());

        let platform = GitHubActions::from_env(&env, &RepoInfo::default()).unwrap();
        let ctx = platform.context();
        assert_eq!(ctx.kind, ChangeKind::PullRequest { number: 42 });
        assert_eq!(ctx.base_ref.as_deref(), Some("1111111111111111"));
        assert_eq!(ctx.head_ref.as_deref(), Some("2222222222222222"));
        assert_eq!(ctx.label, "GitHub_PR#42_bump-lodash");
        assert!(platform.requires_token());
        assert!(platform.has_token());
    }

    #[test]
    fn push_uses_before_sha_as_base() {
        let event = event_file(r#"{ "before": "abcdef0123456789" }"#);
        let env = EnvVars::from_pairs([
            ("GITHUB_ACTIONS", "true"),
            ("GITHUB_EVENT_NAME", "push"),
            ("GITHUB_SHA", "9876543210fedcba"),
            ("GITHUB_REF_NAME", "main"),
        ])
        .with("GITHUB_EVENT_PATH", event.path().to_string_lossy());

        let platform = GitHubActions::from_env(&env, &RepoInfo::default()).unwrap();
        let ctx = platform.context();
        assert_eq!(ctx.kind, ChangeKind::Branch);
        assert_eq!(ctx.base_ref.as_deref(), Some("abcdef0123456789"));
        assert_eq!(ctx.label, "GitHub_main_9876543");
        assert!(!platform.requires_token());
    }

    #[test]
    fn new_branch_push_has_no_base() {
        let event = event_file(r#"{ "before": "0000000000000000000000000000000000000000" }"#);
        let env = EnvVars::from_pairs([("GITHUB_EVENT_NAME", "push"), ("GITHUB_SHA", "abc")])
            .with("GITHUB_EVENT_PATH", event.path().to_string_lossy());
        let platform = GitHubActions::from_env(&env, &RepoInfo::default()).unwrap();
        assert_eq!(platform.context().base_ref, None);
    }

    #[test]
    fn pull_request_without_payload_fails() {
        let env = EnvVars::from_pairs([("GITHUB_EVENT_NAME", "pull_request_target")]);
        let result = GitHubActions::from_env(&env, &RepoInfo::default());
        assert!(matches!(result, Err(PhylumCiError::Platform { .. })));
    }

    #[test]
    fn comments_require_owner_repo() {
        let result = GitHubComments::new(None, "no-slash", 1, "t".into());
        assert!(result.is_err());
        let ok = GitHubComments::new(Some("https://ghe.example.com/api/v3/"), "a/b", 1, "t".into())
            .unwrap();
        assert_eq!(ok.api_url, "https://ghe.example.com/api/v3");
    }

    #[tokio::test]
    async fn missing_token_on_pull_request_is_reported() {
        let event = event_file(PR_EVENT);
        let env = EnvVars::from_pairs([
            ("GITHUB_EVENT_NAME", "pull_request"),
            ("GITHUB_REPOSITORY", "acme/web"),
        ])
        .with("GITHUB_EVENT_PATH", event.path().to_string_lossy());
        let platform = GitHubActions::from_env(&env, &RepoInfo::default()).unwrap();
        assert!(!platform.has_token());
        let err = platform.post_comment("body").await.unwrap_err();
        assert!(matches!(err, PhylumCiError::MissingCiToken { .. }));
    }

    #[tokio::test]
    async fn missing_repository_is_a_config_error() {
        let event = event_file(PR_EVENT);
        let env = EnvVars::from_pairs([
            ("GITHUB_EVENT_NAME", "pull_request"),
            ("GITHUB_TOKEN", "ghs_x"),
        ])
        .with("GITHUB_EVENT_PATH", event.path().to_string_lossy());
        let platform = GitHubActions::from_env(&env, &RepoInfo::default()).unwrap();
        assert!(platform.has_token());
        let err = platform.post_comment("body").await.unwrap_err();
        assert!(matches!(&err, PhylumCiError::Config(msg) if msg.contains("GITHUB_REPOSITORY")));
        assert_ne!(err.return_code(), ReturnCode::MissingCiToken);
    }

    #[test]
    fn null_sha_detection() {
        assert!(is_null_sha("0000000"));
        assert!(!is_null_sha("0000001"));
    }
}
