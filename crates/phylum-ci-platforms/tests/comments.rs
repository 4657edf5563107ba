use phylum_ci_platforms::{
    AzurePipelines, BitbucketPipelines, CiPlatform, CommentOutcome, EnvVars, GitHubComments,
    GitLabCi, RepoInfo, COMMENT_MARKER,
};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn report(verdict: &str) -> String {
    format!("{COMMENT_MARKER}\n## Phylum analysis\n\n{verdict}\n")
}

mod github {
    use super::*;

    const COMMENTS: &str = "/repos/acme/web/issues/7/comments";

    fn user(login: &str) -> Value {
        let base = format!("https://api.github.com/users/{login}");
        json!({
            "login": login,
            "id": 41898282,
            "node_id": "MDM6Qm90NDE4OTgyODI=",
            "avatar_url": "https://avatars.githubusercontent.com/in/15368?v=4",
            "gravatar_id": "",
            "url": base,
            "html_url": format!("https://github.com/{login}"),
            "followers_url": format!("{base}/followers"),
            "following_url": format!("{base}/following"),
            "gists_url": format!("{base}/gists"),
            "starred_url": format!("{base}/starred"),
            "subscriptions_url": format!("{base}/subscriptions"),
            "organizations_url": format!("{base}/orgs"),
            "repos_url": format!("{base}/repos"),
            "events_url": format!("{base}/events"),
            "received_events_url": format!("{base}/received_events"),
            "type": "Bot",
            "site_admin": false
        })
    }

    fn comment(id: u64, body: &str) -> Value {
        json!({
            "id": id,
            "node_id": format!("IC_{id}"),
            "url": format!("https://api.github.com/repos/acme/web/issues/comments/{id}"),
            "html_url": format!("https://github.com/acme/web/pull/7#issuecomment-{id}"),
            "issue_url": "https://api.github.com/repos/acme/web/issues/7",
            "body": body,
            "user": user("github-actions[bot]"),
            "author_association": "NONE",
            "created_at": "2024-05-01T12:00:00Z",
            "updated_at": "2024-05-01T12:00:00Z"
        })
    }

    async fn server_with(existing: Vec<Value>, expected_posts: u64, body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COMMENTS))
            .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(existing)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(COMMENTS))
            .and(body_partial_json(json!({ "body": body })))
            .respond_with(ResponseTemplate::new(201).set_body_json(comment(900, body)))
            .expect(expected_posts)
            .mount(&server)
            .await;
        server
    }

    fn client(server: &MockServer) -> GitHubComments {
        GitHubComments::new(Some(&server.uri()), "acme/web", 7, "ghs_test".into()).unwrap()
    }

    #[tokio::test]
    async fn first_report_is_posted() {
        let body = report("PASS");
        let server = server_with(vec![comment(1, "LGTM")], 1, &body).await;
        assert_eq!(client(&server).post(&body).await.unwrap(), CommentOutcome::Posted);
    }

    #[tokio::test]
    async fn identical_latest_report_is_not_repeated() {
        let body = report("PASS");
        let existing = vec![
            comment(1, &report("FAIL")),
            comment(2, &body),
            comment(3, "thanks"),
        ];
        let server = server_with(existing, 0, &body).await;
        assert_eq!(
            client(&server).post(&body).await.unwrap(),
            CommentOutcome::Unchanged
        );
    }

    #[tokio::test]
    async fn changed_report_is_posted_again() {
        let body = report("PASS");
        // An older comment matches, but the latest one from this tool does not.
        let existing = vec![comment(1, &body), comment(2, &report("FAIL"))];
        let server = server_with(existing, 1, &body).await;
        assert_eq!(client(&server).post(&body).await.unwrap(), CommentOutcome::Posted);
    }

    #[tokio::test]
    async fn api_error_is_a_platform_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COMMENTS))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "message": "Not Found",
                "documentation_url": "https://docs.github.com/rest"
            })))
            .mount(&server)
            .await;
        let err = client(&server).post(&report("PASS")).await.unwrap_err();
        assert_eq!(err.return_code(), phylum_ci_core::ReturnCode::PlatformFailure);
    }
}

mod gitlab {
    use super::*;

    const NOTES: &str = "/api/v4/projects/99/merge_requests/17/notes";

    fn platform(server: &MockServer) -> GitLabCi {
        let env = EnvVars::from_pairs([
            ("GITLAB_CI", "true"),
            ("CI_MERGE_REQUEST_IID", "17"),
            ("CI_MERGE_REQUEST_SOURCE_BRANCH_NAME", "deps/update"),
            ("CI_COMMIT_SHA", "feedfacecafebeef"),
            ("CI_PROJECT_ID", "99"),
            ("GITLAB_TOKEN", "glpat-test"),
        ])
        .with("CI_API_V4_URL", format!("{}/api/v4", server.uri()));
        GitLabCi::from_env(&env, &RepoInfo::default())
    }

    /// Notes are served newest first, as requested by the client.
    async fn server_with(newest_first: &[&str], expected_posts: u64, body: &str) -> MockServer {
        let server = MockServer::start().await;
        let notes: Vec<Value> = newest_first
            .iter()
            .enumerate()
            .map(|(i, b)| json!({ "id": 100 - i, "body": b, "system": false }))
            .collect();
        Mock::given(method("GET"))
            .and(path(NOTES))
            .and(header("PRIVATE-TOKEN", "glpat-test"))
            .and(query_param("sort", "desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(notes))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(NOTES))
            .and(header("PRIVATE-TOKEN", "glpat-test"))
            .and(body_partial_json(json!({ "body": body })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 500, "body": body })))
            .expect(expected_posts)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn first_note_is_posted() {
        let body = report("PASS");
        let server = server_with(&[], 1, &body).await;
        assert_eq!(
            platform(&server).post_comment(&body).await.unwrap(),
            CommentOutcome::Posted
        );
    }

    #[tokio::test]
    async fn identical_latest_note_is_not_repeated() {
        let body = report("PASS");
        let fail = report("FAIL");
        let server = server_with(&["ship it", &body, &fail], 0, &body).await;
        assert_eq!(
            platform(&server).post_comment(&body).await.unwrap(),
            CommentOutcome::Unchanged
        );
    }

    #[tokio::test]
    async fn changed_note_is_posted_again() {
        let body = report("PASS");
        let fail = report("FAIL");
        let server = server_with(&[&fail, &body], 1, &body).await;
        assert_eq!(
            platform(&server).post_comment(&body).await.unwrap(),
            CommentOutcome::Posted
        );
    }

    #[tokio::test]
    async fn rejected_token_is_a_platform_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(NOTES))
            .respond_with(ResponseTemplate::new(401).set_body_string("401 Unauthorized"))
            .mount(&server)
            .await;
        let err = platform(&server).post_comment(&report("PASS")).await.unwrap_err();
        assert!(err.to_string().contains("HTTP 401"), "{err}");
    }
}

mod bitbucket {
    use super::*;

    const COMMENTS: &str = "/repositories/acme/api/pullrequests/5/comments";

    fn platform(server: &MockServer) -> BitbucketPipelines {
        let env = EnvVars::from_pairs([
            ("BITBUCKET_COMMIT", "c0ffee1234567"),
            ("BITBUCKET_BRANCH", "feature"),
            ("BITBUCKET_PR_ID", "5"),
            ("BITBUCKET_WORKSPACE", "acme"),
            ("BITBUCKET_REPO_SLUG", "api"),
            ("BITBUCKET_TOKEN", "bb-test"),
        ]);
        BitbucketPipelines::from_env(&env, &RepoInfo::default()).with_api_url(&server.uri())
    }

    async fn server_with(newest_first: &[&str], expected_posts: u64, body: &str) -> MockServer {
        let server = MockServer::start().await;
        let values: Vec<Value> = newest_first
            .iter()
            .map(|b| json!({ "content": { "raw": b } }))
            .collect();
        Mock::given(method("GET"))
            .and(path(COMMENTS))
            .and(header("Authorization", "Bearer bb-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "values": values,
                "pagelen": 50
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(COMMENTS))
            .and(body_partial_json(json!({ "content": { "raw": body } })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 1 })))
            .expect(expected_posts)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn posts_once_and_skips_identical_latest() {
        let body = report("PASS");
        let server = server_with(&[], 1, &body).await;
        assert_eq!(
            platform(&server).post_comment(&body).await.unwrap(),
            CommentOutcome::Posted
        );
        drop(server);

        let fail = report("FAIL");
        let server = server_with(&[&body, &fail], 0, &body).await;
        assert_eq!(
            platform(&server).post_comment(&body).await.unwrap(),
            CommentOutcome::Unchanged
        );
    }
}

mod azure {
    use super::*;

    const THREADS: &str = "/acme/web/_apis/git/repositories/repo-1/pullRequests/314/threads";

    fn platform(server: &MockServer) -> AzurePipelines {
        let env = EnvVars::from_pairs([
            ("TF_BUILD", "True"),
            ("BUILD_REASON", "PullRequest"),
            ("SYSTEM_PULLREQUEST_PULLREQUESTID", "314"),
            ("SYSTEM_PULLREQUEST_SOURCEBRANCH", "refs/heads/deps"),
            ("SYSTEM_PULLREQUEST_TARGETBRANCH", "refs/heads/main"),
            ("SYSTEM_TEAMPROJECT", "web"),
            ("BUILD_REPOSITORY_ID", "repo-1"),
            ("AZURE_TOKEN", "az-test"),
        ])
        .with("SYSTEM_COLLECTIONURI", format!("{}/acme/", server.uri()));
        AzurePipelines::from_env(&env, &RepoInfo::default())
    }

    #[tokio::test]
    async fn changed_thread_is_posted_again() {
        let body = report("PASS");
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(THREADS))
            .and(query_param("api-version", "7.0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    { "comments": [{ "content": body }] },
                    { "comments": [{ "content": report("FAIL") }, { "content": "ack" }] }
                ],
                "count": 2
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(THREADS))
            .and(body_partial_json(json!({ "comments": [{ "content": body }] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 77 })))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(
            platform(&server).post_comment(&body).await.unwrap(),
            CommentOutcome::Posted
        );
    }
}
