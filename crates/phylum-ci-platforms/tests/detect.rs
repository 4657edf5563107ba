use phylum_ci_platforms::{detect, ChangeKind, CommentOutcome, EnvVars, RepoInfo};

fn repo() -> RepoInfo {
    RepoInfo {
        branch: Some("topic".into()),
        head_sha: Some("0123456789abcdef".into()),
    }
}

#[test]
fn detection_order() {
    let cases = [
        (vec![("GITHUB_ACTIONS", "true"), ("GITHUB_EVENT_NAME", "push")], "GitHub Actions"),
        (vec![("GITLAB_CI", "true")], "GitLab CI"),
        (vec![("TF_BUILD", "True")], "Azure Pipelines"),
        (vec![("BITBUCKET_COMMIT", "abc")], "Bitbucket Pipelines"),
        (vec![("PRE_COMMIT", "1")], "pre-commit"),
        (vec![], "none"),
        // A CI provider wins over the pre-commit marker.
        (vec![("GITLAB_CI", "true"), ("PRE_COMMIT", "1")], "GitLab CI"),
        // Unset-looking values do not count.
        (vec![("GITHUB_ACTIONS", "false"), ("BITBUCKET_COMMIT", "")], "none"),
    ];
    for (pairs, expected) in cases {
        let env = EnvVars::from_pairs(pairs.clone());
        let platform = detect(&env, &repo(), false).unwrap();
        assert_eq!(platform.name(), expected, "{pairs:?}");
    }
}

#[test]
fn staged_arguments_select_pre_commit() {
    let platform = detect(&EnvVars::default(), &repo(), true).unwrap();
    let ctx = platform.context();
    assert_eq!(ctx.kind, ChangeKind::Staged);
    assert_eq!(ctx.label, "pre-commit_topic");
}

#[test]
fn local_fallback_compares_against_default_branch() {
    let platform = detect(&EnvVars::default(), &repo(), false).unwrap();
    let ctx = platform.context();
    assert_eq!(ctx.kind, ChangeKind::Local);
    assert_eq!(ctx.base_ref, None);
    assert_eq!(ctx.head_ref.as_deref(), Some("0123456789abcdef"));
    assert_eq!(ctx.label, "local_topic_0123456");
    assert!(!platform.requires_token());
}

#[test]
fn github_push_falls_back_to_repo_info() {
    let env = EnvVars::from_pairs([("GITHUB_ACTIONS", "true"), ("GITHUB_EVENT_NAME", "push")]);
    let ctx = detect(&env, &repo(), false).unwrap().context();
    assert_eq!(ctx.kind, ChangeKind::Branch);
    assert_eq!(ctx.label, "GitHub_topic_0123456");
}

#[tokio::test]
async fn branch_builds_skip_comments() {
    let env = EnvVars::from_pairs([("BITBUCKET_COMMIT", "abc"), ("BITBUCKET_BRANCH", "main")]);
    let platform = detect(&env, &repo(), false).unwrap();
    assert_eq!(platform.post_comment("hello").await.unwrap(), CommentOutcome::Skipped);
}
