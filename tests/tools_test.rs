use anyhow::Result;
use gemini_nlp::agent::{self, StateAction};
use gemini_nlp::domain::model::Lifespan;
use gemini_nlp::utils::validation::Validate;
use gemini_nlp::{NlpError, ToolRegistry};
use serde_json::json;

#[tokio::test]
async fn test_issue_workflow_through_registry() -> Result<()> {
    let registry = ToolRegistry::with_defaults();

    let listed = registry
        .invoke("github_list_open_issues", json!({"repo": "project-repo"}))
        .await?;
    assert_eq!(listed.lifespan, Lifespan::Session);
    assert_eq!(listed.data["repository"], "project-repo");
    let issues = listed.data["issues"].as_array().unwrap();
    assert_eq!(issues.len(), 3);
    assert_eq!(issues[0]["priority"], "high");

    let details = registry
        .invoke("github_get_issue_details", json!({"issue_id": 1}))
        .await?;
    assert_eq!(details.data["comments"], 8);

    let created = registry
        .invoke(
            "github_create_issue",
            json!({"title": "Login fails", "description": "OAuth callback 500s"}),
        )
        .await?;
    assert_eq!(created.data["id"], 111);
    assert!(created.data["created_at"].as_str().is_some());

    let reopened = registry
        .invoke("github_reopen_issue", json!({"issue_id": 111}))
        .await?;
    assert_eq!(reopened.data["status"], "reopened");
    Ok(())
}

#[tokio::test]
async fn test_pull_request_workflow_through_registry() -> Result<()> {
    let registry = ToolRegistry::with_defaults();

    let listed = registry
        .invoke("github_list_pull_requests", json!({"repo": "anything"}))
        .await?;
    assert_eq!(listed.data["count"], 2);

    let created = registry
        .invoke(
            "github_create_pull_request",
            json!({
                "title": "Add retries",
                "description": "Backoff on 5xx",
                "branch": "feature/retries",
                "target_branch": "develop"
            }),
        )
        .await?;
    assert_eq!(created.data["id"], 211);
    assert_eq!(created.data["target_branch"], "develop");
    assert_eq!(created.data["author"], "dev-agent");

    let closed = registry
        .invoke("github_close_pull_request", json!({"pr_id": 211}))
        .await?;
    assert_eq!(closed.data["reason"], "declined");
    assert!(closed.is_success());
    Ok(())
}

#[tokio::test]
async fn test_failure_payloads_use_response_lifespan() -> Result<()> {
    let registry = ToolRegistry::with_defaults();

    for (name, args) in [
        ("github_get_issue_details", json!({"issue_id": 404})),
        ("github_get_pull_request_details", json!({"pr_id": 404})),
        ("deployment_status_checker", json!({"environment": "moon"})),
    ] {
        let result = registry.invoke(name, args).await?;
        assert!(!result.is_success(), "{} should fail", name);
        assert_eq!(result.lifespan, Lifespan::Response);
        assert!(result.data["error"].as_str().unwrap().contains("not found"));
    }
    Ok(())
}

#[tokio::test]
async fn test_bad_invocations_are_errors() {
    let registry = ToolRegistry::with_defaults();

    let unknown = registry.invoke("github_delete_repo", json!({})).await;
    match unknown {
        Err(NlpError::ToolError { name, .. }) => assert_eq!(name, "github_delete_repo"),
        other => panic!("expected tool error, got {:?}", other),
    }

    let missing = registry
        .invoke("sandbox_run_tests", json!({"repo": "my-repo"}))
        .await;
    assert!(matches!(missing, Err(NlpError::ToolError { .. })));
}

#[tokio::test]
async fn test_sandbox_result_is_stable_per_commit() -> Result<()> {
    let registry = ToolRegistry::with_defaults();
    let args = json!({"repo": "my-repo", "commit_sha": "3f2c9a1e7b"});

    let first = registry.invoke("sandbox_run_tests", args.clone()).await?;
    let second = registry.invoke("sandbox_run_tests", args).await?;
    assert_eq!(first.data, second.data);
    assert_eq!(
        first.data["log_url"],
        "https://internal-logs.example/run/3f2c9a1e"
    );
    Ok(())
}

#[test]
fn test_blueprint_matches_registry() -> Result<()> {
    let registry = ToolRegistry::with_defaults();
    let blueprint = agent::project_manager();
    blueprint.validate()?;
    blueprint.validate_tools(&registry)?;

    let referenced = blueprint.tool_names();
    for name in registry.names() {
        assert!(referenced.contains(name), "{} is never referenced", name);
    }

    let ci = blueprint
        .journeys
        .iter()
        .find(|j| j.title == "CI/CD Troubleshooting")
        .unwrap();
    let first_tool = ci
        .states
        .iter()
        .find_map(|s| match &s.action {
            StateAction::Tool { tool } => Some(tool.as_str()),
            _ => None,
        });
    assert_eq!(first_tool, Some("sandbox_run_tests"));
    Ok(())
}

#[test]
fn test_registry_usable_from_sync_code() {
    let registry = ToolRegistry::with_defaults();
    let result = tokio_test::block_on(registry.invoke("code_review_analyzer", json!({"pr_id": 2})));
    let result = tokio_test::assert_ok!(result);
    assert_eq!(result.data["pr_id"], 2);
    assert_eq!(result.data["test_coverage"]["target"], "85%");
}
