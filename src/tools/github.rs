//! GitHub 議題與合併請求的模擬工具，資料為固定內容。

use super::{now_rfc3339, parse_args};
use crate::domain::model::ToolResult;
use crate::domain::ports::Tool;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// 只有這些儲存庫會回傳議題
pub const KNOWN_REPOSITORIES: [&str; 3] = ["my-repo", "project-repo", "main-repo"];

pub fn tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(ListOpenIssues),
        Arc::new(GetIssueDetails),
        Arc::new(CreateIssue),
        Arc::new(CloseIssue),
        Arc::new(ReopenIssue),
        Arc::new(ListPullRequests),
        Arc::new(GetPullRequestDetails),
        Arc::new(CreatePullRequest),
        Arc::new(MergePullRequest),
        Arc::new(ClosePullRequest),
    ]
}

pub(crate) fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn with_success(mut payload: Value, message: Option<String>) -> Value {
    if let Some(map) = payload.as_object_mut() {
        map.insert("success".to_string(), Value::Bool(true));
        if let Some(message) = message {
            map.insert("message".to_string(), Value::String(message));
        }
    }
    payload
}

fn canned_issues() -> Vec<Value> {
    vec![
        json!({
            "id": 1,
            "title": "Bug in authentication module",
            "status": "open",
            "assignee": "john.doe",
            "created_at": "2024-01-15T10:30:00Z",
            "priority": "high",
            "labels": ["bug", "authentication"]
        }),
        json!({
            "id": 2,
            "title": "Add new user dashboard feature",
            "status": "open",
            "assignee": "jane.smith",
            "created_at": "2024-01-20T14:45:00Z",
            "priority": "medium",
            "labels": ["enhancement", "frontend"]
        }),
        json!({
            "id": 3,
            "title": "Performance optimization for database queries",
            "status": "open",
            "assignee": "bob.wilson",
            "created_at": "2024-01-22T09:15:00Z",
            "priority": "low",
            "labels": ["performance", "database"]
        }),
    ]
}

fn issue_details(issue_id: i64) -> Option<Value> {
    match issue_id {
        1 => Some(json!({
            "id": 1,
            "title": "Bug in authentication module",
            "status": "open",
            "description": "Users are experiencing login failures with social OAuth providers. The error occurs intermittently and affects approximately 15% of login attempts.",
            "assignee": "john.doe",
            "created_at": "2024-01-15T10:30:00Z",
            "updated_at": "2024-01-25T16:22:00Z",
            "priority": "high",
            "labels": ["bug", "authentication"],
            "comments": 8,
            "milestone": "v2.1.0"
        })),
        2 => Some(json!({
            "id": 2,
            "title": "Add new user dashboard feature",
            "status": "open",
            "description": "Create a comprehensive user dashboard with analytics, recent activity, and customizable widgets.",
            "assignee": "jane.smith",
            "created_at": "2024-01-20T14:45:00Z",
            "updated_at": "2024-01-24T11:30:00Z",
            "priority": "medium",
            "labels": ["enhancement", "frontend"],
            "comments": 3,
            "milestone": "v2.2.0"
        })),
        _ => None,
    }
}

fn canned_pull_requests() -> Vec<Value> {
    vec![
        json!({
            "id": 1,
            "title": "Implement user authentication improvements",
            "status": "open",
            "author": "john.doe",
            "created_at": "2024-01-18T12:00:00Z",
            "branch": "feature/auth-improvements",
            "target_branch": "main",
            "commits": 5,
            "files_changed": 12,
            "additions": 234,
            "deletions": 89
        }),
        json!({
            "id": 2,
            "title": "Fix critical bug in payment processing",
            "status": "open",
            "author": "jane.smith",
            "created_at": "2024-01-22T09:30:00Z",
            "branch": "hotfix/payment-bug",
            "target_branch": "main",
            "commits": 2,
            "files_changed": 3,
            "additions": 45,
            "deletions": 12
        }),
    ]
}

fn pull_request_details(pr_id: i64) -> Option<Value> {
    let (mut details, description, updated_at, reviews) = match pr_id {
        1 => (
            canned_pull_requests().remove(0),
            "Implements OAuth2 integration, enhanced security measures, and better error handling.",
            "2024-01-25T14:20:00Z",
            json!(["approved", "pending"]),
        ),
        2 => (
            canned_pull_requests().remove(1),
            "Urgent fix for transaction failures, with proper error handling and transaction rollback.",
            "2024-01-24T16:45:00Z",
            json!(["approved"]),
        ),
        _ => return None,
    };
    if let Some(map) = details.as_object_mut() {
        map.insert("description".to_string(), json!(description));
        map.insert("updated_at".to_string(), json!(updated_at));
        map.insert("reviews".to_string(), reviews);
        map.insert(
            "checks".to_string(),
            json!({"ci": "passing", "tests": "passing", "security": "passing"}),
        );
    }
    Some(details)
}

#[derive(Debug, Deserialize)]
struct RepoArgs {
    repo: String,
}

#[derive(Debug, Deserialize)]
struct IssueArgs {
    issue_id: i64,
}

#[derive(Debug, Deserialize)]
struct PullRequestArgs {
    pr_id: i64,
}

#[derive(Debug, Deserialize)]
struct CreateIssueArgs {
    title: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct CreatePullRequestArgs {
    title: String,
    description: String,
    branch: String,
    #[serde(default = "default_target_branch")]
    target_branch: String,
}

fn default_target_branch() -> String {
    "main".to_string()
}

#[derive(Debug, Deserialize)]
struct MergeArgs {
    pr_id: i64,
    #[serde(default = "default_merge_method")]
    merge_method: String,
}

fn default_merge_method() -> String {
    "merge".to_string()
}

pub struct ListOpenIssues;

#[async_trait]
impl Tool for ListOpenIssues {
    fn name(&self) -> &'static str {
        "github_list_open_issues"
    }

    fn description(&self) -> &'static str {
        "List all open issues in a GitHub repository"
    }

    fn parameters(&self) -> Value {
        object_schema(json!({"repo": {"type": "string"}}), &["repo"])
    }

    async fn call(&self, args: Value) -> Result<ToolResult> {
        let args: RepoArgs = parse_args(self.name(), args)?;
        let known = KNOWN_REPOSITORIES.contains(&args.repo.to_lowercase().as_str());
        let issues = if known { canned_issues() } else { Vec::new() };
        Ok(ToolResult::session(json!({
            "repository": args.repo,
            "count": issues.len(),
            "issues": issues,
            "success": true,
        })))
    }
}

pub struct GetIssueDetails;

#[async_trait]
impl Tool for GetIssueDetails {
    fn name(&self) -> &'static str {
        "github_get_issue_details"
    }

    fn description(&self) -> &'static str {
        "Get detailed information about a specific GitHub issue"
    }

    fn parameters(&self) -> Value {
        object_schema(json!({"issue_id": {"type": "integer"}}), &["issue_id"])
    }

    async fn call(&self, args: Value) -> Result<ToolResult> {
        let args: IssueArgs = parse_args(self.name(), args)?;
        Ok(match issue_details(args.issue_id) {
            Some(issue) => ToolResult::session(with_success(issue, None)),
            None => ToolResult::failure(format!("Issue #{} not found", args.issue_id)),
        })
    }
}

pub struct CreateIssue;

#[async_trait]
impl Tool for CreateIssue {
    fn name(&self) -> &'static str {
        "github_create_issue"
    }

    fn description(&self) -> &'static str {
        "Create a new issue in a GitHub repository"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({
                "title": {"type": "string"},
                "description": {"type": "string"}
            }),
            &["title", "description"],
        )
    }

    async fn call(&self, args: Value) -> Result<ToolResult> {
        let args: CreateIssueArgs = parse_args(self.name(), args)?;
        let issue = json!({
            "id": 100 + args.title.chars().count(),
            "title": args.title,
            "description": args.description,
            "status": "open",
            "assignee": "unassigned",
            "created_at": now_rfc3339(),
            "labels": [],
            "priority": "medium",
            "comments": 0,
        });
        let message = format!("Issue '{}' created successfully", args.title);
        Ok(ToolResult::session(with_success(issue, Some(message))))
    }
}

pub struct CloseIssue;

#[async_trait]
impl Tool for CloseIssue {
    fn name(&self) -> &'static str {
        "github_close_issue"
    }

    fn description(&self) -> &'static str {
        "Close an existing GitHub issue"
    }

    fn parameters(&self) -> Value {
        object_schema(json!({"issue_id": {"type": "integer"}}), &["issue_id"])
    }

    async fn call(&self, args: Value) -> Result<ToolResult> {
        let args: IssueArgs = parse_args(self.name(), args)?;
        Ok(ToolResult::session(json!({
            "id": args.issue_id,
            "status": "closed",
            "closed_at": now_rfc3339(),
            "reason": "resolved",
            "success": true,
            "message": format!("Issue #{} closed successfully", args.issue_id),
        })))
    }
}

pub struct ReopenIssue;

#[async_trait]
impl Tool for ReopenIssue {
    fn name(&self) -> &'static str {
        "github_reopen_issue"
    }

    fn description(&self) -> &'static str {
        "Reopen a previously closed GitHub issue"
    }

    fn parameters(&self) -> Value {
        object_schema(json!({"issue_id": {"type": "integer"}}), &["issue_id"])
    }

    async fn call(&self, args: Value) -> Result<ToolResult> {
        let args: IssueArgs = parse_args(self.name(), args)?;
        Ok(ToolResult::session(json!({
            "id": args.issue_id,
            "status": "reopened",
            "reopened_at": now_rfc3339(),
            "success": true,
            "message": format!("Issue #{} reopened successfully", args.issue_id),
        })))
    }
}

pub struct ListPullRequests;

#[async_trait]
impl Tool for ListPullRequests {
    fn name(&self) -> &'static str {
        "github_list_pull_requests"
    }

    fn description(&self) -> &'static str {
        "List pull requests in a GitHub repository"
    }

    fn parameters(&self) -> Value {
        object_schema(json!({"repo": {"type": "string"}}), &["repo"])
    }

    async fn call(&self, args: Value) -> Result<ToolResult> {
        let args: RepoArgs = parse_args(self.name(), args)?;
        let pull_requests = canned_pull_requests();
        Ok(ToolResult::session(json!({
            "repository": args.repo,
            "count": pull_requests.len(),
            "pull_requests": pull_requests,
            "success": true,
        })))
    }
}

pub struct GetPullRequestDetails;

#[async_trait]
impl Tool for GetPullRequestDetails {
    fn name(&self) -> &'static str {
        "github_get_pull_request_details"
    }

    fn description(&self) -> &'static str {
        "Get detailed information about a specific pull request"
    }

    fn parameters(&self) -> Value {
        object_schema(json!({"pr_id": {"type": "integer"}}), &["pr_id"])
    }

    async fn call(&self, args: Value) -> Result<ToolResult> {
        let args: PullRequestArgs = parse_args(self.name(), args)?;
        Ok(match pull_request_details(args.pr_id) {
            Some(pr) => ToolResult::session(with_success(pr, None)),
            None => ToolResult::failure(format!("Pull request #{} not found", args.pr_id)),
        })
    }
}

pub struct CreatePullRequest;

#[async_trait]
impl Tool for CreatePullRequest {
    fn name(&self) -> &'static str {
        "github_create_pull_request"
    }

    fn description(&self) -> &'static str {
        "Create a new pull request in a GitHub repository"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({
                "title": {"type": "string"},
                "description": {"type": "string"},
                "branch": {"type": "string"},
                "target_branch": {"type": "string", "default": "main"}
            }),
            &["title", "description", "branch"],
        )
    }

    async fn call(&self, args: Value) -> Result<ToolResult> {
        let args: CreatePullRequestArgs = parse_args(self.name(), args)?;
        let pr = json!({
            "id": 200 + args.title.chars().count(),
            "title": args.title,
            "description": args.description,
            "status": "open",
            "author": "dev-agent",
            "created_at": now_rfc3339(),
            "branch": args.branch,
            "target_branch": args.target_branch,
            "commits": 1,
            "files_changed": 1,
            "additions": 50,
            "deletions": 10,
        });
        let message = format!("Pull request '{}' created successfully", args.title);
        Ok(ToolResult::session(with_success(pr, Some(message))))
    }
}

pub struct MergePullRequest;

#[async_trait]
impl Tool for MergePullRequest {
    fn name(&self) -> &'static str {
        "github_merge_pull_request"
    }

    fn description(&self) -> &'static str {
        "Merge a pull request in a GitHub repository"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({
                "pr_id": {"type": "integer"},
                "merge_method": {"type": "string", "enum": ["merge", "squash", "rebase"], "default": "merge"}
            }),
            &["pr_id"],
        )
    }

    async fn call(&self, args: Value) -> Result<ToolResult> {
        let args: MergeArgs = parse_args(self.name(), args)?;
        Ok(ToolResult::session(json!({
            "id": args.pr_id,
            "status": "merged",
            "merged_at": now_rfc3339(),
            "merge_method": args.merge_method,
            "success": true,
            "message": format!("Pull request #{} merged successfully", args.pr_id),
        })))
    }
}

pub struct ClosePullRequest;

#[async_trait]
impl Tool for ClosePullRequest {
    fn name(&self) -> &'static str {
        "github_close_pull_request"
    }

    fn description(&self) -> &'static str {
        "Close a pull request without merging"
    }

    fn parameters(&self) -> Value {
        object_schema(json!({"pr_id": {"type": "integer"}}), &["pr_id"])
    }

    async fn call(&self, args: Value) -> Result<ToolResult> {
        let args: PullRequestArgs = parse_args(self.name(), args)?;
        Ok(ToolResult::session(json!({
            "id": args.pr_id,
            "status": "closed",
            "closed_at": now_rfc3339(),
            "reason": "declined",
            "success": true,
            "message": format!("Pull request #{} closed", args.pr_id),
        })))
    }
}
