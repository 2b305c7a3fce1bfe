//! 測試、搜尋、程式碼審查與部署狀態的模擬工具

use super::github::object_schema;
use super::{now_rfc3339, parse_args};
use crate::domain::model::ToolResult;
use crate::domain::ports::Tool;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub const DEFAULT_TOP_K: usize = 5;
const LOG_BASE_URL: &str = "https://internal-logs.example/run";

pub fn tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(SandboxRunTests),
        Arc::new(VectorRetrieverSearch),
        Arc::new(CodeReviewAnalyzer),
        Arc::new(DeploymentStatusChecker),
    ]
}

/// 以提交 SHA 決定測試結果，同一個提交永遠得到同樣的結果
pub fn sandbox_passes(commit_sha: &str) -> bool {
    // 位元組總和的奇偶，只累加最低位元
    let parity = commit_sha.bytes().fold(0u8, |acc, b| acc ^ (b & 1));
    parity == 0
}

#[derive(Debug, Deserialize)]
struct SandboxArgs {
    repo: String,
    commit_sha: String,
}

pub struct SandboxRunTests;

#[async_trait]
impl Tool for SandboxRunTests {
    fn name(&self) -> &'static str {
        "sandbox_run_tests"
    }

    fn description(&self) -> &'static str {
        "Run tests in a sandboxed environment"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({
                "repo": {"type": "string"},
                "commit_sha": {"type": "string"}
            }),
            &["repo", "commit_sha"],
        )
    }

    async fn call(&self, args: Value) -> Result<ToolResult> {
        let args: SandboxArgs = parse_args(self.name(), args)?;
        let short_sha: String = args.commit_sha.chars().take(8).collect();
        let log_url = format!("{}/{}", LOG_BASE_URL, short_sha);
        tracing::debug!("Sandbox run for {}@{}", args.repo, short_sha);

        let payload = if sandbox_passes(&args.commit_sha) {
            json!({
                "success": true,
                "repo": args.repo,
                "tests_run": 45,
                "tests_passed": 45,
                "tests_failed": 0,
                "duration": "2m 34s",
                "coverage": "87%",
                "log_url": log_url,
            })
        } else {
            json!({
                "success": false,
                "repo": args.repo,
                "tests_run": 45,
                "tests_passed": 42,
                "tests_failed": 3,
                "failed_tests": [
                    "tests/test_authentication.py::test_oauth_login",
                    "tests/test_payment.py::test_invalid_card",
                    "tests/test_database.py::test_connection_timeout"
                ],
                "duration": "2m 12s",
                "coverage": "82%",
                "log_url": log_url,
            })
        };
        Ok(ToolResult::response(payload))
    }
}

fn search_corpus() -> Vec<Value> {
    vec![
        json!({
            "id": "doc-auth-001",
            "score": 0.95,
            "title": "Authentication Module Documentation",
            "snippet": "OAuth2 implementation with proper error handling. Common issues: token expiration, invalid client credentials.",
            "type": "documentation",
            "file_path": "docs/authentication.md"
        }),
        json!({
            "id": "code-auth-002",
            "score": 0.89,
            "title": "Authentication Service Class",
            "snippet": "def handle_oauth_login(self, provider, token): if not token: raise AuthError('Invalid token') ...",
            "type": "code",
            "file_path": "src/auth/service.py"
        }),
        json!({
            "id": "issue-auth-003",
            "score": 0.84,
            "title": "Similar Issue Resolution",
            "snippet": "Fixed similar OAuth login failures by updating token validation logic and improving error messages.",
            "type": "issue",
            "file_path": "issues/resolved/auth-fix-234.md"
        }),
        json!({
            "id": "test-auth-004",
            "score": 0.78,
            "title": "Authentication Test Cases",
            "snippet": "Test cases covering OAuth flow, token validation, and error scenarios. Includes mock providers setup.",
            "type": "test",
            "file_path": "tests/test_authentication.py"
        }),
    ]
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default = "default_top_k")]
    top_k: usize,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

pub struct VectorRetrieverSearch;

#[async_trait]
impl Tool for VectorRetrieverSearch {
    fn name(&self) -> &'static str {
        "vector_retriever_search"
    }

    fn description(&self) -> &'static str {
        "Search for relevant documentation and code snippets using vector search"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({
                "query": {"type": "string"},
                "top_k": {"type": "integer", "default": DEFAULT_TOP_K}
            }),
            &["query"],
        )
    }

    async fn call(&self, args: Value) -> Result<ToolResult> {
        let args: SearchArgs = parse_args(self.name(), args)?;
        let corpus = search_corpus();
        let total = corpus.len();
        let hits: Vec<Value> = corpus.into_iter().take(args.top_k).collect();
        Ok(ToolResult::response(json!({
            "query": args.query,
            "total_results": total,
            "returned_results": hits.len(),
            "hits": hits,
            "success": true,
        })))
    }
}

#[derive(Debug, Deserialize)]
struct ReviewArgs {
    pr_id: i64,
}

pub struct CodeReviewAnalyzer;

#[async_trait]
impl Tool for CodeReviewAnalyzer {
    fn name(&self) -> &'static str {
        "code_review_analyzer"
    }

    fn description(&self) -> &'static str {
        "Analyze code changes in a pull request for potential issues"
    }

    fn parameters(&self) -> Value {
        object_schema(json!({"pr_id": {"type": "integer"}}), &["pr_id"])
    }

    async fn call(&self, args: Value) -> Result<ToolResult> {
        let args: ReviewArgs = parse_args(self.name(), args)?;
        Ok(ToolResult::response(json!({
            "pr_id": args.pr_id,
            "security_issues": [
                {"severity": "medium", "description": "Potential SQL injection in user input handling"},
                {"severity": "low", "description": "Hardcoded API endpoint in configuration"}
            ],
            "performance_issues": [
                {"severity": "high", "description": "N+1 query detected in user data fetching"},
                {"severity": "medium", "description": "Large payload size in API response"}
            ],
            "best_practices": [
                {"type": "warning", "description": "Missing error handling in async function"},
                {"type": "suggestion", "description": "Consider using dependency injection pattern"}
            ],
            "test_coverage": {
                "current": "78%",
                "target": "85%",
                "missing_coverage": ["error_handler.py", "utils/validation.py"]
            },
            "overall_score": 7.5,
            "success": true,
        })))
    }
}

fn environment_status(environment: &str) -> Option<(&'static str, &'static str)> {
    match environment {
        "dev" => Some(("v2.1.3-dev", "99.2%")),
        "staging" => Some(("v2.1.2", "98.7%")),
        "production" => Some(("v2.1.1", "99.9%")),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct DeploymentArgs {
    environment: String,
}

pub struct DeploymentStatusChecker;

#[async_trait]
impl Tool for DeploymentStatusChecker {
    fn name(&self) -> &'static str {
        "deployment_status_checker"
    }

    fn description(&self) -> &'static str {
        "Check the deployment status of different environments"
    }

    fn parameters(&self) -> Value {
        object_schema(
            json!({
                "environment": {"type": "string", "enum": ["dev", "staging", "production"]}
            }),
            &["environment"],
        )
    }

    async fn call(&self, args: Value) -> Result<ToolResult> {
        let args: DeploymentArgs = parse_args(self.name(), args)?;
        let Some((version, uptime)) = environment_status(&args.environment.to_lowercase()) else {
            return Ok(ToolResult::failure(format!(
                "Environment '{}' not found",
                args.environment
            )));
        };
        Ok(ToolResult::response(json!({
            "environment": args.environment,
            "status": "healthy",
            "version": version,
            "uptime": uptime,
            "last_checked": now_rfc3339(),
            "success": true,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Lifespan;

    #[test]
    fn test_sandbox_outcome_is_deterministic() {
        // 'b' = 98, 'a' = 97
        assert!(sandbox_passes("b"));
        assert!(!sandbox_passes("a"));
        assert_eq!(sandbox_passes("deadbeef42"), sandbox_passes("deadbeef42"));
        assert!(sandbox_passes("bb"));
        assert!(!sandbox_passes("ab"));
    }

    #[test]
    fn test_sandbox_handles_very_long_sha() {
        // 總和遠超過 u32 範圍
        let long = "z".repeat(40_000_000);
        assert!(sandbox_passes(&long));
        assert!(!sandbox_passes(&format!("{}a", long)));
    }

    #[tokio::test]
    async fn test_sandbox_payloads() {
        let passed = SandboxRunTests
            .call(json!({"repo": "my-repo", "commit_sha": "bbbbbbbbbbbb"}))
            .await
            .unwrap();
        assert!(passed.is_success());
        assert_eq!(passed.data["tests_failed"], 0);
        assert_eq!(
            passed.data["log_url"],
            "https://internal-logs.example/run/bbbbbbbb"
        );
        assert_eq!(passed.lifespan, Lifespan::Response);

        let failed = SandboxRunTests
            .call(json!({"repo": "my-repo", "commit_sha": "a"}))
            .await
            .unwrap();
        assert!(!failed.is_success());
        assert_eq!(failed.data["failed_tests"].as_array().unwrap().len(), 3);
        assert_eq!(failed.data["log_url"], "https://internal-logs.example/run/a");
    }

    #[tokio::test]
    async fn test_search_truncates_to_top_k() {
        let default = VectorRetrieverSearch
            .call(json!({"query": "oauth"}))
            .await
            .unwrap();
        assert_eq!(default.data["returned_results"], 4);
        assert_eq!(default.data["total_results"], 4);

        let two = VectorRetrieverSearch
            .call(json!({"query": "oauth", "top_k": 2}))
            .await
            .unwrap();
        assert_eq!(two.data["hits"].as_array().unwrap().len(), 2);
        assert_eq!(two.data["hits"][0]["id"], "doc-auth-001");
    }

    #[tokio::test]
    async fn test_code_review_score() {
        let result = CodeReviewAnalyzer.call(json!({"pr_id": 1})).await.unwrap();
        assert_eq!(result.data["overall_score"], 7.5);
        assert_eq!(result.data["pr_id"], 1);
    }

    #[tokio::test]
    async fn test_deployment_status() {
        let staging = DeploymentStatusChecker
            .call(json!({"environment": "Staging"}))
            .await
            .unwrap();
        assert!(staging.is_success());
        assert_eq!(staging.data["version"], "v2.1.2");

        let unknown = DeploymentStatusChecker
            .call(json!({"environment": "qa"}))
            .await
            .unwrap();
        assert!(!unknown.is_success());
        assert_eq!(unknown.data["error"], "Environment 'qa' not found");
    }
}
