//! 提供給代理宿主呼叫的模擬工具。所有工具都回傳固定或簡單參數化的資料，不連接真實服務。

pub mod dev;
pub mod github;

use crate::domain::model::ToolResult;
use crate::domain::ports::Tool;
use crate::utils::error::{NlpError, Result};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;

/// 解析工具參數，失敗時轉為工具錯誤
pub(crate) fn parse_args<A: DeserializeOwned>(tool: &str, args: Value) -> Result<A> {
    serde_json::from_value(args).map_err(|e| NlpError::ToolError {
        name: tool.to_string(),
        message: format!("invalid arguments: {}", e),
    })
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 註冊所有內建的模擬工具
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for tool in github::tools().into_iter().chain(dev::tools()) {
            registry.register(tool);
        }
        registry
    }

    /// 同名工具會被取代
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        if let Some(slot) = self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            tracing::debug!("Replacing tool '{}'", tool.name());
            *slot = tool;
        } else {
            self.tools.push(tool);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 給宿主的工具定義清單
    pub fn definitions(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name(),
                    "description": t.description(),
                    "parameters": t.parameters(),
                })
            })
            .collect()
    }

    pub async fn invoke(&self, name: &str, args: Value) -> Result<ToolResult> {
        let tool = self.get(name).ok_or_else(|| NlpError::ToolError {
            name: name.to_string(),
            message: "unknown tool".to_string(),
        })?;
        tracing::info!("🔧 Invoking tool '{}'", name);
        let result = tool.call(args).await?;
        tracing::debug!(
            "Tool '{}' finished (success: {}, lifespan: {:?})",
            name,
            result.is_success(),
            result.lifespan
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Lifespan;

    #[test]
    fn test_default_registry_has_all_tools() {
        let registry = ToolRegistry::with_defaults();
        assert_eq!(registry.len(), 14);
        for name in [
            "github_list_open_issues",
            "github_get_issue_details",
            "github_create_issue",
            "github_close_issue",
            "github_reopen_issue",
            "github_list_pull_requests",
            "github_get_pull_request_details",
            "github_create_pull_request",
            "github_merge_pull_request",
            "github_close_pull_request",
            "sandbox_run_tests",
            "vector_retriever_search",
            "code_review_analyzer",
            "deployment_status_checker",
        ] {
            assert!(registry.contains(name), "missing {}", name);
        }
    }

    #[test]
    fn test_definitions_carry_parameter_schemas() {
        let registry = ToolRegistry::with_defaults();
        let definitions = registry.definitions();
        assert_eq!(definitions.len(), registry.len());
        assert!(definitions
            .iter()
            .all(|d| d["parameters"]["type"] == "object"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error() {
        let registry = ToolRegistry::with_defaults();
        let result = registry.invoke("delete_everything", json!({})).await;
        assert!(matches!(result, Err(NlpError::ToolError { .. })));
    }

    #[tokio::test]
    async fn test_invalid_arguments_are_error() {
        let registry = ToolRegistry::with_defaults();
        let result = registry
            .invoke("github_get_issue_details", json!({"issue_id": "one"}))
            .await;
        assert!(matches!(result, Err(NlpError::ToolError { .. })));
    }

    #[tokio::test]
    async fn test_invoke_returns_tool_result() {
        let registry = ToolRegistry::with_defaults();
        let result = registry
            .invoke("github_close_issue", json!({"issue_id": 3}))
            .await
            .unwrap();
        assert!(result.is_success());
        assert_eq!(result.lifespan, Lifespan::Session);
        assert_eq!(result.data["status"], "closed");
    }
}
