//! 代理藍圖：交給代理宿主的設定資料（詞彙、變數、準則、旅程）。
//!
//! 本模組只描述資料，不執行對話流程。

use crate::tools::ToolRegistry;
use crate::utils::error::{NlpError, Result};
use crate::utils::validation::{validate_non_empty_string, Validate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentBlueprint {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub glossary: Vec<Term>,
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub guidelines: Vec<Guideline>,
    #[serde(default)]
    pub journeys: Vec<Journey>,
    #[serde(default)]
    pub canned_responses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub description: String,
    pub initial_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guideline {
    pub condition: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StateAction {
    Initial,
    Chat { text: String },
    Tool { tool: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyState {
    pub id: usize,
    #[serde(flatten)]
    pub action: StateAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from: usize,
    pub to: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journey {
    pub title: String,
    pub description: String,
    pub conditions: Vec<String>,
    #[serde(default)]
    pub canned_responses: Vec<String>,
    pub states: Vec<JourneyState>,
    pub transitions: Vec<Transition>,
}

impl Journey {
    pub const INITIAL_STATE: usize = 0;

    pub fn new(title: &str, description: &str, conditions: &[&str]) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            conditions: conditions.iter().map(|c| c.to_string()).collect(),
            canned_responses: Vec::new(),
            states: vec![JourneyState {
                id: Self::INITIAL_STATE,
                action: StateAction::Initial,
            }],
            transitions: Vec::new(),
        }
    }

    pub fn canned(mut self, template: &str) -> Self {
        self.canned_responses.push(template.to_string());
        self
    }

    fn transition_to(&mut self, from: usize, condition: Option<&str>, action: StateAction) -> usize {
        let id = self.states.len();
        self.states.push(JourneyState { id, action });
        self.transitions.push(Transition {
            from,
            to: id,
            condition: condition.map(str::to_string),
        });
        id
    }

    /// 新增一個聊天狀態，回傳其編號
    pub fn chat(&mut self, from: usize, condition: Option<&str>, text: &str) -> usize {
        self.transition_to(
            from,
            condition,
            StateAction::Chat {
                text: text.to_string(),
            },
        )
    }

    /// 新增一個呼叫工具的狀態，回傳其編號
    pub fn tool(&mut self, from: usize, condition: Option<&str>, tool: &str) -> usize {
        self.transition_to(
            from,
            condition,
            StateAction::Tool {
                tool: tool.to_string(),
            },
        )
    }

    pub fn tool_names(&self) -> impl Iterator<Item = &str> {
        self.states.iter().filter_map(|s| match &s.action {
            StateAction::Tool { tool } => Some(tool.as_str()),
            _ => None,
        })
    }
}

impl AgentBlueprint {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            glossary: Vec::new(),
            variables: Vec::new(),
            guidelines: Vec::new(),
            journeys: Vec::new(),
            canned_responses: Vec::new(),
        }
    }

    pub fn term(mut self, name: &str, description: &str, synonyms: &[&str]) -> Self {
        self.glossary.push(Term {
            name: name.to_string(),
            description: description.to_string(),
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn variable(mut self, name: &str, description: &str, initial_value: &str) -> Self {
        self.variables.push(Variable {
            name: name.to_string(),
            description: description.to_string(),
            initial_value: initial_value.to_string(),
        });
        self
    }

    pub fn guideline(mut self, condition: &str, action: &str, tools: &[&str]) -> Self {
        self.guidelines.push(Guideline {
            condition: condition.to_string(),
            action: action.to_string(),
            tools: tools.iter().map(|t| t.to_string()).collect(),
        });
        self
    }

    pub fn journey(mut self, journey: Journey) -> Self {
        self.journeys.push(journey);
        self
    }

    pub fn canned(mut self, template: &str) -> Self {
        self.canned_responses.push(template.to_string());
        self
    }

    /// 準則與旅程中引用到的所有工具名稱
    pub fn tool_names(&self) -> BTreeSet<&str> {
        self.guidelines
            .iter()
            .flat_map(|g| g.tools.iter().map(String::as_str))
            .chain(self.journeys.iter().flat_map(|j| j.tool_names()))
            .collect()
    }

    /// 檢查每個引用的工具都已註冊
    pub fn validate_tools(&self, registry: &ToolRegistry) -> Result<()> {
        let missing: Vec<&str> = self
            .tool_names()
            .into_iter()
            .filter(|name| !registry.contains(name))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(NlpError::ConfigValidationError {
                field: "agent.tools".to_string(),
                message: format!("Unregistered tools referenced: {}", missing.join(", ")),
            })
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Validate for AgentBlueprint {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("agent.name", &self.name)?;
        for journey in &self.journeys {
            validate_non_empty_string("journey.title", &journey.title)?;
            let count = journey.states.len();
            if let Some(bad) = journey
                .transitions
                .iter()
                .find(|t| t.from >= count || t.to >= count)
            {
                return Err(NlpError::ConfigValidationError {
                    field: format!("journey '{}'", journey.title),
                    message: format!("transition {} -> {} points outside the journey", bad.from, bad.to),
                });
            }
        }
        Ok(())
    }
}

const ISSUE_TOOLS: [&str; 5] = [
    "github_list_open_issues",
    "github_get_issue_details",
    "github_create_issue",
    "github_close_issue",
    "github_reopen_issue",
];

const PULL_REQUEST_TOOLS: [&str; 5] = [
    "github_list_pull_requests",
    "github_get_pull_request_details",
    "github_create_pull_request",
    "github_merge_pull_request",
    "github_close_pull_request",
];

const DEV_TOOLS: [&str; 4] = [
    "sandbox_run_tests",
    "vector_retriever_search",
    "code_review_analyzer",
    "deployment_status_checker",
];

fn issue_management_journey() -> Journey {
    let mut journey = Journey::new(
        "Issue Management",
        "Guide users through creating, updating, and resolving GitHub issues",
        &[
            "User wants to manage GitHub issues",
            "User mentions bug reports",
            "User needs help with issue tracking",
        ],
    )
    .canned("I'll help you manage your GitHub issues. What would you like to do with the issues?")
    .canned("I found {{issues_count}} open issues in the {{repo_name}} repository. Would you like me to show you the details?");

    let ask = journey.chat(
        Journey::INITIAL_STATE,
        None,
        "Ask user what they want to do with GitHub issues (create, view, update, close)",
    );

    let details = journey.chat(
        ask,
        Some("User wants to create a new issue"),
        "Ask for the issue title and description",
    );
    let created = journey.tool(details, None, "github_create_issue");
    journey.chat(
        created,
        None,
        "Confirm the issue has been created successfully and ask if they need anything else",
    );

    let listed = journey.tool(
        ask,
        Some("User wants to view existing issues"),
        "github_list_open_issues",
    );
    journey.chat(
        listed,
        None,
        "Show the list of open issues and ask if they want details on any specific issue",
    );

    let which = journey.chat(
        ask,
        Some("User wants to close an issue"),
        "Ask for the issue ID to close",
    );
    let closed = journey.tool(which, None, "github_close_issue");
    journey.chat(
        closed,
        None,
        "Confirm the issue has been closed and ask if they need help with anything else",
    );
    journey
}

fn pull_request_journey() -> Journey {
    let mut journey = Journey::new(
        "Pull Request Management",
        "Help users create, review, and manage pull requests",
        &[
            "User wants to work with pull requests",
            "User mentions PR",
            "User wants to merge code",
        ],
    )
    .canned("I can help you with pull request management. What would you like to do?")
    .canned("Pull request #{pr_id} has been {{action}} successfully!");

    let ask = journey.chat(
        Journey::INITIAL_STATE,
        None,
        "Ask what they want to do with pull requests (create, view, merge, close)",
    );

    let details = journey.chat(
        ask,
        Some("User wants to create a pull request"),
        "Ask for PR title, description, source branch, and target branch",
    );
    let created = journey.tool(details, None, "github_create_pull_request");
    journey.chat(
        created,
        None,
        "Confirm PR creation and provide next steps for review",
    );

    let listed = journey.tool(
        ask,
        Some("User wants to view pull requests"),
        "github_list_pull_requests",
    );
    journey.chat(
        listed,
        None,
        "Present the list of PRs and offer to show details or perform actions",
    );

    let confirm = journey.chat(
        ask,
        Some("User wants to merge a pull request"),
        "Ask for PR ID and confirm merge action",
    );
    let merged = journey.tool(confirm, None, "github_merge_pull_request");
    journey.chat(merged, None, "Confirm successful merge and suggest next steps");
    journey
}

fn ci_troubleshooting_journey() -> Journey {
    let mut journey = Journey::new(
        "CI/CD Troubleshooting",
        "Help diagnose and resolve CI/CD pipeline issues",
        &[
            "Tests are failing",
            "CI pipeline is broken",
            "User reports build failures",
            "Deployment issues",
        ],
    )
    .canned("I'll help you troubleshoot the CI/CD issues. Let me start by running the latest tests.")
    .canned("The test results show {{failed_tests_count}} failing tests. Let me analyze the failures.");

    let ask = journey.chat(
        Journey::INITIAL_STATE,
        None,
        "Acknowledge the CI/CD issue and ask for repository and commit details",
    );
    let ran = journey.tool(ask, None, "sandbox_run_tests");

    let passing = journey.chat(
        ran,
        Some("Tests pass successfully"),
        "Inform that all tests are passing and suggest checking deployment status",
    );
    let searched = journey.tool(ran, Some("Tests are failing"), "vector_retriever_search");
    journey.chat(
        searched,
        None,
        "Present analysis of test failures with suggested fixes and relevant documentation",
    );

    let deployed = journey.tool(passing, None, "deployment_status_checker");
    journey.chat(
        deployed,
        None,
        "Report deployment status and provide recommendations",
    );
    journey
}

fn code_review_journey() -> Journey {
    let mut journey = Journey::new(
        "Code Review Assistance",
        "Help with code review processes and quality assurance",
        &[
            "User needs code review",
            "User mentions code quality",
            "Pull request review needed",
        ],
    )
    .canned("I'll help you with the code review. Which pull request would you like me to analyze?")
    .canned("The code quality score is {{score}}/10. Here are the main areas for improvement:");

    let ask = journey.chat(
        Journey::INITIAL_STATE,
        None,
        "Ask for the pull request ID to review",
    );
    let fetched = journey.tool(ask, None, "github_get_pull_request_details");
    let analyzed = journey.tool(fetched, None, "code_review_analyzer");
    journey.chat(
        analyzed,
        None,
        "Present detailed code review findings with actionable recommendations",
    );
    journey
}

/// GitHub 專案管理代理的完整藍圖
pub fn project_manager() -> AgentBlueprint {
    AgentBlueprint::new(
        "GitHub Project Manager Agent",
        "Expert developer assistant specialized in GitHub project management, CI/CD troubleshooting, \
         and code review. Diagnoses build failures, manages issues and pull requests, runs tests in \
         sandboxed environments, and provides code analysis with actionable recommendations.",
    )
    .term(
        "Office Phone Number",
        "The phone number of our office, at +1-234-567-8900",
        &[],
    )
    .term(
        "Office Location",
        "The location of our office, at 123 Business Rd, Business City, BC 12345",
        &[],
    )
    .term(
        "Business Hours",
        "Our business hours are Monday to Friday, 9am to 5pm",
        &[],
    )
    .term(
        "Charles Xavier",
        "The renowned doctor who specializes in neurology",
        &["Professor X"],
    )
    .variable("repo_name", "The current repository name being worked on", "my-project-repo")
    .variable("current_branch", "The current git branch", "main")
    .variable("commit_sha", "The latest commit SHA for testing", "latest")
    .variable(
        "environment",
        "Current deployment environment (dev, staging, production)",
        "dev",
    )
    .variable(
        "user_role",
        "The role of the current user (developer, reviewer, manager)",
        "developer",
    )
    .variable("project_priority", "Current project priority level", "medium")
    .guideline(
        "User wants to list, view, create, close, or reopen GitHub issues",
        "Use the appropriate GitHub issue management tools to help the user",
        &ISSUE_TOOLS,
    )
    .guideline(
        "User wants to work with pull requests - list, view, create, merge, or close PRs",
        "Use the appropriate pull request management tools to assist the user",
        &PULL_REQUEST_TOOLS,
    )
    .guideline(
        "User needs help with testing, CI/CD, code analysis, or deployment status",
        "Use development and analysis tools to provide comprehensive assistance",
        &DEV_TOOLS,
    )
    .guideline(
        "User asks for help or seems confused",
        "Be helpful and provide clear, actionable guidance. Offer specific next steps and ask clarifying questions if needed.",
        &[],
    )
    .guideline(
        "A critical error or security issue is detected",
        "Immediately highlight the severity, provide clear explanations, and suggest urgent remediation steps.",
        &[],
    )
    .guideline(
        "User requests information about tests or CI/CD",
        "Always run the actual tests or checks first, then provide detailed analysis of the results with actionable recommendations.",
        &[],
    )
    .guideline(
        "Multiple issues or PRs are found",
        "Present information in a clear, organized manner and offer to help with specific items. Ask what the user wants to prioritize.",
        &[],
    )
    .guideline(
        "User mentions deadlines or urgency",
        "Acknowledge the time constraint and prioritize the most critical tasks. Provide efficient solutions and clear timelines.",
        &[],
    )
    .journey(issue_management_journey())
    .journey(pull_request_journey())
    .journey(ci_troubleshooting_journey())
    .journey(code_review_journey())
    .canned("Hello! I'm your GitHub Project Manager Agent. I can help you with issues, pull requests, CI/CD troubleshooting, and code reviews. What would you like to work on today?")
    .canned("I couldn't find that issue. Please verify the issue ID and try again, or would you like me to list all open issues?")
    .canned("The {{environment}} environment is {{status}} with version {{version}}. Uptime: {{uptime}}")
    .canned("I encountered an error: {{error_message}}. Let me try a different approach or would you like to try something else?")
}
