//! Sub-agent factory and the `agent_tool`.
//!
//! A parent agent spawns constrained child agents through an opaque factory;
//! the concrete wiring lives at the session level, which breaks the
//! agent ↔ tool-registry cycle. The parent's conversation only ever sees the
//! child's summary — sub-agent internals stay private.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::agent::approval::{AutoApprover, RestrictedApprover, ToolApprover};
use crate::agent::orchestrator::Agent;
use crate::agent::risk::RiskClassifier;
use crate::ai::types::ChatMessage;
use crate::ai::LlmClient;
use crate::hooks::HookManager;
use crate::tools::registry::{parse_params, Tool, ToolContext, ToolResult};
use crate::tools::ToolRegistry;

/// Kinds of sub-agents, each with its own tool set, approver, and step cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentType {
    GeneralPurpose,
    Searcher,
    Analyzer,
    Executor,
}

impl AgentType {
    pub fn parse(s: &str) -> Self {
        match s {
            "searcher" => AgentType::Searcher,
            "analyzer" => AgentType::Analyzer,
            "executor" => AgentType::Executor,
            _ => AgentType::GeneralPurpose,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::GeneralPurpose => "general-purpose",
            AgentType::Searcher => "searcher",
            AgentType::Analyzer => "analyzer",
            AgentType::Executor => "executor",
        }
    }

    pub fn max_steps(&self) -> usize {
        match self {
            AgentType::Searcher => 15,
            AgentType::Analyzer => 20,
            AgentType::Executor => 5,
            AgentType::GeneralPurpose => 10,
        }
    }

    /// Allowed tool names, or `None` for the full set.
    pub fn allowed_tools(&self) -> Option<&'static [&'static str]> {
        match self {
            AgentType::Searcher => Some(&[
                "read_file",
                "list_files",
                "grep",
                "glob",
                "read_many_files",
            ]),
            AgentType::Analyzer => Some(&[
                "read_file",
                "list_files",
                "grep",
                "glob",
                "read_many_files",
                "todo_read",
            ]),
            AgentType::Executor => Some(&["run_shell", "read_file", "list_files"]),
            AgentType::GeneralPurpose => None,
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            AgentType::Searcher => {
                "You are a specialized search agent. Your task is to efficiently search for \
                 files, code, and information. Use read-only tools like grep, glob, read_file, \
                 and list_files. Be thorough in your search and report all findings clearly."
            }
            AgentType::Analyzer => {
                "You are a code analysis agent. Your task is to analyze code structure, \
                 patterns, and quality. Read files carefully, identify patterns and potential \
                 issues, and provide insights. Focus on understanding the codebase architecture \
                 and design."
            }
            AgentType::Executor => {
                "You are an execution agent specialized in running commands and tests. Use \
                 run_shell to execute commands, run tests, and gather execution results. Report \
                 outputs, errors, and status clearly."
            }
            AgentType::GeneralPurpose => {
                "You are a helpful AI assistant performing a sub-task. Complete the task \
                 efficiently using all available tools and report your findings clearly."
            }
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Creates sub-agents on demand. Held by the `agent_tool` as a trait object.
#[async_trait]
pub trait SubagentFactory: Send + Sync {
    async fn create_subagent(&self, agent_type: AgentType) -> Result<Agent>;
}

/// Default factory: shares the parent's LLM transport and filters the
/// session registry per agent type.
pub struct SessionSubagentFactory {
    llm: Arc<dyn LlmClient>,
    registry: Arc<ToolRegistry>,
    classifier: Arc<RiskClassifier>,
    hooks: Option<Arc<HookManager>>,
    working_dir: std::path::PathBuf,
}

impl SessionSubagentFactory {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: Arc<ToolRegistry>,
        classifier: Arc<RiskClassifier>,
        hooks: Option<Arc<HookManager>>,
        working_dir: std::path::PathBuf,
    ) -> Self {
        Self {
            llm,
            registry,
            classifier,
            hooks,
            working_dir,
        }
    }
}

#[async_trait]
impl SubagentFactory for SessionSubagentFactory {
    async fn create_subagent(&self, agent_type: AgentType) -> Result<Agent> {
        let registry = match agent_type.allowed_tools() {
            Some(allowed) => Arc::new(self.registry.filtered(allowed).await),
            None => self.registry.clone(),
        };

        let approver: Arc<dyn ToolApprover> = match agent_type.allowed_tools() {
            Some(allowed) => Arc::new(RestrictedApprover::new(
                allowed.iter().map(|s| s.to_string()),
            )),
            None => Arc::new(AutoApprover::approve_all()),
        };

        let mut agent = Agent::new(self.llm.clone(), registry, approver)
            .with_classifier(self.classifier.clone())
            .with_max_steps(agent_type.max_steps())
            .with_working_dir(self.working_dir.clone())
            .as_subagent();
        if let Some(hooks) = &self.hooks {
            agent = agent.with_hook_manager(hooks.clone());
        }
        Ok(agent)
    }
}

fn generate_subagent_id() -> String {
    format!("SA-{:04}", rand::random::<u16>() % 10000)
}

/// Tool that launches a constrained sub-agent for a delegated task.
pub struct AgentTool {
    factory: Arc<dyn SubagentFactory>,
}

impl AgentTool {
    pub fn new(factory: Arc<dyn SubagentFactory>) -> Self {
        Self { factory }
    }
}

#[derive(Deserialize)]
struct Params {
    description: String,
    prompt: String,
    #[serde(default)]
    agent_type: Option<String>,
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        "agent_tool"
    }

    fn description(&self) -> &str {
        "Launch a new agent to handle complex, multi-step tasks autonomously"
    }

    fn read_only(&self) -> bool {
        false
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "description": {
                    "type": "string",
                    "description": "A short (3-5 word) description of the task"
                },
                "prompt": {
                    "type": "string",
                    "description": "The task for the agent to perform"
                },
                "agent_type": {
                    "type": "string",
                    "description": "Type of agent (default: general-purpose)",
                    "enum": ["general-purpose", "searcher", "analyzer", "executor"]
                }
            },
            "required": ["description", "prompt"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let agent_type = AgentType::parse(params.agent_type.as_deref().unwrap_or_default());
        let id = generate_subagent_id();

        info!(
            subagent = %id,
            agent_type = %agent_type,
            "launching sub-agent for task: {}",
            params.description
        );

        let subagent = match self.factory.create_subagent(agent_type).await {
            Ok(agent) => agent,
            Err(e) => return ToolResult::error(format!("failed to create sub-agent: {}", e)),
        };

        let conversation = vec![
            ChatMessage::system(agent_type.system_prompt()),
            ChatMessage::user(&params.prompt),
            ChatMessage::system(format!("[SUB-AGENT-CONTEXT] You are sub-agent {}", id)),
        ];

        let (result, _conversation) = subagent.execute_with_history(conversation, false).await;

        info!(
            subagent = %id,
            success = result.success,
            steps = result.steps.len(),
            "sub-agent finished"
        );

        let mut llm_content = format!(
            "Sub-agent {} {} task '{}'.",
            id,
            if result.success { "completed" } else { "did not complete" },
            params.description
        );
        if !result.message.is_empty() {
            llm_content.push_str(&format!("\nResult: {}", result.message));
        }
        llm_content.push_str(&format!("\nExecuted {} steps", result.steps.len()));
        if !result.generated_files.is_empty() {
            llm_content.push_str(&format!(
                "\nGenerated {} files:",
                result.generated_files.len()
            ));
            for file in &result.generated_files {
                llm_content.push_str(&format!("\n  - {}", file.path));
            }
        }

        let display = format!(
            "Sub-agent {} finished: {} ({} steps)",
            id, params.description, result.steps.len()
        );

        ToolResult::success(llm_content).with_display(display)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_type_parsing_defaults_to_general_purpose() {
        assert_eq!(AgentType::parse("searcher"), AgentType::Searcher);
        assert_eq!(AgentType::parse("analyzer"), AgentType::Analyzer);
        assert_eq!(AgentType::parse("executor"), AgentType::Executor);
        assert_eq!(AgentType::parse(""), AgentType::GeneralPurpose);
        assert_eq!(AgentType::parse("wat"), AgentType::GeneralPurpose);
    }

    #[test]
    fn step_caps_per_type() {
        assert_eq!(AgentType::Searcher.max_steps(), 15);
        assert_eq!(AgentType::Analyzer.max_steps(), 20);
        assert_eq!(AgentType::Executor.max_steps(), 5);
        assert_eq!(AgentType::GeneralPurpose.max_steps(), 10);
    }

    #[test]
    fn restricted_types_exclude_the_shell() {
        let allowed = AgentType::Searcher.allowed_tools().unwrap();
        assert!(!allowed.contains(&"run_shell"));
        let allowed = AgentType::Analyzer.allowed_tools().unwrap();
        assert!(allowed.contains(&"todo_read"));
        assert!(!allowed.contains(&"run_shell"));
    }

    #[test]
    fn subagent_ids_have_the_sa_shape() {
        let id = generate_subagent_id();
        assert!(id.starts_with("SA-"));
        assert_eq!(id.len(), 7);
    }
}
