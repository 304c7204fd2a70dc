//! The agent outer loop.
//!
//! Drives Turns until the model stops requesting tools, the step cap is hit,
//! the invocation is cancelled, or a turn fails. Tool responses produced by
//! the handler are appended to the conversation between turns, preserving
//! the assistant's `tool_calls` order.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::agent::cancellation::AgentCancellation;
use crate::agent::debugger::Debugger;
use crate::agent::handler::{DisplaySink, TurnHandler};
use crate::agent::repetition::{detect_repetitive_actions, REPETITION_NUDGE};
use crate::agent::risk::RiskClassifier;
use crate::agent::approval::ToolApprover;
use crate::agent::turn::Turn;
use crate::ai::types::{ChatMessage, Role};
use crate::ai::LlmClient;
use crate::hooks::{self, HookEvent, HookInput, HookManager};
use crate::tools::ToolRegistry;

const DEFAULT_MAX_STEPS: usize = 15;

/// A file created or changed during the invocation.
#[derive(Debug, Clone)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
    pub action: String,
}

/// One executed step, for the caller's audit trail.
#[derive(Debug, Clone)]
pub struct ExecutionStep {
    pub step_number: usize,
    pub action: String,
    pub tool_name: String,
    pub tool_args: Value,
    pub result: Option<String>,
    pub error: Option<String>,
}

/// Outcome of one invocation.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    pub success: bool,
    pub message: String,
    pub generated_files: Vec<GeneratedFile>,
    pub steps: Vec<ExecutionStep>,
}

/// The agent: outer control loop over Turns.
pub struct Agent {
    llm: Arc<dyn LlmClient>,
    registry: Arc<ToolRegistry>,
    classifier: Arc<RiskClassifier>,
    approver: Arc<dyn ToolApprover>,
    hooks: Option<Arc<HookManager>>,
    debugger: Option<Arc<dyn Debugger>>,
    display: Option<DisplaySink>,
    cancellation: AgentCancellation,
    working_dir: PathBuf,
    max_steps: usize,
    /// Sub-agents fire `SubagentStop` instead of `Stop`.
    subagent: bool,
}

impl Agent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: Arc<ToolRegistry>,
        approver: Arc<dyn ToolApprover>,
    ) -> Self {
        Self {
            llm,
            registry,
            classifier: Arc::new(RiskClassifier::new()),
            approver,
            hooks: None,
            debugger: None,
            display: None,
            cancellation: AgentCancellation::new(),
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            max_steps: DEFAULT_MAX_STEPS,
            subagent: false,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<RiskClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_hook_manager(mut self, hooks: Arc<HookManager>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn with_debugger(mut self, debugger: Arc<dyn Debugger>) -> Self {
        self.debugger = Some(debugger);
        self
    }

    pub fn with_display(mut self, display: DisplaySink) -> Self {
        self.display = Some(display);
        self
    }

    pub fn with_working_dir(mut self, working_dir: PathBuf) -> Self {
        self.working_dir = working_dir;
        self
    }

    pub fn with_cancellation(mut self, cancellation: AgentCancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn as_subagent(mut self) -> Self {
        self.subagent = true;
        self
    }

    pub fn cancellation(&self) -> AgentCancellation {
        self.cancellation.clone()
    }

    pub fn registry(&self) -> Arc<ToolRegistry> {
        self.registry.clone()
    }

    /// Run one invocation over an existing conversation.
    ///
    /// Returns the result and the updated conversation; failures are encoded
    /// in `result.success` / `result.message` rather than an error return, so
    /// the caller always gets the partial conversation back.
    pub async fn execute_with_history(
        &self,
        mut conversation: Vec<ChatMessage>,
        dry_run: bool,
    ) -> (ExecutionResult, Vec<ChatMessage>) {
        let mut result = ExecutionResult::default();

        let mut handler = TurnHandler::new(
            self.registry.clone(),
            self.approver.clone(),
            self.classifier.clone(),
            self.working_dir.clone(),
        );
        if let Some(hooks) = &self.hooks {
            handler.set_hook_manager(hooks.clone());
        }
        if let Some(display) = &self.display {
            handler.set_display(display.clone());
        }
        handler.set_dry_run(dry_run);

        // UserPromptSubmit hooks fire once, before the first turn.
        if let Err(reason) = self.run_prompt_hooks(&mut conversation).await {
            result.message = format!("Prompt blocked: {}", reason);
            self.fire_stop_hooks().await;
            return (result, conversation);
        }

        for step in 1..=self.max_steps {
            if self.cancellation.is_cancelled() {
                result.message = "Cancelled".to_string();
                self.fire_stop_hooks().await;
                return (result, conversation);
            }

            info!(step, max_steps = self.max_steps, "starting turn");

            if detect_repetitive_actions(&result.steps) {
                info!("repetitive actions detected, injecting nudge");
                conversation.push(ChatMessage::system(REPETITION_NUDGE));
            }

            let turn = Turn::new(
                self.llm.clone(),
                self.registry.clone(),
                self.classifier.clone(),
                conversation.clone(),
                self.debugger.clone(),
                self.cancellation.clone(),
                self.working_dir.clone(),
            );

            if let Err(e) = handler.handle_turn(&turn).await {
                result.success = false;
                result.message = format!("Turn failed: {}", e);
                // Keep whatever the turn already appended.
                conversation = turn.conversation().await;
                conversation.extend(handler.tool_responses().iter().cloned());
                self.fire_stop_hooks().await;
                return (result, conversation);
            }

            conversation = turn.conversation().await;
            conversation.extend(handler.tool_responses().iter().cloned());

            let pending = turn.pending_calls().await;
            if pending.is_empty() {
                result.success = true;
                result.message = final_assistant_content(&conversation);
                info!("no tool calls in this turn, task completed");
                break;
            }

            for call in &pending {
                let scheduled = handler.scheduler().get(&call.call_id);
                result.steps.push(ExecutionStep {
                    step_number: result.steps.len() + 1,
                    action: "tool_call".to_string(),
                    tool_name: call.name.clone(),
                    tool_args: call.args.clone(),
                    result: scheduled.as_ref().and_then(|c| c.result.clone()),
                    error: scheduled.as_ref().and_then(|c| c.error.clone()),
                });

                if call.name == "write_file" {
                    if let Some(path) = call.args.get("path").and_then(|v| v.as_str()) {
                        let content = call
                            .args
                            .get("content")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default();
                        result.generated_files.push(GeneratedFile {
                            path: path.to_string(),
                            content: content.to_string(),
                            action: "create".to_string(),
                        });
                    }
                }
            }
        }

        if !result.success {
            warn!(max_steps = self.max_steps, "maximum steps reached without completion");
            result.message = "Maximum steps reached".to_string();
        }

        self.fire_stop_hooks().await;
        (result, conversation)
    }

    /// Run UserPromptSubmit hooks; a block aborts the invocation, and
    /// additional context is appended as a system message.
    async fn run_prompt_hooks(&self, conversation: &mut Vec<ChatMessage>) -> Result<(), String> {
        let Some(hooks) = &self.hooks else {
            return Ok(());
        };
        if !hooks.has_hooks_for(HookEvent::UserPromptSubmit) {
            return Ok(());
        }
        let prompt = conversation
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        match hooks
            .run(HookEvent::UserPromptSubmit, HookInput::for_prompt(&prompt))
            .await
        {
            Ok(outputs) => {
                if let Some(reason) = hooks::should_block(&outputs) {
                    return Err(reason);
                }
                if let Some(context) = hooks::additional_context(&outputs) {
                    conversation.push(ChatMessage::system(context));
                }
                Ok(())
            }
            Err(e) => {
                warn!("UserPromptSubmit hook error: {}", e);
                Ok(())
            }
        }
    }

    async fn fire_stop_hooks(&self) {
        let Some(hooks) = &self.hooks else {
            return;
        };
        let event = if self.subagent {
            HookEvent::SubagentStop
        } else {
            HookEvent::Stop
        };
        if !hooks.has_hooks_for(event) {
            return;
        }
        let input = HookInput {
            stop_hook_active: Some(true),
            ..Default::default()
        };
        if let Err(e) = hooks.run(event, input).await {
            warn!(event = %event, "stop hook error: {}", e);
        }
    }
}

fn final_assistant_content(conversation: &[ChatMessage]) -> String {
    conversation
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
        .map(|m| m.content.clone())
        .unwrap_or_default()
}
