//! Turn handler: consumes one turn's events and drives scheduling,
//! approval, hook interception, and tool execution.
//!
//! Tool responses accumulate here in assistant `tool_calls` order; the outer
//! loop appends them to the conversation after the turn. For every tool call
//! exactly one tool message is produced — a real result, a rejection marker,
//! or a blocked marker — which is what keeps the orphan filter a safety net
//! rather than the primary mechanism.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::agent::approval::{ApprovalRequest, ToolApprover};
use crate::agent::events::{AgentEvent, ToolCallRequest};
use crate::agent::risk::{RiskClassifier, RiskLevel};
use crate::agent::scheduler::ToolCallScheduler;
use crate::agent::turn::Turn;
use crate::ai::types::{ChatMessage, ToolCall};
use crate::hooks::{self, HookEvent, HookInput, HookManager, HookOutput};
use crate::tools::{ToolContext, ToolRegistry, ToolResult};

/// Receives human-facing output (assistant text, tool display content).
pub type DisplaySink = Arc<dyn Fn(&str) + Send + Sync>;

pub struct TurnHandler {
    registry: Arc<ToolRegistry>,
    approver: Arc<dyn ToolApprover>,
    classifier: Arc<RiskClassifier>,
    hooks: Option<Arc<HookManager>>,
    scheduler: ToolCallScheduler,
    pending_approvals: HashMap<String, ToolCallRequest>,
    tool_responses: Vec<ChatMessage>,
    working_dir: PathBuf,
    dry_run: bool,
    display: Option<DisplaySink>,
    /// Optional observer stream for post-execution `ToolCallResponse` events.
    observer: Option<mpsc::UnboundedSender<AgentEvent>>,
}

impl TurnHandler {
    pub fn new(
        registry: Arc<ToolRegistry>,
        approver: Arc<dyn ToolApprover>,
        classifier: Arc<RiskClassifier>,
        working_dir: PathBuf,
    ) -> Self {
        Self {
            registry,
            approver,
            classifier,
            hooks: None,
            scheduler: ToolCallScheduler::new(),
            pending_approvals: HashMap::new(),
            tool_responses: Vec::new(),
            working_dir,
            dry_run: false,
            display: None,
            observer: None,
        }
    }

    pub fn set_hook_manager(&mut self, hooks: Arc<HookManager>) {
        self.hooks = Some(hooks);
    }

    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    pub fn set_display(&mut self, display: DisplaySink) {
        self.display = Some(display);
    }

    pub fn set_observer(&mut self, observer: mpsc::UnboundedSender<AgentEvent>) {
        self.observer = Some(observer);
    }

    pub fn scheduler(&self) -> &ToolCallScheduler {
        &self.scheduler
    }

    /// Tool response messages produced for the last handled turn, in the
    /// assistant's `tool_calls` order.
    pub fn tool_responses(&self) -> &[ChatMessage] {
        &self.tool_responses
    }

    /// Consume every event of the turn. An error return aborts the
    /// invocation; locally-recovered failures produce tool messages instead.
    pub async fn handle_turn(&mut self, turn: &Turn) -> Result<()> {
        self.tool_responses.clear();
        self.pending_approvals.clear();

        let mut events = turn.run();
        while let Some(event) = events.recv().await {
            self.handle_event(event).await?;
        }
        Ok(())
    }

    async fn handle_event(&mut self, event: AgentEvent) -> Result<()> {
        match event {
            AgentEvent::Content { text } => {
                self.show(&text);
                Ok(())
            }
            AgentEvent::ToolCallRequest(request) => self.handle_request(request).await,
            AgentEvent::ToolCallConfirmation { request, details } => {
                self.handle_confirmation(request, details).await
            }
            AgentEvent::Thought {
                subject,
                description,
            } => {
                debug!(subject = %subject, "thought: {}", description);
                Ok(())
            }
            AgentEvent::UsageMetadata { usage, duration_ms } => {
                debug!(
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    duration_ms,
                    "usage"
                );
                Ok(())
            }
            AgentEvent::ToolCallResponse { .. } => Ok(()),
            AgentEvent::Error { kind, message } => {
                self.show(&format!("Error: {}", message));
                Err(anyhow!("{:?}: {}", kind, message))
            }
            AgentEvent::UserCancelled => {
                self.show("Operation cancelled");
                Err(anyhow!("cancelled by user"))
            }
            AgentEvent::TurnComplete { .. } => Ok(()),
        }
    }

    async fn handle_request(&mut self, request: ToolCallRequest) -> Result<()> {
        if self.classifier.assess(&request.name) == RiskLevel::Low {
            // Low risk executes immediately, without waiting for approval.
            self.scheduler.schedule(&[to_tool_call(&request)]);
            self.scheduler.approve(&[request.call_id.clone()]);
            self.execute_tool(request, None).await;
            return Ok(());
        }

        // Risky calls wait for their confirmation event.
        self.pending_approvals
            .insert(request.call_id.clone(), request);
        Ok(())
    }

    async fn handle_confirmation(
        &mut self,
        request: ToolCallRequest,
        details: crate::agent::confirmation::ConfirmationDetails,
    ) -> Result<()> {
        let risk = details.risk();
        let request = self
            .pending_approvals
            .remove(&request.call_id)
            .unwrap_or(request);

        let pending = self.scheduler.schedule(&[to_tool_call(&request)]);

        // PreToolUse hooks run once, here; their outputs are reused for the
        // block check inside execute_tool.
        let pre_outputs = self.run_pre_hooks(&request).await;

        let (hook_blocks, hook_approves) = match &pre_outputs {
            Some(outputs) => (
                hooks::should_block(outputs).is_some(),
                hooks::should_auto_approve(outputs),
            ),
            None => (false, false),
        };
        if hook_blocks || hook_approves {
            if hook_approves {
                info!(tool = %request.name, "tool auto-approved by hook");
            }
            // A block surfaces as a failed execution inside execute_tool.
            self.scheduler.approve(&[request.call_id.clone()]);
            self.execute_tool(request, pre_outputs).await;
            return Ok(());
        }

        let approval_request = ApprovalRequest {
            request_id: request.call_id.clone(),
            calls: pending,
            risks: HashMap::from([(request.call_id.clone(), risk)]),
            details: Some(details),
        };

        let response = self
            .approver
            .request_approval(approval_request)
            .await
            .map_err(|e| anyhow!("approval error: {}", e))?;

        if response.approved_ids.contains(&request.call_id) {
            self.scheduler.approve(&[request.call_id.clone()]);
            self.execute_tool(request, pre_outputs).await;
        } else {
            self.scheduler.reject(&[request.call_id.clone()]);
            self.show(&format!("Rejected: {}", request.name));
            self.tool_responses.push(ChatMessage::tool(
                &request.call_id,
                &request.name,
                "Tool call rejected by user",
            ));
        }
        Ok(())
    }

    async fn run_pre_hooks(&self, request: &ToolCallRequest) -> Option<Vec<HookOutput>> {
        let hooks = self.hooks.as_ref()?;
        match hooks
            .run(
                HookEvent::PreToolUse,
                HookInput::for_tool(&request.name, request.args.clone()),
            )
            .await
        {
            Ok(outputs) => Some(outputs),
            Err(e) => {
                warn!("PreToolUse hook error: {}", e);
                None
            }
        }
    }

    /// Execute one tool call end to end: pre-hooks, lookup, invocation,
    /// response threading, post-hooks, scheduler bookkeeping.
    async fn execute_tool(
        &mut self,
        request: ToolCallRequest,
        pre_outputs: Option<Vec<HookOutput>>,
    ) {
        let outputs = match pre_outputs {
            Some(outputs) => Some(outputs),
            None => self.run_pre_hooks(&request).await,
        };

        if let Some(outputs) = &outputs {
            if let Some(reason) = hooks::should_block(outputs) {
                info!(tool = %request.name, reason = %reason, "tool execution blocked by hook");
                let content = format!("Tool execution blocked: {}", reason);
                self.show(&content);
                self.tool_responses.push(ChatMessage::tool(
                    &request.call_id,
                    &request.name,
                    &content,
                ));
                self.scheduler.mark_executed(
                    &request.call_id,
                    None,
                    Some(format!("blocked by hook: {}", reason)),
                );
                return;
            }
        }

        let Some(tool) = self.registry.get(&request.name).await else {
            warn!(tool = %request.name, call_id = %request.call_id, "tool not found");
            let content = format!("tool not found: {}", request.name);
            self.show(&content);
            self.tool_responses.push(ChatMessage::tool(
                &request.call_id,
                &request.name,
                &content,
            ));
            self.scheduler
                .mark_executed(&request.call_id, None, Some(content));
            return;
        };

        info!(tool = %request.name, call_id = %request.call_id, "executing tool");

        let result = if self.dry_run && !tool.read_only() {
            ToolResult::success(format!(
                "[dry-run] Simulated execution of {}; no changes were made",
                request.name
            ))
        } else {
            let ctx = ToolContext::new(self.working_dir.clone());
            self.registry
                .execute(&request.name, request.args.clone(), &ctx)
                .await
                .unwrap_or_else(|| ToolResult::error(format!("tool vanished: {}", request.name)))
        };

        if !result.display_content.is_empty() {
            self.show(&result.display_content);
        }

        let content = match &result.error {
            Some(error) => format!("Error: {}", error),
            None => result.llm_content.clone(),
        };
        self.tool_responses.push(ChatMessage::tool(
            &request.call_id,
            &request.name,
            &content,
        ));

        if let Some(observer) = &self.observer {
            let _ = observer.send(AgentEvent::ToolCallResponse {
                call_id: request.call_id.clone(),
                result: result.llm_content.clone(),
                display: result.display_content.clone(),
                error: result.error.clone(),
            });
        }

        self.run_post_hooks(&request, &result, &content).await;

        self.approver
            .notify_execution(
                &request.call_id,
                Some(result.llm_content.as_str()),
                result.error.as_deref(),
            )
            .await;
        self.scheduler.mark_executed(
            &request.call_id,
            Some(result.llm_content.clone()),
            result.error.clone(),
        );
    }

    async fn run_post_hooks(&mut self, request: &ToolCallRequest, result: &ToolResult, content: &str) {
        let Some(hooks) = &self.hooks else {
            return;
        };

        let mut input = HookInput::for_tool(&request.name, request.args.clone());
        input.tool_response = Some(json!({
            "success": result.error.is_none(),
            "content": content,
            "llm_content": result.llm_content,
            "display": result.display_content,
        }));

        match hooks.run(HookEvent::PostToolUse, input).await {
            Ok(outputs) => {
                for output in outputs {
                    if output.decision.as_deref() == Some("block") {
                        if let Some(reason) = output.reason.as_deref().filter(|r| !r.is_empty()) {
                            self.tool_responses.push(ChatMessage::system(format!(
                                "Hook feedback: {}",
                                reason
                            )));
                        }
                    }
                }
            }
            Err(e) => warn!("PostToolUse hook error: {}", e),
        }
    }

    fn show(&self, text: &str) {
        match &self.display {
            Some(display) => display(text),
            None => info!("{}", text),
        }
    }
}

fn to_tool_call(request: &ToolCallRequest) -> ToolCall {
    ToolCall::new(
        &request.call_id,
        &request.name,
        request.args.to_string(),
    )
}
