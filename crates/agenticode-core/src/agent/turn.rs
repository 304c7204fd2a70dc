//! A Turn: one LLM round-trip and the events it produces.
//!
//! The LLM call runs on a spawned task so the handler can start consuming
//! events as soon as they appear; a bounded channel separates the two. The
//! turn owns a copy of the conversation — the caller reads it back through
//! the accessors once the bus closes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::agent::cancellation::AgentCancellation;
use crate::agent::confirmation::build_confirmation;
use crate::agent::debugger::Debugger;
use crate::agent::events::{AgentEvent, ErrorKind, EventBus, ToolCallRequest};
use crate::agent::risk::{RiskClassifier, RiskLevel};
use crate::ai::types::{ChatMessage, Role};
use crate::ai::LlmClient;
use crate::tools::ToolRegistry;

struct TurnState {
    conversation: Vec<ChatMessage>,
    pending_calls: Vec<ToolCallRequest>,
}

pub struct Turn {
    llm: Arc<dyn LlmClient>,
    registry: Arc<ToolRegistry>,
    classifier: Arc<RiskClassifier>,
    debugger: Option<Arc<dyn Debugger>>,
    cancellation: AgentCancellation,
    working_dir: PathBuf,
    state: Arc<Mutex<TurnState>>,
}

impl Turn {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: Arc<ToolRegistry>,
        classifier: Arc<RiskClassifier>,
        conversation: Vec<ChatMessage>,
        debugger: Option<Arc<dyn Debugger>>,
        cancellation: AgentCancellation,
        working_dir: PathBuf,
    ) -> Self {
        Self {
            llm,
            registry,
            classifier,
            debugger,
            cancellation,
            working_dir,
            state: Arc::new(Mutex::new(TurnState {
                conversation,
                pending_calls: Vec::new(),
            })),
        }
    }

    /// Start the turn; events arrive on the returned receiver until the bus
    /// closes.
    pub fn run(&self) -> mpsc::Receiver<AgentEvent> {
        let (bus, rx) = EventBus::new();
        let llm = self.llm.clone();
        let registry = self.registry.clone();
        let classifier = self.classifier.clone();
        let debugger = self.debugger.clone();
        let cancellation = self.cancellation.clone();
        let working_dir = self.working_dir.clone();
        let state = self.state.clone();

        tokio::spawn(async move {
            run_inner(
                bus,
                llm,
                registry,
                classifier,
                debugger,
                cancellation,
                working_dir,
                state,
            )
            .await;
        });

        rx
    }

    /// The conversation including this turn's assistant message.
    pub async fn conversation(&self) -> Vec<ChatMessage> {
        self.state.lock().await.conversation.clone()
    }

    /// Tool calls parsed out of the assistant message, in order.
    pub async fn pending_calls(&self) -> Vec<ToolCallRequest> {
        self.state.lock().await.pending_calls.clone()
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_inner(
    bus: EventBus,
    llm: Arc<dyn LlmClient>,
    registry: Arc<ToolRegistry>,
    classifier: Arc<RiskClassifier>,
    debugger: Option<Arc<dyn Debugger>>,
    cancellation: AgentCancellation,
    working_dir: PathBuf,
    state: Arc<Mutex<TurnState>>,
) {
    if cancellation.is_cancelled() {
        bus.emit(AgentEvent::UserCancelled);
        return;
    }

    let filtered = {
        let state = state.lock().await;
        filter_orphan_tool_messages(&state.conversation)
    };

    if let Some(debugger) = &debugger {
        if !debugger.should_continue(&filtered) {
            bus.emit(AgentEvent::Error {
                kind: ErrorKind::Cancelled,
                message: "LLM call cancelled by debugger".to_string(),
            });
            return;
        }
    }

    let descriptors = registry.descriptors().await;
    debug!(messages = filtered.len(), tools = descriptors.len(), "calling LLM");

    let start = Instant::now();
    let response = tokio::select! {
        response = llm.generate(&filtered, &descriptors) => response,
        _ = cancellation.cancelled() => {
            bus.emit(AgentEvent::UserCancelled);
            return;
        }
    };

    let response = match response {
        Ok(r) => r,
        Err(e) => {
            bus.emit(AgentEvent::Error {
                kind: ErrorKind::Transport,
                message: format!("LLM call failed: {}", e),
            });
            return;
        }
    };

    if let Some(usage) = response.usage {
        bus.emit(AgentEvent::UsageMetadata {
            usage,
            duration_ms: start.elapsed().as_millis() as u64,
        });
    }

    let Some(choice) = response.choices.into_iter().next() else {
        bus.emit(AgentEvent::Error {
            kind: ErrorKind::EmptyResponse,
            message: "no response choices from LLM".to_string(),
        });
        return;
    };

    let assistant = ChatMessage {
        role: Role::Assistant,
        content: choice.message.content.clone(),
        name: None,
        tool_calls: choice.message.tool_calls.clone(),
        tool_call_id: None,
    };

    {
        let mut state = state.lock().await;
        state.conversation.push(assistant.clone());
    }

    if !assistant.content.is_empty() {
        bus.emit(AgentEvent::Content {
            text: assistant.content.clone(),
        });
    }

    for (index, tool_call) in assistant.tool_calls.iter().enumerate() {
        let call_id = if tool_call.id.is_empty() {
            format!("{}-{}", tool_call.name, index)
        } else {
            tool_call.id.clone()
        };

        let raw = if tool_call.arguments.trim().is_empty() {
            "{}"
        } else {
            tool_call.arguments.as_str()
        };
        let args: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                bus.emit(AgentEvent::Error {
                    kind: ErrorKind::BadArguments,
                    message: format!(
                        "failed to parse tool arguments for {}: {}",
                        tool_call.name, e
                    ),
                });
                continue;
            }
        };

        let request = ToolCallRequest {
            call_id: call_id.clone(),
            name: tool_call.name.clone(),
            args: args.clone(),
            client_initiated: false,
        };

        {
            let mut state = state.lock().await;
            state.pending_calls.push(request.clone());
        }

        bus.emit(AgentEvent::ToolCallRequest(request.clone()));

        let risk = classifier.assess(&tool_call.name);
        if risk != RiskLevel::Low {
            // Building File details reads the current file; an edit of a
            // missing file yields no confirmation and fails at execute time.
            if let Some(details) =
                build_confirmation(&tool_call.name, &args, risk, &working_dir)
            {
                bus.emit(AgentEvent::ToolCallConfirmation { request, details });
            }
        }
    }

    let conversation = state.lock().await.conversation.clone();
    bus.emit(AgentEvent::TurnComplete { conversation });
    // Dropping the bus closes the stream.
}

/// Drop tool messages whose `tool_call_id` is not announced by the directly
/// preceding assistant message. Keeps the view handed to the LLM well-formed
/// even when an earlier turn failed mid-flight.
pub fn filter_orphan_tool_messages(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut filtered: Vec<ChatMessage> = Vec::with_capacity(messages.len());

    for message in messages {
        if message.role != Role::Tool {
            filtered.push(message.clone());
            continue;
        }

        let anchored = match message.tool_call_id.as_deref() {
            Some(call_id) => preceding_assistant_announces(&filtered, call_id),
            None => false,
        };
        if anchored {
            filtered.push(message.clone());
        } else {
            debug!(
                call_id = message.tool_call_id.as_deref().unwrap_or(""),
                "dropping orphaned tool message"
            );
        }
    }

    filtered
}

/// Walk back over contiguous tool messages to the anchoring assistant
/// message and check it announces `call_id`.
fn preceding_assistant_announces(filtered: &[ChatMessage], call_id: &str) -> bool {
    for message in filtered.iter().rev() {
        match message.role {
            Role::Tool => continue,
            Role::Assistant => {
                return message.tool_calls.iter().any(|tc| tc.id == call_id);
            }
            _ => return false,
        }
    }
    false
}
