//! The agent turn engine.
//!
//! ## Loop
//! - `Agent` — outer control loop (`execute_with_history`)
//! - `Turn` — one LLM round-trip, events over a bounded bus
//! - `TurnHandler` — event consumer: scheduling, approval, hooks, execution
//!
//! ## Gating
//! - `RiskClassifier` / `RiskLevel` — name-based risk
//! - `ToolCallScheduler` — per-call lifecycle bookkeeping
//! - `ToolApprover` implementations — interactive, auto, restricted
//! - `ConfirmationDetails` — File/Exec/Info records shown at approval time
//!
//! ## Recursion
//! - `AgentTool` + `SubagentFactory` — constrained sub-agents
//!
//! ## Housekeeping
//! - `summarizer` — conversation compaction
//! - `repetition` — repeated-command nudge
//! - `AgentCancellation` — cooperative cancel

pub mod approval;
pub mod cancellation;
pub mod confirmation;
pub mod debugger;
pub mod events;
pub mod handler;
pub mod interactive;
pub mod orchestrator;
pub mod prompts;
pub mod repetition;
pub mod risk;
pub mod scheduler;
pub mod subagent;
pub mod summarizer;
pub mod turn;

pub use approval::{ApprovalRequest, ApprovalResponse, AutoApprover, RestrictedApprover, ToolApprover};
pub use cancellation::AgentCancellation;
pub use confirmation::{build_confirmation, ConfirmationDetails};
pub use debugger::{Debugger, NoOpDebugger};
pub use events::{AgentEvent, ErrorKind, EventBus, ToolCallRequest, EVENT_BUS_CAPACITY};
pub use handler::{DisplaySink, TurnHandler};
pub use interactive::InteractiveApprover;
pub use orchestrator::{Agent, ExecutionResult, ExecutionStep, GeneratedFile};
pub use repetition::{detect_repetitive_actions, REPETITION_NUDGE};
pub use risk::{RiskClassifier, RiskLevel};
pub use scheduler::{CallStatus, PendingCall, ToolCallScheduler};
pub use subagent::{AgentTool, AgentType, SessionSubagentFactory, SubagentFactory};
pub use summarizer::{
    compact_conversation, estimate_tokens, summarize_conversation, summary_marker,
    SummarizationResult,
};
pub use turn::{filter_orphan_tool_messages, Turn};
