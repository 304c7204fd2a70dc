//! Hook lifecycle events and the stdin/stdout contract with hook processes.
//!
//! ## Exit Code Protocol
//! - 0: allow/continue; stdout may carry a JSON `HookOutput`
//! - 2: block, stderr becomes the reason shown to the model
//! - other: non-blocking warning

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle points at which user-defined hooks fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookEvent {
    PreToolUse,
    PostToolUse,
    UserPromptSubmit,
    Notification,
    Stop,
    SubagentStop,
    PreCompact,
    SessionStart,
}

impl HookEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::PreToolUse => "PreToolUse",
            HookEvent::PostToolUse => "PostToolUse",
            HookEvent::UserPromptSubmit => "UserPromptSubmit",
            HookEvent::Notification => "Notification",
            HookEvent::Stop => "Stop",
            HookEvent::SubagentStop => "SubagentStop",
            HookEvent::PreCompact => "PreCompact",
            HookEvent::SessionStart => "SessionStart",
        }
    }

    /// Tool events match hooks by tool-name pattern; all others always match.
    pub fn is_tool_event(&self) -> bool {
        matches!(self, HookEvent::PreToolUse | HookEvent::PostToolUse)
    }
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One hook command. Only `type: command` is supported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hook {
    #[serde(rename = "type", default = "default_hook_type")]
    pub hook_type: String,
    pub command: String,
    /// Timeout in seconds; defaults to 60.
    #[serde(default)]
    pub timeout: Option<u64>,
}

fn default_hook_type() -> String {
    "command".to_string()
}

/// A matcher groups hooks behind an optional tool-name pattern.
/// Empty or `*` matches every tool; otherwise exact match, then regex.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookMatcher {
    #[serde(default)]
    pub matcher: String,
    pub hooks: Vec<Hook>,
}

/// The complete hook registry, keyed by event name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HookConfig {
    #[serde(flatten)]
    pub events: HashMap<HookEvent, Vec<HookMatcher>>,
}

impl HookConfig {
    pub fn is_empty(&self) -> bool {
        self.events.values().all(|m| m.is_empty())
    }
}

/// JSON record written to a hook's stdin.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HookInput {
    pub session_id: String,
    pub transcript_path: String,
    pub cwd: String,
    pub hook_event_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_response: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_hook_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl HookInput {
    pub fn for_tool(tool_name: &str, tool_input: Value) -> Self {
        Self {
            tool_name: Some(tool_name.to_string()),
            tool_input: Some(tool_input),
            ..Default::default()
        }
    }

    pub fn for_prompt(prompt: &str) -> Self {
        Self {
            prompt: Some(prompt.to_string()),
            ..Default::default()
        }
    }
}

/// Event-specific output fields a hook may return under `hookSpecificOutput`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HookSpecificOutput {
    pub hook_event_name: Option<String>,
    /// PreToolUse: `allow`, `deny`, or `ask`.
    pub permission_decision: Option<String>,
    pub permission_decision_reason: Option<String>,
    /// UserPromptSubmit / SessionStart: appended as a system message.
    pub additional_context: Option<String>,
}

/// Optional JSON a hook writes to stdout on exit 0, or the record the
/// manager synthesizes from a non-zero exit code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HookOutput {
    #[serde(rename = "continue")]
    pub continue_: Option<bool>,
    pub stop_reason: Option<String>,
    pub suppress_output: Option<bool>,
    /// Legacy decision field: `allow`, `deny`, `block`, `approve`.
    pub decision: Option<String>,
    pub reason: Option<String>,
    pub hook_specific_output: Option<HookSpecificOutput>,
}

impl HookOutput {
    fn permission_decision(&self) -> Option<&str> {
        self.hook_specific_output
            .as_ref()
            .and_then(|o| o.permission_decision.as_deref())
    }

    /// Whether this single output vetoes the action, and why.
    pub fn blocking_reason(&self) -> Option<String> {
        if self.continue_ == Some(false) {
            return Some(
                self.stop_reason
                    .clone()
                    .or_else(|| self.reason.clone())
                    .unwrap_or_default(),
            );
        }
        if self.permission_decision() == Some("deny") {
            return Some(
                self.hook_specific_output
                    .as_ref()
                    .and_then(|o| o.permission_decision_reason.clone())
                    .unwrap_or_default(),
            );
        }
        match self.decision.as_deref() {
            Some("deny") | Some("block") => Some(self.reason.clone().unwrap_or_default()),
            _ => None,
        }
    }

    /// Whether this single output explicitly approves the action.
    pub fn approves(&self) -> bool {
        self.permission_decision() == Some("allow")
            || matches!(self.decision.as_deref(), Some("approve") | Some("allow"))
    }
}

/// `true` (with the first reason) if any output blocks the action.
pub fn should_block(outputs: &[HookOutput]) -> Option<String> {
    outputs.iter().find_map(|o| o.blocking_reason())
}

/// `true` if at least one output explicitly approves and none blocks.
pub fn should_auto_approve(outputs: &[HookOutput]) -> bool {
    should_block(outputs).is_none() && outputs.iter().any(|o| o.approves())
}

/// Concatenated `additionalContext` strings, newline-separated.
pub fn additional_context(outputs: &[HookOutput]) -> Option<String> {
    let contexts: Vec<&str> = outputs
        .iter()
        .filter_map(|o| o.hook_specific_output.as_ref())
        .filter_map(|o| o.additional_context.as_deref())
        .filter(|c| !c.is_empty())
        .collect();
    if contexts.is_empty() {
        None
    } else {
        Some(contexts.join("\n"))
    }
}
