//! Pre-LLM-call debugger hook.

use crate::ai::types::ChatMessage;

/// Consulted before every LLM round-trip; returning `false` aborts the turn.
pub trait Debugger: Send + Sync {
    fn should_continue(&self, messages: &[ChatMessage]) -> bool;
}

/// Production default: always continue.
pub struct NoOpDebugger;

impl Debugger for NoOpDebugger {
    fn should_continue(&self, _messages: &[ChatMessage]) -> bool {
        true
    }
}
