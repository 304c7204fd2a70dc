//! agenticode-core — the agent turn engine.
//!
//! Drives an LLM through multi-step tool-using conversations: turns over a
//! bounded event bus, risk-gated approval, a configurable hook pipeline,
//! recursive sub-agents, conversation compaction, and an external-tool
//! transport adapter.
//!
//! The LLM transport itself is a collaborator: anything implementing
//! [`ai::LlmClient`] plugs in.

pub mod agent;
pub mod ai;
pub mod config;
pub mod hooks;
pub mod mcp;
pub mod tools;

pub use agent::{Agent, ExecutionResult};
pub use ai::{ChatMessage, LlmClient, Role, ToolCall};
pub use config::SessionConfig;
