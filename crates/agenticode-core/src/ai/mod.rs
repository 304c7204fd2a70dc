//! LLM transport interface and conversation types.

pub mod client;
pub mod types;

pub use client::LlmClient;
pub use types::{
    ChatMessage, Choice, GenerateResponse, Role, StreamChunk, ToolCall, ToolDescriptor, Usage,
};
