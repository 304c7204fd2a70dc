//! Provider-agnostic LLM client interface.
//!
//! The core never talks HTTP itself; it drives any transport that can answer
//! one `generate` call (plus an optional streaming variant). Concrete
//! providers live outside this crate — tests use scripted stubs.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use super::types::{ChatMessage, GenerateResponse, StreamChunk, ToolDescriptor};

/// A provider-agnostic LLM transport.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One request/response round-trip with function-calling tools attached.
    async fn generate(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDescriptor],
    ) -> Result<GenerateResponse>;

    /// Streaming variant. The default implementation falls back to a single
    /// `generate` call and yields the content as one chunk.
    async fn generate_stream(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDescriptor],
    ) -> Result<mpsc::Receiver<StreamChunk>> {
        let response = self.generate(messages, tools).await?;
        let (tx, rx) = mpsc::channel(8);
        let content = response
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();
        let _ = tx
            .send(StreamChunk {
                delta: content,
                done: true,
            })
            .await;
        Ok(rx)
    }
}
