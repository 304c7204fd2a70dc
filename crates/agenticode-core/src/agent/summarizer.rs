//! Conversation compaction.
//!
//! A dedicated LLM call compresses the user/assistant history into a single
//! summary; the session conversation is then replaced by a fresh three-message
//! conversation whose assistant marker records the compression statistics.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tracing::info;

use crate::agent::prompts;
use crate::ai::types::{ChatMessage, Role};
use crate::ai::LlmClient;

/// Outcome of one summarization, with its compression statistics.
#[derive(Debug, Clone)]
pub struct SummarizationResult {
    pub summary: String,
    pub original_tokens: usize,
    pub summary_tokens: usize,
    pub tokens_saved: usize,
    pub compression_ratio: f64,
}

/// Coarse token estimate: chars/4 plus 10 per message of structure overhead.
/// Intentionally rough — substituting an exact counter must not change
/// control flow.
pub fn estimate_tokens(messages: &[ChatMessage]) -> usize {
    messages
        .iter()
        .map(|m| m.content.len() / 4 + 10)
        .sum()
}

fn summarization_prompt() -> &'static str {
    "Please provide a comprehensive but concise summary of our conversation above.\n\n\
     The summary should:\n\
     1. Capture the main objectives and tasks discussed\n\
     2. List what has been accomplished so far\n\
     3. Note any important decisions or changes made\n\
     4. Include relevant file paths and code changes\n\
     5. Preserve any pending tasks or next steps\n\
     6. Maintain context about the current working state\n\n\
     Focus on information that would be helpful for continuing the conversation. \
     Be concise but don't lose important technical details."
}

/// Compress a conversation into a summary.
///
/// Only user/assistant messages participate. `alternate` selects a cheaper
/// transport for the summarization call when configured.
pub async fn summarize_conversation(
    client: Arc<dyn LlmClient>,
    conversation: &[ChatMessage],
    alternate: Option<Arc<dyn LlmClient>>,
) -> Result<SummarizationResult> {
    let kept: Vec<ChatMessage> = conversation
        .iter()
        .filter(|m| matches!(m.role, Role::User | Role::Assistant))
        .cloned()
        .collect();

    if kept.len() < 2 {
        bail!("conversation too short to summarize (need at least 2 messages)");
    }

    let original_tokens = estimate_tokens(&kept);

    let mut messages = vec![ChatMessage::system(
        "You are a helpful assistant that creates concise summaries of conversations \
         while preserving all important context, decisions, and next steps.",
    )];
    messages.extend(kept);
    messages.push(ChatMessage::user(summarization_prompt()));

    let llm = alternate.unwrap_or(client);
    let response = llm
        .generate(&messages, &[])
        .await
        .context("failed to generate summary")?;

    let summary = response
        .choices
        .first()
        .map(|c| c.message.content.trim().to_string())
        .ok_or_else(|| anyhow!("no response from summarization model"))?;
    if summary.is_empty() {
        bail!("empty summary returned");
    }

    let summary_tokens = estimate_tokens(&[ChatMessage::assistant(&summary)]).max(1);
    let tokens_saved = original_tokens.saturating_sub(summary_tokens);
    let compression_ratio = original_tokens as f64 / summary_tokens as f64;

    info!(
        original_tokens,
        summary_tokens,
        tokens_saved,
        "summarization complete ({:.1}x compression)",
        compression_ratio
    );

    Ok(SummarizationResult {
        summary,
        original_tokens,
        summary_tokens,
        tokens_saved,
        compression_ratio,
    })
}

/// Format the assistant-role summary marker, statistics included.
pub fn summary_marker(result: &SummarizationResult) -> String {
    format!(
        "[CONVERSATION SUMMARY]\n\n{}\n\n---\nCompression Stats: {} → {} tokens ({:.1}x compression, saved {} tokens)\n---\n\nThe conversation history above has been summarized. All previous messages have \
         been compressed into this summary to reduce token usage while maintaining context.",
        result.summary,
        result.original_tokens,
        result.summary_tokens,
        result.compression_ratio,
        result.tokens_saved
    )
}

/// Replace a session conversation with the compacted three-message form:
/// system, developer, assistant summary marker.
pub fn compact_conversation(result: &SummarizationResult) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(prompts::core_system_prompt()),
        ChatMessage::developer(prompts::developer_prompt()),
        ChatMessage::assistant(summary_marker(result)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::{Choice, GenerateResponse, ToolDescriptor};
    use async_trait::async_trait;

    struct FixedSummaryClient(String);

    #[async_trait]
    impl LlmClient for FixedSummaryClient {
        async fn generate(
            &self,
            _messages: &[ChatMessage],
            _tools: &[ToolDescriptor],
        ) -> Result<GenerateResponse> {
            Ok(GenerateResponse {
                choices: vec![Choice {
                    message: ChatMessage::assistant(self.0.clone()),
                    finish_reason: Some("stop".to_string()),
                }],
                usage: None,
            })
        }
    }

    fn long_conversation(pairs: usize) -> Vec<ChatMessage> {
        let mut conversation = vec![ChatMessage::system("sys")];
        for i in 0..pairs {
            conversation.push(ChatMessage::user(format!("question {} {}", i, "x".repeat(400))));
            conversation.push(ChatMessage::assistant(format!(
                "answer {} {}",
                i,
                "y".repeat(400)
            )));
        }
        conversation
    }

    #[tokio::test]
    async fn compaction_produces_three_messages_with_stats() {
        let conversation = long_conversation(20);
        let client = Arc::new(FixedSummaryClient("built a parser; tests pass".to_string()));

        let result = summarize_conversation(client, &conversation, None)
            .await
            .unwrap();
        assert!(result.original_tokens > result.summary_tokens);
        assert!(result.compression_ratio > 1.0);
        assert_eq!(
            result.tokens_saved,
            result.original_tokens - result.summary_tokens
        );

        let compacted = compact_conversation(&result);
        assert_eq!(compacted.len(), 3);
        assert_eq!(compacted[0].role, Role::System);
        assert_eq!(compacted[1].role, Role::Developer);
        assert_eq!(compacted[2].role, Role::Assistant);
        let marker = &compacted[2].content;
        assert!(marker.contains("[CONVERSATION SUMMARY]"));
        assert!(marker.contains(&format!(
            "{} → {} tokens",
            result.original_tokens, result.summary_tokens
        )));
    }

    #[tokio::test]
    async fn too_short_conversations_refuse_to_compact() {
        let conversation = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        let client = Arc::new(FixedSummaryClient("s".to_string()));
        let error = summarize_conversation(client, &conversation, None)
            .await
            .unwrap_err();
        assert!(error.to_string().contains("too short"));
    }

    #[test]
    fn token_estimate_counts_chars_and_overhead() {
        let messages = vec![ChatMessage::user("x".repeat(400))];
        // 400/4 + 10 per message
        assert_eq!(estimate_tokens(&messages), 110);
    }
}
