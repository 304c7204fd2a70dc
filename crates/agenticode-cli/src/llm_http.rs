//! Minimal OpenAI-compatible chat-completions transport.
//!
//! The core only needs one `generate` call; this client speaks the
//! chat-completions dialect that most providers expose. Provider/model come
//! from the session config's `providers` and `models` tables.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use agenticode_core::ai::types::{
    ChatMessage, Choice, GenerateResponse, Role, ToolCall, ToolDescriptor, Usage,
};
use agenticode_core::ai::LlmClient;
use agenticode_core::config::SessionConfig;

pub struct HttpLlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpLlmClient {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }

    /// Resolve a named selection ("default", "summarize", ...) or a
    /// "provider/model" pair against the session config.
    pub fn from_config(config: &SessionConfig, selection: &str) -> Result<Self> {
        let (provider_name, model_id) = match config.models.get(selection) {
            Some(selection) => (selection.provider.clone(), selection.model.clone()),
            None => selection
                .split_once('/')
                .map(|(p, m)| (p.to_string(), m.to_string()))
                .ok_or_else(|| anyhow!("unknown model selection '{}'", selection))?,
        };

        let provider = config
            .providers
            .get(&provider_name)
            .ok_or_else(|| anyhow!("unknown provider '{}'", provider_name))?;
        if provider.base_url.is_empty() {
            return Err(anyhow!("provider '{}' has no base_url", provider_name));
        }

        Ok(Self::new(
            provider.base_url.clone(),
            provider.api_key.clone(),
            model_id,
        ))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn message_to_wire(message: &ChatMessage) -> Value {
    let role = match message.role {
        // Providers without a developer role treat it as system content.
        Role::Developer => "system".to_string(),
        other => other.to_string(),
    };
    let mut wire = json!({"role": role, "content": message.content});
    if let Some(name) = &message.name {
        wire["name"] = json!(name);
    }
    if let Some(call_id) = &message.tool_call_id {
        wire["tool_call_id"] = json!(call_id);
    }
    if !message.tool_calls.is_empty() {
        wire["tool_calls"] = json!(message
            .tool_calls
            .iter()
            .map(|tc| json!({
                "id": tc.id,
                "type": "function",
                "function": {"name": tc.name, "arguments": tc.arguments}
            }))
            .collect::<Vec<_>>());
    }
    wire
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
    #[serde(default)]
    total_tokens: usize,
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDescriptor],
    ) -> Result<GenerateResponse> {
        let mut body = json!({
            "model": self.model,
            "messages": messages.iter().map(message_to_wire).collect::<Vec<_>>(),
        });
        if !tools.is_empty() {
            body["tools"] = json!(tools
                .iter()
                .map(|t| json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                }))
                .collect::<Vec<_>>());
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("LLM request failed")?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(anyhow!("provider returned {}: {}", status, text));
        }

        let wire: WireResponse =
            serde_json::from_str(&text).context("failed to parse provider response")?;

        let choices = wire
            .choices
            .into_iter()
            .map(|choice| Choice {
                message: ChatMessage::assistant_with_tools(
                    choice.message.content.unwrap_or_default(),
                    choice
                        .message
                        .tool_calls
                        .into_iter()
                        .map(|tc| ToolCall::new(tc.id, tc.function.name, tc.function.arguments))
                        .collect(),
                ),
                finish_reason: choice.finish_reason,
            })
            .collect();

        Ok(GenerateResponse {
            choices,
            usage: wire.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_carries_tool_plumbing() {
        let message = ChatMessage::tool("c1", "read_file", "contents");
        let wire = message_to_wire(&message);
        assert_eq!(wire["role"], "tool");
        assert_eq!(wire["tool_call_id"], "c1");
        assert_eq!(wire["name"], "read_file");
    }

    #[test]
    fn developer_role_downgrades_to_system() {
        let wire = message_to_wire(&ChatMessage::developer("rules"));
        assert_eq!(wire["role"], "system");
    }

    #[test]
    fn selection_resolution_prefers_named_entries() {
        let yaml = r#"
providers:
  local:
    type: openai
    base_url: http://localhost:8080/v1
    api_key: key
models:
  default:
    provider: local
    model: small
"#;
        let config = SessionConfig::from_yaml(yaml).unwrap();
        let client = HttpLlmClient::from_config(&config, "default").unwrap();
        assert_eq!(client.model(), "small");

        let client = HttpLlmClient::from_config(&config, "local/other").unwrap();
        assert_eq!(client.model(), "other");

        assert!(HttpLlmClient::from_config(&config, "nope").is_err());
    }
}
