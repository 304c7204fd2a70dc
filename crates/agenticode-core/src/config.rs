//! Session configuration.
//!
//! Parses the YAML session file (`~/.agenticode.yaml` by default) into the
//! pieces the core consumes: provider/model catalog, loop limits, approval
//! policy, hook registry, and MCP server definitions.
//!
//! Every string field supports `$VAR` / `${VAR}` references which are
//! expanded from the process environment at load time. Missing variables
//! expand to the empty string.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::hooks::HookConfig;
use crate::mcp::McpServerConfig;

static ENV_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)").unwrap());

/// Expand `$VAR` and `${VAR}` references against the process environment.
/// Unset variables expand to the empty string.
pub fn expand_env(value: &str) -> String {
    ENV_REF
        .replace_all(value, |caps: &regex::Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or("");
            std::env::var(name).unwrap_or_default()
        })
        .into_owned()
}

fn expand_map(map: &mut HashMap<String, String>) {
    for value in map.values_mut() {
        *value = expand_env(value);
    }
}

/// One model offered by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub context_window: usize,
    #[serde(default)]
    pub max_tokens: usize,
}

/// An LLM provider entry. Consumed by the external transport; the core only
/// parses and env-expands it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub provider_type: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

/// A named provider/model selection ("default", "summarize", ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSelection {
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub max_steps: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { max_steps: 15 }
    }
}

/// Approval policy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalMode {
    #[default]
    Interactive,
    Auto,
    Policy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    pub mode: ApprovalMode,
    /// Tool names approved without prompting, across risk levels.
    pub auto_approve: Vec<String>,
    /// Tool names that never auto-approve.
    pub require_approval: Vec<String>,
    /// Interactive prompt timeout in seconds.
    pub timeout: u64,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            mode: ApprovalMode::Interactive,
            auto_approve: vec![
                "read_file".to_string(),
                "list_files".to_string(),
                "grep".to_string(),
                "glob".to_string(),
                "read_many_files".to_string(),
                "todo_read".to_string(),
                "todo_write".to_string(),
            ],
            require_approval: vec![
                "run_shell".to_string(),
                "write_file".to_string(),
                "edit".to_string(),
            ],
            timeout: 60,
        }
    }
}

/// The complete session configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub providers: HashMap<String, ProviderConfig>,
    pub models: HashMap<String, ModelSelection>,
    pub general: GeneralConfig,
    pub approval: ApprovalConfig,
    pub hooks: HookConfig,
    pub mcp: HashMap<String, McpServerConfig>,
}

impl SessionConfig {
    /// Parse a YAML document and expand environment references.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let mut config: SessionConfig =
            serde_yaml::from_str(yaml).context("failed to parse session config")?;
        config.expand_env_refs();
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml(&raw)
    }

    fn expand_env_refs(&mut self) {
        for provider in self.providers.values_mut() {
            provider.base_url = expand_env(&provider.base_url);
            provider.api_key = expand_env(&provider.api_key);
        }
        for matchers in self.hooks.events.values_mut() {
            for matcher in matchers {
                for hook in &mut matcher.hooks {
                    hook.command = expand_env(&hook.command);
                }
            }
        }
        for server in self.mcp.values_mut() {
            server.command = expand_env(&server.command);
            for arg in &mut server.args {
                *arg = expand_env(arg);
            }
            server.url = expand_env(&server.url);
            expand_map(&mut server.env);
            expand_map(&mut server.headers);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_braced_and_bare_refs() {
        std::env::set_var("AGENTICODE_TEST_KEY", "sk-123");
        assert_eq!(expand_env("$AGENTICODE_TEST_KEY"), "sk-123");
        assert_eq!(expand_env("${AGENTICODE_TEST_KEY}"), "sk-123");
        assert_eq!(
            expand_env("Bearer ${AGENTICODE_TEST_KEY}!"),
            "Bearer sk-123!"
        );
    }

    #[test]
    fn missing_vars_expand_to_empty() {
        std::env::remove_var("AGENTICODE_TEST_UNSET");
        assert_eq!(expand_env("x${AGENTICODE_TEST_UNSET}y"), "xy");
        assert_eq!(expand_env("$AGENTICODE_TEST_UNSET"), "");
    }

    #[test]
    fn parses_full_document_and_expands_api_key() {
        std::env::set_var("AGENTICODE_TEST_OPENAI_KEY", "secret");
        let yaml = r#"
providers:
  openai:
    type: openai
    base_url: https://api.openai.com/v1
    api_key: ${AGENTICODE_TEST_OPENAI_KEY}
    models:
      - id: gpt-4o
        name: GPT-4o
        context_window: 128000
        max_tokens: 4096
models:
  default:
    provider: openai
    model: gpt-4o
general:
  max_steps: 25
approval:
  mode: auto
  auto_approve: [read_file]
  timeout: 30
"#;
        let config = SessionConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.providers["openai"].api_key, "secret");
        assert_eq!(config.general.max_steps, 25);
        assert_eq!(config.approval.mode, ApprovalMode::Auto);
        assert_eq!(config.approval.timeout, 30);
        assert_eq!(config.models["default"].model, "gpt-4o");
    }

    #[test]
    fn defaults_apply_when_sections_missing() {
        let config = SessionConfig::from_yaml("{}").unwrap();
        assert_eq!(config.general.max_steps, 15);
        assert_eq!(config.approval.mode, ApprovalMode::Interactive);
        assert_eq!(config.approval.timeout, 60);
        assert!(config
            .approval
            .auto_approve
            .iter()
            .any(|name| name == "read_file"));
    }
}
