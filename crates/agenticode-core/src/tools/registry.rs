//! Tool registry — the single source of truth for what the LLM may call.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::ai::types::ToolDescriptor;

/// Default tool execution timeout (2 minutes).
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

/// Result of one tool execution.
///
/// `llm_content` goes back to the model in the tool-role message;
/// `display_content` is the human-facing rendering.
#[derive(Debug, Clone, Default)]
pub struct ToolResult {
    pub llm_content: String,
    pub display_content: String,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(llm_content: impl Into<String>) -> Self {
        let llm_content = llm_content.into();
        Self {
            display_content: llm_content.clone(),
            llm_content,
            error: None,
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display_content = display.into();
        self
    }

    pub fn error(message: impl std::fmt::Display) -> Self {
        let message = message.to_string();
        Self {
            llm_content: format!("Error: {}", message),
            display_content: format!("Error: {}", message),
            error: Some(message),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Parse tool parameters into a typed struct, mapping failures to a
/// tool error instead of a panic.
pub fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, ToolResult> {
    serde_json::from_value(params)
        .map_err(|e| ToolResult::error(format!("invalid parameters: {}", e)))
}

/// Context handed to every tool execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub working_dir: PathBuf,
    /// Per-call timeout override.
    pub timeout: Option<Duration>,
}

impl Default for ToolContext {
    fn default() -> Self {
        Self {
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            timeout: None,
        }
    }
}

impl ToolContext {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            timeout: None,
        }
    }

    /// Resolve a path relative to the working directory; absolute paths pass
    /// through unchanged.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let p = PathBuf::from(path);
        if p.is_absolute() {
            p
        } else {
            self.working_dir.join(p)
        }
    }
}

/// A named callable exposed to the LLM.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Read-only tools never mutate state and are eligible for
    /// execution without approval.
    fn read_only(&self) -> bool;

    /// JSON-Schema object describing the parameters.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult;
}

/// Catalog of callable tools.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
    default_timeout: Duration,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            default_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.write().await.insert(name, tool);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().await.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.tools.read().await.contains_key(name)
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn is_read_only(&self, name: &str) -> bool {
        self.tools
            .read()
            .await
            .get(name)
            .map(|t| t.read_only())
            .unwrap_or(false)
    }

    /// Project the catalog into provider function-calling descriptors.
    pub async fn descriptors(&self) -> Vec<ToolDescriptor> {
        let tools = self.tools.read().await;
        let mut descriptors: Vec<ToolDescriptor> = tools
            .values()
            .map(|t| ToolDescriptor {
                name: t.name().to_string(),
                description: t.description().to_string(),
                read_only: t.read_only(),
                parameters: t.parameters_schema(),
            })
            .collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// A new registry holding only the named tools; used to constrain
    /// sub-agents.
    pub async fn filtered(&self, allowed: &[&str]) -> ToolRegistry {
        let tools = self.tools.read().await;
        let filtered = ToolRegistry::new();
        {
            let mut map = filtered.tools.write().await;
            for name in allowed {
                if let Some(tool) = tools.get(*name) {
                    map.insert((*name).to_string(), tool.clone());
                }
            }
        }
        filtered
    }

    /// Execute a tool by name with a timeout. `None` means the tool does not
    /// exist.
    pub async fn execute(&self, name: &str, params: Value, ctx: &ToolContext) -> Option<ToolResult> {
        let tool = self.get(name).await?;
        let timeout = ctx.timeout.unwrap_or(self.default_timeout);

        let result = match tokio::time::timeout(timeout, tool.execute(params, ctx)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(tool = name, timeout_secs = timeout.as_secs(), "tool timed out");
                ToolResult::error(format!(
                    "tool '{}' timed out after {} seconds",
                    name,
                    timeout.as_secs()
                ))
            }
        };

        Some(result)
    }
}
