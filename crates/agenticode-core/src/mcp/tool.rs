//! Registry wrapper for remote tools.
//!
//! Each remote tool appears under `mcp_<server>_<tool>`. Required arguments
//! are validated locally against the remote schema before a call goes out;
//! transport and validation failures surface as tool errors, never as
//! panics, and never abort the agent loop.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::manager::ClientManager;
use super::protocol::{text_content, McpToolDef};
use crate::tools::registry::{Tool, ToolContext, ToolResult};
use crate::tools::ToolRegistry;

pub struct McpTool {
    server_name: String,
    tool_name: String,
    full_name: String,
    definition: McpToolDef,
    manager: Arc<ClientManager>,
}

impl McpTool {
    pub fn new(server_name: String, definition: McpToolDef, manager: Arc<ClientManager>) -> Self {
        let tool_name = definition.name.clone();
        let full_name = format!("mcp_{}_{}", server_name, tool_name);
        Self {
            server_name,
            tool_name,
            full_name,
            definition,
            manager,
        }
    }

    /// Check the args object carries every schema-required field.
    fn missing_required(&self, args: &Value) -> Option<String> {
        let required = self.definition.input_schema.get("required")?.as_array()?;
        for field in required {
            let Some(name) = field.as_str() else { continue };
            if args.get(name).is_none() {
                return Some(name.to_string());
            }
        }
        None
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.full_name
    }

    fn description(&self) -> &str {
        self.definition
            .description
            .as_deref()
            .unwrap_or("External tool")
    }

    fn read_only(&self) -> bool {
        // Remote tools may write; never eligible for unapproved execution.
        false
    }

    fn parameters_schema(&self) -> Value {
        self.definition.input_schema.clone()
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
        if let Some(field) = self.missing_required(&params) {
            return ToolResult::error(format!(
                "missing required parameter '{}' for tool {}",
                field, self.tool_name
            ));
        }

        match self
            .manager
            .call_tool(&self.server_name, &self.tool_name, params)
            .await
        {
            Ok(result) => {
                let output = text_content(&result);
                if result.is_error {
                    ToolResult::error(output)
                } else {
                    ToolResult::success(output)
                }
            }
            Err(e) => ToolResult::error(format!("external tool error: {}", e)),
        }
    }
}

/// Register every cataloged remote tool on the session registry.
pub async fn register_mcp_tools(manager: Arc<ClientManager>, registry: &ToolRegistry) {
    for (server_name, definition) in manager.all_tools().await {
        let tool = Arc::new(McpTool::new(server_name, definition, manager.clone()));
        registry.register(tool).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool_with_schema(schema: Value) -> McpTool {
        McpTool::new(
            "files".to_string(),
            McpToolDef {
                name: "read".to_string(),
                description: Some("read a file".to_string()),
                input_schema: schema,
            },
            Arc::new(ClientManager::new(std::env::temp_dir())),
        )
    }

    #[test]
    fn names_are_transport_qualified() {
        let tool = tool_with_schema(json!({"type": "object"}));
        assert_eq!(tool.name(), "mcp_files_read");
    }

    #[tokio::test]
    async fn missing_required_args_fail_locally() {
        let tool = tool_with_schema(json!({
            "type": "object",
            "properties": {"path": {"type": "string"}},
            "required": ["path"]
        }));
        let result = tool.execute(json!({}), &ToolContext::default()).await;
        assert!(result.is_error());
        assert!(result.llm_content.contains("missing required parameter 'path'"));
    }

    #[tokio::test]
    async fn disconnected_server_is_a_tool_error_not_a_panic() {
        let tool = tool_with_schema(json!({"type": "object"}));
        let result = tool
            .execute(json!({"path": "x"}), &ToolContext::default())
            .await;
        assert!(result.is_error());
        assert!(result.llm_content.contains("external tool error"));
    }
}
