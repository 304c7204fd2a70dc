//! todo_read / todo_write — session task list over the shared store.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::registry::{parse_params, Tool, ToolContext, ToolResult};
use crate::tools::todo_store::{TodoItem, TodoStatus, TodoStore};

pub struct TodoReadTool;

#[async_trait]
impl Tool for TodoReadTool {
    fn name(&self) -> &str {
        "todo_read"
    }

    fn description(&self) -> &str {
        "Read the current session to-do list"
    }

    fn read_only(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    async fn execute(&self, _params: Value, _ctx: &ToolContext) -> ToolResult {
        let items = TodoStore::read();
        if items.is_empty() {
            return ToolResult::success("No todos");
        }
        let lines: Vec<String> = items
            .iter()
            .map(|item| {
                let marker = match item.status {
                    TodoStatus::Pending => "[ ]",
                    TodoStatus::InProgress => "[~]",
                    TodoStatus::Completed => "[x]",
                };
                format!("{} {} {}", marker, item.id, item.content)
            })
            .collect();
        ToolResult::success(lines.join("\n"))
    }
}

pub struct TodoWriteTool;

#[derive(Deserialize)]
struct WriteParams {
    todos: Vec<TodoItem>,
}

#[async_trait]
impl Tool for TodoWriteTool {
    fn name(&self) -> &str {
        "todo_write"
    }

    fn description(&self) -> &str {
        "Replace the session to-do list with the given items"
    }

    fn read_only(&self) -> bool {
        // Mutates only the in-process store; treated like the reader for
        // approval purposes.
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "todos": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "string"},
                            "content": {"type": "string"},
                            "status": {
                                "type": "string",
                                "enum": ["pending", "in_progress", "completed"]
                            },
                            "priority": {"type": "string"}
                        },
                        "required": ["id", "content", "status"]
                    }
                }
            },
            "required": ["todos"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<WriteParams>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };
        let count = params.todos.len();
        TodoStore::replace(params.todos);
        ToolResult::success(format!("Stored {} todos", count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trip() {
        let ctx = ToolContext::default();
        TodoWriteTool
            .execute(
                json!({"todos": [
                    {"id": "1", "content": "ship it", "status": "in_progress"}
                ]}),
                &ctx,
            )
            .await;
        let result = TodoReadTool.execute(json!({}), &ctx).await;
        assert!(result.llm_content.contains("[~] 1 ship it"));
        TodoStore::clear();
    }
}
