//! write_file — write content to a file, creating parent directories.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::fs;

use crate::tools::registry::{parse_params, Tool, ToolContext, ToolResult};

pub struct WriteFileTool;

#[derive(Deserialize)]
struct Params {
    path: String,
    content: String,
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating it (and parent directories) if needed"
    }

    fn read_only(&self) -> bool {
        false
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path of the file to write"
                },
                "content": {
                    "type": "string",
                    "description": "Full content to write"
                }
            },
            "required": ["path", "content"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let path = ctx.resolve_path(&params.path);
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent).await {
                return ToolResult::error(format!("failed to create directory: {}", e));
            }
        }

        match fs::write(&path, params.content.as_bytes()).await {
            Ok(()) => ToolResult::success(format!("Wrote {} bytes to {}", params.content.len(), params.path))
                .with_display(format!("Wrote {}", params.path)),
            Err(e) => ToolResult::error(format!("failed to write {}: {}", params.path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn writes_file_creating_parents() {
        let dir = TempDir::new().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf());

        let result = WriteFileTool
            .execute(json!({"path": "sub/dir/out.txt", "content": "hello"}), &ctx)
            .await;
        assert!(!result.is_error());
        let written = std::fs::read_to_string(dir.path().join("sub/dir/out.txt")).unwrap();
        assert_eq!(written, "hello");
    }

    #[tokio::test]
    async fn missing_content_is_invalid_parameters() {
        let dir = TempDir::new().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf());
        let result = WriteFileTool.execute(json!({"path": "x"}), &ctx).await;
        assert!(result.is_error());
        assert!(result.llm_content.contains("invalid parameters"));
    }
}
