//! read_file — read file contents with offset/limit and binary detection.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::fs;

use crate::tools::registry::{parse_params, Tool, ToolContext, ToolResult};

/// Maximum file size to read into memory (10 MB).
const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_LINE_LIMIT: usize = 2000;

pub struct ReadFileTool;

#[derive(Deserialize)]
struct Params {
    path: String,
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    limit: Option<usize>,
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read file contents. Supports line offset/limit for large files and detects binary files."
    }

    fn read_only(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path of the file to read"
                },
                "offset": {
                    "type": "number",
                    "description": "The line number to start reading from (1-indexed)"
                },
                "limit": {
                    "type": "number",
                    "description": "The number of lines to read"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let path = ctx.resolve_path(&params.path);
        if !path.is_file() {
            return ToolResult::error(format!("file not found: {}", params.path));
        }

        let metadata = match fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) => return ToolResult::error(format!("failed to stat {}: {}", params.path, e)),
        };
        if metadata.len() > MAX_FILE_SIZE {
            return ToolResult::error(format!(
                "file too large: {} bytes (max {} MB); use offset/limit",
                metadata.len(),
                MAX_FILE_SIZE / (1024 * 1024)
            ));
        }

        let bytes = match fs::read(&path).await {
            Ok(b) => b,
            Err(e) => return ToolResult::error(format!("failed to read {}: {}", params.path, e)),
        };

        let check_len = bytes.len().min(8192);
        if bytes[..check_len].contains(&0) {
            return ToolResult::success(format!(
                "Binary file: {} ({} bytes)",
                path.display(),
                bytes.len()
            ));
        }

        let content = match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => return ToolResult::error(format!("file is not valid UTF-8: {}", e)),
        };

        let lines: Vec<&str> = content.lines().collect();
        let total = lines.len();
        let start = params.offset.unwrap_or(1).saturating_sub(1);
        let limit = params.limit.unwrap_or(DEFAULT_LINE_LIMIT);
        if start >= total && total > 0 {
            return ToolResult::error(format!(
                "start line {} is beyond file length ({})",
                start + 1,
                total
            ));
        }
        let end = (start + limit).min(total);
        let slice = lines[start..end].join("\n");

        ToolResult::success(slice).with_display(format!(
            "Read {} lines from {}",
            end - start,
            params.path
        ))
    }
}
