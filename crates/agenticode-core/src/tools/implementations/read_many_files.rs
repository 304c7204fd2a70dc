//! read_many_files — read several files in one call.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::fs;

use crate::tools::registry::{parse_params, Tool, ToolContext, ToolResult};

const MAX_FILES: usize = 20;
const MAX_TOTAL_BYTES: usize = 512 * 1024;

pub struct ReadManyFilesTool;

#[derive(Deserialize)]
struct Params {
    paths: Vec<String>,
}

#[async_trait]
impl Tool for ReadManyFilesTool {
    fn name(&self) -> &str {
        "read_many_files"
    }

    fn description(&self) -> &str {
        "Read several files at once; each file is returned under a path header"
    }

    fn read_only(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "paths": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Paths of the files to read"
                }
            },
            "required": ["paths"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        if params.paths.is_empty() {
            return ToolResult::error("paths must not be empty");
        }
        if params.paths.len() > MAX_FILES {
            return ToolResult::error(format!(
                "too many files: {} (max {})",
                params.paths.len(),
                MAX_FILES
            ));
        }

        let mut sections = Vec::new();
        let mut total = 0usize;
        for raw in &params.paths {
            let path = ctx.resolve_path(raw);
            match fs::read_to_string(&path).await {
                Ok(content) => {
                    total += content.len();
                    if total > MAX_TOTAL_BYTES {
                        sections.push(format!("=== {} ===\n[skipped: size budget exhausted]", raw));
                        continue;
                    }
                    sections.push(format!("=== {} ===\n{}", raw, content));
                }
                Err(e) => sections.push(format!("=== {} ===\n[error: {}]", raw, e)),
            }
        }

        let count = params.paths.len();
        ToolResult::success(sections.join("\n\n"))
            .with_display(format!("Read {} files", count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn reads_multiple_files_with_headers() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        std::fs::write(dir.path().join("b.txt"), "beta").unwrap();

        let ctx = ToolContext::new(dir.path().to_path_buf());
        let result = ReadManyFilesTool
            .execute(json!({"paths": ["a.txt", "b.txt"]}), &ctx)
            .await;
        assert!(result.llm_content.contains("=== a.txt ===\nalpha"));
        assert!(result.llm_content.contains("=== b.txt ===\nbeta"));
    }

    #[tokio::test]
    async fn missing_file_reported_inline() {
        let dir = TempDir::new().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf());
        let result = ReadManyFilesTool
            .execute(json!({"paths": ["missing.txt"]}), &ctx)
            .await;
        assert!(!result.is_error());
        assert!(result.llm_content.contains("[error:"));
    }
}
