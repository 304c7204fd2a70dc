//! glob — find files by glob pattern.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::registry::{parse_params, Tool, ToolContext, ToolResult};

const MAX_MATCHES: usize = 500;

pub struct GlobTool;

#[derive(Deserialize)]
struct Params {
    pattern: String,
    #[serde(default)]
    path: Option<String>,
}

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Find files matching a glob pattern, e.g. **/*.rs"
    }

    fn read_only(&self) -> bool {
        true
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern to match"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search from (default: working directory)"
                }
            },
            "required": ["pattern"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let root = params
            .path
            .as_deref()
            .map(|p| ctx.resolve_path(p))
            .unwrap_or_else(|| ctx.working_dir.clone());
        let full_pattern = format!("{}/{}", root.display(), params.pattern);

        let paths = match glob::glob(&full_pattern) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("invalid glob pattern: {}", e)),
        };

        let mut matches = Vec::new();
        let mut truncated = false;
        for entry in paths.flatten() {
            if matches.len() >= MAX_MATCHES {
                truncated = true;
                break;
            }
            matches.push(entry.display().to_string());
        }
        matches.sort();

        let mut output = matches.join("\n");
        if truncated {
            output.push_str(&format!("\n[truncated at {} matches]", MAX_MATCHES));
        }
        if output.is_empty() {
            output = format!("No files matching {}", params.pattern);
        }

        ToolResult::success(output)
            .with_display(format!("{} matches for {}", matches.len(), params.pattern))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn finds_files_recursively() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/nested/lib.rs"), "").unwrap();
        std::fs::write(dir.path().join("readme.md"), "").unwrap();

        let ctx = ToolContext::new(dir.path().to_path_buf());
        let result = GlobTool.execute(json!({"pattern": "**/*.rs"}), &ctx).await;
        assert!(result.llm_content.contains("main.rs"));
        assert!(result.llm_content.contains("lib.rs"));
        assert!(!result.llm_content.contains("readme.md"));
    }
}
