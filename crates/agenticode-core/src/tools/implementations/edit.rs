//! edit — literal string replacement within an existing file.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::fs;

use crate::tools::registry::{parse_params, Tool, ToolContext, ToolResult};

pub struct EditTool;

#[derive(Deserialize)]
struct Params {
    file_path: String,
    old_string: String,
    new_string: String,
    #[serde(default)]
    replace_all: bool,
}

#[async_trait]
impl Tool for EditTool {
    fn name(&self) -> &str {
        "edit"
    }

    fn description(&self) -> &str {
        "Replace an exact string in a file. The old string must be unique unless replace_all is set."
    }

    fn read_only(&self) -> bool {
        false
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path of the file to edit"
                },
                "old_string": {
                    "type": "string",
                    "description": "Exact text to replace"
                },
                "new_string": {
                    "type": "string",
                    "description": "Replacement text"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace every occurrence instead of requiring uniqueness"
                }
            },
            "required": ["file_path", "old_string", "new_string"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let path = ctx.resolve_path(&params.file_path);
        let content = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => {
                return ToolResult::error(format!("cannot edit {}: {}", params.file_path, e))
            }
        };

        let occurrences = content.matches(&params.old_string).count();
        if occurrences == 0 {
            return ToolResult::error(format!(
                "old_string not found in {}",
                params.file_path
            ));
        }
        if occurrences > 1 && !params.replace_all {
            return ToolResult::error(format!(
                "old_string occurs {} times in {}; pass replace_all or make it unique",
                occurrences, params.file_path
            ));
        }

        let updated = if params.replace_all {
            content.replace(&params.old_string, &params.new_string)
        } else {
            content.replacen(&params.old_string, &params.new_string, 1)
        };

        if updated == content {
            return ToolResult::error(
                "no changes made - old_string and new_string might be identical",
            );
        }

        match fs::write(&path, updated.as_bytes()).await {
            Ok(()) => {
                let replaced = if params.replace_all { occurrences } else { 1 };
                ToolResult::success(format!(
                    "Replaced {} occurrence(s) in {}",
                    replaced, params.file_path
                ))
            }
            Err(e) => ToolResult::error(format!("failed to write {}: {}", params.file_path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ctx(dir: &TempDir) -> ToolContext {
        ToolContext::new(dir.path().to_path_buf())
    }

    #[tokio::test]
    async fn replaces_single_occurrence() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn old() {}").unwrap();

        let result = EditTool
            .execute(
                json!({"file_path": "a.rs", "old_string": "old", "new_string": "new"}),
                &ctx(&dir),
            )
            .await;
        assert!(!result.is_error());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.rs")).unwrap(),
            "fn new() {}"
        );
    }

    #[tokio::test]
    async fn ambiguous_match_requires_replace_all() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x x").unwrap();

        let result = EditTool
            .execute(
                json!({"file_path": "a.txt", "old_string": "x", "new_string": "y"}),
                &ctx(&dir),
            )
            .await;
        assert!(result.is_error());

        let result = EditTool
            .execute(
                json!({"file_path": "a.txt", "old_string": "x", "new_string": "y", "replace_all": true}),
                &ctx(&dir),
            )
            .await;
        assert!(!result.is_error());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "y y"
        );
    }

    #[tokio::test]
    async fn identical_replacement_is_a_no_op_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "same").unwrap();

        let result = EditTool
            .execute(
                json!({"file_path": "a.txt", "old_string": "same", "new_string": "same"}),
                &ctx(&dir),
            )
            .await;
        assert!(result.is_error());
        assert!(result.llm_content.contains("no changes made"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "same"
        );
    }

    #[tokio::test]
    async fn editing_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let result = EditTool
            .execute(
                json!({"file_path": "nope.txt", "old_string": "a", "new_string": "b"}),
                &ctx(&dir),
            )
            .await;
        assert!(result.is_error());
    }
}
