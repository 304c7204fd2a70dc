//! grep — regex search over files.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::registry::{parse_params, Tool, ToolContext, ToolResult};

const MAX_RESULTS: usize = 200;
const MAX_FILE_SIZE: u64 = 2 * 1024 * 1024;

pub struct GrepTool;

#[derive(Deserialize)]
struct Params {
    pattern: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    include: Option<String>,
}

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn description(&self) -> &str {
        "Search file contents with a regular expression; reports file:line matches"
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
                    "description": "Regular expression to search for"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search (default: working directory)"
                },
                "include": {
                    "type": "string",
                    "description": "Glob filter for file names, e.g. *.rs"
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

        let re = match Regex::new(&params.pattern) {
            Ok(re) => re,
            Err(e) => return ToolResult::error(format!("invalid pattern: {}", e)),
        };

        let root = params
            .path
            .as_deref()
            .map(|p| ctx.resolve_path(p))
            .unwrap_or_else(|| ctx.working_dir.clone());
        let include = params.include.as_deref().unwrap_or("**/*");
        let full_pattern = format!("{}/{}", root.display(), include);

        let paths = match glob::glob(&full_pattern) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(format!("invalid include glob: {}", e)),
        };

        let mut results = Vec::new();
        'files: for path in paths.flatten() {
            if !path.is_file() {
                continue;
            }
            if std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0) > MAX_FILE_SIZE {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue; // skip binary / non-UTF-8
            };
            for (i, line) in content.lines().enumerate() {
                if re.is_match(line) {
                    results.push(format!("{}:{}: {}", path.display(), i + 1, line.trim()));
                    if results.len() >= MAX_RESULTS {
                        results.push(format!("[truncated at {} matches]", MAX_RESULTS));
                        break 'files;
                    }
                }
            }
        }

        if results.is_empty() {
            return ToolResult::success(format!("No matches for {}", params.pattern));
        }

        let count = results.len();
        ToolResult::success(results.join("\n"))
            .with_display(format!("{} matches for {}", count, params.pattern))
    }
}
