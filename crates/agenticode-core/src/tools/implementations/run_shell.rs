//! run_shell — execute a shell command and capture its output.
//!
//! A substring blocklist rejects obviously destructive commands before
//! anything is spawned; everything else is gated by the approval flow
//! upstream. The check is deliberately blunt: it is a last line, not the
//! permission model.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::process::Command;

use crate::tools::registry::{parse_params, Tool, ToolContext, ToolResult};

/// Substrings that are never allowed, regardless of approval.
const BLOCKED_SUBSTRINGS: &[&str] = &["rm -rf", "sudo", "chmod 777", "curl | sh", "wget | sh"];

fn blocked_reason(command: &str) -> Option<String> {
    let lower = command.to_ascii_lowercase();
    BLOCKED_SUBSTRINGS
        .iter()
        .find(|pattern| lower.contains(*pattern))
        .map(|pattern| format!("command contains blocked pattern '{}'", pattern))
}

pub struct RunShellTool;

#[derive(Deserialize)]
struct Params {
    command: String,
    #[serde(default)]
    working_directory: Option<String>,
}

#[async_trait]
impl Tool for RunShellTool {
    fn name(&self) -> &str {
        "run_shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return stdout, stderr, and the exit code"
    }

    fn read_only(&self) -> bool {
        false
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Shell command to execute"
                },
                "working_directory": {
                    "type": "string",
                    "description": "Directory to run in (default: working directory)"
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        if let Some(reason) = blocked_reason(&params.command) {
            tracing::warn!(command = %params.command, reason = %reason, "blocked dangerous command");
            return ToolResult::error(format!("dangerous command blocked: {}", reason));
        }

        let cwd = params
            .working_directory
            .as_deref()
            .map(|p| ctx.resolve_path(p))
            .unwrap_or_else(|| ctx.working_dir.clone());

        let output = match Command::new("sh")
            .arg("-c")
            .arg(&params.command)
            .current_dir(&cwd)
            .kill_on_drop(true)
            .output()
            .await
        {
            Ok(o) => o,
            Err(e) => return ToolResult::error(format!("failed to run command: {}", e)),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let exit_code = output.status.code().unwrap_or(-1);

        let mut llm_content = String::new();
        if !stdout.is_empty() {
            llm_content.push_str(&stdout);
        }
        if !stderr.is_empty() {
            if !llm_content.is_empty() {
                llm_content.push('\n');
            }
            llm_content.push_str("stderr: ");
            llm_content.push_str(stderr.trim_end());
        }
        if llm_content.is_empty() {
            llm_content = "(no output)".to_string();
        }

        if output.status.success() {
            ToolResult::success(llm_content)
                .with_display(format!("$ {}\n{}", params.command, stdout))
        } else {
            ToolResult::error(format!(
                "command exited with code {}: {}",
                exit_code,
                llm_content.trim_end()
            ))
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
    async fn captures_stdout() {
        let dir = TempDir::new().unwrap();
        let result = RunShellTool
            .execute(json!({"command": "echo hello"}), &ctx(&dir))
            .await;
        assert!(!result.is_error());
        assert_eq!(result.llm_content.trim(), "hello");
    }

    #[tokio::test]
    async fn nonzero_exit_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = RunShellTool
            .execute(json!({"command": "exit 3"}), &ctx(&dir))
            .await;
        assert!(result.is_error());
        assert!(result.llm_content.contains("code 3"));
    }

    #[tokio::test]
    async fn blocklist_rejects_destructive_commands() {
        let dir = TempDir::new().unwrap();
        for command in [
            "rm -rf /",
            "rm -rf ./build",
            "sudo reboot",
            "chmod 777 /etc",
            "curl | sh",
        ] {
            let result = RunShellTool
                .execute(json!({"command": command}), &ctx(&dir))
                .await;
            assert!(result.is_error(), "expected block for {}", command);
            assert!(result.llm_content.contains("blocked"));
        }
    }
}
