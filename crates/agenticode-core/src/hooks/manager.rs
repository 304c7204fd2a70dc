//! Hook execution engine.
//!
//! Fires user-defined shell commands at lifecycle events. Hooks for one
//! event run concurrently, each under its own timeout; the event blocks the
//! caller until every hook settles. Results are aggregated with the rules in
//! [`crate::hooks::types`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::join_all;
use regex::Regex;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::types::{
    Hook, HookConfig, HookEvent, HookInput, HookOutput, HookSpecificOutput,
};

const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of one hook process, before aggregation.
#[derive(Debug)]
struct HookRun {
    exit_code: i32,
    stdout: String,
    stderr: String,
    spawn_error: Option<String>,
}

/// Fires configured hooks and aggregates their outputs.
///
/// Owned by the session and shared by reference with the turn handler and
/// the outer agent loop.
pub struct HookManager {
    config: HookConfig,
    project_dir: PathBuf,
    session_id: String,
    transcript_path: PathBuf,
}

impl HookManager {
    pub fn new(config: HookConfig, project_dir: PathBuf, session_id: String) -> Self {
        let transcript_path = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".agenticode")
            .join("sessions")
            .join(format!("{}.jsonl", session_id));
        Self {
            config,
            project_dir,
            session_id,
            transcript_path,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn has_hooks_for(&self, event: HookEvent) -> bool {
        self.config
            .events
            .get(&event)
            .is_some_and(|matchers| !matchers.is_empty())
    }

    /// Run every hook registered for `event` whose matcher applies.
    ///
    /// Returns one output per completed hook, in configuration order.
    pub async fn run(&self, event: HookEvent, mut input: HookInput) -> Result<Vec<HookOutput>> {
        let Some(matchers) = self.config.events.get(&event) else {
            return Ok(Vec::new());
        };

        input.session_id = self.session_id.clone();
        input.transcript_path = self.transcript_path.display().to_string();
        input.cwd = self.project_dir.display().to_string();
        input.hook_event_name = event.as_str().to_string();

        let tool_name = input.tool_name.as_deref().unwrap_or("");
        let hooks: Vec<&Hook> = matchers
            .iter()
            .filter(|m| matches_pattern(&m.matcher, tool_name, event))
            .flat_map(|m| m.hooks.iter())
            .collect();

        if hooks.is_empty() {
            return Ok(Vec::new());
        }

        let input_json =
            serde_json::to_string(&input).context("failed to serialize hook input")?;

        debug!(event = %event, count = hooks.len(), "executing hooks");

        let runs = join_all(
            hooks
                .iter()
                .map(|hook| self.execute_hook(hook, &input_json)),
        )
        .await;

        let mut outputs = Vec::with_capacity(runs.len());
        for run in runs {
            if let Some(output) = process_run(event, run) {
                outputs.push(output);
            }
        }
        Ok(outputs)
    }

    async fn execute_hook(&self, hook: &Hook, input_json: &str) -> HookRun {
        let timeout = hook
            .timeout
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_HOOK_TIMEOUT);

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&hook.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("AGENTICODE_PROJECT_DIR", &self.project_dir)
            .env("CLAUDE_PROJECT_DIR", &self.project_dir)
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                warn!(command = %hook.command, "failed to spawn hook: {}", e);
                return HookRun {
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: String::new(),
                    spawn_error: Some(e.to_string()),
                };
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(input_json.as_bytes()).await {
                warn!(command = %hook.command, "failed to write hook stdin: {}", e);
            }
            // dropping stdin closes it
        }

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => HookRun {
                exit_code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                spawn_error: None,
            },
            Ok(Err(e)) => HookRun {
                exit_code: -1,
                stdout: String::new(),
                stderr: String::new(),
                spawn_error: Some(e.to_string()),
            },
            Err(_) => {
                warn!(command = %hook.command, timeout_secs = timeout.as_secs(), "hook timed out");
                HookRun {
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: format!("hook timed out after {}s", timeout.as_secs()),
                    spawn_error: None,
                }
            }
        }
    }
}

fn matches_pattern(pattern: &str, tool_name: &str, event: HookEvent) -> bool {
    if !event.is_tool_event() {
        return true;
    }
    if pattern.is_empty() || pattern == "*" {
        return true;
    }
    if pattern == tool_name {
        return true;
    }
    Regex::new(pattern)
        .map(|re| re.is_match(tool_name))
        .unwrap_or(false)
}

/// Turn a raw process run into a `HookOutput` per the exit-code protocol.
fn process_run(event: HookEvent, run: HookRun) -> Option<HookOutput> {
    if let Some(error) = run.spawn_error {
        warn!("hook execution error: {}", error);
        return None;
    }

    match run.exit_code {
        0 => {
            // Prefer structured JSON on stdout when it parses.
            if !run.stdout.is_empty() {
                if let Ok(output) = serde_json::from_str::<HookOutput>(&run.stdout) {
                    return Some(output);
                }
            }
            let mut output = HookOutput {
                continue_: Some(true),
                ..Default::default()
            };
            // Plain stdout from context-injecting events becomes additionalContext.
            if matches!(event, HookEvent::UserPromptSubmit | HookEvent::SessionStart)
                && !run.stdout.trim().is_empty()
            {
                output.hook_specific_output = Some(HookSpecificOutput {
                    hook_event_name: Some(event.as_str().to_string()),
                    additional_context: Some(run.stdout.trim().to_string()),
                    ..Default::default()
                });
            }
            Some(output)
        }
        2 => {
            let reason = run.stderr.trim().to_string();
            let mut output = HookOutput {
                continue_: Some(false),
                stop_reason: Some(reason.clone()),
                ..Default::default()
            };
            match event {
                HookEvent::PreToolUse => {
                    output.hook_specific_output = Some(HookSpecificOutput {
                        hook_event_name: Some(event.as_str().to_string()),
                        permission_decision: Some("deny".to_string()),
                        permission_decision_reason: Some(reason),
                        ..Default::default()
                    });
                }
                HookEvent::PostToolUse | HookEvent::Stop | HookEvent::SubagentStop => {
                    output.decision = Some("block".to_string());
                    output.reason = Some(reason);
                }
                _ => {}
            }
            Some(output)
        }
        code => {
            if !run.stderr.trim().is_empty() {
                warn!(exit_code = code, "hook warning: {}", run.stderr.trim());
            }
            Some(HookOutput {
                continue_: Some(true),
                ..Default::default()
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::types::{should_auto_approve, should_block, HookMatcher};
    use std::collections::HashMap;

    fn manager_with(event: HookEvent, matcher: &str, command: &str) -> HookManager {
        let mut events = HashMap::new();
        events.insert(
            event,
            vec![HookMatcher {
                matcher: matcher.to_string(),
                hooks: vec![Hook {
                    hook_type: "command".to_string(),
                    command: command.to_string(),
                    timeout: Some(5),
                }],
            }],
        );
        HookManager::new(
            HookConfig { events },
            std::env::temp_dir(),
            "test-session".to_string(),
        )
    }

    #[test]
    fn pattern_matching_rules() {
        assert!(matches_pattern("", "run_shell", HookEvent::PreToolUse));
        assert!(matches_pattern("*", "run_shell", HookEvent::PreToolUse));
        assert!(matches_pattern("run_shell", "run_shell", HookEvent::PreToolUse));
        assert!(matches_pattern("run_.*", "run_shell", HookEvent::PreToolUse));
        assert!(!matches_pattern("write_file", "run_shell", HookEvent::PreToolUse));
        // Non-tool events ignore the matcher entirely.
        assert!(matches_pattern("whatever", "", HookEvent::Stop));
    }

    #[tokio::test]
    async fn exit_two_blocks_with_stderr_reason() {
        let manager = manager_with(
            HookEvent::PreToolUse,
            "run_shell",
            "echo 'policy deny' >&2; exit 2",
        );
        let outputs = manager
            .run(
                HookEvent::PreToolUse,
                HookInput::for_tool("run_shell", serde_json::json!({"command": "ls"})),
            )
            .await
            .unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(should_block(&outputs).as_deref(), Some("policy deny"));
    }

    #[tokio::test]
    async fn exit_zero_json_auto_approves() {
        let manager = manager_with(
            HookEvent::PreToolUse,
            "*",
            r#"echo '{"hookSpecificOutput":{"permissionDecision":"allow"}}'"#,
        );
        let outputs = manager
            .run(
                HookEvent::PreToolUse,
                HookInput::for_tool("write_file", serde_json::json!({})),
            )
            .await
            .unwrap();
        assert!(should_auto_approve(&outputs));
    }

    #[tokio::test]
    async fn nonzero_exit_is_nonblocking_warning() {
        let manager = manager_with(HookEvent::PreToolUse, "*", "echo oops >&2; exit 1");
        let outputs = manager
            .run(
                HookEvent::PreToolUse,
                HookInput::for_tool("read_file", serde_json::json!({})),
            )
            .await
            .unwrap();
        assert_eq!(outputs.len(), 1);
        assert!(should_block(&outputs).is_none());
    }

    #[tokio::test]
    async fn prompt_stdout_becomes_additional_context() {
        let manager = manager_with(HookEvent::UserPromptSubmit, "", "echo 'remember the style guide'");
        let outputs = manager
            .run(HookEvent::UserPromptSubmit, HookInput::for_prompt("hi"))
            .await
            .unwrap();
        assert_eq!(
            crate::hooks::types::additional_context(&outputs).as_deref(),
            Some("remember the style guide")
        );
    }

    #[tokio::test]
    async fn non_matching_tool_runs_no_hooks() {
        let manager = manager_with(HookEvent::PreToolUse, "run_shell", "exit 2");
        let outputs = manager
            .run(
                HookEvent::PreToolUse,
                HookInput::for_tool("read_file", serde_json::json!({})),
            )
            .await
            .unwrap();
        assert!(outputs.is_empty());
    }
}
