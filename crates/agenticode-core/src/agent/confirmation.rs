//! Confirmation details shown to the approver for risky calls.
//!
//! The most specific variant a tool supports is produced: file tools get a
//! computed diff, shell execution gets the command, everything else falls
//! back to an info record. Building File details requires reading the
//! current file; if that I/O fails the builder falls back to Info rather
//! than aborting approval.

use std::path::Path;

use serde_json::Value;
use similar::TextDiff;

use crate::agent::risk::RiskLevel;

/// What a risky tool call is about to do, in approver-facing form.
#[derive(Debug, Clone)]
pub enum ConfirmationDetails {
    File {
        tool_name: String,
        file_path: String,
        is_new_file: bool,
        original_content: String,
        new_content: String,
        unified_diff: String,
        risk: RiskLevel,
    },
    Exec {
        tool_name: String,
        command: String,
        working_dir: String,
        risk: RiskLevel,
    },
    Info {
        tool_name: String,
        description: String,
        parameters: Value,
        risk: RiskLevel,
    },
}

impl ConfirmationDetails {
    pub fn risk(&self) -> RiskLevel {
        match self {
            ConfirmationDetails::File { risk, .. } => *risk,
            ConfirmationDetails::Exec { risk, .. } => *risk,
            ConfirmationDetails::Info { risk, .. } => *risk,
        }
    }

    pub fn tool_name(&self) -> &str {
        match self {
            ConfirmationDetails::File { tool_name, .. } => tool_name,
            ConfirmationDetails::Exec { tool_name, .. } => tool_name,
            ConfirmationDetails::Info { tool_name, .. } => tool_name,
        }
    }

    pub fn title(&self) -> String {
        match self {
            ConfirmationDetails::File {
                file_path,
                is_new_file,
                ..
            } => {
                if *is_new_file {
                    format!("Create new file: {}", file_path)
                } else {
                    format!("Modify file: {}", file_path)
                }
            }
            ConfirmationDetails::Exec { command, .. } => {
                format!("Execute command: {}", command)
            }
            ConfirmationDetails::Info { description, .. } => description.clone(),
        }
    }
}

/// Generate a unified diff between old and new file contents.
pub fn unified_diff(original: &str, updated: &str, file_path: &str) -> String {
    TextDiff::from_lines(original, updated)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{}", file_path), &format!("b/{}", file_path))
        .to_string()
}

/// Build the most specific confirmation for a tool call.
///
/// Returns `None` for an `edit` of a non-existent file: no confirmation is
/// shown and the call fails at execute time instead.
pub fn build_confirmation(
    tool_name: &str,
    args: &Value,
    risk: RiskLevel,
    working_dir: &Path,
) -> Option<ConfirmationDetails> {
    match tool_name {
        "write_file" => Some(build_write_file(tool_name, args, risk, working_dir)),
        "edit" => build_edit(tool_name, args, risk, working_dir),
        "run_shell" => Some(build_exec(tool_name, args, risk, working_dir)),
        _ => Some(info_details(tool_name, args, risk)),
    }
}

fn resolve(working_dir: &Path, raw: &str) -> std::path::PathBuf {
    let p = std::path::PathBuf::from(raw);
    if p.is_absolute() {
        p
    } else {
        working_dir.join(p)
    }
}

fn build_write_file(
    tool_name: &str,
    args: &Value,
    risk: RiskLevel,
    working_dir: &Path,
) -> ConfirmationDetails {
    let file_path = args
        .get("path")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let new_content = args
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let resolved = resolve(working_dir, &file_path);
    match std::fs::read_to_string(&resolved) {
        Ok(original_content) => {
            let diff = unified_diff(&original_content, &new_content, &file_path);
            ConfirmationDetails::File {
                tool_name: tool_name.to_string(),
                file_path,
                is_new_file: false,
                original_content,
                new_content,
                unified_diff: diff,
                risk,
            }
        }
        Err(_) => ConfirmationDetails::File {
            tool_name: tool_name.to_string(),
            file_path,
            is_new_file: true,
            original_content: String::new(),
            new_content,
            unified_diff: String::new(),
            risk,
        },
    }
}

fn build_edit(
    tool_name: &str,
    args: &Value,
    risk: RiskLevel,
    working_dir: &Path,
) -> Option<ConfirmationDetails> {
    let file_path = args
        .get("file_path")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    let resolved = resolve(working_dir, &file_path);
    // Editing a non-existent file cannot be confirmed; it fails at execution.
    let original_content = std::fs::read_to_string(&resolved).ok()?;

    let old_string = args.get("old_string").and_then(|v| v.as_str()).unwrap_or("");
    let new_string = args.get("new_string").and_then(|v| v.as_str()).unwrap_or("");
    let replace_all = args
        .get("replace_all")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let new_content = if replace_all {
        original_content.replace(old_string, new_string)
    } else {
        original_content.replacen(old_string, new_string, 1)
    };

    let diff = unified_diff(&original_content, &new_content, &file_path);
    Some(ConfirmationDetails::File {
        tool_name: tool_name.to_string(),
        file_path,
        is_new_file: false,
        original_content,
        new_content,
        unified_diff: diff,
        risk,
    })
}

fn build_exec(tool_name: &str, args: &Value, risk: RiskLevel, working_dir: &Path) -> ConfirmationDetails {
    let command = args
        .get("command")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let working = args
        .get("working_directory")
        .and_then(|v| v.as_str())
        .map(ToString::to_string)
        .unwrap_or_else(|| working_dir.display().to_string());
    ConfirmationDetails::Exec {
        tool_name: tool_name.to_string(),
        command,
        working_dir: working,
        risk,
    }
}

fn info_details(tool_name: &str, args: &Value, risk: RiskLevel) -> ConfirmationDetails {
    ConfirmationDetails::Info {
        tool_name: tool_name.to_string(),
        description: format!("{}: {}", tool_name, args),
        parameters: args.clone(),
        risk,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn write_file_over_existing_gets_a_diff() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "old line\n").unwrap();

        let details = build_confirmation(
            "write_file",
            &json!({"path": "a.txt", "content": "new line\n"}),
            RiskLevel::Medium,
            dir.path(),
        )
        .unwrap();

        let ConfirmationDetails::File {
            is_new_file,
            unified_diff,
            ..
        } = details
        else {
            panic!("expected file details");
        };
        assert!(!is_new_file);
        assert!(unified_diff.contains("-old line"));
        assert!(unified_diff.contains("+new line"));
    }

    #[test]
    fn write_file_to_new_path_is_new_file() {
        let dir = TempDir::new().unwrap();
        let details = build_confirmation(
            "write_file",
            &json!({"path": "new.txt", "content": "hi"}),
            RiskLevel::Medium,
            dir.path(),
        )
        .unwrap();
        let ConfirmationDetails::File { is_new_file, .. } = details else {
            panic!("expected file details");
        };
        assert!(is_new_file);
    }

    #[test]
    fn edit_of_missing_file_produces_no_confirmation() {
        let dir = TempDir::new().unwrap();
        let details = build_confirmation(
            "edit",
            &json!({"file_path": "gone.txt", "old_string": "a", "new_string": "b"}),
            RiskLevel::Medium,
            dir.path(),
        );
        assert!(details.is_none());
    }

    #[test]
    fn edit_synthesizes_post_state() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello world").unwrap();
        let details = build_confirmation(
            "edit",
            &json!({"file_path": "a.txt", "old_string": "world", "new_string": "rust"}),
            RiskLevel::Medium,
            dir.path(),
        )
        .unwrap();
        let ConfirmationDetails::File { new_content, .. } = details else {
            panic!("expected file details");
        };
        assert_eq!(new_content, "hello rust");
    }

    #[test]
    fn run_shell_gets_exec_details() {
        let dir = TempDir::new().unwrap();
        let details = build_confirmation(
            "run_shell",
            &json!({"command": "cargo test"}),
            RiskLevel::High,
            dir.path(),
        )
        .unwrap();
        let ConfirmationDetails::Exec { command, .. } = details else {
            panic!("expected exec details");
        };
        assert_eq!(command, "cargo test");
    }

    #[test]
    fn unknown_tool_falls_back_to_info() {
        let dir = TempDir::new().unwrap();
        let details =
            build_confirmation("mystery", &json!({"x": 1}), RiskLevel::Medium, dir.path()).unwrap();
        assert!(matches!(details, ConfirmationDetails::Info { .. }));
        assert_eq!(details.risk(), RiskLevel::Medium);
    }
}
