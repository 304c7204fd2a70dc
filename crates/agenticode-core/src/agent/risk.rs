//! Risk classification for tool calls.
//!
//! Risk is a pure function of the tool name — the classifier never looks at
//! arguments. It selects the confirmation UI and decides whether approval is
//! requested at all.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Risk level of a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Read-only operations; executed without approval.
    Low,
    /// File modifications and anything unknown.
    Medium,
    /// Arbitrary command execution.
    High,
}

impl RiskLevel {
    pub fn description(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Safe (read-only)",
            RiskLevel::Medium => "Moderate (modifies files)",
            RiskLevel::High => "High (system commands)",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        };
        write!(f, "{}", s)
    }
}

/// Maps tool name → risk level. Seeded with the fixed default table and
/// overridable per name from configuration.
#[derive(Debug, Clone, Default)]
pub struct RiskClassifier {
    overrides: HashMap<String, RiskLevel>,
}

impl RiskClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_overrides(overrides: HashMap<String, RiskLevel>) -> Self {
        Self { overrides }
    }

    pub fn set_override(&mut self, name: impl Into<String>, risk: RiskLevel) {
        self.overrides.insert(name.into(), risk);
    }

    /// Assess the risk of a tool by name. Unknown names default to Medium.
    pub fn assess(&self, name: &str) -> RiskLevel {
        if let Some(risk) = self.overrides.get(name) {
            return *risk;
        }
        match name {
            "read_file" | "read" | "list_files" | "grep" | "glob" | "read_many_files"
            | "todo_read" | "todo_write" => RiskLevel::Low,
            "write_file" | "edit" | "apply_patch" | "multi_edit" => RiskLevel::Medium,
            "run_shell" => RiskLevel::High,
            _ => RiskLevel::Medium,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table() {
        let classifier = RiskClassifier::new();
        assert_eq!(classifier.assess("read_file"), RiskLevel::Low);
        assert_eq!(classifier.assess("todo_write"), RiskLevel::Low);
        assert_eq!(classifier.assess("write_file"), RiskLevel::Medium);
        assert_eq!(classifier.assess("edit"), RiskLevel::Medium);
        assert_eq!(classifier.assess("run_shell"), RiskLevel::High);
    }

    #[test]
    fn unknown_names_default_to_medium() {
        let classifier = RiskClassifier::new();
        assert_eq!(classifier.assess("mcp_fs_read"), RiskLevel::Medium);
    }

    #[test]
    fn overrides_win() {
        let mut classifier = RiskClassifier::new();
        classifier.set_override("run_shell", RiskLevel::Low);
        assert_eq!(classifier.assess("run_shell"), RiskLevel::Low);
    }
}
