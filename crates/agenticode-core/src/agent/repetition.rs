//! Repetition detection over executed steps.
//!
//! The loop does not abort on repetition; it injects a system nudge and
//! continues.

use crate::agent::orchestrator::ExecutionStep;

/// The nudge appended to the conversation when repetition is detected.
pub const REPETITION_NUDGE: &str = "You seem to be repeating the same actions. \
Please review the previous results and try a different approach.";

/// True when, among the last (up to) three executed steps, the same shell
/// command was invoked at least twice.
pub fn detect_repetitive_actions(steps: &[ExecutionStep]) -> bool {
    if steps.len() < 2 {
        return false;
    }

    let recent = &steps[steps.len().saturating_sub(3)..];
    let mut commands: Vec<&str> = Vec::new();
    for step in recent {
        if step.tool_name != "run_shell" {
            continue;
        }
        let Some(command) = step.tool_args.get("command").and_then(|v| v.as_str()) else {
            continue;
        };
        if commands.contains(&command) {
            return true;
        }
        commands.push(command);
    }
    false
}
