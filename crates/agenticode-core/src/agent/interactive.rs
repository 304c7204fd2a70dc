//! Interactive approver: prompts the user on the terminal.
//!
//! Per request it offers approve-all, reject-all, per-item selection, and a
//! detail-expanded view. Auto-approve/auto-reject name lists short-circuit
//! the prompt; a timed-out prompt rejects everything.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use super::approval::{ApprovalRequest, ApprovalResponse, ToolApprover};
use super::confirmation::ConfirmationDetails;
use super::risk::RiskLevel;

const DEFAULT_PROMPT_TIMEOUT: Duration = Duration::from_secs(60);

pub struct InteractiveApprover {
    stdin: Mutex<Lines<BufReader<Stdin>>>,
    auto_approve: HashSet<String>,
    auto_reject: HashSet<String>,
    timeout: Duration,
}

impl Default for InteractiveApprover {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractiveApprover {
    pub fn new() -> Self {
        Self {
            stdin: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
            auto_approve: HashSet::new(),
            auto_reject: HashSet::new(),
            timeout: DEFAULT_PROMPT_TIMEOUT,
        }
    }

    pub fn with_auto_approve(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.auto_approve.extend(names);
        self
    }

    pub fn with_auto_reject(mut self, names: impl IntoIterator<Item = String>) -> Self {
        self.auto_reject.extend(names);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read one trimmed, lowercased line, or `None` on timeout/EOF.
    async fn read_choice(&self) -> Option<String> {
        let mut stdin = self.stdin.lock().await;
        match tokio::time::timeout(self.timeout, stdin.next_line()).await {
            Ok(Ok(Some(line))) => Some(line.trim().to_lowercase()),
            _ => None,
        }
    }

    fn print_request(&self, request: &ApprovalRequest) {
        println!("\n{}", "─".repeat(60));
        println!("TOOL APPROVAL REQUEST");
        println!("{}", "─".repeat(60));
        for (i, call) in request.calls.iter().enumerate() {
            let risk = request
                .risks
                .get(&call.id)
                .copied()
                .unwrap_or(RiskLevel::Medium);
            println!(
                "\n{}. {} [{}] - {}",
                i + 1,
                call.call.name,
                risk,
                risk.description()
            );
            if let Ok(args) = serde_json::from_str::<serde_json::Value>(&call.call.arguments) {
                if let Some(map) = args.as_object() {
                    for (key, value) in map {
                        let mut rendered = value.to_string();
                        if rendered.len() > 100 {
                            rendered.truncate(97);
                            rendered.push_str("...");
                        }
                        println!("   - {}: {}", key, rendered);
                    }
                }
            }
        }
        if let Some(details) = &request.details {
            println!("\n   {}", details.title());
        }
        println!("\n{}", "─".repeat(60));
        println!("Options:");
        println!("  y/yes    - Approve all");
        println!("  n/no     - Reject all");
        println!("  s/select - Choose individual tools");
        println!("  i/info   - Show more details");
        print!("\nYour choice [y/n/s/i]: ");
        use std::io::Write;
        let _ = std::io::stdout().flush();
    }

    fn print_details(&self, request: &ApprovalRequest) {
        println!("\n{}", "═".repeat(60));
        println!("DETAILED TOOL INFORMATION");
        println!("{}", "═".repeat(60));
        for (i, call) in request.calls.iter().enumerate() {
            let risk = request
                .risks
                .get(&call.id)
                .copied()
                .unwrap_or(RiskLevel::Medium);
            println!("\n{}. Tool: {}", i + 1, call.call.name);
            println!("   Risk: {} ({})", risk, risk.description());
            println!("   Call ID: {}", call.id);
            println!("   Created: {}", call.created_at.format("%H:%M:%S"));
            if let Ok(args) = serde_json::from_str::<serde_json::Value>(&call.call.arguments) {
                println!(
                    "   Arguments:\n{}",
                    serde_json::to_string_pretty(&args).unwrap_or_default()
                );
            }
        }
        if let Some(ConfirmationDetails::File { unified_diff, .. }) = &request.details {
            if !unified_diff.is_empty() {
                println!("\n{}", unified_diff);
            }
        }
        println!("{}", "═".repeat(60));
    }

    async fn selective(
        &self,
        request: &ApprovalRequest,
        remaining: &[crate::agent::scheduler::PendingCall],
    ) -> ApprovalResponse {
        let mut response = ApprovalResponse {
            request_id: request.request_id.clone(),
            ..Default::default()
        };

        println!("\nEnter numbers to approve (comma-separated), 'all', or 'none':");
        let Some(input) = self.read_choice().await else {
            response.rejected_ids = remaining.iter().map(|c| c.id.clone()).collect();
            response.reason = Some("approval prompt timed out".to_string());
            return response;
        };

        match input.as_str() {
            "all" => {
                response.approved_ids = remaining.iter().map(|c| c.id.clone()).collect();
            }
            "none" => {
                response.rejected_ids = remaining.iter().map(|c| c.id.clone()).collect();
            }
            _ => {
                let selected: HashSet<usize> = input
                    .split(',')
                    .filter_map(|s| s.trim().parse::<usize>().ok())
                    .filter_map(|n| n.checked_sub(1))
                    .collect();
                for (i, call) in remaining.iter().enumerate() {
                    if selected.contains(&i) {
                        response.approved_ids.push(call.id.clone());
                    } else {
                        response.rejected_ids.push(call.id.clone());
                    }
                }
            }
        }
        response
    }
}

#[async_trait]
impl ToolApprover for InteractiveApprover {
    async fn request_approval(&self, request: ApprovalRequest) -> Result<ApprovalResponse> {
        let mut response = ApprovalResponse {
            request_id: request.request_id.clone(),
            ..Default::default()
        };

        // Auto lists first: rejects peel off, and if every remaining call is
        // auto-approved there is nothing to ask.
        let mut remaining = Vec::new();
        for call in &request.calls {
            if self.auto_reject.contains(call.call.name.as_str()) {
                response.rejected_ids.push(call.id.clone());
                response.reason =
                    Some(format!("tool '{}' is configured for auto-rejection", call.call.name));
            } else {
                remaining.push(call.clone());
            }
        }
        if remaining
            .iter()
            .all(|c| self.auto_approve.contains(c.call.name.as_str()))
        {
            response
                .approved_ids
                .extend(remaining.iter().map(|c| c.id.clone()));
            return Ok(response);
        }

        loop {
            self.print_request(&request);
            let Some(choice) = self.read_choice().await else {
                // Timeout or EOF defaults to reject.
                response.approved_ids.clear();
                response.rejected_ids = request.calls.iter().map(|c| c.id.clone()).collect();
                response.reason = Some("approval prompt timed out".to_string());
                return Ok(response);
            };

            match choice.as_str() {
                "y" | "yes" => {
                    for call in &remaining {
                        response.approved_ids.push(call.id.clone());
                    }
                    return Ok(response);
                }
                "n" | "no" => {
                    for call in &remaining {
                        response.rejected_ids.push(call.id.clone());
                    }
                    response.reason = Some("user rejected all tool calls".to_string());
                    return Ok(response);
                }
                "s" | "select" => {
                    let selected = self.selective(&request, &remaining).await;
                    response.approved_ids.extend(selected.approved_ids);
                    response.rejected_ids.extend(selected.rejected_ids);
                    if response.reason.is_none() {
                        response.reason = selected.reason;
                    }
                    return Ok(response);
                }
                "i" | "info" => {
                    self.print_details(&request);
                    // Fall through and show the menu again.
                }
                other => {
                    println!("Invalid choice: {}", other);
                }
            }
        }
    }

    async fn notify_execution(&self, call_id: &str, _result: Option<&str>, error: Option<&str>) {
        if let Some(error) = error {
            println!("Tool execution failed (ID: {}): {}", call_id, error);
        }
    }
}
