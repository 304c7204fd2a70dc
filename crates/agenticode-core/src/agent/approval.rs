//! Approval policies for risky tool calls.
//!
//! An approver decides, per call, whether execution may proceed. Its response
//! must cover every input id: the union of approved and rejected ids equals
//! the request's call set — an approver never silently drops a call.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;

use crate::agent::confirmation::ConfirmationDetails;
use crate::agent::risk::RiskLevel;
use crate::agent::scheduler::PendingCall;

/// A batch of calls awaiting a decision.
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub request_id: String,
    pub calls: Vec<PendingCall>,
    pub risks: HashMap<String, RiskLevel>,
    pub details: Option<ConfirmationDetails>,
}

/// The decision for one request.
#[derive(Debug, Clone, Default)]
pub struct ApprovalResponse {
    pub request_id: String,
    pub approved_ids: Vec<String>,
    pub rejected_ids: Vec<String>,
    pub reason: Option<String>,
}

impl ApprovalResponse {
    /// Check the coverage invariant against a request.
    pub fn covers(&self, request: &ApprovalRequest) -> bool {
        let mut decided: HashSet<&str> = HashSet::new();
        decided.extend(self.approved_ids.iter().map(String::as_str));
        decided.extend(self.rejected_ids.iter().map(String::as_str));
        request.calls.iter().all(|c| decided.contains(c.id.as_str()))
    }
}

/// Policy object deciding whether risky tool calls run.
#[async_trait]
pub trait ToolApprover: Send + Sync {
    async fn request_approval(&self, request: ApprovalRequest) -> Result<ApprovalResponse>;

    /// Post-execution notification for UI side effects. Default: no-op.
    async fn notify_execution(&self, _call_id: &str, _result: Option<&str>, _error: Option<&str>) {}
}

/// Non-interactive policy: fixed allow/deny name lists with a default.
pub struct AutoApprover {
    auto_approve: HashSet<String>,
    auto_reject: HashSet<String>,
    default_approve: bool,
}

impl AutoApprover {
    pub fn new(
        auto_approve: impl IntoIterator<Item = String>,
        auto_reject: impl IntoIterator<Item = String>,
        default_approve: bool,
    ) -> Self {
        Self {
            auto_approve: auto_approve.into_iter().collect(),
            auto_reject: auto_reject.into_iter().collect(),
            default_approve,
        }
    }

    /// Approve everything; used for general-purpose and executor sub-agents.
    pub fn approve_all() -> Self {
        Self::new([], [], true)
    }
}

#[async_trait]
impl ToolApprover for AutoApprover {
    async fn request_approval(&self, request: ApprovalRequest) -> Result<ApprovalResponse> {
        let mut response = ApprovalResponse {
            request_id: request.request_id.clone(),
            ..Default::default()
        };
        for call in &request.calls {
            let name = call.call.name.as_str();
            let approved = if self.auto_reject.contains(name) {
                false
            } else if self.auto_approve.contains(name) {
                true
            } else {
                self.default_approve
            };
            if approved {
                response.approved_ids.push(call.id.clone());
            } else {
                response.rejected_ids.push(call.id.clone());
            }
        }
        Ok(response)
    }
}

/// Allow-list-only policy used for restricted sub-agents: anything not in
/// the list is rejected.
pub struct RestrictedApprover {
    allowed: HashSet<String>,
}

impl RestrictedApprover {
    pub fn new(allowed: impl IntoIterator<Item = String>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }
}

#[async_trait]
impl ToolApprover for RestrictedApprover {
    async fn request_approval(&self, request: ApprovalRequest) -> Result<ApprovalResponse> {
        let mut response = ApprovalResponse {
            request_id: request.request_id.clone(),
            ..Default::default()
        };
        for call in &request.calls {
            if self.allowed.contains(call.call.name.as_str()) {
                response.approved_ids.push(call.id.clone());
            } else {
                response.rejected_ids.push(call.id.clone());
            }
        }
        if !response.rejected_ids.is_empty() {
            response.reason = Some("tool not allowed for this agent type".to_string());
        }
        Ok(response)
    }
}
