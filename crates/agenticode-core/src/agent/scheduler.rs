//! Tool-call scheduler.
//!
//! Bookkeeping for every tool call of one agent invocation. Transitions are
//! monotonic: `Pending → {Approved, Rejected}`, `Approved → {Executed,
//! Failed}`; `Rejected`, `Executed`, and `Failed` are sinks. The handler is
//! the only writer; observers may read concurrently.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::ai::types::ToolCall;

/// Lifecycle state of a scheduled tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Pending,
    Approved,
    Rejected,
    Executed,
    Failed,
}

impl CallStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallStatus::Rejected | CallStatus::Executed | CallStatus::Failed)
    }
}

/// A tool call with lifecycle fields.
#[derive(Debug, Clone)]
pub struct PendingCall {
    pub id: String,
    pub call: ToolCall,
    pub status: CallStatus,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub executed_at: Option<DateTime<Utc>>,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl PendingCall {
    fn new(call: ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            call,
            status: CallStatus::Pending,
            created_at: Utc::now(),
            approved_at: None,
            executed_at: None,
            result: None,
            error: None,
        }
    }
}

#[derive(Default)]
struct SchedulerState {
    calls: HashMap<String, PendingCall>,
    /// Insertion order, the only ordering the LLM ever observes.
    order: Vec<String>,
}

/// Per-invocation tool-call bookkeeping.
#[derive(Default)]
pub struct ToolCallScheduler {
    state: Mutex<SchedulerState>,
}

impl ToolCallScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert calls as `Pending`, preserving insertion order. Returns
    /// snapshots of the scheduled entries.
    pub fn schedule(&self, calls: &[ToolCall]) -> Vec<PendingCall> {
        let mut state = self.lock();
        let mut scheduled = Vec::with_capacity(calls.len());
        for call in calls {
            let pending = PendingCall::new(call.clone());
            if !state.calls.contains_key(&pending.id) {
                state.order.push(pending.id.clone());
            }
            state.calls.insert(pending.id.clone(), pending.clone());
            scheduled.push(pending);
        }
        scheduled
    }

    /// `Pending → Approved`; illegal transitions are ignored.
    pub fn approve(&self, ids: &[String]) {
        let now = Utc::now();
        let mut state = self.lock();
        for id in ids {
            if let Some(call) = state.calls.get_mut(id) {
                if call.status == CallStatus::Pending {
                    call.status = CallStatus::Approved;
                    call.approved_at = Some(now);
                }
            }
        }
    }

    /// `Pending → Rejected`; illegal transitions are ignored.
    pub fn reject(&self, ids: &[String]) {
        let mut state = self.lock();
        for id in ids {
            if let Some(call) = state.calls.get_mut(id) {
                if call.status == CallStatus::Pending {
                    call.status = CallStatus::Rejected;
                }
            }
        }
    }

    /// `Approved → Executed | Failed` depending on `error`.
    pub fn mark_executed(&self, id: &str, result: Option<String>, error: Option<String>) {
        let mut state = self.lock();
        if let Some(call) = state.calls.get_mut(id) {
            if call.status != CallStatus::Approved {
                tracing::warn!(
                    call_id = id,
                    status = ?call.status,
                    "mark_executed on a call that was never approved"
                );
                return;
            }
            call.executed_at = Some(Utc::now());
            call.result = result;
            call.status = if error.is_some() {
                CallStatus::Failed
            } else {
                CallStatus::Executed
            };
            call.error = error;
        }
    }

    pub fn status_of(&self, id: &str) -> Option<CallStatus> {
        self.lock().calls.get(id).map(|c| c.status)
    }

    pub fn get(&self, id: &str) -> Option<PendingCall> {
        self.lock().calls.get(id).cloned()
    }

    pub fn list_pending(&self) -> Vec<PendingCall> {
        self.list_by(|c| c.status == CallStatus::Pending)
    }

    pub fn list_approved(&self) -> Vec<PendingCall> {
        self.list_by(|c| c.status == CallStatus::Approved)
    }

    /// Drop terminal entries (executed, failed, rejected).
    pub fn clear_terminal(&self) {
        let mut state = self.lock();
        let keep: Vec<String> = state
            .order
            .iter()
            .filter(|id| {
                state
                    .calls
                    .get(*id)
                    .map(|c| !c.status.is_terminal())
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        state.calls.retain(|_, c| !c.status.is_terminal());
        state.order = keep;
    }

    fn list_by(&self, predicate: impl Fn(&PendingCall) -> bool) -> Vec<PendingCall> {
        let state = self.lock();
        state
            .order
            .iter()
            .filter_map(|id| state.calls.get(id))
            .filter(|c| predicate(c))
            .cloned()
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
