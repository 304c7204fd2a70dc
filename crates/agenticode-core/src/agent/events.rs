//! Turn event protocol and the bounded event bus.
//!
//! A `Turn` is the single producer; its `TurnHandler` is the single consumer.
//! The channel is bounded; overflow is dropped on the producer side rather
//! than blocking the LLM task. Dropping the sender closes the bus and marks
//! turn end — the consumer drains whatever remains.

use serde_json::Value;
use tokio::sync::mpsc;

use crate::agent::confirmation::ConfirmationDetails;
use crate::ai::types::{ChatMessage, Usage};

/// Channel capacity for one turn's events.
pub const EVENT_BUS_CAPACITY: usize = 64;

/// Classification of turn-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// LLM or network failure.
    Transport,
    /// The provider returned no choices.
    EmptyResponse,
    /// Tool call arguments were not valid JSON.
    BadArguments,
    /// Context cancellation.
    Cancelled,
}

/// A parsed tool call surfaced to the handler.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub name: String,
    /// Parsed argument object.
    pub args: Value,
    pub client_initiated: bool,
}

/// Events a Turn emits while processing one LLM round-trip.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// Free-form assistant text.
    Content { text: String },
    /// A parsed tool call.
    ToolCallRequest(ToolCallRequest),
    /// Emitted after the request for every non-Low risk call.
    ToolCallConfirmation {
        request: ToolCallRequest,
        details: ConfirmationDetails,
    },
    /// Published by the handler after execution for observers; the Turn
    /// itself never reads it.
    ToolCallResponse {
        call_id: String,
        result: String,
        display: String,
        error: Option<String>,
    },
    /// Optional internal reasoning for display.
    Thought { subject: String, description: String },
    UsageMetadata { usage: Usage, duration_ms: u64 },
    Error { kind: ErrorKind, message: String },
    UserCancelled,
    /// Terminal event carrying the post-turn conversation.
    TurnComplete { conversation: Vec<ChatMessage> },
}

/// Producer half of the bounded turn event stream.
pub struct EventBus {
    tx: mpsc::Sender<AgentEvent>,
}

impl EventBus {
    /// Create a bus; the receiver goes to the consumer.
    pub fn new() -> (Self, mpsc::Receiver<AgentEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_BUS_CAPACITY);
        (Self { tx }, rx)
    }

    /// Emit without blocking; a full buffer drops the event.
    pub fn emit(&self, event: AgentEvent) {
        if let Err(e) = self.tx.try_send(event) {
            tracing::debug!("event bus full, dropping event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_arrive_in_order() {
        let (bus, mut rx) = EventBus::new();
        bus.emit(AgentEvent::Content {
            text: "first".to_string(),
        });
        bus.emit(AgentEvent::Content {
            text: "second".to_string(),
        });
        drop(bus);

        let mut texts = Vec::new();
        while let Some(event) = rx.recv().await {
            if let AgentEvent::Content { text } = event {
                texts.push(text);
            }
        }
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn dropping_the_bus_closes_the_stream() {
        let (bus, mut rx) = EventBus::new();
        drop(bus);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn overflow_is_dropped_not_blocking() {
        let (bus, mut rx) = EventBus::new();
        for i in 0..(EVENT_BUS_CAPACITY + 10) {
            bus.emit(AgentEvent::Content {
                text: i.to_string(),
            });
        }
        drop(bus);

        let mut count = 0;
        while rx.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, EVENT_BUS_CAPACITY);
    }
}
