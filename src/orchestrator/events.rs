//! Observable orchestrator events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::TurnStatus;
use crate::types::{Message, StreamEvent};

/// Callback receiving orchestrator events.
pub type ConversationEventSink = Arc<dyn Fn(ConversationEvent) + Send + Sync>;

/// Event payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationEventPayload {
    StepStarted {
        step: u32,
    },
    /// A protocol event was folded into the streaming message.
    EventApplied {
        event: StreamEvent,
    },
    /// Snapshot after any change to the streaming or suspended message.
    MessageUpdated {
        message: Message,
    },
    ToolExecutionStarted {
        tool_call_id: String,
        tool_name: String,
        args: serde_json::Value,
    },
    ToolExecutionFinished {
        tool_call_id: String,
        tool_name: String,
        result: serde_json::Value,
        is_error: bool,
    },
    ConfirmationRequired {
        tool_call_id: String,
        tool_name: String,
        args: serde_json::Value,
    },
    StepFinished {
        step: u32,
    },
    TurnFinished {
        status: TurnStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Envelope for orchestrator events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEvent {
    pub conversation_id: String,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: ConversationEventPayload,
}

pub(super) struct ConversationEventEmitter {
    conversation_id: String,
    seq: AtomicU64,
    sink: Option<ConversationEventSink>,
}

impl ConversationEventEmitter {
    pub(super) fn new(conversation_id: &str, sink: Option<ConversationEventSink>) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            seq: AtomicU64::new(1),
            sink,
        }
    }

    pub(super) fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub(super) fn emit(&self, payload: ConversationEventPayload) {
        let Some(sink) = &self.sink else {
            return;
        };
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        (sink)(ConversationEvent {
            conversation_id: self.conversation_id.clone(),
            seq,
            timestamp: Utc::now(),
            payload,
        });
    }
}
