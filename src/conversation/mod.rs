//! Conversation state: history, the streaming assistant message, and the
//! per-turn step counter.

pub mod fold;

pub use fold::{FoldEffect, StreamFold};

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::Display;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::ToolStreamError;
use crate::types::{InvocationPhase, Message, MessageStatus, Role, StreamEvent, ToolInvocation, Usage};

/// Where the current turn stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TurnStatus {
    /// No turn has run since the last user message.
    #[default]
    Idle,
    /// A generation request is in flight.
    Streaming,
    /// Suspended until every pending confirmation has a result.
    AwaitingConfirmation,
    /// The backend answered without requesting tools.
    Completed,
    /// Stopped at the step budget with tool work outstanding.
    StepLimitReached,
    /// Canceled by the caller.
    Interrupted,
    /// Ended with a protocol or transport error.
    Failed,
}

impl TurnStatus {
    /// Whether the turn will make no further progress on its own.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Streaming | Self::AwaitingConfirmation)
    }
}

/// Cancels a running turn from another task.
#[derive(Debug, Clone)]
pub struct AbortHandle {
    token: CancellationToken,
}

impl AbortHandle {
    pub fn abort(&self) {
        self.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Serializable view of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSnapshot {
    pub id: String,
    pub messages: Vec<Message>,
    pub step: u32,
    pub status: TurnStatus,
    #[serde(default)]
    pub usage: Usage,
}

/// One conversation, owned by a single orchestrator at a time.
#[derive(Debug)]
pub struct Conversation {
    id: String,
    messages: Vec<Message>,
    active: Option<StreamFold>,
    tool_call_ids: HashSet<String>,
    step: u32,
    requests: u32,
    status: TurnStatus,
    usage: Usage,
    turn_usage: Usage,
    cancel: CancellationToken,
}

impl Conversation {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
            active: None,
            tool_call_ids: HashSet::new(),
            step: 0,
            requests: 0,
            status: TurnStatus::Idle,
            usage: Usage::default(),
            turn_usage: Usage::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Rebuild a conversation from a snapshot. A snapshot taken mid-stream
    /// restores as interrupted.
    pub fn restore(snapshot: ConversationSnapshot) -> Result<Self, ToolStreamError> {
        let mut conversation = Self::with_id(snapshot.id);
        for mut message in snapshot.messages {
            if message.status == MessageStatus::Streaming {
                message.status = MessageStatus::Interrupted;
            }
            conversation.reserve_ids(&message)?;
            conversation.messages.push(message);
        }
        conversation.step = snapshot.step;
        conversation.usage = snapshot.usage;
        conversation.status = match snapshot.status {
            TurnStatus::Streaming => TurnStatus::Interrupted,
            other => other,
        };
        Ok(conversation)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Settled history. The message being streamed is not included.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The assistant message currently being streamed.
    pub fn streaming_message(&self) -> Option<&Message> {
        self.active.as_ref().map(StreamFold::message)
    }

    /// Steps taken in the current turn; 0 for the first request.
    pub fn step(&self) -> u32 {
        self.step
    }

    /// Generation requests issued in the current turn.
    pub fn requests(&self) -> u32 {
        self.requests
    }

    pub fn status(&self) -> TurnStatus {
        self.status
    }

    /// Token usage across every request of the conversation.
    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// Token usage of the current turn's responses, suspensions included.
    pub fn turn_usage(&self) -> Usage {
        self.turn_usage
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            token: self.cancel.clone(),
        }
    }

    /// Start a new turn with a user message.
    pub fn push_user_message(&mut self, text: impl Into<String>) -> Result<&Message, ToolStreamError> {
        self.push_message(Message::user(text))
    }

    pub fn push_system_message(&mut self, text: impl Into<String>) -> Result<&Message, ToolStreamError> {
        self.push_message(Message::system(text))
    }

    /// Append a complete message. Resets the turn: the step counter goes
    /// back to 0 and a fresh cancellation scope is opened.
    pub fn push_message(&mut self, message: Message) -> Result<&Message, ToolStreamError> {
        if self.status == TurnStatus::Streaming {
            return Err(ToolStreamError::InvalidState(
                "cannot add a message while a response is streaming".into(),
            ));
        }
        self.reserve_ids(&message)?;
        self.messages.push(message);
        self.step = 0;
        self.requests = 0;
        self.turn_usage = Usage::default();
        self.status = TurnStatus::Idle;
        self.cancel = CancellationToken::new();
        Ok(&self.messages[self.messages.len() - 1])
    }

    /// Bind a result to a call in `call` state, typically a confirmation.
    ///
    /// Fails with `UnknownToolCall` if no message holds the id and with
    /// `DuplicateResolution` if it is already resolved.
    pub fn submit_result(&mut self, tool_call_id: &str, result: Value) -> Result<(), ToolStreamError> {
        if let Some(fold) = self.active.as_mut() {
            if fold.message().tool_invocation(tool_call_id).is_some() {
                fold.bind_result(tool_call_id, result)?;
                return Ok(());
            }
        }
        let message = self
            .messages
            .iter_mut()
            .rev()
            .find(|message| message.tool_invocation(tool_call_id).is_some())
            .ok_or_else(|| ToolStreamError::UnknownToolCall {
                tool_call_id: tool_call_id.to_string(),
            })?;
        let mut fold = StreamFold::resume(std::mem::replace(message, Message::new(Role::Assistant)));
        let bound = fold.bind_result(tool_call_id, result);
        *message = fold.into_message();
        bound.map(|_| ())
    }

    /// Calls of the last assistant message awaiting a person's decision.
    pub fn pending_confirmations(&self) -> Vec<ToolInvocation> {
        if self.status != TurnStatus::AwaitingConfirmation {
            return Vec::new();
        }
        self.last_assistant_message()
            .map(|message| {
                message
                    .tool_invocations()
                    .filter(|call| call.phase() == InvocationPhase::Call)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Full owned view, including the message being streamed.
    pub fn snapshot(&self) -> ConversationSnapshot {
        let mut messages = self.messages.clone();
        if let Some(fold) = &self.active {
            messages.push(fold.snapshot());
        }
        ConversationSnapshot {
            id: self.id.clone(),
            messages,
            step: self.step,
            status: self.status,
            usage: self.usage,
        }
    }

    pub fn last_assistant_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
    }

    pub(crate) fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn set_status(&mut self, status: TurnStatus) {
        self.status = status;
    }

    pub(crate) fn advance_step(&mut self) {
        self.step += 1;
    }

    /// Open a new streaming assistant message for the next request.
    pub(crate) fn begin_response(&mut self) -> Result<(), ToolStreamError> {
        if self.active.is_some() {
            return Err(ToolStreamError::InvalidState(
                "a response is already streaming".into(),
            ));
        }
        self.active = Some(StreamFold::new());
        self.requests += 1;
        self.status = TurnStatus::Streaming;
        Ok(())
    }

    pub(crate) fn active(&self) -> Option<&StreamFold> {
        self.active.as_ref()
    }

    /// Fold one event into the streaming message, enforcing id uniqueness
    /// across the whole conversation.
    pub(crate) fn apply_event(&mut self, event: StreamEvent) -> Result<FoldEffect, ToolStreamError> {
        let fold = self
            .active
            .as_mut()
            .ok_or_else(|| ToolStreamError::InvalidState("no response is streaming".into()))?;
        if let StreamEvent::ToolCallStart { tool_call_id, .. } = &event {
            if self.tool_call_ids.contains(tool_call_id) {
                return Err(ToolStreamError::protocol(format!(
                    "tool call id {tool_call_id} is already used in this conversation"
                )));
            }
        }
        let effect = fold.apply_event(event)?;
        if let FoldEffect::ToolCallOpened { tool_call_id, .. } = &effect {
            self.tool_call_ids.insert(tool_call_id.clone());
        }
        if let Some(usage) = fold.usage().filter(|_| effect == FoldEffect::Finished) {
            self.usage.merge(&usage);
            self.turn_usage.merge(&usage);
        }
        Ok(effect)
    }

    /// Move the streaming message into history. `interrupted` or `failed`
    /// overrides its status.
    pub(crate) fn commit_response(&mut self, outcome: Option<MessageStatus>) -> Option<&Message> {
        let mut fold = self.active.take()?;
        match outcome {
            Some(MessageStatus::Interrupted) => fold.interrupt(),
            Some(MessageStatus::Failed) => fold.fail(),
            _ => {}
        }
        self.messages.push(fold.into_message());
        self.messages.last()
    }

    /// Mark the current turn's last assistant message interrupted, e.g. after
    /// a cancel while awaiting confirmation. Responses to earlier user or
    /// system messages are never touched.
    pub(crate) fn interrupt_last_response(&mut self) {
        let turn_start = self
            .messages
            .iter()
            .rposition(|message| message.role != Role::Assistant)
            .map_or(0, |index| index + 1);
        if let Some(message) = self.messages[turn_start..]
            .iter_mut()
            .rev()
            .find(|message| message.role == Role::Assistant)
        {
            if message.status == MessageStatus::Complete {
                message.status = MessageStatus::Interrupted;
            }
        }
    }

    fn reserve_ids(&mut self, message: &Message) -> Result<(), ToolStreamError> {
        let ids: Vec<&str> = message.tool_invocations().map(ToolInvocation::tool_call_id).collect();
        let mut seen = HashSet::new();
        if let Some(dup) = ids
            .iter()
            .find(|id| self.tool_call_ids.contains(**id) || !seen.insert(**id))
        {
            return Err(ToolStreamError::InvalidArgument(format!(
                "tool call id {dup} is already used in this conversation"
            )));
        }
        self.tool_call_ids.extend(ids.into_iter().map(str::to_string));
        Ok(())
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn streamed(conversation: &mut Conversation, events: Vec<StreamEvent>) {
        conversation.begin_response().unwrap();
        for event in events {
            conversation.apply_event(event).unwrap();
        }
        conversation.commit_response(None);
    }

    #[test]
    fn tool_call_ids_are_unique_across_messages() {
        let mut conversation = Conversation::with_id("c1");
        conversation.push_user_message("hi").unwrap();
        streamed(
            &mut conversation,
            vec![
                StreamEvent::tool_call_start("t1", "getFigmaStatus"),
                StreamEvent::tool_call_complete("t1", json!({})),
                StreamEvent::done(),
            ],
        );
        conversation.begin_response().unwrap();
        let err = conversation
            .apply_event(StreamEvent::tool_call_start("t1", "getFigmaStatus"))
            .unwrap_err();
        assert!(matches!(err, ToolStreamError::ProtocolViolation(_)));
        assert!(conversation.streaming_message().unwrap().parts.is_empty());
    }

    #[test]
    fn submit_result_reaches_settled_history() {
        let mut conversation = Conversation::new();
        conversation.push_user_message("confirm?").unwrap();
        streamed(
            &mut conversation,
            vec![
                StreamEvent::tool_call_start("c1", "askForConfirmation"),
                StreamEvent::tool_call_complete("c1", json!({"message": "ok?"})),
                StreamEvent::done(),
            ],
        );
        conversation.set_status(TurnStatus::AwaitingConfirmation);
        assert_eq!(conversation.pending_confirmations().len(), 1);

        conversation
            .submit_result("c1", json!("Yes, confirmed."))
            .unwrap();
        assert!(conversation.pending_confirmations().is_empty());
        assert!(matches!(
            conversation.submit_result("c1", json!("No, denied")),
            Err(ToolStreamError::DuplicateResolution { .. })
        ));
        assert!(matches!(
            conversation.submit_result("nope", json!(1)),
            Err(ToolStreamError::UnknownToolCall { .. })
        ));
        let call = conversation
            .last_assistant_message()
            .unwrap()
            .tool_invocation("c1")
            .unwrap();
        assert_eq!(call.result(), Some(&json!("Yes, confirmed.")));
    }

    #[test]
    fn new_user_message_resets_the_turn() {
        let mut conversation = Conversation::new();
        conversation.push_user_message("one").unwrap();
        conversation.advance_step();
        conversation.abort_handle().abort();
        conversation.push_user_message("two").unwrap();
        assert_eq!(conversation.step(), 0);
        assert!(!conversation.abort_handle().is_aborted());
    }

    #[test]
    fn interrupting_only_touches_the_current_turn() {
        let mut conversation = Conversation::new();
        conversation.push_user_message("one").unwrap();
        streamed(&mut conversation, vec![StreamEvent::text("first"), StreamEvent::done()]);
        conversation.push_user_message("two").unwrap();

        conversation.interrupt_last_response();
        assert_eq!(conversation.messages()[1].status, MessageStatus::Complete);

        streamed(&mut conversation, vec![StreamEvent::text("second"), StreamEvent::done()]);
        conversation.interrupt_last_response();
        assert_eq!(conversation.messages()[1].status, MessageStatus::Complete);
        assert_eq!(conversation.messages()[3].status, MessageStatus::Interrupted);
    }

    #[test]
    fn turn_usage_restarts_with_each_user_message() {
        let mut conversation = Conversation::new();
        conversation.push_user_message("one").unwrap();
        streamed(
            &mut conversation,
            vec![StreamEvent::Done {
                finish_reason: None,
                usage: Some(Usage::new(4, 2)),
            }],
        );
        assert_eq!(conversation.turn_usage(), Usage::new(4, 2));

        conversation.push_user_message("two").unwrap();
        assert_eq!(conversation.turn_usage(), Usage::default());
        assert_eq!(conversation.usage(), Usage::new(4, 2));
    }

    #[test]
    fn snapshot_round_trips_through_restore() {
        let mut conversation = Conversation::with_id("c9");
        conversation.push_system_message("be brief").unwrap();
        conversation.push_user_message("hi").unwrap();
        conversation.begin_response().unwrap();
        conversation.apply_event(StreamEvent::text("Hel")).unwrap();

        let snapshot = conversation.snapshot();
        assert_eq!(snapshot.messages.len(), 3);
        assert_eq!(snapshot.status, TurnStatus::Streaming);

        let json = serde_json::to_string(&snapshot).unwrap();
        let restored = Conversation::restore(serde_json::from_str(&json).unwrap()).unwrap();
        assert_eq!(restored.status(), TurnStatus::Interrupted);
        assert_eq!(restored.messages()[2].status, MessageStatus::Interrupted);
        assert_eq!(restored.messages()[2].text(), "Hel");
    }

    #[test]
    fn usage_accumulates_from_done_events() {
        let mut conversation = Conversation::new();
        conversation.push_user_message("hi").unwrap();
        streamed(
            &mut conversation,
            vec![StreamEvent::Done {
                finish_reason: None,
                usage: Some(Usage::new(5, 7)),
            }],
        );
        assert_eq!(conversation.usage().total_tokens(), 12);
    }
}
