//! Folding stream events into the assistant message being streamed.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::ToolStreamError;
use crate::protocol::parse_partial;
use crate::types::{
    FinishReason, InvocationPhase, Message, MessageStatus, Part, Role, StreamEvent, ToolInvocation,
    Usage,
};

/// What a single [`StreamFold::apply_event`] changed.
#[derive(Debug, Clone, PartialEq)]
pub enum FoldEffect {
    /// Text was appended to the part at `part_index` (new or existing).
    TextAppended { part_index: usize },
    /// A tool invocation part was appended in `partial-call` state.
    ToolCallOpened {
        part_index: usize,
        tool_call_id: String,
    },
    /// Best-effort arguments of a streaming call changed.
    ToolArgsUpdated {
        part_index: usize,
        tool_call_id: String,
    },
    /// A call reached `call` state and awaits resolution.
    ToolCallReady {
        part_index: usize,
        tool_call_id: String,
    },
    /// A result was bound.
    ToolResultBound {
        part_index: usize,
        tool_call_id: String,
    },
    /// The stream finished normally.
    Finished,
    /// The backend reported an error; the message is marked failed.
    Failed { message: String },
    /// Nothing changed (a repeated `done`).
    Ignored,
}

/// Builds one assistant message from its event stream.
///
/// Every event is validated before anything is mutated, so a rejected event
/// leaves the message exactly as it was.
#[derive(Debug, Clone)]
pub struct StreamFold {
    message: Message,
    arg_buffers: HashMap<String, String>,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
    error: Option<String>,
}

impl StreamFold {
    /// Start an empty assistant message in `streaming` status.
    pub fn new() -> Self {
        let mut message = Message::new(Role::Assistant);
        message.status = MessageStatus::Streaming;
        Self::resume(message)
    }

    /// Continue folding into an existing message.
    pub fn resume(message: Message) -> Self {
        Self {
            message,
            arg_buffers: HashMap::new(),
            finish_reason: None,
            usage: None,
            error: None,
        }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Owned copy for readers while folding continues.
    pub fn snapshot(&self) -> Message {
        self.message.clone()
    }

    pub fn into_message(self) -> Message {
        self.message
    }

    /// Whether `done` has been applied.
    pub fn is_done(&self) -> bool {
        self.message.status == MessageStatus::Complete
    }

    /// Backend error message, if the stream ended with `error`.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    pub fn usage(&self) -> Option<Usage> {
        self.usage
    }

    /// Apply one event.
    pub fn apply_event(&mut self, event: StreamEvent) -> Result<FoldEffect, ToolStreamError> {
        match self.message.status {
            MessageStatus::Streaming => {}
            MessageStatus::Complete => {
                return match event {
                    StreamEvent::Done { .. } => Ok(FoldEffect::Ignored),
                    other => Err(ToolStreamError::protocol(format!(
                        "{} event after done",
                        other.kind()
                    ))),
                };
            }
            MessageStatus::Failed => {
                return Err(ToolStreamError::protocol(format!(
                    "{} event after the stream reported an error",
                    event.kind()
                )))
            }
            MessageStatus::Interrupted => {
                return Err(ToolStreamError::InvalidState(format!(
                    "message {} was interrupted",
                    self.message.id
                )))
            }
        }

        match event {
            StreamEvent::TextDelta { text } => Ok(self.append_text(text)),
            StreamEvent::ToolCallStart {
                tool_call_id,
                tool_name,
            } => {
                if self.message.tool_invocation(&tool_call_id).is_some() {
                    return Err(ToolStreamError::protocol(format!(
                        "tool call {tool_call_id} started twice"
                    )));
                }
                self.message
                    .parts
                    .push(Part::tool_invocation(ToolInvocation::new(&tool_call_id, tool_name)));
                self.arg_buffers.insert(tool_call_id.clone(), String::new());
                Ok(FoldEffect::ToolCallOpened {
                    part_index: self.message.parts.len() - 1,
                    tool_call_id,
                })
            }
            StreamEvent::ToolCallDelta {
                tool_call_id,
                args_fragment,
            } => {
                let part_index = self.streaming_call(&tool_call_id, "tool-call-delta")?;
                let buffer = self.arg_buffers.entry(tool_call_id.clone()).or_default();
                buffer.push_str(&args_fragment);
                if let Some(partial) = parse_partial(buffer) {
                    self.invocation_at(part_index)?.update_partial_args(partial)?;
                }
                Ok(FoldEffect::ToolArgsUpdated {
                    part_index,
                    tool_call_id,
                })
            }
            StreamEvent::ToolCallComplete {
                tool_call_id,
                tool_name,
                args,
            } => {
                let part_index = self.streaming_call(&tool_call_id, "tool-call-complete")?;
                if let Some(name) = &tool_name {
                    let opened_as = self.invocation_ref(part_index)?.tool_name();
                    if opened_as != name {
                        return Err(ToolStreamError::protocol(format!(
                            "tool call {tool_call_id} opened as '{opened_as}' but completed as '{name}'"
                        )));
                    }
                }
                let args = match args {
                    Some(args) => args,
                    None => self.parse_buffer(&tool_call_id)?,
                };
                self.invocation_at(part_index)?.complete(args)?;
                self.arg_buffers.remove(&tool_call_id);
                Ok(FoldEffect::ToolCallReady {
                    part_index,
                    tool_call_id,
                })
            }
            StreamEvent::ToolResult {
                tool_call_id,
                result,
            } => {
                let part_index = self.part_index(&tool_call_id, "tool-result")?;
                if self.invocation_ref(part_index)?.phase() == InvocationPhase::PartialCall {
                    return Err(ToolStreamError::protocol(format!(
                        "result for tool call {tool_call_id} before its arguments completed"
                    )));
                }
                self.invocation_at(part_index)?.resolve(result)?;
                Ok(FoldEffect::ToolResultBound {
                    part_index,
                    tool_call_id,
                })
            }
            StreamEvent::Error { message } => {
                self.message.status = MessageStatus::Failed;
                self.error = Some(message.clone());
                Ok(FoldEffect::Failed { message })
            }
            StreamEvent::Done {
                finish_reason,
                usage,
            } => {
                self.message.status = MessageStatus::Complete;
                self.finish_reason = finish_reason;
                self.usage = usage;
                Ok(FoldEffect::Finished)
            }
        }
    }

    /// Bind a result produced outside the stream (a local handler or a
    /// person). Allowed after `done`, refused once the message is
    /// interrupted or failed.
    pub fn bind_result(&mut self, tool_call_id: &str, result: Value) -> Result<usize, ToolStreamError> {
        if matches!(
            self.message.status,
            MessageStatus::Interrupted | MessageStatus::Failed
        ) {
            return Err(ToolStreamError::InvalidState(format!(
                "message {} is {} and takes no more results",
                self.message.id, self.message.status
            )));
        }
        let part_index = self
            .find_part(tool_call_id)
            .ok_or_else(|| ToolStreamError::UnknownToolCall {
                tool_call_id: tool_call_id.to_string(),
            })?;
        self.invocation_at(part_index)?.resolve(result)?;
        Ok(part_index)
    }

    /// Stop accepting events. A failed message keeps its status.
    pub fn interrupt(&mut self) {
        if self.message.status != MessageStatus::Failed {
            self.message.status = MessageStatus::Interrupted;
        }
    }

    /// Mark the message failed without a backend error event.
    pub fn fail(&mut self) {
        if self.message.status != MessageStatus::Interrupted {
            self.message.status = MessageStatus::Failed;
        }
    }

    fn append_text(&mut self, text: String) -> FoldEffect {
        if let Some(Part::Text { text: tail }) = self.message.parts.last_mut() {
            tail.push_str(&text);
        } else {
            self.message.parts.push(Part::text(text));
        }
        FoldEffect::TextAppended {
            part_index: self.message.parts.len() - 1,
        }
    }

    fn parse_buffer(&self, tool_call_id: &str) -> Result<Value, ToolStreamError> {
        let raw = self
            .arg_buffers
            .get(tool_call_id)
            .map(String::as_str)
            .unwrap_or_default();
        if raw.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(raw).map_err(|err| {
            ToolStreamError::protocol(format!(
                "arguments of tool call {tool_call_id} are not valid JSON: {err}"
            ))
        })
    }

    fn find_part(&self, tool_call_id: &str) -> Option<usize> {
        self.message.parts.iter().position(|part| {
            part.as_tool_invocation()
                .is_some_and(|call| call.tool_call_id() == tool_call_id)
        })
    }

    fn part_index(&self, tool_call_id: &str, kind: &str) -> Result<usize, ToolStreamError> {
        self.find_part(tool_call_id).ok_or_else(|| {
            ToolStreamError::protocol(format!("{kind} references unknown tool call {tool_call_id}"))
        })
    }

    fn streaming_call(&self, tool_call_id: &str, kind: &str) -> Result<usize, ToolStreamError> {
        let part_index = self.part_index(tool_call_id, kind)?;
        if self.invocation_ref(part_index)?.phase() != InvocationPhase::PartialCall {
            return Err(ToolStreamError::protocol(format!(
                "{kind} for tool call {tool_call_id} after its arguments completed"
            )));
        }
        Ok(part_index)
    }

    fn invocation_ref(&self, part_index: usize) -> Result<&ToolInvocation, ToolStreamError> {
        self.message
            .parts
            .get(part_index)
            .and_then(Part::as_tool_invocation)
            .ok_or_else(|| ToolStreamError::InvalidState(format!("part {part_index} is not a tool call")))
    }

    fn invocation_at(&mut self, part_index: usize) -> Result<&mut ToolInvocation, ToolStreamError> {
        match self.message.parts.get_mut(part_index) {
            Some(Part::ToolInvocation { tool_invocation }) => Ok(tool_invocation),
            _ => Err(ToolStreamError::InvalidState(format!(
                "part {part_index} is not a tool call"
            ))),
        }
    }
}

impl Default for StreamFold {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fold(events: Vec<StreamEvent>) -> StreamFold {
        let mut fold = StreamFold::new();
        for event in events {
            fold.apply_event(event).unwrap();
        }
        fold
    }

    #[test]
    fn text_interleaves_with_tool_parts() {
        let fold = fold(vec![
            StreamEvent::text("Checking "),
            StreamEvent::text("now."),
            StreamEvent::tool_call_start("t1", "getWeather"),
            StreamEvent::text("Still "),
            StreamEvent::tool_call_delta("t1", "{}"),
            StreamEvent::text("here"),
        ]);
        let parts = &fold.message().parts;
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], Part::text("Checking now."));
        assert!(parts[1].as_tool_invocation().is_some());
        assert_eq!(parts[2], Part::text("Still here"));
    }

    #[test]
    fn partial_args_track_the_buffer() {
        let mut fold = fold(vec![
            StreamEvent::tool_call_start("t1", "getWeather"),
            StreamEvent::tool_call_delta("t1", "{\"city\":\"NY"),
        ]);
        let call = fold.message().tool_invocation("t1").unwrap();
        assert_eq!(call.phase(), InvocationPhase::PartialCall);
        assert_eq!(call.args(), &json!({"city": "NY"}));

        fold.apply_event(StreamEvent::tool_call_delta("t1", "C\"}")).unwrap();
        let effect = fold
            .apply_event(StreamEvent::ToolCallComplete {
                tool_call_id: "t1".into(),
                tool_name: None,
                args: None,
            })
            .unwrap();
        assert!(matches!(effect, FoldEffect::ToolCallReady { part_index: 0, .. }));
        let call = fold.message().tool_invocation("t1").unwrap();
        assert_eq!(call.phase(), InvocationPhase::Call);
        assert_eq!(call.args(), &json!({"city": "NYC"}));
    }

    #[test]
    fn unparseable_buffer_at_completion_is_a_violation() {
        let mut fold = fold(vec![
            StreamEvent::tool_call_start("t1", "getWeather"),
            StreamEvent::tool_call_delta("t1", "{\"city\""),
        ]);
        let before = fold.snapshot();
        let err = fold
            .apply_event(StreamEvent::ToolCallComplete {
                tool_call_id: "t1".into(),
                tool_name: None,
                args: None,
            })
            .unwrap_err();
        assert!(matches!(err, ToolStreamError::ProtocolViolation(_)));
        assert_eq!(fold.snapshot(), before);
    }

    #[test]
    fn mismatched_tool_name_is_a_violation() {
        let mut fold = fold(vec![StreamEvent::tool_call_start("t1", "getWeather")]);
        let err = fold
            .apply_event(StreamEvent::ToolCallComplete {
                tool_call_id: "t1".into(),
                tool_name: Some("getLocation".into()),
                args: Some(json!({})),
            })
            .unwrap_err();
        assert!(matches!(err, ToolStreamError::ProtocolViolation(_)));
    }

    #[test]
    fn results_bind_once() {
        let mut fold = fold(vec![
            StreamEvent::tool_call_start("t1", "getOrderHistory"),
            StreamEvent::tool_call_complete("t1", json!({})),
            StreamEvent::tool_result("t1", json!(["order-1"])),
        ]);
        let err = fold.bind_result("t1", json!("late")).unwrap_err();
        assert!(matches!(err, ToolStreamError::DuplicateResolution { .. }));
        assert_eq!(
            fold.message().tool_invocation("t1").unwrap().result(),
            Some(&json!(["order-1"]))
        );
    }

    #[test]
    fn results_bind_after_done_but_not_after_interrupt() {
        let mut fold = fold(vec![
            StreamEvent::tool_call_start("t1", "getFigmaStatus"),
            StreamEvent::tool_call_complete("t1", json!({})),
            StreamEvent::tool_call_start("t2", "getFigmaStatus"),
            StreamEvent::tool_call_complete("t2", json!({})),
            StreamEvent::done(),
        ]);
        assert_eq!(fold.bind_result("t1", json!("Done")).unwrap(), 0);
        fold.interrupt();
        assert!(matches!(
            fold.bind_result("t2", json!("Done")),
            Err(ToolStreamError::InvalidState(_))
        ));
        assert_eq!(fold.message().status, MessageStatus::Interrupted);
    }

    #[test]
    fn error_event_fails_the_message() {
        let mut fold = fold(vec![StreamEvent::text("Hi"), StreamEvent::error("overloaded")]);
        assert_eq!(fold.message().status, MessageStatus::Failed);
        assert_eq!(fold.error(), Some("overloaded"));
        assert!(fold.apply_event(StreamEvent::text("more")).is_err());
    }

    #[test]
    fn done_records_finish_metadata() {
        let mut fold = StreamFold::new();
        fold.apply_event(StreamEvent::Done {
            finish_reason: Some(FinishReason::Stop),
            usage: Some(Usage::new(3, 2)),
        })
        .unwrap();
        assert!(fold.is_done());
        assert_eq!(fold.finish_reason(), Some(FinishReason::Stop));
        assert_eq!(fold.usage(), Some(Usage::new(3, 2)));
        assert_eq!(fold.apply_event(StreamEvent::done()).unwrap(), FoldEffect::Ignored);
    }
}
