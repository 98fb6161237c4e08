//! Per-response ordering rules for decoded events.

use std::collections::HashMap;

use tracing::warn;

use crate::error::ToolStreamError;
use crate::types::StreamEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallProgress {
    Streaming,
    Complete,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminal {
    Done,
    Error,
}

/// Validates the relative order of events within one response.
///
/// Each call moves `start → delta* → complete → result?`. Calls may
/// interleave with each other and with text. Nothing but a repeated `done`
/// may follow a terminal event, and the repeat is swallowed. A second
/// `tool-result` for a resolved call is dropped; the first one stands.
#[derive(Debug, Default)]
pub struct EventSequencer {
    implicit_start: bool,
    calls: HashMap<String, CallProgress>,
    terminal: Option<Terminal>,
}

impl EventSequencer {
    /// A strict sequencer: every call must be opened by `tool-call-start`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Let a named `tool-call-complete` for an unseen id open the call itself.
    pub fn with_implicit_start(mut self, enabled: bool) -> Self {
        self.implicit_start = enabled;
        self
    }

    /// Whether `done` or `error` has been observed.
    pub fn is_finished(&self) -> bool {
        self.terminal.is_some()
    }

    /// Check one event against everything seen so far.
    ///
    /// Returns the events to forward: usually just `event`, nothing for a
    /// repeated `done` or a repeated result, or a synthesized start followed
    /// by the completion when an implicit start applies.
    pub fn observe(&mut self, event: StreamEvent) -> Result<Vec<StreamEvent>, ToolStreamError> {
        match self.terminal {
            Some(Terminal::Error) => {
                return Err(ToolStreamError::protocol(format!(
                    "{} event after the stream reported an error",
                    event.kind()
                )))
            }
            Some(Terminal::Done) => {
                return match event {
                    StreamEvent::Done { .. } => Ok(Vec::new()),
                    other => Err(ToolStreamError::protocol(format!(
                        "{} event after done",
                        other.kind()
                    ))),
                };
            }
            None => {}
        }

        match &event {
            StreamEvent::TextDelta { .. } => {}
            StreamEvent::ToolCallStart { tool_call_id, .. } => {
                if self.calls.contains_key(tool_call_id) {
                    return Err(ToolStreamError::protocol(format!(
                        "tool call {tool_call_id} started twice"
                    )));
                }
                self.calls
                    .insert(tool_call_id.clone(), CallProgress::Streaming);
            }
            StreamEvent::ToolCallDelta { tool_call_id, .. } => {
                match self.progress(tool_call_id, &event)? {
                    CallProgress::Streaming => {}
                    _ => {
                        return Err(ToolStreamError::protocol(format!(
                            "argument fragment for tool call {tool_call_id} after it completed"
                        )))
                    }
                }
            }
            StreamEvent::ToolCallComplete {
                tool_call_id,
                tool_name,
                ..
            } => {
                if !self.calls.contains_key(tool_call_id) && self.implicit_start {
                    if let Some(tool_name) = tool_name {
                        self.calls
                            .insert(tool_call_id.clone(), CallProgress::Complete);
                        let start = StreamEvent::tool_call_start(tool_call_id, tool_name);
                        return Ok(vec![start, event]);
                    }
                }
                match self.progress(tool_call_id, &event)? {
                    CallProgress::Streaming => {
                        self.calls
                            .insert(tool_call_id.clone(), CallProgress::Complete);
                    }
                    _ => {
                        return Err(ToolStreamError::protocol(format!(
                            "tool call {tool_call_id} completed twice"
                        )))
                    }
                }
            }
            StreamEvent::ToolResult { tool_call_id, .. } => {
                match self.progress(tool_call_id, &event)? {
                    CallProgress::Complete => {
                        self.calls
                            .insert(tool_call_id.clone(), CallProgress::Resolved);
                    }
                    CallProgress::Resolved => {
                        warn!(%tool_call_id, "tool call already has a result; repeated result dropped");
                        return Ok(Vec::new());
                    }
                    CallProgress::Streaming => {
                        return Err(ToolStreamError::protocol(format!(
                            "result for tool call {tool_call_id} before its arguments completed"
                        )))
                    }
                }
            }
            StreamEvent::Error { .. } => self.terminal = Some(Terminal::Error),
            StreamEvent::Done { .. } => self.terminal = Some(Terminal::Done),
        }
        Ok(vec![event])
    }

    fn progress(
        &self,
        tool_call_id: &str,
        event: &StreamEvent,
    ) -> Result<CallProgress, ToolStreamError> {
        self.calls.get(tool_call_id).copied().ok_or_else(|| {
            ToolStreamError::protocol(format!(
                "{} references unknown tool call {tool_call_id}",
                event.kind()
            ))
        })
    }
}
