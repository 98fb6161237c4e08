//! Protocol events emitted by the backend for a single generation response.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::usage::Usage;

/// One decoded unit of a response stream.
///
/// Events for a given `tool_call_id` arrive start → deltas → complete
/// (→ result for server-executed tools), possibly interleaved with text and
/// with events of other calls. `Error` and `Done` are terminal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent {
    /// Append to the open assistant text part.
    TextDelta { text: String },
    /// Open a tool invocation in `partial-call` state.
    #[serde(rename_all = "camelCase")]
    ToolCallStart {
        tool_call_id: String,
        tool_name: String,
    },
    /// Raw argument JSON fragment for an open call.
    #[serde(rename_all = "camelCase")]
    ToolCallDelta {
        tool_call_id: String,
        args_fragment: String,
    },
    /// Arguments are complete. When `args` is absent the buffered fragments are parsed.
    #[serde(rename_all = "camelCase")]
    ToolCallComplete {
        tool_call_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        args: Option<serde_json::Value>,
    },
    /// Result of a server-executed tool.
    #[serde(rename_all = "camelCase")]
    ToolResult {
        tool_call_id: String,
        result: serde_json::Value,
    },
    /// The backend aborted the stream.
    Error { message: String },
    /// No more events follow.
    #[serde(rename_all = "camelCase")]
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finish_reason: Option<FinishReason>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
}

impl StreamEvent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::TextDelta { text: text.into() }
    }

    pub fn tool_call_start(tool_call_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self::ToolCallStart {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
        }
    }

    pub fn tool_call_delta(tool_call_id: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self::ToolCallDelta {
            tool_call_id: tool_call_id.into(),
            args_fragment: fragment.into(),
        }
    }

    pub fn tool_call_complete(tool_call_id: impl Into<String>, args: serde_json::Value) -> Self {
        Self::ToolCallComplete {
            tool_call_id: tool_call_id.into(),
            tool_name: None,
            args: Some(args),
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, result: serde_json::Value) -> Self {
        Self::ToolResult {
            tool_call_id: tool_call_id.into(),
            result,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn done() -> Self {
        Self::Done {
            finish_reason: None,
            usage: None,
        }
    }

    /// The call this event refers to, if any.
    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            Self::ToolCallStart { tool_call_id, .. }
            | Self::ToolCallDelta { tool_call_id, .. }
            | Self::ToolCallComplete { tool_call_id, .. }
            | Self::ToolResult { tool_call_id, .. } => Some(tool_call_id),
            Self::TextDelta { .. } | Self::Error { .. } | Self::Done { .. } => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Done { .. })
    }

    /// Wire name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TextDelta { .. } => "text-delta",
            Self::ToolCallStart { .. } => "tool-call-start",
            Self::ToolCallDelta { .. } => "tool-call-delta",
            Self::ToolCallComplete { .. } => "tool-call-complete",
            Self::ToolResult { .. } => "tool-result",
            Self::Error { .. } => "error",
            Self::Done { .. } => "done",
        }
    }
}

/// Why the backend stopped generating.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Error,
    Other,
    Unknown,
}
