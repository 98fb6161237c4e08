//! Conversation messages and their typed parts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::invocation::{InvocationPhase, ToolInvocation};

/// A message in a conversation.
///
/// Parts are append-only: they may change state in place but are never
/// reordered or removed once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "MessageStatus::is_complete")]
    pub status: MessageStatus,
}

impl Message {
    /// Create an empty message with a fresh id.
    pub fn new(role: Role) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            parts: Vec::new(),
            created_at: Some(Utc::now()),
            status: MessageStatus::Complete,
        }
    }

    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System).with_text(text)
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User).with_text(text)
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant).with_text(text)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    fn with_text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(Part::text(text));
        self
    }

    /// Concatenate all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                Part::ToolInvocation { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool invocations in emission order.
    pub fn tool_invocations(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.parts.iter().filter_map(Part::as_tool_invocation)
    }

    pub fn tool_invocation(&self, tool_call_id: &str) -> Option<&ToolInvocation> {
        self.tool_invocations()
            .find(|call| call.tool_call_id() == tool_call_id)
    }

    pub(crate) fn tool_invocation_mut(&mut self, tool_call_id: &str) -> Option<&mut ToolInvocation> {
        self.parts.iter_mut().find_map(|part| match part {
            Part::ToolInvocation { tool_invocation } if tool_invocation.tool_call_id() == tool_call_id => {
                Some(tool_invocation)
            }
            _ => None,
        })
    }

    /// Tool invocations that have not reached `result`.
    pub fn unresolved_tool_invocations(&self) -> impl Iterator<Item = &ToolInvocation> {
        self.tool_invocations()
            .filter(|call| call.phase() != InvocationPhase::Result)
    }
}

/// Conversation role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Terminal marker of a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageStatus {
    /// Still receiving events.
    Streaming,
    #[default]
    Complete,
    /// Canceled by the caller; no further mutation.
    Interrupted,
    /// The step that produced it aborted with an error.
    Failed,
}

impl MessageStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Whether the message will not receive further events.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Streaming)
    }
}

/// A single typed unit of message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Part {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolInvocation {
        tool_invocation: ToolInvocation,
    },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn tool_invocation(tool_invocation: ToolInvocation) -> Self {
        Self::ToolInvocation { tool_invocation }
    }

    pub fn as_tool_invocation(&self) -> Option<&ToolInvocation> {
        match self {
            Self::ToolInvocation { tool_invocation } => Some(tool_invocation),
            Self::Text { .. } => None,
        }
    }
}
