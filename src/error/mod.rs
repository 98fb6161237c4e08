//! Error types for toolstream.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

/// Primary error type for all toolstream operations.
#[derive(Error, Debug)]
pub enum ToolStreamError {
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Stream ended while tool call {tool_call_id} was still streaming its arguments")]
    IncompleteToolCall { tool_call_id: String },

    #[error("Tool call {tool_call_id} already has a result")]
    DuplicateResolution { tool_call_id: String },

    #[error("Tool '{tool_name}' (call {tool_call_id}) is not registered")]
    UnregisteredTool {
        tool_name: String,
        tool_call_id: String,
    },

    #[error("Unknown tool call: {tool_call_id}")]
    UnknownToolCall { tool_call_id: String },

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error (status {status}): {message}")]
    Http { status: u16, message: String },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ToolStreamError {
    /// Shorthand for a protocol violation.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::ProtocolViolation(message.into())
    }

    /// Create an HTTP status error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ProtocolViolation(_) | Self::IncompleteToolCall { .. } => ErrorCategory::Protocol,
            Self::DuplicateResolution { .. } | Self::UnknownToolCall { .. } => {
                ErrorCategory::Resolution
            }
            Self::UnregisteredTool { .. } => ErrorCategory::Registry,
            Self::ToolExecution { .. } => ErrorCategory::ToolExecution,
            Self::Network(_) | Self::Transport(_) | Self::Stream(_) => ErrorCategory::Transport,
            Self::Http { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Transport,
            },
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) | Self::Toml(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::InvalidArgument(_) | Self::InvalidState(_) | Self::Io(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether this error is a connection-level fault rather than a protocol fault.
    pub fn is_transport_failure(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transport
                | ErrorCategory::Timeout
                | ErrorCategory::Server
                | ErrorCategory::Authentication
        )
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transport | ErrorCategory::Timeout | ErrorCategory::Server
        )
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Transport | ErrorCategory::Server => {
                RecoverySuggestion::RetryWithBackoff
            }
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::Registry => RecoverySuggestion::RegisterTool,
            ErrorCategory::ToolExecution => RecoverySuggestion::CheckToolImplementation,
            ErrorCategory::Protocol => RecoverySuggestion::StartNewTurn,
            ErrorCategory::Resolution => RecoverySuggestion::IgnoreDuplicate,
            ErrorCategory::Serialization | ErrorCategory::Unknown => {
                RecoverySuggestion::ReportBug
            }
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ToolStreamError>;
