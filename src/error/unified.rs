//! Error classification and recovery hints.

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed or out-of-order stream content.
    Protocol,
    /// A result was bound twice or to a call that does not exist.
    Resolution,
    /// The model called a tool the client does not know.
    Registry,
    ToolExecution,
    Transport,
    Timeout,
    Server,
    Authentication,
    Configuration,
    Serialization,
    Unknown,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryWithBackoff,
    IncreaseTimeout,
    CheckCredentials,
    CheckConfiguration,
    RegisterTool,
    CheckToolImplementation,
    StartNewTurn,
    IgnoreDuplicate,
    ReportBug,
}
