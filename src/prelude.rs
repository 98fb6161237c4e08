//! Convenience re-exports for common use.

pub use crate::config::ClientConfig;
pub use crate::conversation::{AbortHandle, Conversation, ConversationSnapshot, TurnStatus};
pub use crate::error::{Result, ToolStreamError};
pub use crate::orchestrator::{
    ConversationEvent, ConversationEventPayload, OrchestratorConfig, StepOrchestrator, TurnOutcome,
};
pub use crate::protocol::Framing;
pub use crate::tools::{
    ExecutionMode, FnTool, RegisteredTool, Tool, ToolArguments, ToolExecutionContext,
    ToolParameters, ToolRegistry,
};
pub use crate::transport::{ChatRequest, HttpTransport, ResponseStream, Transport};
pub use crate::types::{
    FinishReason, InvocationPhase, Message, MessageStatus, Part, Role, StreamEvent,
    ToolInvocation, Usage,
};
