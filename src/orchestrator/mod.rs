//! Multi-step orchestration: issue a request, fold its stream, settle tool
//! calls, and continue with the full history until the turn settles.

pub mod events;
pub mod limits;
pub mod runner;
mod tooling;
pub mod types;

pub use events::{ConversationEvent, ConversationEventPayload, ConversationEventSink};
pub use limits::StepBudget;
pub use runner::StepOrchestrator;
pub use types::{OrchestratorConfig, TurnOutcome};
