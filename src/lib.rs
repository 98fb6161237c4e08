//! Toolstream: a client for streaming, multi-step tool-calling chat backends.
//!
//! A backend answers each request with a live stream of events that
//! interleave assistant text with tool invocations. This crate decodes that
//! stream, folds it into typed messages, settles tool calls (server-executed,
//! client-executed, or confirmed by a person) and feeds the results back to
//! the backend until the turn completes or hits its step budget.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use toolstream::prelude::*;
//!
//! # async fn example() -> toolstream::error::Result<()> {
//! let transport = Arc::new(HttpTransport::new("http://localhost:3000/api/chat")?);
//! let registry = ToolRegistry::new().with(RegisteredTool::server(
//!     "getWeatherInformation",
//!     "show the weather in a given city",
//!     ToolParameters::object().string("city", "City", true).build(),
//! ))?;
//! let orchestrator = StepOrchestrator::new(transport, Arc::new(registry), OrchestratorConfig::default());
//!
//! let mut conversation = Conversation::new();
//! conversation.push_user_message("What is the weather in Lima?")?;
//! let outcome = orchestrator.run(&mut conversation).await?;
//! println!("{:?}: {}", outcome.status, conversation.messages().last().map(Message::text).unwrap_or_default());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod conversation;
pub mod error;
pub mod orchestrator;
pub mod prelude;
pub mod protocol;
pub mod tools;
pub mod transport;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
