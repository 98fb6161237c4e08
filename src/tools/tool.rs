//! Client-side tool handlers.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

use super::arguments::ToolArguments;
use super::types::ToolParameters;
use crate::error::ToolStreamError;

/// The call a handler runs for. Handlers get their own copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolExecutionContext {
    pub conversation_id: String,
    pub tool_call_id: String,
    /// Step of the response that produced the call.
    pub step: u32,
}

impl ToolExecutionContext {
    pub fn new(conversation_id: impl Into<String>, tool_call_id: impl Into<String>, step: u32) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            tool_call_id: tool_call_id.into(),
            step,
        }
    }
}

/// A tool whose calls are answered on the client.
///
/// The arguments have already been checked against [`Tool::parameters`]
/// when `execute` runs. Returning `Err` does not fail the turn; the message
/// is bound to the call as `{ "error": message }` and sent back.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Must match the `toolName` the backend emits.
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> &ToolParameters;

    async fn execute(
        &self,
        args: ToolArguments,
        ctx: ToolExecutionContext,
    ) -> Result<Value, ToolStreamError>;
}

/// A [`Tool`] backed by an async closure.
#[derive(Clone)]
pub struct FnTool {
    name: String,
    description: String,
    parameters: ToolParameters,
    handler: Arc<
        dyn Fn(ToolArguments, ToolExecutionContext) -> BoxFuture<'static, Result<Value, ToolStreamError>>
            + Send
            + Sync,
    >,
}

impl FnTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolStreamError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |args, ctx| handler(args, ctx).boxed()),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: ToolArguments,
        ctx: ToolExecutionContext,
    ) -> Result<Value, ToolStreamError> {
        (self.handler)(args, ctx).await
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
