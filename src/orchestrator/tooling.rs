use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::ToolStreamError;
use crate::tools::{validate_arguments, Tool, ToolArguments, ToolExecutionContext};

/// What a finished handler task reports back to the orchestrator.
#[derive(Debug, Clone)]
pub(super) struct ToolExecutionOutcome {
    pub(super) tool_call_id: String,
    pub(super) tool_name: String,
    pub(super) result: Value,
    pub(super) is_error: bool,
}

pub(super) fn error_result(message: impl std::fmt::Display) -> Value {
    json!({ "error": message.to_string() })
}

/// Run a client handler for one call. Never fails: validation errors,
/// handler errors, panics and timeouts all become `{ "error": .. }`.
pub(super) async fn execute_tool_call(
    tool: Arc<dyn Tool>,
    args: Value,
    ctx: ToolExecutionContext,
    timeout: Option<Duration>,
) -> ToolExecutionOutcome {
    let tool_name = tool.name().to_string();
    let tool_call_id = ctx.tool_call_id.clone();

    if let Err(violation) = validate_arguments(&args, &tool.parameters().schema) {
        warn!(tool_call_id = %tool_call_id, tool = %tool_name, %violation, "tool arguments rejected");
        return ToolExecutionOutcome {
            tool_call_id,
            tool_name,
            result: error_result(format!("Argument validation failed: {violation}")),
            is_error: true,
        };
    }

    let call = tool.execute(ToolArguments::new(args), ctx);
    let run = async {
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(ToolStreamError::ToolExecution {
                tool_name: tool_name.clone(),
                message: panic_message(&*panic),
            }),
        }
    };
    let outcome = crate::util::with_optional_timeout(timeout, run).await;

    let (result, is_error) = match outcome {
        Ok(value) => (value, false),
        Err(ToolStreamError::ToolExecution { message, .. }) => (error_result(message), true),
        Err(err) => (error_result(err), true),
    };
    debug!(tool_call_id = %tool_call_id, tool = %tool_name, is_error, "tool handler finished");
    ToolExecutionOutcome {
        tool_call_id,
        tool_name,
        result,
        is_error,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("handler panicked: {message}")
    } else {
        "handler panicked".to_string()
    }
}
