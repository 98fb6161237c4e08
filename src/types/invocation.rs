//! Tool invocation lifecycle: `partial-call → call → result`.

use serde::{Deserialize, Serialize};

use crate::error::ToolStreamError;

/// A tool call embedded in an assistant message.
///
/// The state only moves forward. Every transition goes through a method on
/// this type so a call can never regress or be resolved twice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    tool_call_id: String,
    tool_name: String,
    #[serde(flatten)]
    state: InvocationState,
}

/// State of a tool invocation, carrying exactly the data valid in that state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum InvocationState {
    /// Arguments are still streaming; `args` is a best-effort parse of the fragments so far.
    PartialCall {
        #[serde(default)]
        args: serde_json::Value,
    },
    /// Arguments are complete and parsed.
    Call { args: serde_json::Value },
    /// A result has been bound.
    Result {
        args: serde_json::Value,
        result: serde_json::Value,
    },
}

/// Fieldless view of [`InvocationState`], ordered by lifecycle position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InvocationPhase {
    PartialCall,
    Call,
    Result,
}

impl ToolInvocation {
    /// Open a call in `partial-call` state with no arguments yet.
    pub fn new(tool_call_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            state: InvocationState::PartialCall {
                args: serde_json::Value::Null,
            },
        }
    }

    pub fn tool_call_id(&self) -> &str {
        &self.tool_call_id
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn state(&self) -> &InvocationState {
        &self.state
    }

    pub fn phase(&self) -> InvocationPhase {
        match self.state {
            InvocationState::PartialCall { .. } => InvocationPhase::PartialCall,
            InvocationState::Call { .. } => InvocationPhase::Call,
            InvocationState::Result { .. } => InvocationPhase::Result,
        }
    }

    /// Current arguments (possibly partial).
    pub fn args(&self) -> &serde_json::Value {
        match &self.state {
            InvocationState::PartialCall { args }
            | InvocationState::Call { args }
            | InvocationState::Result { args, .. } => args,
        }
    }

    pub fn result(&self) -> Option<&serde_json::Value> {
        match &self.state {
            InvocationState::Result { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.phase() == InvocationPhase::Result
    }

    /// Whether the bound result is a `{ "error": .. }` object produced by a failed handler.
    pub fn is_error_result(&self) -> bool {
        self.result()
            .and_then(|value| value.as_object())
            .is_some_and(|object| object.len() == 1 && object.contains_key("error"))
    }

    /// Replace the best-effort arguments while the call is still streaming.
    pub fn update_partial_args(&mut self, partial: serde_json::Value) -> Result<(), ToolStreamError> {
        match &mut self.state {
            InvocationState::PartialCall { args } => {
                *args = partial;
                Ok(())
            }
            _ => Err(ToolStreamError::protocol(format!(
                "argument fragment for tool call {} after its arguments completed",
                self.tool_call_id
            ))),
        }
    }

    /// `partial-call → call`.
    pub fn complete(&mut self, args: serde_json::Value) -> Result<(), ToolStreamError> {
        if !matches!(self.state, InvocationState::PartialCall { .. }) {
            return Err(ToolStreamError::protocol(format!(
                "tool call {} completed twice",
                self.tool_call_id
            )));
        }
        self.state = InvocationState::Call { args };
        Ok(())
    }

    /// `call → result`. Fails with `DuplicateResolution` and leaves the bound
    /// result untouched if one already exists.
    pub fn resolve(&mut self, result: serde_json::Value) -> Result<(), ToolStreamError> {
        match &self.state {
            InvocationState::Call { args } => {
                self.state = InvocationState::Result {
                    args: args.clone(),
                    result,
                };
                Ok(())
            }
            InvocationState::Result { .. } => Err(ToolStreamError::DuplicateResolution {
                tool_call_id: self.tool_call_id.clone(),
            }),
            InvocationState::PartialCall { .. } => Err(ToolStreamError::InvalidState(format!(
                "tool call {} cannot take a result before its arguments complete",
                self.tool_call_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lifecycle_moves_forward_only() {
        let mut call = ToolInvocation::new("t1", "getWeather");
        assert_eq!(call.phase(), InvocationPhase::PartialCall);
        call.complete(json!({"city": "NYC"})).unwrap();
        assert!(call.complete(json!({})).is_err());
        assert!(call.update_partial_args(json!({})).is_err());
        call.resolve(json!("sunny")).unwrap();
        assert_eq!(call.phase(), InvocationPhase::Result);
        assert_eq!(call.args(), &json!({"city": "NYC"}));
    }

    #[test]
    fn second_resolution_keeps_first_result() {
        let mut call = ToolInvocation::new("t1", "getWeather");
        call.complete(json!({})).unwrap();
        call.resolve(json!(1)).unwrap();
        let err = call.resolve(json!(2)).unwrap_err();
        assert!(matches!(err, ToolStreamError::DuplicateResolution { ref tool_call_id } if tool_call_id == "t1"));
        assert_eq!(call.result(), Some(&json!(1)));
    }

    #[test]
    fn result_before_call_is_rejected() {
        let mut call = ToolInvocation::new("t1", "getWeather");
        assert!(matches!(
            call.resolve(json!(1)),
            Err(ToolStreamError::InvalidState(_))
        ));
        assert_eq!(call.phase(), InvocationPhase::PartialCall);
    }

    #[test]
    fn wire_shape_matches_state_tag() {
        let mut call = ToolInvocation::new("t1", "getWeather");
        call.complete(json!({"city": "NYC"})).unwrap();
        let value = serde_json::to_value(&call).unwrap();
        assert_eq!(
            value,
            json!({
                "toolCallId": "t1",
                "toolName": "getWeather",
                "state": "call",
                "args": {"city": "NYC"},
            })
        );
        let back: ToolInvocation = serde_json::from_value(value).unwrap();
        assert_eq!(back, call);
    }

    #[test]
    fn error_result_detection() {
        let mut call = ToolInvocation::new("t1", "getJIRA");
        call.complete(json!({})).unwrap();
        call.resolve(json!({"error": "boom"})).unwrap();
        assert!(call.is_error_result());
    }
}
