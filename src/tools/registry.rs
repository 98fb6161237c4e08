//! Tool registry: who resolves each tool's calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::tool::Tool;
use super::types::ToolParameters;
use crate::error::ToolStreamError;

/// Who binds the result of a call.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ExecutionMode {
    /// The backend runs the tool and streams `tool-result`.
    ServerAuto,
    /// A local handler runs once the call completes.
    ClientAuto,
    /// A human decides; the result arrives through `submit_result`.
    ClientConfirm,
}

/// One registry entry.
#[derive(Clone)]
pub struct RegisteredTool {
    name: String,
    description: String,
    parameters: ToolParameters,
    mode: ExecutionMode,
    handler: Option<Arc<dyn Tool>>,
    timeout: Option<Duration>,
}

impl RegisteredTool {
    /// A tool executed by the backend.
    pub fn server(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
    ) -> Self {
        Self::described(name, description, parameters, ExecutionMode::ServerAuto)
    }

    /// A tool whose result is supplied by a person.
    pub fn confirm(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
    ) -> Self {
        Self::described(name, description, parameters, ExecutionMode::ClientConfirm)
    }

    /// A tool run automatically by a local handler.
    pub fn client(tool: impl Tool + 'static) -> Self {
        Self::client_arc(Arc::new(tool))
    }

    pub fn client_arc(tool: Arc<dyn Tool>) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters().clone(),
            mode: ExecutionMode::ClientAuto,
            handler: Some(tool),
            timeout: None,
        }
    }

    fn described(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        mode: ExecutionMode,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            mode,
            handler: None,
            timeout: None,
        }
    }

    /// Bound the handler's run time; overrides the orchestrator default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn handler(&self) -> Option<&Arc<dyn Tool>> {
        self.handler.as_ref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Immutable once built; share it across conversations behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Names must be unique.
    pub fn register(&mut self, tool: RegisteredTool) -> Result<(), ToolStreamError> {
        if self.tools.contains_key(tool.name()) {
            return Err(ToolStreamError::Configuration(format!(
                "tool '{}' is already registered",
                tool.name()
            )));
        }
        self.tools.insert(tool.name().to_string(), tool);
        Ok(())
    }

    /// Chaining form of [`register`](Self::register).
    pub fn with(mut self, tool: RegisteredTool) -> Result<Self, ToolStreamError> {
        self.register(tool)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    pub fn mode(&self, name: &str) -> Option<ExecutionMode> {
        self.get(name).map(RegisteredTool::mode)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Entries sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredTool> {
        let mut tools: Vec<_> = self.tools.values().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::FnTool;
    use serde_json::json;

    fn status_tool() -> FnTool {
        FnTool::new(
            "getFigmaStatus",
            "Status of the design file",
            ToolParameters::empty(),
            |_args, _ctx| async { Ok(json!("Done")) },
        )
    }

    #[test]
    fn modes_are_recorded_per_entry() {
        let registry = ToolRegistry::new()
            .with(RegisteredTool::client(status_tool()))
            .unwrap()
            .with(RegisteredTool::confirm(
                "askForConfirmation",
                "Ask the user",
                ToolParameters::object().string("message", "Question", true).build(),
            ))
            .unwrap()
            .with(RegisteredTool::server("getOrderHistory", "Orders", ToolParameters::empty()))
            .unwrap();

        assert_eq!(registry.mode("getFigmaStatus"), Some(ExecutionMode::ClientAuto));
        assert_eq!(registry.mode("askForConfirmation"), Some(ExecutionMode::ClientConfirm));
        assert_eq!(registry.mode("getOrderHistory"), Some(ExecutionMode::ServerAuto));
        assert_eq!(registry.mode("getLocation"), None);
        assert!(registry.get("getFigmaStatus").unwrap().handler().is_some());
        assert!(registry.get("askForConfirmation").unwrap().handler().is_none());
        let names: Vec<_> = registry.iter().map(RegisteredTool::name).collect();
        assert_eq!(names, ["askForConfirmation", "getFigmaStatus", "getOrderHistory"]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(RegisteredTool::client(status_tool())).unwrap();
        let err = registry
            .register(RegisteredTool::server("getFigmaStatus", "", ToolParameters::empty()))
            .unwrap_err();
        assert!(matches!(err, ToolStreamError::Configuration(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn execution_mode_names() {
        assert_eq!(ExecutionMode::ClientConfirm.to_string(), "client-confirm");
        assert_eq!(
            serde_json::to_value(ExecutionMode::ServerAuto).unwrap(),
            json!("server-auto")
        );
    }
}
