//! Demo tool set for the `chat` command.

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::error::ToolStreamError;
use crate::tools::{
    ExecutionMode, FnTool, RegisteredTool, ToolArguments, ToolExecutionContext, ToolParameters,
    ToolRegistry,
};

/// Confirmation answers bound for `askForConfirmation`.
pub const CONFIRMED: &str = "Yes, confirmed.";
pub const DENIED: &str = "No, denied";

/// Tools the chat route is known to offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "camelCase")]
pub enum KnownTool {
    GetFigmaStatus,
    #[strum(serialize = "getJIRA")]
    GetJira,
    AskForConfirmation,
    GetOrderHistory,
    GetWeatherInformation,
}

impl KnownTool {
    pub fn mode(&self) -> ExecutionMode {
        match self {
            Self::GetFigmaStatus | Self::GetJira => ExecutionMode::ClientAuto,
            Self::AskForConfirmation => ExecutionMode::ClientConfirm,
            Self::GetOrderHistory | Self::GetWeatherInformation => ExecutionMode::ServerAuto,
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Self::GetFigmaStatus => "show the status of the UX designs",
            Self::GetJira => "Get the JIRA status",
            Self::AskForConfirmation => "Ask the user for confirmation.",
            Self::GetOrderHistory => "Get the confluence pages",
            Self::GetWeatherInformation => "show the weather in a given city to the user",
        }
    }

    fn parameters(&self) -> ToolParameters {
        match self {
            Self::GetFigmaStatus => ToolParameters::object()
                .string("city", "City the landing page targets", false)
                .build(),
            Self::AskForConfirmation => ToolParameters::object()
                .string("message", "The message to ask for confirmation.", true)
                .build(),
            Self::GetWeatherInformation => ToolParameters::object()
                .string("city", "City to report on", true)
                .build(),
            Self::GetJira | Self::GetOrderHistory => ToolParameters::empty(),
        }
    }

    fn registration(&self) -> RegisteredTool {
        let name = self.as_ref();
        match self {
            Self::GetFigmaStatus => RegisteredTool::client(FnTool::new(
                name,
                self.description(),
                self.parameters(),
                figma_status,
            )),
            Self::GetJira => RegisteredTool::client(FnTool::new(
                name,
                self.description(),
                self.parameters(),
                jira_status,
            )),
            Self::AskForConfirmation => {
                RegisteredTool::confirm(name, self.description(), self.parameters())
            }
            Self::GetOrderHistory | Self::GetWeatherInformation => {
                RegisteredTool::server(name, self.description(), self.parameters())
            }
        }
    }
}

/// Registry holding every [`KnownTool`].
pub fn demo_registry() -> Result<ToolRegistry, ToolStreamError> {
    let mut registry = ToolRegistry::new();
    for tool in KnownTool::iter() {
        registry.register(tool.registration())?;
    }
    Ok(registry)
}

/// Map a typed answer to the confirmation result.
pub fn confirmation_result(answer: &str) -> Value {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => json!(CONFIRMED),
        _ => json!(DENIED),
    }
}

async fn figma_status(
    args: ToolArguments,
    _ctx: ToolExecutionContext,
) -> Result<Value, ToolStreamError> {
    let city = args.get_opt_str("city").unwrap_or("Headquarters");
    let landing_page = format!("{city} Landing Page");
    let now = Utc::now();
    let projects = [
        ("Navigation", "In Progress", "Alex", 75, Duration::hours(3)),
        ("Dashboard", "Ready for Review", "Jamie", 90, Duration::days(1)),
        ("User Profile", "Approved", "Taylor", 100, Duration::days(2)),
        (landing_page.as_str(), "Not Started", "Morgan", 15, Duration::days(4)),
    ]
    .into_iter()
    .map(|(component, status, designer, progress, age)| {
        json!({
            "component": component,
            "status": status,
            "designer": designer,
            "progress": progress,
            "lastUpdated": (now - age).to_rfc3339(),
        })
    })
    .collect::<Vec<_>>();

    Ok(json!({
        "status": "success",
        "data": projects,
        "message": "Current Figma design status retrieved successfully",
    }))
}

async fn jira_status(
    _args: ToolArguments,
    _ctx: ToolExecutionContext,
) -> Result<Value, ToolStreamError> {
    Ok(json!({
        "status": "success",
        "data": "JIRA data retrieved successfully",
        "message": "JIRA data retrieved successfully",
    }))
}
