//! Terminal rendering of tool parts.

use serde_json::Value;

use super::demo_tools::KnownTool;
use crate::types::{InvocationState, ToolInvocation};

/// One line describing a tool part, chosen by tool and state.
pub fn render_invocation(invocation: &ToolInvocation) -> String {
    let Ok(tool) = invocation.tool_name().parse::<KnownTool>() else {
        return render_generic(invocation);
    };
    match (tool, invocation.state()) {
        (KnownTool::AskForConfirmation, InvocationState::PartialCall { .. }) => {
            "Preparing a question...".to_string()
        }
        (KnownTool::AskForConfirmation, InvocationState::Call { args }) => {
            format!("Confirm: {} [y/N]", field(args, "message"))
        }
        (KnownTool::AskForConfirmation, InvocationState::Result { result, .. }) => {
            format!("Confirmation: {}", scalar(result))
        }

        (KnownTool::GetWeatherInformation, InvocationState::PartialCall { args }) => {
            format!("Preparing weather request... {args}")
        }
        (KnownTool::GetWeatherInformation, InvocationState::Call { args }) => {
            format!("Getting weather for {}...", field(args, "city"))
        }
        (KnownTool::GetWeatherInformation, InvocationState::Result { args, result }) => {
            format!(
                "Weather Report / Location: {} / Condition: {}",
                field(args, "city"),
                scalar(result)
            )
        }

        (KnownTool::GetFigmaStatus, InvocationState::PartialCall { .. })
        | (KnownTool::GetFigmaStatus, InvocationState::Call { .. }) => {
            "Fetching Figma design status...".to_string()
        }
        (KnownTool::GetFigmaStatus, InvocationState::Result { result, .. }) => {
            if invocation.is_error_result() {
                return format!("Figma status failed: {}", field(result, "error"));
            }
            let items = result["data"].as_array().map(Vec::len).unwrap_or(0);
            format!("Figma Design Status: {items} component(s)")
        }

        (KnownTool::GetJira, InvocationState::PartialCall { .. })
        | (KnownTool::GetJira, InvocationState::Call { .. }) => "Fetching JIRA status...".to_string(),
        (KnownTool::GetJira, InvocationState::Result { result, .. }) => {
            format!("JIRA: {}", summary(result))
        }

        (KnownTool::GetOrderHistory, InvocationState::PartialCall { .. })
        | (KnownTool::GetOrderHistory, InvocationState::Call { .. }) => {
            "Fetching order history...".to_string()
        }
        (KnownTool::GetOrderHistory, InvocationState::Result { result, .. }) => {
            format!("Order history: {}", summary(result))
        }
    }
}

fn render_generic(invocation: &ToolInvocation) -> String {
    match invocation.state() {
        InvocationState::PartialCall { .. } => format!("{}...", invocation.tool_name()),
        InvocationState::Call { args } => format!("{}({args})", invocation.tool_name()),
        InvocationState::Result { result, .. } => {
            format!("{} -> {}", invocation.tool_name(), summary(result))
        }
    }
}

fn field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("?")
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn summary(value: &Value) -> String {
    if let Some(message) = value.get("message").and_then(Value::as_str) {
        return message.to_string();
    }
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return format!("error: {error}");
    }
    let text = value.to_string();
    if text.len() <= 200 {
        return text;
    }
    let mut end = 200;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn call(name: &str, args: Value) -> ToolInvocation {
        let mut invocation = ToolInvocation::new("t1", name);
        invocation.complete(args).unwrap();
        invocation
    }

    #[test]
    fn confirmation_prompt_and_answer() {
        let mut invocation = call("askForConfirmation", json!({"message": "Deploy now?"}));
        assert_eq!(render_invocation(&invocation), "Confirm: Deploy now? [y/N]");
        invocation.resolve(json!("Yes, confirmed.")).unwrap();
        assert_eq!(render_invocation(&invocation), "Confirmation: Yes, confirmed.");
    }

    #[test]
    fn weather_uses_args_and_result() {
        let mut invocation = call("getWeatherInformation", json!({"city": "Lima"}));
        assert_eq!(render_invocation(&invocation), "Getting weather for Lima...");
        invocation.resolve(json!("sunny")).unwrap();
        assert_eq!(
            render_invocation(&invocation),
            "Weather Report / Location: Lima / Condition: sunny"
        );
    }

    #[test]
    fn failed_handler_is_shown() {
        let mut invocation = call("getFigmaStatus", json!({}));
        invocation.resolve(json!({"error": "offline"})).unwrap();
        assert_eq!(render_invocation(&invocation), "Figma status failed: offline");
    }

    #[test]
    fn unknown_tools_fall_back() {
        let invocation = call("lookupStock", json!({"sku": 7}));
        assert_eq!(render_invocation(&invocation), r#"lookupStock({"sku":7})"#);
    }
}
