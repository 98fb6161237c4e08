//! Outgoing history cleanup.

use crate::types::{InvocationPhase, Message, Part};

/// Prepare history for a generation request.
///
/// Tool invocations that never reached `result` (left behind by an
/// interrupted, failed or step-limited response) are dropped, as are empty
/// text parts. Messages with nothing left are skipped.
pub fn sanitize_history(messages: &[Message]) -> Vec<Message> {
    messages.iter().filter_map(sanitize_message).collect()
}

fn sanitize_message(message: &Message) -> Option<Message> {
    let parts: Vec<Part> = message
        .parts
        .iter()
        .filter(|part| match part {
            Part::Text { text } => !text.is_empty(),
            Part::ToolInvocation { tool_invocation } => {
                tool_invocation.phase() == InvocationPhase::Result
            }
        })
        .cloned()
        .collect();
    if parts.is_empty() {
        return None;
    }
    let mut next = message.clone();
    next.parts = parts;
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MessageStatus, Role, ToolInvocation};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn invocation(id: &str, result: Option<serde_json::Value>) -> Part {
        let mut call = ToolInvocation::new(id, "getJIRA");
        call.complete(json!({})).unwrap();
        if let Some(result) = result {
            call.resolve(result).unwrap();
        }
        Part::tool_invocation(call)
    }

    #[test]
    fn unresolved_calls_and_empty_messages_are_dropped() {
        let mut interrupted = Message::new(Role::Assistant);
        interrupted.status = MessageStatus::Interrupted;
        interrupted.parts.push(invocation("t1", None));

        let mut mixed = Message::new(Role::Assistant);
        mixed.parts.push(Part::text("Looking it up"));
        mixed.parts.push(invocation("t2", Some(json!({"ticket": "ABC-1"}))));
        mixed.parts.push(invocation("t3", None));
        mixed.parts.push(Part::text(""));

        let history = vec![Message::user("status?"), interrupted, mixed];
        let sanitized = sanitize_history(&history);

        assert_eq!(sanitized.len(), 2);
        assert_eq!(sanitized[0], history[0]);
        let ids: Vec<_> = sanitized[1]
            .tool_invocations()
            .map(|call| call.tool_call_id().to_string())
            .collect();
        assert_eq!(ids, ["t2"]);
        assert_eq!(sanitized[1].parts.len(), 2);
    }
}
