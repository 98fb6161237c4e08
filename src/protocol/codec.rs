//! Line codecs for the two supported framings.

use std::str::FromStr;

use serde::Deserialize;
use serde_json::json;

use super::Framing;
use crate::error::ToolStreamError;
use crate::types::{FinishReason, StreamEvent, Usage};

const TEXT: &str = "0";
const DATA: &str = "2";
const ERROR: &str = "3";
const ANNOTATION: &str = "8";
const TOOL_CALL: &str = "9";
const TOOL_RESULT: &str = "a";
const TOOL_CALL_STREAMING_START: &str = "b";
const TOOL_CALL_DELTA: &str = "c";
const FINISH_MESSAGE: &str = "d";
const FINISH_STEP: &str = "e";
const START_STEP: &str = "f";
/// Reasoning, redacted reasoning, reasoning signature, sources and files.
const IGNORED_CODES: [&str; 5] = ["g", "h", "i", "j", "k"];

const SSE_DONE: &str = "[DONE]";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamingStartFrame {
    tool_call_id: String,
    tool_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArgsDeltaFrame {
    tool_call_id: String,
    args_text_delta: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolCallFrame {
    tool_call_id: String,
    #[serde(default)]
    tool_name: Option<String>,
    #[serde(default)]
    args: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolResultFrame {
    tool_call_id: String,
    result: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinishFrame {
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

/// Encode one event as a complete frame, including its line terminator.
pub fn encode_event(framing: Framing, event: &StreamEvent) -> Result<String, ToolStreamError> {
    match framing {
        Framing::DataStream => encode_data_stream(event),
        Framing::Sse => Ok(format!("data: {}\n\n", serde_json::to_string(event)?)),
    }
}

/// Decode a single line (without its terminator). Returns `Ok(None)` for
/// lines that carry no event (blank lines, comments, skipped frame kinds).
pub fn decode_line(framing: Framing, line: &str) -> Result<Option<StreamEvent>, ToolStreamError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(None);
    }
    match framing {
        Framing::DataStream => decode_data_stream(line),
        Framing::Sse => decode_sse(line),
    }
}

fn encode_data_stream(event: &StreamEvent) -> Result<String, ToolStreamError> {
    let (code, payload) = match event {
        StreamEvent::TextDelta { text } => (TEXT, json!(text)),
        StreamEvent::ToolCallStart {
            tool_call_id,
            tool_name,
        } => (
            TOOL_CALL_STREAMING_START,
            json!({ "toolCallId": tool_call_id, "toolName": tool_name }),
        ),
        StreamEvent::ToolCallDelta {
            tool_call_id,
            args_fragment,
        } => (
            TOOL_CALL_DELTA,
            json!({ "toolCallId": tool_call_id, "argsTextDelta": args_fragment }),
        ),
        StreamEvent::ToolCallComplete {
            tool_call_id,
            tool_name,
            args,
        } => {
            let mut frame = serde_json::Map::new();
            frame.insert("toolCallId".into(), json!(tool_call_id));
            if let Some(name) = tool_name {
                frame.insert("toolName".into(), json!(name));
            }
            if let Some(args) = args {
                frame.insert("args".into(), args.clone());
            }
            (TOOL_CALL, serde_json::Value::Object(frame))
        }
        StreamEvent::ToolResult {
            tool_call_id,
            result,
        } => (
            TOOL_RESULT,
            json!({ "toolCallId": tool_call_id, "result": result }),
        ),
        StreamEvent::Error { message } => (ERROR, json!(message)),
        StreamEvent::Done {
            finish_reason,
            usage,
        } => {
            let mut frame = serde_json::Map::new();
            if let Some(reason) = finish_reason {
                frame.insert("finishReason".into(), json!(reason.to_string()));
            }
            if let Some(usage) = usage {
                frame.insert("usage".into(), serde_json::to_value(usage)?);
            }
            (FINISH_MESSAGE, serde_json::Value::Object(frame))
        }
    };
    Ok(format!("{code}:{}\n", serde_json::to_string(&payload)?))
}

fn decode_data_stream(line: &str) -> Result<Option<StreamEvent>, ToolStreamError> {
    let Some((code, payload)) = line.split_once(':') else {
        return Err(ToolStreamError::protocol(format!(
            "data stream line without a type code: {line:?}"
        )));
    };

    let event = match code {
        TEXT => StreamEvent::TextDelta {
            text: frame(code, payload)?,
        },
        TOOL_CALL_STREAMING_START => {
            let start: StreamingStartFrame = frame(code, payload)?;
            StreamEvent::ToolCallStart {
                tool_call_id: start.tool_call_id,
                tool_name: start.tool_name,
            }
        }
        TOOL_CALL_DELTA => {
            let delta: ArgsDeltaFrame = frame(code, payload)?;
            StreamEvent::ToolCallDelta {
                tool_call_id: delta.tool_call_id,
                args_fragment: delta.args_text_delta,
            }
        }
        TOOL_CALL => {
            let call: ToolCallFrame = frame(code, payload)?;
            StreamEvent::ToolCallComplete {
                tool_call_id: call.tool_call_id,
                tool_name: call.tool_name,
                args: call.args,
            }
        }
        TOOL_RESULT => {
            let result: ToolResultFrame = frame(code, payload)?;
            StreamEvent::ToolResult {
                tool_call_id: result.tool_call_id,
                result: result.result,
            }
        }
        ERROR => StreamEvent::Error {
            message: frame(code, payload)?,
        },
        FINISH_MESSAGE => {
            let finish: FinishFrame = frame(code, payload)?;
            StreamEvent::Done {
                finish_reason: finish
                    .finish_reason
                    .map(|reason| FinishReason::from_str(&reason).unwrap_or(FinishReason::Unknown)),
                usage: finish.usage,
            }
        }
        DATA | ANNOTATION | FINISH_STEP | START_STEP => return Ok(None),
        other if IGNORED_CODES.contains(&other) => return Ok(None),
        other => {
            return Err(ToolStreamError::protocol(format!(
                "unknown data stream type code {other:?}"
            )))
        }
    };
    Ok(Some(event))
}

fn frame<T: serde::de::DeserializeOwned>(code: &str, payload: &str) -> Result<T, ToolStreamError> {
    serde_json::from_str(payload)
        .map_err(|err| ToolStreamError::protocol(format!("malformed '{code}' frame: {err}")))
}

fn decode_sse(line: &str) -> Result<Option<StreamEvent>, ToolStreamError> {
    if line.starts_with(':') {
        return Ok(None);
    }
    let Some(data) = line.strip_prefix("data:") else {
        if ["event:", "id:", "retry:"]
            .iter()
            .any(|field| line.starts_with(field))
        {
            return Ok(None);
        }
        return Err(ToolStreamError::protocol(format!(
            "unexpected SSE line: {line:?}"
        )));
    };
    let data = data.trim_start();
    if data == SSE_DONE {
        return Ok(Some(StreamEvent::done()));
    }
    serde_json::from_str(data)
        .map(Some)
        .map_err(|err| ToolStreamError::protocol(format!("malformed SSE event: {err}")))
}
