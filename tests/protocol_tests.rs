//! Tests for wire decoding of response bodies.

use pretty_assertions::assert_eq;
use serde_json::json;

use toolstream::error::ToolStreamError;
use toolstream::protocol::{decode_line, encode_event, EventDecoder, Framing};
use toolstream::types::{FinishReason, StreamEvent, Usage};

fn decode_all(framing: Framing, body: &[u8], chunk: usize) -> Result<Vec<StreamEvent>, ToolStreamError> {
    let mut decoder = EventDecoder::new(framing);
    let mut events = Vec::new();
    for piece in body.chunks(chunk.max(1)) {
        decoder.push(piece, &mut events)?;
    }
    decoder.finish(&mut events)?;
    Ok(events)
}

#[test]
fn data_stream_text_response() {
    let body = b"0:\"Hello\"\n0:\" world\"\nd:{\"finishReason\":\"stop\",\"usage\":{\"promptTokens\":3,\"completionTokens\":2}}\n";
    let events = decode_all(Framing::DataStream, body, body.len()).unwrap();
    assert_eq!(
        events,
        vec![
            StreamEvent::text("Hello"),
            StreamEvent::text(" world"),
            StreamEvent::Done {
                finish_reason: Some(FinishReason::Stop),
                usage: Some(Usage::new(3, 2)),
            },
        ]
    );
}

#[test]
fn data_stream_tool_call_with_server_result() {
    let body = concat!(
        "f:{\"messageId\":\"msg-1\"}\n",
        "b:{\"toolCallId\":\"w1\",\"toolName\":\"getWeatherInformation\"}\n",
        "c:{\"toolCallId\":\"w1\",\"argsTextDelta\":\"{\\\"city\\\":\"}\n",
        "c:{\"toolCallId\":\"w1\",\"argsTextDelta\":\"\\\"Lima\\\"}\"}\n",
        "9:{\"toolCallId\":\"w1\",\"toolName\":\"getWeatherInformation\",\"args\":{\"city\":\"Lima\"}}\n",
        "a:{\"toolCallId\":\"w1\",\"result\":\"sunny\"}\n",
        "e:{\"finishReason\":\"tool-calls\"}\n",
        "d:{\"finishReason\":\"tool-calls\"}\n",
    );
    let events = decode_all(Framing::DataStream, body.as_bytes(), 5).unwrap();
    assert_eq!(events.len(), 6);
    assert_eq!(events[0], StreamEvent::tool_call_start("w1", "getWeatherInformation"));
    assert_eq!(events[1], StreamEvent::tool_call_delta("w1", "{\"city\":"));
    assert_eq!(events[4], StreamEvent::tool_result("w1", json!("sunny")));
    assert!(events[5].is_terminal());
}

#[test]
fn data_stream_complete_call_without_start_opens_it() {
    let body = "9:{\"toolCallId\":\"j1\",\"toolName\":\"getJIRA\",\"args\":{}}\nd:{}\n";
    let events = decode_all(Framing::DataStream, body.as_bytes(), 4).unwrap();
    assert_eq!(events[0], StreamEvent::tool_call_start("j1", "getJIRA"));
    assert_eq!(events[1].tool_call_id(), Some("j1"));
}

#[test]
fn sse_body_decodes_the_same_events() {
    let events = vec![
        StreamEvent::text("Checking"),
        StreamEvent::tool_call_start("c1", "askForConfirmation"),
        StreamEvent::tool_call_complete("c1", json!({"message": "Go?"})),
        StreamEvent::done(),
    ];
    let mut body = String::from(": keep-alive\n\n");
    for event in &events {
        body.push_str(&encode_event(Framing::Sse, event).unwrap());
    }
    body.push_str("data: [DONE]\n\n");

    for chunk in [1, 2, 13, body.len()] {
        assert_eq!(decode_all(Framing::Sse, body.as_bytes(), chunk).unwrap(), events);
    }
}

#[test]
fn text_concatenation_is_chunking_invariant() {
    let deltas = ["Über", " ", "naïve", " café ", "🙂", " done"];
    let mut body = String::new();
    for delta in deltas {
        body.push_str(&encode_event(Framing::DataStream, &StreamEvent::text(delta)).unwrap());
    }
    body.push_str(&encode_event(Framing::DataStream, &StreamEvent::done()).unwrap());

    let expected: String = deltas.concat();
    for chunk in 1..=body.len() {
        let text: String = decode_all(Framing::DataStream, body.as_bytes(), chunk)
            .unwrap()
            .into_iter()
            .filter_map(|event| match event {
                StreamEvent::TextDelta { text } => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(text, expected, "chunk size {chunk}");
    }
}

#[test]
fn repeated_done_is_dropped() {
    let body = b"0:\"hi\"\nd:{}\nd:{}\n";
    let events = decode_all(Framing::DataStream, body, body.len()).unwrap();
    assert_eq!(events.len(), 2);
}

#[test]
fn result_for_unknown_call_is_a_violation() {
    let body = b"0:\"hi\"\na:{\"toolCallId\":\"ghost\",\"result\":1}\nd:{}\n";
    let err = decode_all(Framing::DataStream, body, body.len()).unwrap_err();
    assert!(matches!(err, ToolStreamError::ProtocolViolation(_)));
}

#[test]
fn second_result_is_dropped_and_decoding_continues() {
    let body = concat!(
        "9:{\"toolCallId\":\"w1\",\"toolName\":\"getWeatherInformation\",\"args\":{}}\n",
        "a:{\"toolCallId\":\"w1\",\"result\":\"sunny\"}\n",
        "a:{\"toolCallId\":\"w1\",\"result\":\"rain\"}\n",
        "d:{}\n",
    );
    let events = decode_all(Framing::DataStream, body.as_bytes(), 3).unwrap();
    let results: Vec<&StreamEvent> = events
        .iter()
        .filter(|event| matches!(event, StreamEvent::ToolResult { .. }))
        .collect();
    assert_eq!(results, vec![&StreamEvent::tool_result("w1", json!("sunny"))]);
    assert!(events.last().unwrap().is_terminal());
}

#[test]
fn events_after_error_are_rejected() {
    let body = b"3:\"overloaded\"\n0:\"late\"\n";
    let err = decode_all(Framing::DataStream, body, body.len()).unwrap_err();
    assert!(matches!(err, ToolStreamError::ProtocolViolation(_)));
}

#[test]
fn truncated_body_is_rejected() {
    let body = b"0:\"Hel";
    let err = decode_all(Framing::DataStream, body, 2).unwrap_err();
    assert!(matches!(err, ToolStreamError::ProtocolViolation(_)));

    let err = decode_all(Framing::DataStream, b"0:\"Hello\"\n", 4).unwrap_err();
    assert!(matches!(err, ToolStreamError::Transport(_)));
}

#[test]
fn unknown_frame_code_is_a_violation() {
    let err = decode_line(Framing::DataStream, "z:{}").unwrap_err();
    assert!(matches!(err, ToolStreamError::ProtocolViolation(_)));
    assert_eq!(decode_line(Framing::DataStream, "").unwrap(), None);
    assert_eq!(decode_line(Framing::Sse, "event: message").unwrap(), None);
}
