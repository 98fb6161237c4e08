//! Shared test helpers and a scripted transport.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use toolstream::error::ToolStreamError;
use toolstream::orchestrator::{ConversationEvent, ConversationEventSink};
use toolstream::transport::{ChatRequest, ResponseStream, Transport};
use toolstream::types::StreamEvent;

/// What the transport answers for one request.
pub enum Reply {
    /// Replay these events.
    Events(Vec<StreamEvent>),
    /// Replay these items, errors included.
    Items(Vec<Result<StreamEvent, ToolStreamError>>),
    /// Refuse the request.
    Refuse(ToolStreamError),
    /// Events pushed by the test through the paired sender.
    Channel(mpsc::Receiver<Result<StreamEvent, ToolStreamError>>),
}

/// A transport that answers requests from a queue and records them.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, reply: Reply) -> Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    /// Queue a reply that replays `events`.
    pub fn then(self, events: Vec<StreamEvent>) -> Self {
        self.with_reply(Reply::Events(events))
    }

    /// Queue a channel-backed reply and return its sender.
    pub fn channel(&self) -> mpsc::Sender<Result<StreamEvent, ToolStreamError>> {
        let (tx, rx) = mpsc::channel(16);
        self.replies.lock().unwrap().push_back(Reply::Channel(rx));
        tx
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ChatRequest) -> Result<ResponseStream, ToolStreamError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Events(events)) => Ok(ResponseStream::from_events(events)),
            Some(Reply::Items(items)) => Ok(ResponseStream::new(Box::pin(futures::stream::iter(items)))),
            Some(Reply::Refuse(err)) => Err(err),
            Some(Reply::Channel(rx)) => Ok(ResponseStream::from_channel(rx)),
            None => Err(ToolStreamError::Transport(format!(
                "no scripted reply for step {}",
                request.step
            ))),
        }
    }
}

/// Event sink that keeps everything it receives.
pub fn recording_sink() -> (ConversationEventSink, Arc<Mutex<Vec<ConversationEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let captured = events.clone();
    let sink: ConversationEventSink = Arc::new(move |event| {
        captured.lock().unwrap().push(event);
    });
    (sink, events)
}

/// A complete tool call: start, argument fragments, complete.
pub fn tool_call(id: &str, name: &str, args: Value) -> Vec<StreamEvent> {
    let raw = args.to_string();
    let (head, tail) = raw.split_at(raw.len() / 2);
    vec![
        StreamEvent::tool_call_start(id, name),
        StreamEvent::tool_call_delta(id, head),
        StreamEvent::tool_call_delta(id, tail),
        StreamEvent::tool_call_complete(id, args),
    ]
}

/// `parts` followed by `done`.
pub fn finished(parts: impl IntoIterator<Item = Vec<StreamEvent>>) -> Vec<StreamEvent> {
    let mut events: Vec<StreamEvent> = parts.into_iter().flatten().collect();
    events.push(StreamEvent::done());
    events
}
