//! Transport adapters: send a request, receive a live event stream.

pub mod http;
pub mod sanitize;

pub use http::HttpTransport;
pub use sanitize::sanitize_history;

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::stream::{BoxStream, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::error::ToolStreamError;
use crate::types::{Message, StreamEvent};

/// Body of one generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Conversation id.
    pub id: String,
    pub messages: Vec<Message>,
    /// Step within the current turn. Not sent on the wire.
    #[serde(skip)]
    pub step: u32,
}

impl ChatRequest {
    pub fn new(id: impl Into<String>, messages: Vec<Message>, step: u32) -> Self {
        Self {
            id: id.into(),
            messages,
            step,
        }
    }
}

/// Stream of decoded events for one response.
pub type EventStream = BoxStream<'static, Result<StreamEvent, ToolStreamError>>;

/// A single-use, forward-only response.
///
/// After [`cancel`](Self::cancel) the stream yields nothing more. Events
/// already delivered stay delivered.
pub struct ResponseStream {
    inner: EventStream,
    cancel: CancellationToken,
}

impl ResponseStream {
    pub fn new(inner: EventStream) -> Self {
        Self::with_cancellation(inner, CancellationToken::new())
    }

    /// Wrap a stream whose producer also watches `cancel`.
    pub fn with_cancellation(inner: EventStream, cancel: CancellationToken) -> Self {
        Self { inner, cancel }
    }

    /// A response fed by an in-process producer.
    pub fn from_channel(rx: mpsc::Receiver<Result<StreamEvent, ToolStreamError>>) -> Self {
        Self::new(Box::pin(ReceiverStream::new(rx)))
    }

    /// A response that replays fixed events.
    pub fn from_events(events: Vec<StreamEvent>) -> Self {
        Self::new(Box::pin(futures::stream::iter(events.into_iter().map(Ok))))
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Stream for ResponseStream {
    type Item = Result<StreamEvent, ToolStreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseStream")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Opens one generation request per call.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request`. Connection-level failures surface as transport
    /// errors, either here or from the returned stream.
    async fn send(&self, request: &ChatRequest) -> Result<ResponseStream, ToolStreamError>;
}
