//! HTTP transport: POST the conversation, decode the streamed body.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{ChatRequest, ResponseStream, Transport};
use crate::error::ToolStreamError;
use crate::protocol::{EventDecoder, Framing};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Talks to a chat route that answers with a streamed body.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    headers: HeaderMap,
    framing: Framing,
    idle_timeout: Option<Duration>,
}

impl HttpTransport {
    /// Create a transport for `endpoint` with the default connect timeout.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ToolStreamError> {
        Self::with_connect_timeout(endpoint, DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_connect_timeout(
        endpoint: impl Into<String>,
        connect_timeout: Duration,
    ) -> Result<Self, ToolStreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .pool_max_idle_per_host(10)
            .build()?;
        Ok(Self::with_client(client, endpoint))
    }

    /// Use a preconfigured client.
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            headers: HeaderMap::new(),
            framing: Framing::default(),
            idle_timeout: None,
        }
    }

    pub fn with_api_key(mut self, api_key: &str) -> Result<Self, ToolStreamError> {
        let value = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| ToolStreamError::Configuration("API key is not a valid header value".into()))?;
        self.headers.insert(AUTHORIZATION, value);
        Ok(self)
    }

    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Fail the stream if no bytes arrive for `timeout`.
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    fn request_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static(self.framing.content_type()));
        headers
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ChatRequest) -> Result<ResponseStream, ToolStreamError> {
        debug!(
            conversation_id = %request.id,
            step = request.step,
            messages = request.messages.len(),
            endpoint = %self.endpoint,
            "sending chat request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.request_headers())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "chat request rejected");
            return Err(status_to_error(status.as_u16(), &body));
        }

        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let framing = self.framing;
        let idle_timeout = self.idle_timeout;
        let byte_stream = response.bytes_stream();

        let stream = async_stream::stream! {
            let mut decoder = EventDecoder::new(framing);
            futures::pin_mut!(byte_stream);

            loop {
                let next = tokio::select! {
                    _ = stop.cancelled() => break,
                    next = next_chunk(&mut byte_stream, idle_timeout) => next,
                };
                let mut events = Vec::new();
                let decoded = match next {
                    Ok(Some(chunk)) => decoder.push(&chunk, &mut events).map(|()| true),
                    Ok(None) => decoder.finish(&mut events).map(|()| false),
                    Err(err) => Err(err),
                };
                for event in events {
                    yield Ok(event);
                }
                match decoded {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                }
            }
        };

        Ok(ResponseStream::with_cancellation(Box::pin(stream), cancel))
    }
}

async fn next_chunk<S, B>(
    stream: &mut S,
    idle_timeout: Option<Duration>,
) -> Result<Option<B>, ToolStreamError>
where
    S: futures::Stream<Item = Result<B, reqwest::Error>> + Unpin,
{
    let next = match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, stream.next())
            .await
            .map_err(|_| ToolStreamError::Timeout(limit.as_millis() as u64))?,
        None => stream.next().await,
    };
    next.transpose().map_err(ToolStreamError::from)
}

/// Map a non-2xx response to an error, preferring the body's own message.
pub fn status_to_error(status: u16, body: &str) -> ToolStreamError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            let error = value.get("error")?;
            error
                .get("message")
                .and_then(|message| message.as_str())
                .or_else(|| error.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());
    ToolStreamError::http(status, message)
}
