//! NDJSON streaming client for the remote agent's `/chat` and `/continue` endpoints.

use bytes::BytesMut;
use futures::StreamExt;
use futures::stream::BoxStream;
use regex_lite::Regex;
use serde::Serialize;
use serde_json::Value;
use wangr_protocol::protocol::AgentEvent;
use wangr_protocol::protocol::ChatRequest;
use wangr_protocol::protocol::ContinueRequest;
use wangr_protocol::protocol::ToolOutput;

use crate::config::Config;
use crate::error::Result;
use crate::error::WangrErr;
use crate::operation::PendingBatch;
use crate::resolver::ContinueOutcome;
use crate::resolver::Continuation;

pub type AgentEventStream = BoxStream<'static, Result<AgentEvent>>;

/// Everything one response stream produced, up to its end or its `pending_file_ops` event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamOutcome {
    /// Assistant text assembled from `text_delta`/`text` events.
    pub text: String,
    pub tool_calls: Vec<Value>,
    /// Set when the stream ended by handing a batch to the client.
    pub pending: Option<PendingBatch>,
}

#[derive(Debug, Clone)]
pub struct AgentClient {
    client: reqwest::Client,
    chat_url: String,
    continue_url: String,
    api_key: Option<String>,
    request_timeout: std::time::Duration,
    suppress_status: Regex,
}

impl AgentClient {
    pub fn new(config: &Config) -> Result<Self> {
        let suppress_status = Regex::new(&config.suppress_status_pattern).map_err(|e| {
            WangrErr::InvalidConfig(format!(
                "suppress_status_pattern {:?}: {e}",
                config.suppress_status_pattern
            ))
        })?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Ok(Self {
            client,
            chat_url: config.chat_api_url.clone(),
            continue_url: config.continue_url(),
            api_key: config.api_key.clone(),
            request_timeout: config.request_timeout,
            suppress_status,
        })
    }

    /// Whether a `status` message should be hidden from the user.
    pub fn should_suppress_status(&self, message: &str) -> bool {
        self.suppress_status.is_match(message)
    }

    pub async fn stream_chat(&self, request: &ChatRequest) -> Result<AgentEventStream> {
        self.stream_post(&self.chat_url, request).await
    }

    pub async fn stream_continue(&self, request: &ContinueRequest) -> Result<AgentEventStream> {
        self.stream_post(&self.continue_url, request).await
    }

    /// Send a chat message and drain its response stream, forwarding displayable events.
    pub async fn chat(
        &self,
        request: &ChatRequest,
        on_event: impl FnMut(AgentEvent) + Send,
    ) -> Result<StreamOutcome> {
        let stream = self.stream_chat(request).await?;
        self.drain(stream, on_event).await
    }

    /// Report tool outputs for `pending_id` and drain the agent's answer.
    pub async fn continue_exchange(
        &self,
        pending_id: &str,
        tool_outputs: Vec<ToolOutput>,
        on_event: impl FnMut(AgentEvent) + Send,
    ) -> Result<StreamOutcome> {
        let request = ContinueRequest {
            pending_id: pending_id.to_string(),
            tool_outputs,
        };
        let stream = self.stream_continue(&request).await?;
        self.drain(stream, on_event).await
    }

    /// Consume `stream` until it ends or yields `pending_file_ops`; later lines are ignored.
    /// Suppressed status messages are not forwarded.
    pub async fn drain(
        &self,
        mut stream: AgentEventStream,
        mut on_event: impl FnMut(AgentEvent) + Send,
    ) -> Result<StreamOutcome> {
        let mut outcome = StreamOutcome::default();
        while let Some(event) = stream.next().await {
            match event? {
                AgentEvent::PendingFileOps(pending) => {
                    outcome.pending = Some(PendingBatch::from(pending));
                    break;
                }
                AgentEvent::Status { message } if self.should_suppress_status(&message) => {
                    tracing::debug!("suppressed status: {message}");
                }
                AgentEvent::Unknown => {}
                event => {
                    match &event {
                        AgentEvent::TextDelta { content } => outcome.text.push_str(content),
                        AgentEvent::Text { content } => outcome.text = content.clone(),
                        AgentEvent::Done(done) => outcome.tool_calls = done.tool_calls.clone(),
                        _ => {}
                    }
                    on_event(event);
                }
            }
        }
        Ok(outcome)
    }

    async fn stream_post<T: Serialize>(&self, url: &str, body: &T) -> Result<AgentEventStream> {
        tracing::debug!("POST {url}");
        let mut builder = self
            .client
            .post(url)
            .timeout(self.request_timeout)
            .json(body);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }
        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(WangrErr::UnexpectedStatus(status, body));
        }
        Ok(ndjson_events(resp.bytes_stream()))
    }
}

/// Split a byte stream into NDJSON lines and parse each as an [`AgentEvent`]. Blank and
/// malformed lines are skipped; a transport error ends the stream.
fn ndjson_events<S, B, E>(mut bytes: S) -> AgentEventStream
where
    S: futures::Stream<Item = std::result::Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    let s = async_stream::stream! {
        let mut buf = BytesMut::new();
        loop {
            match bytes.next().await {
                Some(Ok(chunk)) => {
                    buf.extend_from_slice(chunk.as_ref());
                    while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                        let line = buf.split_to(pos + 1);
                        if let Some(event) = parse_line(&line) {
                            yield Ok(event);
                        }
                    }
                }
                Some(Err(e)) => {
                    yield Err(WangrErr::Stream(e.to_string()));
                    return;
                }
                None => {
                    // Final line without a trailing newline.
                    if let Some(event) = parse_line(&buf) {
                        yield Ok(event);
                    }
                    return;
                }
            }
        }
    };
    Box::pin(s)
}

fn parse_line(line: &[u8]) -> Option<AgentEvent> {
    let text = std::str::from_utf8(line).ok()?.trim();
    if text.is_empty() {
        return None;
    }
    match serde_json::from_str::<AgentEvent>(text) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::debug!("skipping malformed stream line: {e}");
            None
        }
    }
}

/// [`Continuation`] that talks to the agent and forwards every displayable event of the
/// answer to `on_event`.
pub struct StreamingContinuation<'a, F> {
    client: &'a AgentClient,
    on_event: F,
}

impl<'a, F> StreamingContinuation<'a, F>
where
    F: Fn(AgentEvent) + Send + Sync,
{
    pub fn new(client: &'a AgentClient, on_event: F) -> Self {
        Self { client, on_event }
    }
}

impl<F> Continuation for StreamingContinuation<'_, F>
where
    F: Fn(AgentEvent) + Send + Sync,
{
    fn continue_pending(
        &self,
        pending_id: &str,
        tool_outputs: Vec<ToolOutput>,
    ) -> impl Future<Output = Result<ContinueOutcome>> + Send {
        async move {
            let outcome = self
                .client
                .continue_exchange(pending_id, tool_outputs, |event| (self.on_event)(event))
                .await?;
            Ok(ContinueOutcome {
                response_text: outcome.text,
                next_pending: outcome.pending,
            })
        }
    }
}
