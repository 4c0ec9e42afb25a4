//! Client side of the Streamable HTTP transport (§4.5): a `reqwest`-backed
//! [`Transport`] that POSTs outgoing messages and maintains an optional GET
//! SSE stream for messages the server sends without being asked (a second
//! sampling request mid-call, a resource-updated notification, and so on).
//!
//! The wire-level SSE parsing here mirrors how every event-stream client in
//! this corpus reads one: accumulate bytes until a blank line, split
//! `field: value` lines, and treat an `event: endpoint` frame as carrying the
//! session's message-posting URL rather than a JSON-RPC payload. Unlike an
//! older HTTP client this shape is sometimes paired with, [`receive`] never
//! reports "no message queued yet" as `Ok(None)` — that return means the
//! channel feeding it has been closed by [`disconnect`], matching every
//! other [`Transport`] in this workspace.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use mcp_transport::{
    validate_request_size, validate_response_size, AtomicMetrics, LimitsConfig, TimeoutConfig,
    Transport, TransportCapabilities, TransportError, TransportKind, TransportMessage,
    TransportMetrics, TransportResult, TransportState,
};

const SESSION_HEADER: &str = "Mcp-Session-Id";
const LAST_EVENT_HEADER: &str = "Last-Event-ID";

/// Configuration for [`HttpClientTransport`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Full URL of the server's mounted endpoint, e.g. `https://host/mcp`.
    pub url: String,
    /// Whether to open a GET SSE stream for server-initiated traffic after
    /// connecting. Servers running in stateless mode reject GET entirely, so
    /// this should be `false` against one.
    pub open_unsolicited_stream: bool,
    /// Bearer token sent as `Authorization`, if any.
    pub auth_token: Option<String>,
    pub(crate) limits: LimitsConfig,
    pub(crate) timeouts: TimeoutConfig,
}

impl HttpClientConfig {
    /// Build a config pointed at `url` with every other setting defaulted.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            open_unsolicited_stream: true,
            auth_token: None,
            limits: LimitsConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

struct ClientState {
    session_id: Mutex<Option<String>>,
    last_event_id: Mutex<Option<String>>,
    inbound_tx: Mutex<Option<mpsc::UnboundedSender<TransportMessage>>>,
}

/// The client half of the Streamable HTTP transport.
pub struct HttpClientTransport {
    config: HttpClientConfig,
    http: reqwest::Client,
    state: Arc<ClientState>,
    inbound_rx: mpsc::UnboundedReceiver<TransportMessage>,
    sse_task: Option<JoinHandle<()>>,
    connected: AtomicBool,
    transport_state: TransportState,
    metrics: Arc<AtomicMetrics>,
}

impl HttpClientTransport {
    /// Build a transport against `config`. Call [`Transport::connect`]
    /// before sending or receiving.
    #[must_use]
    pub fn new(config: HttpClientConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            http: reqwest::Client::new(),
            config,
            state: Arc::new(ClientState {
                session_id: Mutex::new(None),
                last_event_id: Mutex::new(None),
                inbound_tx: Mutex::new(Some(tx)),
            }),
            inbound_rx: rx,
            sse_task: None,
            connected: AtomicBool::new(false),
            transport_state: TransportState::Disconnected,
            metrics: Arc::new(AtomicMetrics::new()),
        }
    }

    fn build_headers(&self, accept: &'static str) -> TransportResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(accept));
        if let Some(session_id) = self.state.session_id.lock().clone() {
            let value = HeaderValue::from_str(&session_id)
                .map_err(|_| TransportError::SendFailed("invalid session id".to_string()))?;
            headers.insert(SESSION_HEADER, value);
        }
        if let Some(token) = &self.config.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| TransportError::SendFailed("invalid auth token".to_string()))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn adopt_session_id(&self, headers: &header::HeaderMap) {
        if let Some(id) = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) {
            *self.state.session_id.lock() = Some(id.to_string());
        }
    }

    fn spawn_unsolicited_stream(&mut self) {
        if !self.config.open_unsolicited_stream {
            return;
        }
        let Some(session_id) = self.state.session_id.lock().clone() else {
            return;
        };
        let http = self.http.clone();
        let url = self.config.url.clone();
        let state = self.state.clone();
        let auth_token = self.config.auth_token.clone();

        self.sse_task = Some(tokio::spawn(async move {
            let mut headers = HeaderMap::new();
            headers.insert(header::ACCEPT, HeaderValue::from_static("text/event-stream"));
            if let Ok(value) = HeaderValue::from_str(&session_id) {
                headers.insert(SESSION_HEADER, value);
            }
            if let Some(last_id) = state.last_event_id.lock().clone() {
                if let Ok(value) = HeaderValue::from_str(&last_id) {
                    headers.insert(LAST_EVENT_HEADER, value);
                }
            }
            if let Some(token) = &auth_token {
                if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
                    headers.insert(header::AUTHORIZATION, value);
                }
            }

            let response = match http.get(&url).headers(headers).send().await {
                Ok(response) if response.status().is_success() => response,
                Ok(response) => {
                    warn!(status = %response.status(), "unsolicited SSE stream rejected");
                    return;
                }
                Err(error) => {
                    warn!(%error, "failed to open unsolicited SSE stream");
                    return;
                }
            };

            let mut stream = response.bytes_stream();
            let mut buffer = String::new();
            while let Some(chunk) = stream.next().await {
                let Ok(chunk) = chunk else { break };
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(pos) = buffer.find("\n\n") {
                    let frame = buffer[..pos].to_string();
                    buffer = buffer[pos + 2..].to_string();
                    if !deliver_sse_frame(&frame, &state) {
                        return;
                    }
                }
            }
            debug!("unsolicited SSE stream ended");
        }));
    }
}

/// Parse one `\n\n`-delimited SSE frame and, if it carries a JSON-RPC
/// message, forward it to the transport's inbound channel. Returns `false`
/// if that channel is gone (the transport has disconnected), signalling the
/// caller to stop reading the stream.
fn deliver_sse_frame(frame: &str, state: &ClientState) -> bool {
    let mut event_type: Option<&str> = None;
    let mut data_lines = Vec::new();
    let mut event_id: Option<&str> = None;

    for line in frame.lines() {
        let Some((field, value)) = line.split_once(':') else { continue };
        let value = value.trim_start();
        match field {
            "event" => event_type = Some(value),
            "data" => data_lines.push(value),
            "id" => event_id = Some(value),
            _ => {}
        }
    }

    if let Some(id) = event_id {
        *state.last_event_id.lock() = Some(id.to_string());
    }
    if data_lines.is_empty() {
        return true;
    }
    // The endpoint discovery event carries a URL, not a JSON-RPC message;
    // this transport always posts to the configured URL, so it's ignored.
    if event_type == Some("endpoint") {
        return true;
    }

    let data = data_lines.join("\n");
    let Ok(value) = serde_json::from_str::<Value>(&data) else {
        warn!("dropping unparseable SSE event");
        return true;
    };
    let Ok(payload) = serde_json::to_vec(&value) else { return true };

    match state.inbound_tx.lock().as_ref() {
        Some(tx) => tx.send(TransportMessage::new(Bytes::from(payload))).is_ok(),
        None => false,
    }
}

#[async_trait]
impl Transport for HttpClientTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::StreamableHttp
    }

    fn capabilities(&self) -> TransportCapabilities {
        TransportCapabilities::streamable_http()
    }

    fn state(&self) -> TransportState {
        self.transport_state.clone()
    }

    async fn connect(&mut self) -> TransportResult<()> {
        self.connected.store(true, Ordering::Release);
        self.transport_state = TransportState::Connected;
        self.metrics.record_connection(true);
        Ok(())
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        self.connected.store(false, Ordering::Release);
        self.state.inbound_tx.lock().take();
        if let Some(task) = self.sse_task.take() {
            task.abort();
        }
        self.transport_state = TransportState::Disconnected;
        Ok(())
    }

    async fn send(&mut self, message: TransportMessage) -> TransportResult<()> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(TransportError::NotConnected);
        }
        validate_request_size(message.size(), &self.config.limits)?;

        let headers = self.build_headers("application/json, text/event-stream")?;
        let response = self
            .http
            .post(&self.config.url)
            .headers(headers)
            .header(header::CONTENT_TYPE, "application/json")
            .body(message.payload.clone())
            .send()
            .await
            .map_err(|error| TransportError::SendFailed(error.to_string()))?;

        self.metrics.record_sent(message.size() as u64);
        self.adopt_session_id(response.headers());

        if self.sse_task.is_none() {
            self.spawn_unsolicited_stream();
        }

        match response.status() {
            status if status == reqwest::StatusCode::ACCEPTED => Ok(()),
            status if status.is_success() => {
                let content_type = response
                    .headers()
                    .get(header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();

                if content_type.contains("text/event-stream") {
                    self.drain_post_sse(response).await
                } else {
                    let body = response.bytes().await.map_err(|error| TransportError::ReceiveFailed(error.to_string()))?;
                    validate_response_size(body.len(), &self.config.limits)?;
                    self.metrics.record_received(body.len() as u64);
                    if let Some(tx) = self.state.inbound_tx.lock().as_ref() {
                        let _ = tx.send(TransportMessage::new(body));
                    }
                    Ok(())
                }
            }
            status => Err(TransportError::SendFailed(format!("server returned {status}"))),
        }
    }

    async fn receive(&mut self) -> TransportResult<Option<TransportMessage>> {
        match self.inbound_rx.recv().await {
            Some(message) => Ok(Some(message)),
            None => Ok(None),
        }
    }

    fn limits(&self) -> &LimitsConfig {
        &self.config.limits
    }

    fn timeouts(&self) -> &TimeoutConfig {
        &self.config.timeouts
    }

    fn metrics(&self) -> TransportMetrics {
        self.metrics.snapshot()
    }
}

impl HttpClientTransport {
    /// Read a POST response delivered as an SSE stream instead of a single
    /// JSON body — the server choosing to stream a long-running call's
    /// eventual reply alongside any interleaved server-initiated requests.
    async fn drain_post_sse(&self, response: reqwest::Response) -> TransportResult<()> {
        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|error| TransportError::ReceiveFailed(error.to_string()))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(pos) = buffer.find("\n\n") {
                let frame = buffer[..pos].to_string();
                buffer = buffer[pos + 2..].to_string();
                deliver_sse_frame(&frame, &self.state);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deliver_sse_frame_ignores_the_endpoint_event() {
        let state = ClientState {
            session_id: Mutex::new(None),
            last_event_id: Mutex::new(None),
            inbound_tx: Mutex::new(None),
        };
        assert!(deliver_sse_frame("event: endpoint\ndata: {\"uri\":\"http://x\"}\nid: 1", &state));
        assert_eq!(*state.last_event_id.lock(), Some("1".to_string()));
    }

    #[tokio::test]
    async fn deliver_sse_frame_forwards_a_message_event() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let state = ClientState {
            session_id: Mutex::new(None),
            last_event_id: Mutex::new(None),
            inbound_tx: Mutex::new(Some(tx)),
        };
        let frame = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"method\":\"ping\"}";
        assert!(deliver_sse_frame(frame, &state));
        let message = rx.recv().await.expect("message delivered");
        assert!(std::str::from_utf8(&message.payload).unwrap().contains("ping"));
    }

    #[test]
    fn deliver_sse_frame_with_no_inbound_channel_reports_closed() {
        let state = ClientState {
            session_id: Mutex::new(None),
            last_event_id: Mutex::new(None),
            inbound_tx: Mutex::new(None),
        };
        let frame = "data: {\"jsonrpc\":\"2.0\",\"method\":\"ping\"}";
        assert!(!deliver_sse_frame(frame, &state));
    }

    #[tokio::test]
    async fn disconnect_closes_the_inbound_channel() {
        let mut transport = HttpClientTransport::new(HttpClientConfig::new("http://localhost:1/mcp"));
        transport.connect().await.unwrap();
        transport.disconnect().await.unwrap();
        assert!(transport.receive().await.unwrap().is_none());
    }
}
