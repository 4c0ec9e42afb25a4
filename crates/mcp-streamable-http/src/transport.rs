//! Server side of the Streamable HTTP transport (§4.5): an axum [`Router`]
//! implementing POST/GET/DELETE on one mount path, plus the
//! [`Transport`] half a `Session` drives for each accepted `Mcp-Session-Id`.
//!
//! Unlike stdio, one physical HTTP listener serves many logical sessions at
//! once. Rather than make a single `Transport` multiplex all of them (which
//! would force every session's pending-request table to share one id
//! namespace), [`router`] hands back one [`HttpServerTransport`] per session
//! through its `on_session` callback — the caller (`mcp-server`, typically)
//! spawns a `Session` on each. [`HttpServerTransport`] still implements
//! [`MultiplexedTransport`] for interoperability with code written against
//! that trait; it just always reports its own session id.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use mcp_core::{JsonRpcMessage, JsonRpcRequest};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use mcp_transport::{
    validate_request_size, AtomicMetrics, LimitsConfig, MultiplexedTransport,
    TimeoutConfig, Transport, TransportCapabilities, TransportError, TransportKind, TransportMessage,
    TransportMetrics, TransportResult, TransportState,
};

use crate::config::StreamableHttpConfig;
use crate::event_store::{DeliveredEvent, EventStore};
use crate::session::{HttpSessionState, SessionRegistry};

const SESSION_HEADER: &str = "Mcp-Session-Id";
const LAST_EVENT_HEADER: &str = "Last-Event-ID";

/// How long a POST carrying a request waits for the session's driving
/// `Session` to produce a reply before the HTTP call fails with `504`.
/// MCP recommends 60 seconds for server-initiated round trips (§4.9); the
/// same figure is reasonable here since both directions share one
/// request/response shape.
const POST_REPLY_TIMEOUT: Duration = Duration::from_secs(60);

/// The server half of one session's [`Transport`]. Handed to the
/// `on_session` callback passed to [`router`]; typically fed straight into
/// `mcp_session::Session::spawn`.
pub struct HttpServerTransport {
    state: Arc<HttpSessionState>,
    inbound_rx: mpsc::UnboundedReceiver<TransportMessage>,
    transport_state: TransportState,
    metrics: Arc<AtomicMetrics>,
    limits: LimitsConfig,
    timeouts: TimeoutConfig,
}

impl HttpServerTransport {
    fn new(state: Arc<HttpSessionState>, inbound_rx: mpsc::UnboundedReceiver<TransportMessage>) -> Self {
        Self {
            state,
            inbound_rx,
            transport_state: TransportState::Disconnected,
            metrics: Arc::new(AtomicMetrics::new()),
            limits: LimitsConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }

    /// The `Mcp-Session-Id` this transport's `Session` will be driving.
    #[must_use]
    pub fn session_id(&self) -> &str {
        self.state.id()
    }
}

#[async_trait]
impl Transport for HttpServerTransport {
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
        self.metrics.record_connection(true);
        self.transport_state = TransportState::Connected;
        Ok(())
    }

    async fn disconnect(&mut self) -> TransportResult<()> {
        self.state.close();
        self.transport_state = TransportState::Disconnected;
        Ok(())
    }

    async fn send(&mut self, message: TransportMessage) -> TransportResult<()> {
        if !matches!(self.transport_state, TransportState::Connected) {
            return Err(TransportError::NotConnected);
        }
        validate_request_size(message.size(), &self.limits)?;
        self.metrics.record_sent(message.size() as u64);
        self.state.route_outbound(message).await;
        Ok(())
    }

    async fn receive(&mut self) -> TransportResult<Option<TransportMessage>> {
        if !matches!(self.transport_state, TransportState::Connected) {
            return Err(TransportError::NotConnected);
        }
        match self.inbound_rx.recv().await {
            Some(message) => {
                self.metrics.record_received(message.size() as u64);
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }

    fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    fn timeouts(&self) -> &TimeoutConfig {
        &self.timeouts
    }

    fn metrics(&self) -> TransportMetrics {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl MultiplexedTransport for HttpServerTransport {
    fn session_id_of(&self, _message: &TransportMessage) -> Option<String> {
        Some(self.state.id().to_string())
    }
}

/// Invoked once per newly accepted `Mcp-Session-Id`, handed the
/// [`HttpServerTransport`] that session's `Session` should be spawned on.
/// `mcp-streamable-http` has no opinion on what runs the session — that's
/// `mcp-server`'s job — it only ever hands back the transport half.
pub type NewSessionFn = Arc<dyn Fn(HttpServerTransport) + Send + Sync>;

#[derive(Clone)]
struct AppState {
    config: Arc<StreamableHttpConfig>,
    registry: Arc<SessionRegistry>,
    event_store: Arc<dyn EventStore>,
    on_session: NewSessionFn,
}

/// Build the axum [`Router`] implementing the Streamable HTTP transport:
/// POST/GET/DELETE all mounted at `config.mount_path`. Returned alongside
/// the [`SessionRegistry`] backing it, so the hosting binary can run its own
/// `tokio::time::interval` loop calling [`SessionRegistry::evict_idle`] —
/// `mcp-streamable-http` does not spawn background tasks of its own.
///
/// `on_session` runs for every new session this router accepts. In
/// stateless mode it runs once per POST, since there is no session to share
/// across calls.
#[must_use]
pub fn router(
    config: StreamableHttpConfig,
    event_store: Arc<dyn EventStore>,
    on_session: NewSessionFn,
) -> (Router, Arc<SessionRegistry>) {
    let mount_path = config.mount_path.clone();
    let registry = Arc::new(SessionRegistry::new(config.max_sessions));
    let state = AppState { registry: registry.clone(), config: Arc::new(config), event_store, on_session };

    let router = Router::new()
        .route(&mount_path, post(handle_post).get(handle_get).delete(handle_delete))
        .with_state(state);
    (router, registry)
}

fn origin_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::ORIGIN).and_then(|v| v.to_str().ok())
}

async fn handle_post(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if !state.config.accepts_origin(origin_header(&headers)) {
        return StatusCode::FORBIDDEN.into_response();
    }
    if body.len() > state.config.max_body_size {
        return StatusCode::PAYLOAD_TOO_LARGE.into_response();
    }

    let text = match std::str::from_utf8(&body) {
        Ok(text) => text,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };
    let message = match JsonRpcMessage::parse(text) {
        Ok(message) => message,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };
    let session_id = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()).map(str::to_string);
    let payload = body.clone();

    match message {
        JsonRpcMessage::Request(request) => handle_post_request(&state, session_id, request, payload).await,
        JsonRpcMessage::Notification(_) | JsonRpcMessage::Response(_) => {
            handle_post_fire_and_forget(&state, session_id.as_deref(), payload).await
        }
    }
}

async fn handle_post_fire_and_forget(state: &AppState, session_id: Option<&str>, payload: bytes::Bytes) -> Response {
    let Some(session_id) = session_id else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let Some(session) = state.registry.get(session_id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    session.touch();
    session.feed_inbound(TransportMessage::new(payload));
    StatusCode::ACCEPTED.into_response()
}

/// Create a fresh session, register it unless running stateless, and hand
/// its transport half to `state.on_session`.
fn open_session(state: &AppState) -> (Arc<HttpSessionState>, String) {
    if !state.config.stateless {
        if let Some(evicted) = state.registry.make_room() {
            warn!(session = %evicted.id(), "evicting idlest session: max_sessions exceeded");
        }
    }
    let id = Uuid::new_v4().to_string();
    let (session, rx) = HttpSessionState::new(id.clone(), state.event_store.clone());
    if !state.config.stateless {
        state.registry.insert(session.clone());
    }
    let mut transport = HttpServerTransport::new(session.clone(), rx);
    transport.transport_state = TransportState::Connected;
    (state.on_session)(transport);
    (session, id)
}

async fn handle_post_request(
    state: &AppState,
    session_id: Option<String>,
    request: JsonRpcRequest,
    payload: bytes::Bytes,
) -> Response {
    let (session, session_id, is_new) = if state.config.stateless {
        let (session, id) = open_session(state);
        (session, id, true)
    } else {
        match session_id {
            Some(id) => match state.registry.get(&id) {
                Some(session) => (session, id, false),
                None => return StatusCode::NOT_FOUND.into_response(),
            },
            None => {
                let (session, id) = open_session(state);
                (session, id, true)
            }
        }
    };

    session.touch();
    let waiter = session.register_post_waiter(request.id.clone());
    session.feed_inbound(TransportMessage::new(payload));

    let reply = match tokio::time::timeout(POST_REPLY_TIMEOUT, waiter).await {
        Ok(Ok(message)) => message,
        Ok(Err(_)) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        Err(_) => return StatusCode::GATEWAY_TIMEOUT.into_response(),
    };

    let body: Value = match serde_json::from_slice(&reply.payload) {
        Ok(value) => value,
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    let mut response_headers = HeaderMap::new();
    if is_new && !state.config.stateless {
        if let Ok(value) = HeaderValue::from_str(&session_id) {
            response_headers.insert(SESSION_HEADER, value);
        }
    }
    (StatusCode::OK, response_headers, Json(body)).into_response()
}

async fn handle_get(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if state.config.stateless {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    if !state.config.accepts_origin(origin_header(&headers)) {
        return StatusCode::FORBIDDEN.into_response();
    }
    let accept = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()).unwrap_or("");
    if !accept.contains("text/event-stream") {
        return StatusCode::NOT_ACCEPTABLE.into_response();
    }
    let Some(session_id) = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let Some(session) = state.registry.get(session_id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    session.touch();

    let mut backlog = Vec::new();
    if let Some(last_event_id) = headers.get(LAST_EVENT_HEADER).and_then(|v| v.to_str().ok()) {
        match session.replay_unsolicited(last_event_id).await {
            Some(events) => backlog = events,
            // Unresolvable id: the stream has expired or never existed.
            // The client must restart rather than resume (§4.4).
            None => return StatusCode::NOT_FOUND.into_response(),
        }
    }

    let (tx, rx) = mpsc::unbounded_channel::<DeliveredEvent>();
    session.add_unsolicited_sender(tx);

    let keep_alive = state.config.keep_alive;
    let stream = async_stream::stream! {
        for event in backlog {
            yield Ok::<Event, Infallible>(to_sse_event(event));
        }
        let mut rx = rx;
        while let Some(event) = rx.recv().await {
            yield Ok(to_sse_event(event));
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(keep_alive)).into_response()
}

fn to_sse_event(delivered: DeliveredEvent) -> Event {
    Event::default().id(delivered.id).event(delivered.event.event_type).data(delivered.event.data)
}

async fn handle_delete(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if state.config.stateless {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    let Some(session_id) = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok()) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    match state.registry.remove(session_id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::InMemoryEventStore;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Mutex;
    use tower::ServiceExt;

    fn test_router(config: StreamableHttpConfig) -> (Router, Arc<Mutex<Vec<HttpServerTransport>>>) {
        let spawned = Arc::new(Mutex::new(Vec::new()));
        let captured = spawned.clone();
        let on_session: NewSessionFn = Arc::new(move |transport| {
            captured.lock().unwrap().push(transport);
        });
        let (router, _registry) = router(config, Arc::new(InMemoryEventStore::default()), on_session);
        (router, spawned)
    }

    #[tokio::test]
    async fn initialize_post_without_a_session_id_opens_a_new_session() {
        let (router, spawned) = test_router(StreamableHttpConfig::default());
        let body = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#;

        // Nothing will ever answer this POST's waiter, so it will time out;
        // what matters here is that a session was opened and handed off.
        let request = Request::post("/mcp")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        let _ = tokio::time::timeout(Duration::from_millis(50), router.oneshot(request)).await;
        assert_eq!(spawned.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn notification_without_a_known_session_is_rejected() {
        let (router, _spawned) = test_router(StreamableHttpConfig::default());
        let body = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        let request = Request::post("/mcp")
            .header(SESSION_HEADER, "unknown")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_without_session_header_is_a_bad_request() {
        let (router, _spawned) = test_router(StreamableHttpConfig::default());
        let request = Request::delete("/mcp").body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_is_rejected_in_stateless_mode() {
        let (router, _spawned) = test_router(StreamableHttpConfig::stateless());
        let request = Request::get("/mcp")
            .header(header::ACCEPT, "text/event-stream")
            .header(SESSION_HEADER, "anything")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn get_without_event_stream_accept_is_rejected() {
        let (router, _spawned) = test_router(StreamableHttpConfig::default());
        let request = Request::get("/mcp").body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
    }
}
