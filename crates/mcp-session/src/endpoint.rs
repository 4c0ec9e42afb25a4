//! The session dispatch loop (§4.6): one task owns the transport exclusively
//! and talks to the rest of the program over channels, matching the
//! [`mcp_transport::Transport`] contract's documented usage pattern.

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use mcp_core::{
    JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId,
};
use mcp_protocol::ErrorCode;
use mcp_transport::{Transport, TransportMessage};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::filter::{FilterContext, IncomingMessageFilter, MethodHandler, OutgoingMessageFilter};
use crate::ids::RequestIdAllocator;
use crate::notifications::NotificationRegistry;
use crate::pending::{await_completion, PendingRequestTable};
use crate::tracing_ctx;

/// Tracks the cancellation token for each request currently executing on
/// this side, so an inbound `notifications/cancelled` can reach it (§4.6).
type InflightTable = DashMap<RequestId, CancellationToken>;

/// A live MCP session: one dispatch loop over one transport, with a
/// method table, a notification registry, and the filter/message-filter
/// chains wrapping both directions (§4.6, §4.7).
///
/// Cloning a [`Session`] is cheap — it shares the same background task and
/// tables; use it to hand a session handle to multiple call sites.
#[derive(Clone)]
pub struct Session {
    outbound_tx: mpsc::UnboundedSender<JsonRpcMessage>,
    pending: Arc<PendingRequestTable>,
    ids: Arc<RequestIdAllocator>,
    inflight: Arc<InflightTable>,
    methods: Arc<DashMap<String, MethodHandler>>,
    notifications: Arc<NotificationRegistry>,
    incoming_filters: Arc<RwLock<Vec<Arc<dyn IncomingMessageFilter>>>>,
    outgoing_filters: Arc<RwLock<Vec<Arc<dyn OutgoingMessageFilter>>>>,
    closed: CancellationToken,
}

impl Session {
    /// Spawn the dispatch loop over `transport`, connecting it first.
    ///
    /// # Errors
    ///
    /// Returns whatever [`Transport::connect`] returns.
    pub async fn spawn(mut transport: Box<dyn Transport>) -> SessionResult<Self> {
        transport.connect().await?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<JsonRpcMessage>();
        let pending = Arc::new(PendingRequestTable::new());
        let ids = Arc::new(RequestIdAllocator::new());
        let inflight: Arc<InflightTable> = Arc::new(DashMap::new());
        let methods: Arc<DashMap<String, MethodHandler>> = Arc::new(DashMap::new());
        let notifications = Arc::new(NotificationRegistry::new());
        let incoming_filters = Arc::new(RwLock::new(Vec::<Arc<dyn IncomingMessageFilter>>::new()));
        let outgoing_filters = Arc::new(RwLock::new(Vec::<Arc<dyn OutgoingMessageFilter>>::new()));
        let closed = CancellationToken::new();

        let session = Self {
            outbound_tx,
            pending: pending.clone(),
            ids,
            inflight: inflight.clone(),
            methods: methods.clone(),
            notifications: notifications.clone(),
            incoming_filters: incoming_filters.clone(),
            outgoing_filters: outgoing_filters.clone(),
            closed: closed.clone(),
        };

        let driver = Driver {
            transport,
            outbound_rx,
            pending,
            inflight,
            methods,
            notifications,
            incoming_filters,
            outgoing_filters,
            closed: closed.clone(),
            reply_tx: session.outbound_tx.clone(),
        };
        tokio::spawn(driver.run());

        Ok(session)
    }

    /// Register the handler (already composed with its filters) for
    /// `method`.
    pub fn register_method(&self, method: impl Into<String>, handler: MethodHandler) {
        self.methods.insert(method.into(), handler);
    }

    /// Register a notification handler for `method`.
    pub fn on_notification(&self, method: impl Into<String>, handler: Arc<dyn crate::notifications::NotificationHandler>) {
        self.notifications.on(method, handler);
    }

    /// Add an incoming-message filter, appended after any already
    /// registered (first-registered runs first, per §4.7).
    pub fn add_incoming_filter(&self, filter: Arc<dyn IncomingMessageFilter>) {
        self.incoming_filters.write().push(filter);
    }

    /// Add an outgoing-message filter, appended after any already
    /// registered.
    pub fn add_outgoing_filter(&self, filter: Arc<dyn OutgoingMessageFilter>) {
        self.outgoing_filters.write().push(filter);
    }

    /// Send a request and await its response, injecting the current trace
    /// context into `_meta.traceparent` (§4.6).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TransportClosed`] if the session's driver has
    /// exited, or [`SessionError::Protocol`] if the peer answered with an
    /// error.
    pub async fn call(&self, method: impl Into<String>, params: Option<serde_json::Value>) -> SessionResult<serde_json::Value> {
        let method = method.into();
        let id = self.ids.next();
        let params = inject_traceparent(params);
        let rx = self.pending.register(id.clone());

        let request = JsonRpcRequest::new(method.clone(), params, id.clone());
        if self.outbound_tx.send(JsonRpcMessage::Request(request)).is_err() {
            self.pending.remove(&id);
            return Err(SessionError::TransportClosed);
        }

        tokio::select! {
            result = await_completion(rx) => result,
            () = self.closed.cancelled() => Err(SessionError::TransportClosed),
        }
    }

    /// Send a request, but abandon it (notifying the peer via
    /// `notifications/cancelled`) if `cancel` fires before a response
    /// arrives (§4.6, §5 Cancellation).
    ///
    /// # Errors
    ///
    /// As [`Self::call`], plus [`SessionError::Cancelled`] if `cancel` fires
    /// first.
    pub async fn call_cancellable(
        &self,
        method: impl Into<String>,
        params: Option<serde_json::Value>,
        cancel: CancellationToken,
    ) -> SessionResult<serde_json::Value> {
        let method = method.into();
        let id = self.ids.next();
        let params = inject_traceparent(params);
        let rx = self.pending.register(id.clone());

        let request = JsonRpcRequest::new(method, params, id.clone());
        if self.outbound_tx.send(JsonRpcMessage::Request(request)).is_err() {
            self.pending.remove(&id);
            return Err(SessionError::TransportClosed);
        }

        tokio::select! {
            result = await_completion(rx) => result,
            () = cancel.cancelled() => {
                self.pending.remove(&id);
                let _ = self.notify(
                    "notifications/cancelled",
                    Some(serde_json::json!({ "requestId": request_id_to_json(&id) })),
                );
                Err(SessionError::Cancelled)
            }
            () = self.closed.cancelled() => Err(SessionError::TransportClosed),
        }
    }

    /// Send a fire-and-forget notification.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TransportClosed`] if the driver has exited.
    pub fn notify(&self, method: impl Into<String>, params: Option<serde_json::Value>) -> SessionResult<()> {
        let notification = JsonRpcNotification::new(method, params);
        self.outbound_tx
            .send(JsonRpcMessage::Notification(notification))
            .map_err(|_| SessionError::TransportClosed)
    }

    /// `true` once the driver has observed the transport close.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// A `CancellationToken` that fires when this session's transport
    /// closes, so long-lived handlers can select on it.
    #[must_use]
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }
}

fn inject_traceparent(params: Option<serde_json::Value>) -> Option<serde_json::Value> {
    let Some(traceparent) = tracing_ctx::current_traceparent() else {
        return params;
    };
    let mut params = params.unwrap_or_else(|| serde_json::json!({}));
    if let Some(obj) = params.as_object_mut() {
        let meta = obj.entry("_meta").or_insert_with(|| serde_json::json!({}));
        if let Some(meta_obj) = meta.as_object_mut() {
            meta_obj.insert("traceparent".to_string(), serde_json::json!(traceparent));
        }
    }
    Some(params)
}

fn request_id_to_json(id: &RequestId) -> serde_json::Value {
    match id {
        RequestId::String(s) => serde_json::json!(s),
        RequestId::Number(n) => serde_json::json!(n),
    }
}

/// The background task that owns the transport. Receives inbound messages
/// and routes them; drains `outbound_rx` and serializes each message out.
struct Driver {
    transport: Box<dyn Transport>,
    outbound_rx: mpsc::UnboundedReceiver<JsonRpcMessage>,
    pending: Arc<PendingRequestTable>,
    inflight: Arc<InflightTable>,
    methods: Arc<DashMap<String, MethodHandler>>,
    notifications: Arc<NotificationRegistry>,
    incoming_filters: Arc<RwLock<Vec<Arc<dyn IncomingMessageFilter>>>>,
    outgoing_filters: Arc<RwLock<Vec<Arc<dyn OutgoingMessageFilter>>>>,
    closed: CancellationToken,
    reply_tx: mpsc::UnboundedSender<JsonRpcMessage>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                outbound = self.outbound_rx.recv() => {
                    match outbound {
                        Some(message) => self.send_outbound(message).await,
                        None => break,
                    }
                }

                received = self.transport.receive() => {
                    match received {
                        Ok(Some(message)) => self.handle_inbound(message),
                        Ok(None) => {
                            debug!("peer closed the transport");
                            break;
                        }
                        Err(error) => {
                            warn!(%error, "transport receive failed");
                            break;
                        }
                    }
                }
            }
        }

        self.pending.fail_all();
        self.closed.cancel();
        let _ = self.transport.disconnect().await;
        info!("session driver exited");
    }

    async fn send_outbound(&mut self, message: JsonRpcMessage) {
        let message = {
            let filters = self.outgoing_filters.read().clone();
            let mut current = Some(message);
            for filter in filters {
                let Some(msg) = current else { break };
                current = filter.filter(msg).await;
            }
            current
        };
        let Some(message) = message else {
            debug!("outgoing message suppressed by a filter");
            return;
        };

        let payload = Bytes::from(message.to_line().into_bytes());
        if let Err(error) = self.transport.send(TransportMessage::new(payload)).await {
            error!(%error, "failed to send message");
        }
    }

    fn handle_inbound(&mut self, message: TransportMessage) {
        let text = match std::str::from_utf8(&message.payload) {
            Ok(text) => text,
            Err(error) => {
                warn!(%error, "inbound message was not valid UTF-8");
                return;
            }
        };
        let parsed = match JsonRpcMessage::parse(text) {
            Ok(parsed) => parsed,
            Err(error) => {
                warn!(%error, "failed to parse inbound JSON-RPC message");
                return;
            }
        };

        match parsed {
            JsonRpcMessage::Request(request) => self.handle_request(request),
            JsonRpcMessage::Notification(notification) => self.handle_notification(notification),
            JsonRpcMessage::Response(response) => self.handle_response(response),
        }
    }

    fn handle_request(&self, request: JsonRpcRequest) {
        if request.method == "notifications/cancelled" {
            // not a request in practice, but guard against a misbehaving peer
            return;
        }

        let traceparent = request.meta_field("traceparent").and_then(|v| v.as_str().map(str::to_string));
        let token = CancellationToken::new();
        self.inflight.insert(request.id.clone(), token.clone());

        let methods = self.methods.clone();
        let incoming_filters = self.incoming_filters.read().clone();
        let inflight = self.inflight.clone();
        let reply_tx = self.reply_tx.clone();

        tokio::spawn(async move {
            let span = tracing::info_span!("mcp.request", method = %request.method);
            if let Some(ref tp) = traceparent {
                tracing_ctx::attach_parent(&span, tp);
            }
            let _entered = span.enter();

            let outcome = dispatch_request(&request, &methods, &incoming_filters, &token).await;
            inflight.remove(&request.id);

            let response = match outcome {
                Ok(result) => JsonRpcResponse::success(result, request.id),
                Err(error) => JsonRpcResponse::error(error.into_wire_error(), request.id),
            };
            let _ = reply_tx.send(JsonRpcMessage::Response(response));
        });
    }

    fn handle_notification(&self, notification: JsonRpcNotification) {
        if notification.method == "notifications/cancelled" {
            if let Some(id) = notification
                .params
                .as_ref()
                .and_then(|p| p.get("requestId"))
                .and_then(json_to_request_id)
            {
                if let Some((_, token)) = self.inflight.remove(&id) {
                    token.cancel();
                }
            }
            return;
        }

        let notifications = self.notifications.clone();
        tokio::spawn(async move {
            notifications.dispatch(&notification.method, notification.params).await;
        });
    }

    fn handle_response(&self, response: JsonRpcResponse) {
        let Some(id) = response.id.0.clone() else {
            warn!("received a response with a null id");
            return;
        };
        if !self.pending.complete(&id, response.payload) {
            warn!(%id, "received a response with no matching pending request");
        }
    }
}

async fn dispatch_request(
    request: &JsonRpcRequest,
    methods: &DashMap<String, MethodHandler>,
    incoming_filters: &[Arc<dyn IncomingMessageFilter>],
    cancel: &CancellationToken,
) -> SessionResult<serde_json::Value> {
    for filter in incoming_filters {
        if let Some(outcome) = filter.intercept(&request.method, request.params.as_ref()).await {
            return outcome;
        }
    }

    let Some(handler) = methods.get(&request.method).map(|entry| entry.clone()) else {
        return Err(SessionError::MethodNotFound(request.method.clone()));
    };

    let mut ctx = FilterContext::with_cancel(request.method.clone(), request.params.clone(), cancel.clone());
    handler.dispatch(&mut ctx).await
}

fn json_to_request_id(value: &serde_json::Value) -> Option<RequestId> {
    if let Some(s) = value.as_str() {
        Some(RequestId::String(s.to_string()))
    } else {
        value.as_i64().map(RequestId::Number)
    }
}

/// Build a bare JSON-RPC error response for a request that failed before a
/// method could even be resolved (parse failures never reach here; this
/// covers defensive call sites that want the wire type without going
/// through [`Session`]).
#[must_use]
pub fn error_response(code: ErrorCode, message: impl Into<String>, id: RequestId) -> JsonRpcResponse {
    JsonRpcResponse::error(JsonRpcError::new(code.code(), message), id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mcp_transport::{LimitsConfig, TimeoutConfig, TransportCapabilities, TransportKind, TransportMetrics, TransportState};
    use tokio::sync::mpsc as tokio_mpsc;

    struct PairTransport {
        state: TransportState,
        limits: LimitsConfig,
        timeouts: TimeoutConfig,
        inbound: tokio_mpsc::UnboundedReceiver<TransportMessage>,
        outbound: tokio_mpsc::UnboundedSender<TransportMessage>,
    }

    #[async_trait]
    impl Transport for PairTransport {
        fn kind(&self) -> TransportKind {
            TransportKind::Stdio
        }

        fn capabilities(&self) -> TransportCapabilities {
            TransportCapabilities::stdio()
        }

        fn state(&self) -> TransportState {
            self.state.clone()
        }

        async fn connect(&mut self) -> mcp_transport::TransportResult<()> {
            self.state = TransportState::Connected;
            Ok(())
        }

        async fn disconnect(&mut self) -> mcp_transport::TransportResult<()> {
            self.state = TransportState::Disconnected;
            Ok(())
        }

        async fn send(&mut self, message: TransportMessage) -> mcp_transport::TransportResult<()> {
            let _ = self.outbound.send(message);
            Ok(())
        }

        async fn receive(&mut self) -> mcp_transport::TransportResult<Option<TransportMessage>> {
            Ok(self.inbound.recv().await)
        }

        fn limits(&self) -> &LimitsConfig {
            &self.limits
        }

        fn timeouts(&self) -> &TimeoutConfig {
            &self.timeouts
        }

        fn metrics(&self) -> TransportMetrics {
            TransportMetrics::default()
        }
    }

    fn harness() -> (tokio_mpsc::UnboundedSender<TransportMessage>, tokio_mpsc::UnboundedReceiver<TransportMessage>, Box<dyn Transport>) {
        let (to_session_tx, to_session_rx) = tokio_mpsc::unbounded_channel();
        let (from_session_tx, from_session_rx) = tokio_mpsc::unbounded_channel();
        let transport = PairTransport {
            state: TransportState::Disconnected,
            limits: LimitsConfig::default(),
            timeouts: TimeoutConfig::default(),
            inbound: to_session_rx,
            outbound: from_session_tx,
        };
        (to_session_tx, from_session_rx, Box::new(transport))
    }

    #[tokio::test]
    async fn call_round_trips_through_a_synthesized_peer_response() {
        let (peer_in, mut peer_out, transport) = harness();
        let session = Session::spawn(transport).await.unwrap();

        let call = tokio::spawn({
            let session = session.clone();
            async move { session.call("ping", None).await }
        });

        let sent = tokio::time::timeout(std::time::Duration::from_secs(1), peer_out.recv())
            .await
            .unwrap()
            .unwrap();
        let parsed = JsonRpcMessage::parse(std::str::from_utf8(&sent.payload).unwrap()).unwrap();
        let JsonRpcMessage::Request(req) = parsed else { panic!("expected request") };
        assert_eq!(req.method, "ping");

        let response = JsonRpcResponse::success(serde_json::json!("pong"), req.id);
        let line = JsonRpcMessage::Response(response).to_line();
        peer_in.send(TransportMessage::new(Bytes::from(line.into_bytes()))).unwrap();

        let result = tokio::time::timeout(std::time::Duration::from_secs(1), call)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(result, serde_json::json!("pong"));
    }

    #[tokio::test]
    async fn unregistered_method_returns_method_not_found() {
        let (peer_in, mut peer_out, transport) = harness();
        let _session = Session::spawn(transport).await.unwrap();

        let request = JsonRpcRequest::new("bogus/method", None, 1i64);
        let line = JsonRpcMessage::Request(request).to_line();
        peer_in.send(TransportMessage::new(Bytes::from(line.into_bytes()))).unwrap();

        let reply = tokio::time::timeout(std::time::Duration::from_secs(1), peer_out.recv())
            .await
            .unwrap()
            .unwrap();
        let parsed = JsonRpcMessage::parse(std::str::from_utf8(&reply.payload).unwrap()).unwrap();
        let JsonRpcMessage::Response(resp) = parsed else { panic!("expected response") };
        assert!(!resp.is_success());
        assert_eq!(resp.error_payload().unwrap().code, -32601);
    }

    #[tokio::test]
    async fn notification_dispatches_to_registered_handler() {
        let (peer_in, _peer_out, transport) = harness();
        let session = Session::spawn(transport).await.unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        session.on_notification(
            "notifications/progress",
            Arc::new(move |params: Option<serde_json::Value>| {
                let _ = tx.send(params);
            }),
        );

        let notification = JsonRpcNotification::new("notifications/progress", Some(serde_json::json!({"pct": 50})));
        let line = JsonRpcMessage::Notification(notification).to_line();
        peer_in.send(TransportMessage::new(Bytes::from(line.into_bytes()))).unwrap();

        let received = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
        assert_eq!(received, Some(serde_json::json!({"pct": 50})));
    }

    #[tokio::test]
    async fn dropping_the_peer_closes_the_session() {
        let (peer_in, _peer_out, transport) = harness();
        let session = Session::spawn(transport).await.unwrap();
        drop(peer_in);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(session.is_closed());
    }
}
