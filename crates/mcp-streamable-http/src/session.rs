//! Per-session state for the server side of the Streamable HTTP transport
//! (§4.5): the piece that outlives any single HTTP request and is shared
//! between the axum handlers in [`crate::transport`] and the
//! [`crate::transport::HttpServerTransport`] driving that session's
//! `Session`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use mcp_core::{JsonRpcMessage, RequestId};
use mcp_transport::TransportMessage;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::event_store::{DeliveredEvent, EventStore, StoredEvent};

/// The stream id used for a session's long-lived GET stream, distinct from
/// the ephemeral reply path a POST request correlates on by request id.
pub const UNSOLICITED_STREAM_ID: &str = "unsolicited";

/// Shared state for one `Mcp-Session-Id`.
///
/// Cloned (via `Arc`) into both the axum handlers that see this session's
/// HTTP traffic and the [`crate::transport::HttpServerTransport`] that a
/// `Session` drives — the two meet here rather than through the transport
/// directly, since HTTP requests and the transport's `send`/`receive` run on
/// entirely separate tasks.
pub struct HttpSessionState {
    id: String,
    event_store: Arc<dyn EventStore>,
    inbound_tx: Mutex<Option<mpsc::UnboundedSender<TransportMessage>>>,
    post_waiters: DashMap<RequestId, oneshot::Sender<TransportMessage>>,
    unsolicited_senders: Mutex<Vec<mpsc::UnboundedSender<DeliveredEvent>>>,
    touched_at: Mutex<Instant>,
    closed: AtomicBool,
}

impl HttpSessionState {
    /// Build a new session's state, returning it alongside the receiver half
    /// a [`crate::transport::HttpServerTransport`] reads incoming messages
    /// from.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        event_store: Arc<dyn EventStore>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<TransportMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Self {
            id: id.into(),
            event_store,
            inbound_tx: Mutex::new(Some(tx)),
            post_waiters: DashMap::new(),
            unsolicited_senders: Mutex::new(Vec::new()),
            touched_at: Mutex::new(Instant::now()),
            closed: AtomicBool::new(false),
        };
        (Arc::new(state), rx)
    }

    /// The `Mcp-Session-Id` this state belongs to.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// `true` once [`Self::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Reset the idle clock to now. Called on every HTTP request this
    /// session handles.
    pub fn touch(&self) {
        *self.touched_at.lock() = Instant::now();
    }

    /// How long since this session last saw any HTTP traffic.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.touched_at.lock().elapsed()
    }

    /// Hand an inbound (client-sent) message to the `Session` driving this
    /// session. Returns `false` if the session was already closed.
    pub fn feed_inbound(&self, message: TransportMessage) -> bool {
        match self.inbound_tx.lock().as_ref() {
            Some(tx) => tx.send(message).is_ok(),
            None => false,
        }
    }

    /// Register a one-shot waiter for the reply to `id`, so the POST handler
    /// that delivered the request carrying it can return the response
    /// directly rather than requiring the client to hold an open GET stream.
    pub fn register_post_waiter(&self, id: RequestId) -> oneshot::Receiver<TransportMessage> {
        let (tx, rx) = oneshot::channel();
        self.post_waiters.insert(id, tx);
        rx
    }

    fn complete_post_waiter(&self, id: &RequestId, message: &TransportMessage) -> bool {
        match self.post_waiters.remove(id) {
            Some((_, tx)) => tx.send(message.clone()).is_ok(),
            None => false,
        }
    }

    /// Register a sender for the session's unsolicited (GET) stream.
    pub fn add_unsolicited_sender(&self, tx: mpsc::UnboundedSender<DeliveredEvent>) {
        self.unsolicited_senders.lock().push(tx);
    }

    /// Replay every event after `last_event_id` on the unsolicited stream, or
    /// `None` if the id is unresolvable (expired or never issued) — the
    /// caller must then fail the resume and have the client restart (§4.4).
    pub async fn replay_unsolicited(&self, last_event_id: &str) -> Option<Vec<DeliveredEvent>> {
        self.event_store.read_from(last_event_id).await.ok().flatten()
    }

    /// Route a message the driving `Session` wants delivered to the peer:
    /// complete a waiting POST if this is the direct reply to it, otherwise
    /// persist it to the event store and fan it out to every open
    /// unsolicited stream.
    pub async fn route_outbound(&self, message: TransportMessage) {
        let Ok(text) = std::str::from_utf8(&message.payload) else {
            debug!(session = %self.id, "dropping outbound message: not valid UTF-8");
            return;
        };
        let text = text.to_string();

        if let Some(id) = Self::response_id(&text) {
            if self.complete_post_waiter(&id, &message) {
                return;
            }
        }

        let Ok(event_id) = self
            .event_store
            .write(&self.id, UNSOLICITED_STREAM_ID, StoredEvent::message(text.clone()))
            .await
        else {
            debug!(session = %self.id, "dropping outbound message: unsolicited stream already disposed");
            return;
        };
        let delivered = DeliveredEvent { id: event_id, event: StoredEvent::message(text) };
        self.unsolicited_senders.lock().retain(|tx| tx.send(delivered.clone()).is_ok());
    }

    /// The id of the response `text` carries, if it is a response at all —
    /// a server-initiated request or a notification has none to match
    /// against a POST waiter.
    fn response_id(text: &str) -> Option<RequestId> {
        match JsonRpcMessage::parse(text).ok()? {
            JsonRpcMessage::Response(response) => response.id.0,
            JsonRpcMessage::Request(_) | JsonRpcMessage::Notification(_) => None,
        }
    }

    /// Close the session: drop the inbound sender so the driving `Session`'s
    /// `transport.receive()` observes a clean peer-closed (`Ok(None)`), and
    /// drop every open SSE stream.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.inbound_tx.lock().take();
        self.unsolicited_senders.lock().clear();
    }
}

/// The live `Mcp-Session-Id -> HttpSessionState` table for a deployment,
/// with idlest-first eviction to bound memory under `max_sessions`.
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<HttpSessionState>>,
    max_sessions: usize,
}

impl SessionRegistry {
    /// Build a registry holding at most `max_sessions` live sessions.
    #[must_use]
    pub fn new(max_sessions: usize) -> Self {
        Self { sessions: DashMap::new(), max_sessions }
    }

    /// How many sessions are currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// `true` if no sessions are currently tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Look up a session by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<HttpSessionState>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// If the table is already at `max_sessions`, evict the idlest session
    /// and return it so the caller can log the eviction before closing it.
    pub fn make_room(&self) -> Option<Arc<HttpSessionState>> {
        if self.sessions.len() < self.max_sessions {
            return None;
        }
        let oldest = self
            .sessions
            .iter()
            .max_by_key(|entry| entry.value().idle_for())
            .map(|entry| entry.key().clone())?;
        self.remove(&oldest)
    }

    /// Track a newly created session.
    pub fn insert(&self, state: Arc<HttpSessionState>) {
        self.sessions.insert(state.id().to_string(), state);
    }

    /// Stop tracking a session, closing it so its driving `Session` winds
    /// down.
    pub fn remove(&self, id: &str) -> Option<Arc<HttpSessionState>> {
        self.sessions.remove(id).map(|(_, state)| {
            state.close();
            state
        })
    }

    /// Evict and return every session idle for at least `idle_timeout`, for
    /// a periodic sweep.
    pub fn evict_idle(&self, idle_timeout: Duration) -> Vec<Arc<HttpSessionState>> {
        let stale: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().idle_for() >= idle_timeout)
            .map(|entry| entry.key().clone())
            .collect();
        stale.iter().filter_map(|id| self.remove(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_store::InMemoryEventStore;
    use bytes::Bytes;
    use mcp_core::{JsonRpcNotification, JsonRpcResponse};

    fn store() -> Arc<dyn EventStore> {
        Arc::new(InMemoryEventStore::default())
    }

    #[tokio::test]
    async fn feed_inbound_delivers_to_the_transport_side() {
        let (state, mut rx) = HttpSessionState::new("sess-1", store());
        assert!(state.feed_inbound(TransportMessage::new(Bytes::from_static(b"{}"))));
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn close_drops_the_inbound_channel() {
        let (state, mut rx) = HttpSessionState::new("sess-1", store());
        state.close();
        assert!(!state.feed_inbound(TransportMessage::new(Bytes::from_static(b"{}"))));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn route_outbound_completes_a_matching_post_waiter() {
        let (state, _rx) = HttpSessionState::new("sess-1", store());
        let mut waiter = state.register_post_waiter(RequestId::Number(1));

        let response = JsonRpcResponse::success(serde_json::json!({"ok": true}), RequestId::Number(1));
        let payload = Bytes::from(JsonRpcMessage::Response(response).to_line().into_bytes());
        state.route_outbound(TransportMessage::new(payload)).await;

        let received = waiter.try_recv().expect("waiter completed");
        assert!(std::str::from_utf8(&received.payload).unwrap().contains("ok"));
    }

    #[tokio::test]
    async fn route_outbound_without_a_waiter_fans_out_to_open_streams() {
        let (state, _rx) = HttpSessionState::new("sess-1", store());
        let (tx, mut stream_rx) = mpsc::unbounded_channel();
        state.add_unsolicited_sender(tx);

        let notification = JsonRpcNotification::new("notifications/message", None);
        let payload = Bytes::from(JsonRpcMessage::Notification(notification).to_line().into_bytes());
        state.route_outbound(TransportMessage::new(payload)).await;

        let delivered = stream_rx.recv().await.expect("event delivered");
        assert!(delivered.event.data.contains("notifications/message"));
    }

    #[test]
    fn registry_evicts_the_idlest_session_to_make_room() {
        let registry = SessionRegistry::new(1);
        let (first, _rx1) = HttpSessionState::new("first", store());
        registry.insert(first);
        std::thread::sleep(Duration::from_millis(5));

        let evicted = registry.make_room().expect("registry at capacity");
        assert_eq!(evicted.id(), "first");
        assert!(evicted.is_closed());
        assert!(registry.is_empty());
    }

    #[test]
    fn registry_get_after_remove_is_none() {
        let registry = SessionRegistry::new(10);
        let (state, _rx) = HttpSessionState::new("sess-1", store());
        registry.insert(state);
        assert!(registry.get("sess-1").is_some());
        registry.remove("sess-1");
        assert!(registry.get("sess-1").is_none());
    }
}
