//! The outgoing-request correlation table (§3 Session, §5 Shared resources).
//!
//! One lock, mutated only by the session: register a completion when a
//! request goes out, resolve it when the matching response arrives, remove
//! it if the caller cancels first.

use mcp_core::{JsonRpcResponsePayload, RequestId};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::oneshot;

use crate::error::{SessionError, SessionResult};

/// A single outstanding request's completion slot.
type Completion = oneshot::Sender<JsonRpcResponsePayload>;

/// Thread-safe table of `request id -> pending completion`.
#[derive(Default)]
pub struct PendingRequestTable {
    inner: Mutex<HashMap<RequestId, Completion>>,
}

impl PendingRequestTable {
    /// Build an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id` as awaiting a response, returning the receiver half.
    pub fn register(&self, id: RequestId) -> oneshot::Receiver<JsonRpcResponsePayload> {
        let (tx, rx) = oneshot::channel();
        self.inner.lock().insert(id, tx);
        rx
    }

    /// Resolve `id` with the peer's response payload. Returns `false` if no
    /// request with that id was pending (§4.6: "an unmatched id is logged
    /// and dropped").
    pub fn complete(&self, id: &RequestId, payload: JsonRpcResponsePayload) -> bool {
        if let Some(tx) = self.inner.lock().remove(id) {
            let _ = tx.send(payload);
            true
        } else {
            false
        }
    }

    /// Remove `id` without resolving it — used when the caller cancels an
    /// outgoing request before a response arrives (§5 Cancellation).
    pub fn remove(&self, id: &RequestId) {
        self.inner.lock().remove(id);
    }

    /// Drain every pending entry, dropping each sender so awaiting callers
    /// observe a closed channel (§7: transport closed fails all pending
    /// requests).
    pub fn fail_all(&self) {
        self.inner.lock().clear();
    }

    /// Number of requests currently awaiting a response.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// `true` if no requests are outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Await `rx`, translating a closed channel (transport death or explicit
/// `fail_all`) into [`SessionError::TransportClosed`].
///
/// # Errors
///
/// Returns [`SessionError::TransportClosed`] if the sender was dropped
/// without completing, or [`SessionError::Protocol`] if the peer answered
/// with a JSON-RPC error.
pub async fn await_completion(
    rx: oneshot::Receiver<JsonRpcResponsePayload>,
) -> SessionResult<serde_json::Value> {
    match rx.await {
        Ok(JsonRpcResponsePayload::Success { result }) => Ok(result),
        Ok(JsonRpcResponsePayload::Error { error }) => Err(SessionError::Protocol(error)),
        Err(_) => Err(SessionError::TransportClosed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn complete_resolves_the_matching_receiver() {
        let table = PendingRequestTable::new();
        let id = RequestId::Number(1);
        let rx = table.register(id.clone());
        assert!(table.complete(&id, JsonRpcResponsePayload::Success { result: serde_json::json!(42) }));
        let result = await_completion(rx).await.unwrap();
        assert_eq!(result, serde_json::json!(42));
    }

    #[test]
    fn complete_on_unknown_id_returns_false() {
        let table = PendingRequestTable::new();
        assert!(!table.complete(&RequestId::Number(99), JsonRpcResponsePayload::Success { result: serde_json::json!(null) }));
    }

    #[tokio::test]
    async fn fail_all_closes_every_pending_receiver() {
        let table = PendingRequestTable::new();
        let rx1 = table.register(RequestId::Number(1));
        let rx2 = table.register(RequestId::Number(2));
        table.fail_all();
        assert!(await_completion(rx1).await.is_err());
        assert!(await_completion(rx2).await.is_err());
    }

    #[tokio::test]
    async fn remove_drops_without_resolving() {
        let table = PendingRequestTable::new();
        let id = RequestId::Number(1);
        let rx = table.register(id.clone());
        table.remove(&id);
        assert!(matches!(await_completion(rx).await, Err(SessionError::TransportClosed)));
    }
}
