//! The `Transport` abstraction every wire binding implements (§4.2).
//!
//! Where the reference transport layer this crate is descended from models
//! async operations as hand-written `Pin<Box<dyn Future>>` return types,
//! implementations here use `#[async_trait]`: one more allocation per call in
//! exchange for trait methods that read like ordinary `async fn`s, which
//! matters more once `mcp-stdio` and `mcp-streamable-http` both implement
//! this trait and `mcp-session` drives either one interchangeably.

use async_trait::async_trait;

use crate::config::{LimitsConfig, TimeoutConfig};
use crate::error::TransportResult;
use crate::message::TransportMessage;
use crate::metrics::TransportMetrics;
use crate::types::{TransportCapabilities, TransportKind, TransportState};

/// A bidirectional channel that moves serialized JSON-RPC messages between a
/// session and its peer.
///
/// Implementations are not required to be `Sync`; `mcp-session` holds each
/// transport behind its own task and talks to it over channels rather than
/// sharing a reference across threads.
#[async_trait]
pub trait Transport: Send {
    /// Which wire mechanism this is.
    fn kind(&self) -> TransportKind;

    /// What this transport can do.
    fn capabilities(&self) -> TransportCapabilities;

    /// Where this transport is in its connection lifecycle.
    fn state(&self) -> TransportState;

    /// Establish the connection. Idempotent if already connected.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TransportError::ConnectionFailed`] if the underlying
    /// channel (subprocess, HTTP client) could not be established.
    async fn connect(&mut self) -> TransportResult<()>;

    /// Tear down the connection. Idempotent if already disconnected.
    ///
    /// # Errors
    ///
    /// Returns an error only if the underlying teardown itself fails (e.g.
    /// a child process that will not exit); callers should still treat the
    /// transport as unusable afterward.
    async fn disconnect(&mut self) -> TransportResult<()>;

    /// Send a single message to the peer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TransportError::NotConnected`] if called before
    /// `connect`, [`crate::TransportError::MessageTooLarge`] if the message
    /// exceeds the configured limit, or [`crate::TransportError::SendFailed`]
    /// on an I/O failure.
    async fn send(&mut self, message: TransportMessage) -> TransportResult<()>;

    /// Receive the next message from the peer, or `Ok(None)` if the peer
    /// closed the connection cleanly.
    ///
    /// # Errors
    ///
    /// Returns [`crate::TransportError::NotConnected`] if called before
    /// `connect`, or [`crate::TransportError::ReceiveFailed`] on an I/O or
    /// framing failure.
    async fn receive(&mut self) -> TransportResult<Option<TransportMessage>>;

    /// The size and timeout limits this transport enforces.
    fn limits(&self) -> &LimitsConfig;

    /// The timeout configuration this transport enforces.
    fn timeouts(&self) -> &TimeoutConfig;

    /// A snapshot of this transport's traffic counters (§10.1).
    fn metrics(&self) -> TransportMetrics;
}

/// A transport that can multiplex several logical sessions over one
/// underlying channel, reporting which session a received message belongs
/// to. Only Streamable HTTP implements this; stdio's one-pipe-per-process
/// model has exactly one session by construction.
#[async_trait]
pub trait MultiplexedTransport: Transport {
    /// The session id a just-received message was addressed to, if the
    /// underlying protocol carries one.
    fn session_id_of(&self, message: &TransportMessage) -> Option<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::AtomicMetrics;
    use bytes::Bytes;
    use std::sync::Arc;

    struct LoopbackTransport {
        state: TransportState,
        limits: LimitsConfig,
        timeouts: TimeoutConfig,
        metrics: Arc<AtomicMetrics>,
        inbox: Vec<TransportMessage>,
    }

    impl LoopbackTransport {
        fn new() -> Self {
            Self {
                state: TransportState::Disconnected,
                limits: LimitsConfig::default(),
                timeouts: TimeoutConfig::default(),
                metrics: Arc::new(AtomicMetrics::new()),
                inbox: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl Transport for LoopbackTransport {
        fn kind(&self) -> TransportKind {
            TransportKind::Stdio
        }

        fn capabilities(&self) -> TransportCapabilities {
            TransportCapabilities::stdio()
        }

        fn state(&self) -> TransportState {
            self.state.clone()
        }

        async fn connect(&mut self) -> TransportResult<()> {
            self.state = TransportState::Connected;
            self.metrics.record_connection(true);
            Ok(())
        }

        async fn disconnect(&mut self) -> TransportResult<()> {
            self.state = TransportState::Disconnected;
            Ok(())
        }

        async fn send(&mut self, message: TransportMessage) -> TransportResult<()> {
            self.metrics.record_sent(message.size() as u64);
            self.inbox.push(message);
            Ok(())
        }

        async fn receive(&mut self) -> TransportResult<Option<TransportMessage>> {
            let message = self.inbox.pop();
            if let Some(ref m) = message {
                self.metrics.record_received(m.size() as u64);
            }
            Ok(message)
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

    #[tokio::test]
    async fn loopback_round_trips_a_message() {
        let mut transport = LoopbackTransport::new();
        transport.connect().await.unwrap();
        transport
            .send(TransportMessage::new(Bytes::from_static(b"{\"jsonrpc\":\"2.0\"}")))
            .await
            .unwrap();
        let received = transport.receive().await.unwrap();
        assert!(received.is_some());
        assert_eq!(transport.metrics().messages_sent, 1);
        assert_eq!(transport.metrics().messages_received, 1);
    }
}
