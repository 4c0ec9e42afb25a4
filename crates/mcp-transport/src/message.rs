//! The envelope a transport moves, one level below the JSON-RPC content it
//! carries. Kept byte-oriented (rather than typed on [`mcp_core::JsonRpcMessage`])
//! so a transport can enforce size limits and attach wire metadata (e.g. an
//! `Mcp-Session-Id` header) before a single byte is parsed.

use std::collections::HashMap;

use bytes::Bytes;

/// A single message in flight over a transport.
#[derive(Debug, Clone)]
pub struct TransportMessage {
    /// The serialized JSON-RPC message.
    pub payload: Bytes,
    /// Transport-level metadata that travels alongside the payload.
    pub metadata: TransportMessageMetadata,
}

impl TransportMessage {
    /// Wrap a payload with no metadata.
    #[must_use]
    pub fn new(payload: Bytes) -> Self {
        Self {
            payload,
            metadata: TransportMessageMetadata::default(),
        }
    }

    /// Wrap a payload with metadata.
    #[must_use]
    pub const fn with_metadata(payload: Bytes, metadata: TransportMessageMetadata) -> Self {
        Self { payload, metadata }
    }

    /// The payload's length in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.payload.len()
    }
}

/// Metadata carried alongside a [`TransportMessage`]. Each transport decides
/// which fields it populates; none are mandatory.
#[derive(Debug, Clone, Default)]
pub struct TransportMessageMetadata {
    /// The session this message belongs to, for transports that multiplex
    /// several sessions over shared infrastructure (§4.4).
    pub session_id: Option<String>,
    /// SSE stream id and event sequence, for resumable delivery (§4.5).
    pub event_id: Option<String>,
    /// Arbitrary transport-specific headers (e.g. `traceparent`, §4.9).
    pub headers: HashMap<String, String>,
}

impl TransportMessageMetadata {
    /// Attach a session id.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Attach an SSE event id.
    #[must_use]
    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    /// Add a header, overwriting any prior value for the same key.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_reflects_payload_length() {
        let message = TransportMessage::new(Bytes::from_static(b"{}"));
        assert_eq!(message.size(), 2);
    }

    #[test]
    fn metadata_builder_accumulates_headers() {
        let metadata = TransportMessageMetadata::default()
            .with_session_id("sess-1")
            .with_header("traceparent", "00-abc-def-01");
        assert_eq!(metadata.session_id.as_deref(), Some("sess-1"));
        assert_eq!(
            metadata.headers.get("traceparent").map(String::as_str),
            Some("00-abc-def-01")
        );
    }
}
