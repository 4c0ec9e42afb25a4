//! Transport identity and lifecycle state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which wire mechanism a [`crate::Transport`] speaks (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Newline-delimited JSON-RPC over stdin/stdout (§4.3).
    Stdio,
    /// HTTP POST/GET/DELETE with optional resumable SSE streams (§4.4, §4.5).
    StreamableHttp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::StreamableHttp => write!(f, "streamable-http"),
        }
    }
}

/// Where a transport is in its connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportState {
    /// Not yet connected, or already disconnected.
    Disconnected,
    /// `connect` is in progress.
    Connecting,
    /// Ready to send and receive.
    Connected,
    /// `disconnect` is in progress.
    Disconnecting,
    /// An unrecoverable error occurred; the transport must be reconstructed.
    Failed {
        /// What went wrong.
        reason: String,
    },
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnecting => write!(f, "disconnecting"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// What a transport implementation can do, reported so a session can adapt
/// (e.g. only attempt resumption against a transport that supports it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportCapabilities {
    /// Whether messages may arrive out of order with respect to requests
    /// sent on the same connection (true for Streamable HTTP's parallel
    /// SSE streams, false for stdio's single ordered pipe).
    pub supports_multiplexing: bool,
    /// Whether a dropped connection can resume a prior session rather than
    /// starting over (§4.5 resumability via `Last-Event-Id`).
    pub supports_resumption: bool,
}

impl TransportCapabilities {
    /// Capabilities of the stdio transport: single ordered stream, no
    /// resumption (a dropped process is gone).
    #[must_use]
    pub const fn stdio() -> Self {
        Self {
            supports_multiplexing: false,
            supports_resumption: false,
        }
    }

    /// Capabilities of the Streamable HTTP transport.
    #[must_use]
    pub const fn streamable_http() -> Self {
        Self {
            supports_multiplexing: true,
            supports_resumption: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_kind_displays_lowercase() {
        assert_eq!(TransportKind::Stdio.to_string(), "stdio");
        assert_eq!(TransportKind::StreamableHttp.to_string(), "streamable-http");
    }

    #[test]
    fn failed_state_carries_reason() {
        let state = TransportState::Failed {
            reason: "peer closed".to_string(),
        };
        assert_eq!(state.to_string(), "failed: peer closed");
    }
}
