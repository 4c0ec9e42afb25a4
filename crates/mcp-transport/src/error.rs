//! Transport-level errors, distinct from the protocol errors in
//! [`mcp_core::Error`] — these describe failures in moving bytes, not in
//! the JSON-RPC content those bytes carry.

use thiserror::Error;

/// Result alias for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Failures a [`crate::Transport`] implementation can report.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum TransportError {
    /// Failed to establish a connection.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// An established connection was lost mid-session.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// Failed to write a message.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Failed to read a message.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// The bytes on the wire didn't parse as a JSON-RPC message.
    #[error("serialization failed: {0}")]
    SerializationFailed(String),

    /// The operation exceeded its configured timeout.
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// A message exceeded the configured size limit before it was sent or
    /// after it was received.
    #[error("message of {size} bytes exceeds the {max}-byte limit")]
    MessageTooLarge {
        /// The message's actual size.
        size: usize,
        /// The configured limit.
        max: usize,
    },

    /// The transport was asked to operate before `connect` or after
    /// `disconnect`.
    #[error("transport is not connected")]
    NotConnected,

    /// The requested transport kind isn't available on this platform/build.
    #[error("transport not available: {0}")]
    NotAvailable(String),

    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationFailed(err.to_string())
    }
}
