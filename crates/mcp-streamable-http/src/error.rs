//! Error types for the Streamable HTTP transport and its event store.

use thiserror::Error;

/// Errors raised by [`crate::event_store`] and [`crate::transport`].
#[derive(Debug, Error, Clone)]
pub enum StreamableError {
    /// A write was attempted against a stream already marked complete.
    #[error("stream '{0}' has already been disposed")]
    StreamDisposed(String),

    /// The session id presented by a request does not match any tracked
    /// session (§4.5: the HTTP layer turns this into a 404; the client
    /// must restart).
    #[error("unknown session id '{0}'")]
    UnknownSession(String),

    /// The deployment is running in stateless mode, which disallows the
    /// operation attempted (GET, DELETE, or any server-initiated message).
    #[error("operation unavailable in stateless mode")]
    StatelessModeUnavailable,

    /// The transport was not connected when an operation requiring a live
    /// connection was attempted.
    #[error("transport not connected")]
    NotConnected,

    /// A message failed to serialize or deserialize as JSON-RPC.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// Convenience alias for this crate's fallible operations.
pub type StreamableResult<T> = Result<T, StreamableError>;

impl From<StreamableError> for mcp_transport::TransportError {
    fn from(err: StreamableError) -> Self {
        match err {
            StreamableError::StreamDisposed(s) => Self::SendFailed(format!("stream disposed: {s}")),
            StreamableError::UnknownSession(s) => Self::ConnectionLost(format!("unknown session: {s}")),
            StreamableError::StatelessModeUnavailable => {
                Self::NotAvailable("stateless mode".to_string())
            }
            StreamableError::NotConnected => Self::NotConnected,
            StreamableError::Serialization(s) => Self::SerializationFailed(s),
        }
    }
}
