//! Errors raised by the session/endpoint layer (§7).

use mcp_core::JsonRpcError;
use mcp_protocol::ErrorCode;

/// Result alias for session operations.
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Failures raised while dispatching or correlating messages at the session
/// layer, distinct from [`mcp_transport::TransportError`] (which describes
/// failures moving bytes) and [`mcp_core::Error`] (which describes failures
/// parsing them).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SessionError {
    /// The transport closed; outstanding and future requests cannot
    /// complete (§7 propagation policy: terminates the session).
    #[error("transport closed")]
    TransportClosed,

    /// An outgoing request was cancelled by its caller before a response
    /// arrived.
    #[error("request cancelled")]
    Cancelled,

    /// An outgoing request's deadline elapsed before a response arrived.
    #[error("request timed out")]
    Timeout,

    /// No handler is registered for the given method.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// A peer-reported JSON-RPC error, reconstructed at this layer so it
    /// can be inspected/propagated without losing `code`/`data` (§7).
    #[error("{0}")]
    Protocol(JsonRpcError),

    /// The `initialize` handshake did not complete within its configured
    /// deadline (§4.6, §7: fatal).
    #[error("initialization timed out")]
    InitializationTimeout,

    /// The peer's protocol version is incompatible with ours (§4.6, §7:
    /// fatal).
    #[error("protocol version mismatch: requested {requested}, server offered {offered}")]
    ProtocolVersionMismatch {
        /// What the client asked for.
        requested: String,
        /// What the server answered with.
        offered: String,
    },

    /// An authorization filter rejected the call (§4.7, §7).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Lower-layer transport failure.
    #[error(transparent)]
    Transport(#[from] mcp_transport::TransportError),

    /// Lower-layer codec failure.
    #[error(transparent)]
    Core(#[from] mcp_core::Error),
}

impl SessionError {
    /// Convert to the wire `JsonRpcError` this failure should be reported
    /// as, sanitizing handler-originated detail (§7 propagation policy:
    /// only primitives/serializable fields reach `error.data`).
    #[must_use]
    pub fn into_wire_error(self) -> JsonRpcError {
        match self {
            Self::MethodNotFound(method) => {
                JsonRpcError::new(ErrorCode::MethodNotFound.code(), format!("Method not found: {method}"))
            }
            Self::Protocol(err) => err,
            Self::Forbidden(message) => JsonRpcError::new(ErrorCode::InvalidRequest.code(), message),
            Self::Cancelled => JsonRpcError::new(ErrorCode::Application(-32800), "Request cancelled"),
            Self::Timeout => JsonRpcError::new(ErrorCode::Application(-32801), "Request timed out"),
            other => JsonRpcError::new(ErrorCode::InternalError.code(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_not_found_maps_to_standard_code() {
        let err = SessionError::MethodNotFound("tools/bogus".to_string());
        let wire = err.into_wire_error();
        assert_eq!(wire.code, -32601);
    }

    #[test]
    fn protocol_error_passes_through_unchanged() {
        let original = JsonRpcError::new(-32602, "bad params").with_data(serde_json::json!({"x": 1}));
        let err = SessionError::Protocol(original.clone());
        assert_eq!(err.into_wire_error(), original);
    }
}
