//! Errors surfaced by the client session convenience API (§7, §4.10).

use mcp_core::JsonRpcError;
use mcp_protocol::ErrorCode;
use mcp_session::SessionError;

/// Result alias for client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Failures a client session can raise, layered over [`SessionError`] with
/// the client-specific cases from §4.10/§7 (initialize handshake, URL
/// elicitation, child-process lifecycle).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ClientError {
    /// Lower-layer session/dispatch failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// `initialize` did not complete within its configured deadline (§4.6).
    #[error("initialize timed out")]
    InitializationTimeout,

    /// The server answered `initialize` with a protocol version this client
    /// does not speak.
    #[error("protocol version mismatch: requested {requested}, server offered {offered}")]
    ProtocolVersionMismatch {
        /// What this client asked for.
        requested: String,
        /// What the server answered with.
        offered: String,
    },

    /// A server-initiated request arrived for a capability (sampling,
    /// elicitation, roots) this client never registered a handler for.
    #[error("no handler registered for {0}")]
    UnsupportedRequest(&'static str),

    /// A server response carried the distinguished `-32042` "URL
    /// elicitation required" error, reconstructed into its typed form so a
    /// caller can drive the out-of-band flow (§7).
    #[error("URL elicitation required: {0}")]
    UrlElicitationRequired(JsonRpcError),

    /// Failed to spawn, communicate with, or terminate a child process
    /// backing a stdio transport (§4.3).
    #[error("child process error: {0}")]
    Process(#[from] std::io::Error),

    /// Lower-layer transport failure building the stdio pipe to a freshly
    /// spawned child (§4.3).
    #[error(transparent)]
    Transport(#[from] mcp_transport::TransportError),
}

impl ClientError {
    /// Reinterpret a peer-reported protocol error, upgrading the
    /// distinguished URL-elicitation code to its own variant (§7).
    #[must_use]
    pub fn from_protocol(error: JsonRpcError) -> Self {
        if error.code == ErrorCode::UrlElicitationRequired.code() {
            Self::UrlElicitationRequired(error)
        } else {
            Self::Session(SessionError::Protocol(error))
        }
    }
}

impl From<ClientError> for SessionError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::Session(inner) => inner,
            ClientError::UrlElicitationRequired(inner) => SessionError::Protocol(inner),
            ClientError::InitializationTimeout => SessionError::InitializationTimeout,
            ClientError::ProtocolVersionMismatch { requested, offered } => {
                SessionError::ProtocolVersionMismatch { requested, offered }
            }
            ClientError::UnsupportedRequest(method) => SessionError::MethodNotFound(method.to_string()),
            ClientError::Process(inner) => {
                SessionError::Protocol(JsonRpcError::new(ErrorCode::InternalError.code(), inner.to_string()))
            }
            ClientError::Transport(inner) => SessionError::Transport(inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_elicitation_code_is_reclassified() {
        let error = JsonRpcError::new(-32042, "needs browser confirmation");
        let classified = ClientError::from_protocol(error);
        assert!(matches!(classified, ClientError::UrlElicitationRequired(_)));
    }

    #[test]
    fn ordinary_protocol_error_stays_generic() {
        let error = JsonRpcError::new(-32602, "bad params");
        let classified = ClientError::from_protocol(error);
        assert!(matches!(classified, ClientError::Session(SessionError::Protocol(_))));
    }
}
