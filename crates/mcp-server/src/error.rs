//! Errors surfaced by the server session convenience API (§7, §4.11).

use mcp_core::JsonRpcError;
use mcp_protocol::ErrorCode;
use mcp_session::SessionError;

/// Result alias for server operations.
pub type ServerResult<T> = std::result::Result<T, ServerError>;

/// Failures a server session can raise, layered over [`SessionError`] with
/// the server-specific cases from §4.11/§7 (primitive lookup, task
/// augmentation, authorization).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ServerError {
    /// Lower-layer session/dispatch failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// `tools/call`, `prompts/get`, or `resources/read` named a primitive
    /// this server never registered.
    #[error("no such {kind} registered: {name}")]
    NotFound {
        /// `"tool"`, `"prompt"`, or `"resource"`.
        kind: &'static str,
        /// The name or URI the caller asked for.
        name: String,
    },

    /// A registered handler returned an error while actually running.
    /// Carries only a sanitized message (§7, §10.2): the original error's
    /// `Display` output, never its `Debug` internals.
    #[error("handler for {method} failed: {message}")]
    HandlerFailed {
        /// The method being dispatched.
        method: String,
        /// Sanitized failure description.
        message: String,
    },

    /// `tasks/*` referenced a task id this server's store doesn't know
    /// about, or that belongs to a different session (§4.9).
    #[error(transparent)]
    TaskStore(#[from] mcp_session::TaskStoreError),

    /// A client attempted `tasks/result` on a method the server never
    /// task-augmented in the first place, or requested task augmentation
    /// for a method that does not support it.
    #[error("{0}")]
    InvalidTaskRequest(String),
}

impl ServerError {
    /// Sanitize an arbitrary handler error into a [`JsonRpcError`] (§7, §10.2
    /// error_sanitization): only this crate's own message text crosses into
    /// `error.data`-free wire form, never a handler's internal error chain.
    #[must_use]
    pub fn sanitize(method: &str, error: impl std::fmt::Display) -> Self {
        Self::HandlerFailed {
            method: method.to_string(),
            message: error.to_string(),
        }
    }
}

impl From<ServerError> for SessionError {
    fn from(error: ServerError) -> Self {
        match error {
            ServerError::Session(inner) => inner,
            ServerError::NotFound { kind, name } => SessionError::Protocol(JsonRpcError::new(
                ErrorCode::InvalidParams.code(),
                format!("no such {kind} registered: {name}"),
            )),
            ServerError::HandlerFailed { message, .. } => {
                SessionError::Protocol(JsonRpcError::new(ErrorCode::InternalError.code(), message))
            }
            ServerError::TaskStore(inner) => {
                SessionError::Protocol(JsonRpcError::new(ErrorCode::InvalidParams.code(), inner.to_string()))
            }
            ServerError::InvalidTaskRequest(message) => {
                SessionError::Protocol(JsonRpcError::new(ErrorCode::InvalidParams.code(), message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_drops_debug_detail() {
        #[derive(Debug)]
        struct Boom;
        impl std::fmt::Display for Boom {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "boom")
            }
        }
        let err = ServerError::sanitize("tools/call", Boom);
        assert_eq!(err.to_string(), "handler for tools/call failed: boom");
    }

    #[test]
    fn not_found_maps_to_invalid_params() {
        let err = ServerError::NotFound {
            kind: "tool",
            name: "missing".to_string(),
        };
        let SessionError::Protocol(wire) = SessionError::from(err) else {
            panic!("expected protocol error")
        };
        assert_eq!(wire.code, -32602);
    }
}
