//! Standard JSON-RPC/MCP error codes and this crate's own error type.

use std::fmt;

use crate::jsonrpc::JsonRpcError;

/// Result alias for this crate's fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The well-known JSON-RPC error codes plus the MCP extensions used
/// throughout the protocol core (§4.1, §4.4, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Malformed JSON (`-32700`).
    ParseError,
    /// Structurally invalid JSON-RPC request (`-32600`).
    InvalidRequest,
    /// Unknown `method` (`-32601`).
    MethodNotFound,
    /// Handler rejected `params` (`-32602`).
    InvalidParams,
    /// Handler raised an unexpected error (`-32603`).
    InternalError,
    /// Out-of-band user action is required before the call can proceed
    /// (`-32042`, §4.1, §6, §7).
    UrlElicitationRequired,
    /// Any other application-defined code, conventionally `<= -32000`.
    Application(i32),
}

impl ErrorCode {
    /// The numeric wire code.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::UrlElicitationRequired => -32042,
            Self::Application(code) => code,
        }
    }

    /// The conventional message for the standard codes.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::UrlElicitationRequired => "URL elicitation required",
            Self::Application(_) => "Application error",
        }
    }
}

impl From<i32> for ErrorCode {
    fn from(code: i32) -> Self {
        match code {
            -32700 => Self::ParseError,
            -32600 => Self::InvalidRequest,
            -32601 => Self::MethodNotFound,
            -32602 => Self::InvalidParams,
            -32603 => Self::InternalError,
            -32042 => Self::UrlElicitationRequired,
            other => Self::Application(other),
        }
    }
}

impl From<ErrorCode> for JsonRpcError {
    fn from(code: ErrorCode) -> Self {
        JsonRpcError::new(code.code(), code.default_message())
    }
}

/// Errors raised while building, parsing, or routing a JSON-RPC message at
/// this crate's layer. Higher layers (`mcp-protocol`, `mcp-session`, ...)
/// wrap this with `#[from]` and add their own variants rather than
/// re-deriving the same taxonomy (§10.2).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// `text` failed to parse as a JSON-RPC message.
    #[error("failed to parse JSON-RPC message: {0}")]
    Parse(#[from] serde_json::Error),

    /// A JSON-RPC level protocol error, carrying the wire error object.
    #[error("{0}")]
    Protocol(JsonRpcError),

    /// A message exceeded a configured size limit.
    #[error("message of {actual} bytes exceeds the {limit}-byte limit")]
    TooLarge {
        /// The configured limit.
        limit: usize,
        /// The message's actual size.
        actual: usize,
    },
}

impl Error {
    /// Build a protocol error from a standard or application error code.
    #[must_use]
    pub fn protocol(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Protocol(JsonRpcError::new(code.code(), message))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.default_message(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_codes_roundtrip() {
        assert_eq!(ErrorCode::ParseError.code(), -32700);
        assert_eq!(ErrorCode::from(-32601), ErrorCode::MethodNotFound);
        assert_eq!(ErrorCode::from(-32042), ErrorCode::UrlElicitationRequired);
    }

    #[test]
    fn unknown_code_is_application() {
        assert_eq!(ErrorCode::from(-32050), ErrorCode::Application(-32050));
    }

    #[test]
    fn parse_error_converts_from_serde() {
        let err = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err();
        let wrapped: Error = err.into();
        assert!(matches!(wrapped, Error::Parse(_)));
    }
}
