//! Request and progress identifiers.
//!
//! Both identifiers share the same shape (string or signed integer) but are
//! kept as distinct types so a progress token can never accidentally be
//! threaded through code expecting a request id, and vice versa.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Correlates a response to the request that produced it.
///
/// Per JSON-RPC 2.0, an id is either a string or a number; MCP restricts
/// numbers to signed integers (no fractional ids).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// String identifier.
    String(String),
    /// Numeric identifier.
    Number(i64),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for RequestId {
    fn from(n: i32) -> Self {
        Self::Number(i64::from(n))
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        Self::Number(n as i64)
    }
}

/// Correlates `notifications/progress` with the request that carried
/// `_meta.progressToken`.
///
/// Structurally identical to [`RequestId`]; kept separate so the two can't be
/// confused at call sites.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressToken {
    /// String token.
    String(String),
    /// Numeric token.
    Number(i64),
}

impl fmt::Display for ProgressToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<String> for ProgressToken {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for ProgressToken {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<i64> for ProgressToken {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl From<RequestId> for ProgressToken {
    fn from(id: RequestId) -> Self {
        match id {
            RequestId::String(s) => Self::String(s),
            RequestId::Number(n) => Self::Number(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_conversions() {
        let id: RequestId = "abc".into();
        assert!(matches!(id, RequestId::String(_)));
        let id: RequestId = 7i32.into();
        assert_eq!(id, RequestId::Number(7));
    }

    #[test]
    fn progress_token_from_request_id() {
        let req = RequestId::Number(42);
        let token: ProgressToken = req.into();
        assert_eq!(token, ProgressToken::Number(42));
    }

    #[test]
    fn display_matches_inner_value() {
        assert_eq!(RequestId::from("x").to_string(), "x");
        assert_eq!(RequestId::from(5i64).to_string(), "5");
    }
}
