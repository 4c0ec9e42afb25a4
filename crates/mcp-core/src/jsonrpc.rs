//! JSON-RPC 2.0 message envelope.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::RequestId;

/// The literal JSON-RPC version string every message carries.
pub const JSONRPC_VERSION: &str = "2.0";

/// Zero-sized marker that (de)serializes as the literal `"2.0"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JsonRpcVersion;

impl Serialize for JsonRpcVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(JSONRPC_VERSION)
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let version = String::deserialize(deserializer)?;
        if version == JSONRPC_VERSION {
            Ok(JsonRpcVersion)
        } else {
            Err(serde::de::Error::custom(format!(
                "invalid JSON-RPC version: expected '{JSONRPC_VERSION}', got '{version}'"
            )))
        }
    }
}

/// A JSON-RPC request: expects a response matching `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: JsonRpcVersion,
    /// Method name, e.g. `"tools/call"`.
    pub method: String,
    /// Method parameters, including an optional `_meta` object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Correlates the eventual response.
    pub id: RequestId,
}

impl JsonRpcRequest {
    /// Build a request.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>, id: impl Into<RequestId>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params,
            id: id.into(),
        }
    }

    /// Fetch `params._meta.<key>` if present.
    #[must_use]
    pub fn meta_field(&self, key: &str) -> Option<&Value> {
        self.params.as_ref()?.get("_meta")?.get(key)
    }
}

/// A JSON-RPC notification: fire-and-forget, no `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// Always `"2.0"`.
    pub jsonrpc: JsonRpcVersion,
    /// Method name, e.g. `"notifications/progress"`.
    pub method: String,
    /// Notification parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Build a notification.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            method: method.into(),
            params,
        }
    }
}

/// `error.code`/`error.message`/`error.data` per JSON-RPC 2.0, plus the MCP
/// extension codes in the `-32000` and below application range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    /// Numeric error code.
    pub code: i32,
    /// Human-readable summary.
    pub message: String,
    /// Free-form structured detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Build a bare error.
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach structured `data`.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Wraps a request id in a response, where a parse error forces `id: null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseId(pub Option<RequestId>);

impl ResponseId {
    /// Wrap a known request id.
    #[must_use]
    pub fn from_request(id: RequestId) -> Self {
        Self(Some(id))
    }

    /// The `null` id used for responses to unparseable requests.
    #[must_use]
    pub fn null() -> Self {
        Self(None)
    }
}

/// A JSON-RPC response: either a success result or an error, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: JsonRpcVersion,
    /// Response outcome.
    #[serde(flatten)]
    pub payload: JsonRpcResponsePayload,
    /// The request id this response answers (`null` only for parse errors).
    pub id: ResponseId,
}

/// The mutually-exclusive `result`/`error` half of a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcResponsePayload {
    /// Successful completion.
    Success {
        /// The method's result value.
        result: Value,
    },
    /// Failed completion.
    Error {
        /// The error describing the failure.
        error: JsonRpcError,
    },
}

impl JsonRpcResponse {
    /// Build a success response.
    #[must_use]
    pub fn success(result: Value, id: RequestId) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            payload: JsonRpcResponsePayload::Success { result },
            id: ResponseId::from_request(id),
        }
    }

    /// Build an error response correlated to a known request.
    #[must_use]
    pub fn error(error: JsonRpcError, id: RequestId) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            payload: JsonRpcResponsePayload::Error { error },
            id: ResponseId::from_request(id),
        }
    }

    /// Build an error response with a null id, for requests that never
    /// parsed far enough to have one (§4.1 parse errors).
    #[must_use]
    pub fn error_without_id(error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JsonRpcVersion,
            payload: JsonRpcResponsePayload::Error { error },
            id: ResponseId::null(),
        }
    }

    /// `true` if this is a success response.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.payload, JsonRpcResponsePayload::Success { .. })
    }

    /// The result, if this is a success response.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        match &self.payload {
            JsonRpcResponsePayload::Success { result } => Some(result),
            JsonRpcResponsePayload::Error { .. } => None,
        }
    }

    /// The error, if this is an error response.
    #[must_use]
    pub fn error_payload(&self) -> Option<&JsonRpcError> {
        match &self.payload {
            JsonRpcResponsePayload::Success { .. } => None,
            JsonRpcResponsePayload::Error { error } => Some(error),
        }
    }
}

/// Tagged union over the four message shapes a JSON-RPC 2.0 peer may send
/// (§3 Messages table). Untagged deserialization disambiguates by shape:
/// presence of `method` + `id` is a request, `method` alone is a
/// notification, `id` + (`result` xor `error`) is a response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    /// Expects a correlated response.
    Request(JsonRpcRequest),
    /// Fire-and-forget.
    Notification(JsonRpcNotification),
    /// Terminates a previously sent request.
    Response(JsonRpcResponse),
}

impl JsonRpcMessage {
    /// Parse a single JSON-RPC message from a line/body of text.
    ///
    /// # Errors
    ///
    /// Returns an error if `text` is not valid JSON or doesn't match any of
    /// the three message shapes.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Serialize to a single-line JSON string (no trailing newline).
    ///
    /// # Panics
    ///
    /// Panics only if the message contains non-serializable data, which
    /// can't happen for the variants defined here.
    #[must_use]
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).expect("JsonRpcMessage always serializes")
    }

    /// The method name, for requests and notifications.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request(r) => Some(&r.method),
            Self::Notification(n) => Some(&n.method),
            Self::Response(_) => None,
        }
    }

    /// The request id, for requests and responses.
    #[must_use]
    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            Self::Request(r) => Some(&r.id),
            Self::Notification(_) => None,
            Self::Response(r) => r.id.0.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_roundtrips() {
        let req = JsonRpcRequest::new("tools/call", Some(serde_json::json!({"name": "x"})), 1i64);
        let msg = JsonRpcMessage::Request(req);
        let line = msg.to_line();
        let parsed = JsonRpcMessage::parse(&line).unwrap();
        match parsed {
            JsonRpcMessage::Request(r) => {
                assert_eq!(r.method, "tools/call");
                assert_eq!(r.id, RequestId::Number(1));
            }
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn notification_has_no_id() {
        let note = JsonRpcNotification::new("notifications/cancelled", None);
        let value = serde_json::to_value(&note).unwrap();
        assert!(value.get("id").is_none());
    }

    #[test]
    fn response_discriminates_success_and_error() {
        let ok = JsonRpcResponse::success(serde_json::json!(42), RequestId::Number(1));
        assert!(ok.is_success());
        assert_eq!(ok.result(), Some(&serde_json::json!(42)));

        let err = JsonRpcResponse::error(JsonRpcError::new(-32602, "bad params"), RequestId::Number(1));
        assert!(!err.is_success());
        assert_eq!(err.error_payload().unwrap().code, -32602);
    }

    #[test]
    fn parse_error_response_has_null_id() {
        let resp = JsonRpcResponse::error_without_id(JsonRpcError::new(-32700, "Parse error"));
        let value = serde_json::to_value(&resp).unwrap();
        assert!(value["id"].is_null());
    }

    #[test]
    fn untagged_message_parses_each_shape() {
        let req = r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#;
        let note = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        let resp = r#"{"jsonrpc":"2.0","id":1,"result":{}}"#;
        let err = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"nope"}}"#;

        assert!(matches!(
            JsonRpcMessage::parse(req).unwrap(),
            JsonRpcMessage::Request(_)
        ));
        assert!(matches!(
            JsonRpcMessage::parse(note).unwrap(),
            JsonRpcMessage::Notification(_)
        ));
        assert!(matches!(
            JsonRpcMessage::parse(resp).unwrap(),
            JsonRpcMessage::Response(_)
        ));
        assert!(matches!(
            JsonRpcMessage::parse(err).unwrap(),
            JsonRpcMessage::Response(_)
        ));
    }

    #[test]
    fn meta_field_reads_nested_params() {
        let req = JsonRpcRequest::new(
            "tools/call",
            Some(serde_json::json!({"_meta": {"progressToken": "p1"}})),
            1i64,
        );
        assert_eq!(
            req.meta_field("progressToken"),
            Some(&serde_json::json!("p1"))
        );
        assert_eq!(req.meta_field("missing"), None);
    }
}
