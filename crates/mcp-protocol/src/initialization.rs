//! The `initialize` handshake (§4.6): the first request a client sends and
//! the only one a server may answer before capabilities are agreed.

use serde::{Deserialize, Serialize};

use crate::capabilities::{ClientCapabilities, ServerCapabilities};
use crate::core::{Implementation, ProtocolVersion};

/// `initialize` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeRequest {
    /// The highest protocol version the client supports.
    #[serde(rename = "protocolVersion")]
    pub protocol_version: ProtocolVersion,
    /// What the client is able to do.
    pub capabilities: ClientCapabilities,
    /// Identifies the client.
    #[serde(rename = "clientInfo")]
    pub client_info: Implementation,
}

/// `initialize` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    /// The protocol version the server has agreed to speak. If this
    /// doesn't match the client's requested version, the client decides
    /// whether to proceed or disconnect (§4.6 edge cases).
    #[serde(rename = "protocolVersion")]
    pub protocol_version: ProtocolVersion,
    /// What the server is able to do.
    pub capabilities: ServerCapabilities,
    /// Identifies the server.
    #[serde(rename = "serverInfo")]
    pub server_info: Implementation,
    /// Freeform operator instructions for the model, e.g. usage guidance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// `notifications/initialized`: sent by the client once it has processed
/// the `initialize` result and is ready to issue further requests (§4.6,
/// §11).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InitializedNotification;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_result_round_trips() {
        let result = InitializeResult {
            protocol_version: "2025-06-18".to_string(),
            capabilities: ServerCapabilities::default(),
            server_info: Implementation {
                name: "test-server".to_string(),
                ..Implementation::default()
            },
            instructions: None,
        };
        let json = serde_json::to_string(&result).unwrap();
        let back: InitializeResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.server_info.name, "test-server");
    }
}
