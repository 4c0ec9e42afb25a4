//! Capability negotiation exchanged during `initialize` (§4.6).
//!
//! Each side declares the feature groups it supports; absence of a field
//! means the feature is unsupported, not merely undeclared. A session must
//! not invoke or advertise a primitive kind the peer didn't declare here.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// What a client is willing to do on behalf of the server.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientCapabilities {
    /// Non-standard, experimental capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, serde_json::Value>>,
    /// Present if the client will answer `roots/list`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roots: Option<RootsCapabilities>,
    /// Present if the client will answer `sampling/createMessage`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingCapabilities>,
    /// Present if the client will answer `elicitation/create`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elicitation: Option<ElicitationCapabilities>,
}

/// What a server offers to a client.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// Non-standard, experimental capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, serde_json::Value>>,
    /// Present if the server will emit `notifications/message`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingCapabilities>,
    /// Present if the server answers `completion/complete`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completions: Option<CompletionCapabilities>,
    /// Present if the server offers any prompts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapabilities>,
    /// Present if the server offers any resources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapabilities>,
    /// Present if the server offers any tools.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapabilities>,
    /// Present if the server supports task-augmented requests (§9).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<TasksCapabilities>,
}

/// Marker: the client answers sampling requests. Carries no sub-fields in
/// this protocol revision.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SamplingCapabilities;

/// Marker: the client answers elicitation requests.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ElicitationCapabilities;

/// Marker: the server answers completion requests.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompletionCapabilities;

/// Root-list capability, with optional change notifications.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RootsCapabilities {
    /// Whether `notifications/roots/list_changed` will be sent.
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Marker: the server will emit log notifications.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingCapabilities;

/// Prompt-listing capability.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PromptsCapabilities {
    /// Whether `notifications/prompts/list_changed` will be sent.
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Resource-listing capability.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResourcesCapabilities {
    /// Whether `resources/subscribe` is supported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<bool>,
    /// Whether `notifications/resources/list_changed` will be sent.
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Tool-listing capability.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolsCapabilities {
    /// Whether `notifications/tools/list_changed` will be sent.
    #[serde(rename = "listChanged", skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// Task-augmentation capability (§9, SEP-1686).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TasksCapabilities {
    /// Methods the server accepts `task` metadata on, e.g. `"tools/call"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_capability_is_absent_not_null() {
        let caps = ServerCapabilities::default();
        let value = serde_json::to_value(&caps).unwrap();
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn list_changed_flag_round_trips() {
        let caps = ToolsCapabilities {
            list_changed: Some(true),
        };
        let value = serde_json::to_value(&caps).unwrap();
        assert_eq!(value["listChanged"], serde_json::json!(true));
    }
}
