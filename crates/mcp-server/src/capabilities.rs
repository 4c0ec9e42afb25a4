//! Builds the `ServerCapabilities` declared at `initialize`, derived from
//! what was actually registered on the [`crate::builder::ServerBuilder`]
//! (§4.6, §4.11) — the server-side mirror of `mcp-client`'s "capability
//! follows handler presence" rule.

use mcp_protocol::capabilities::{
    CompletionCapabilities, LoggingCapabilities, PromptsCapabilities, ResourcesCapabilities,
    ServerCapabilities, TasksCapabilities, ToolsCapabilities,
};

use crate::registry::Registry;

/// Which methods a server accepts `_meta.task` augmentation on, and what
/// else to declare alongside the primitive collections.
#[derive(Debug, Clone, Default)]
pub struct CapabilityConfig {
    /// Methods this server will run as a background task when a caller
    /// attaches `_meta.task` (§4.9, §9). Empty means task augmentation is
    /// not offered at all.
    pub task_augmented_methods: Vec<String>,
    /// Whether a [`crate::completion::CompletionHandler`] was registered.
    pub completions: bool,
}

/// Derive the capabilities to advertise from `registry` and `config`. A
/// primitive capability is declared only when the builder was given at
/// least one entry of that kind to offer (§4.6: absence of a field means
/// the feature is unsupported, not merely undeclared).
#[must_use]
pub fn negotiate_server_capabilities(registry: &Registry, config: &CapabilityConfig) -> ServerCapabilities {
    ServerCapabilities {
        experimental: None,
        logging: Some(LoggingCapabilities),
        completions: config.completions.then_some(CompletionCapabilities),
        prompts: (!registry.prompts.is_empty()).then(|| PromptsCapabilities { list_changed: Some(true) }),
        resources: (!registry.resources.is_empty() || !registry.resource_templates.is_empty()).then(|| {
            ResourcesCapabilities {
                subscribe: Some(true),
                list_changed: Some(true),
            }
        }),
        tools: (!registry.tools.is_empty()).then(|| ToolsCapabilities { list_changed: Some(true) }),
        tasks: (!config.task_augmented_methods.is_empty()).then(|| TasksCapabilities {
            requests: Some(config.task_augmented_methods.clone()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ResourceEntry, ResourceHandler, ToolEntry, ToolHandler};
    use mcp_protocol::resources::{ReadResourceResult, Resource};
    use mcp_protocol::tools::{CallToolResult, Tool, ToolInputSchema};
    use std::collections::HashMap;
    use std::sync::Arc;

    #[test]
    fn empty_registry_declares_only_logging() {
        let caps = negotiate_server_capabilities(&Registry::new(), &CapabilityConfig::default());
        assert!(caps.logging.is_some());
        assert!(caps.tools.is_none());
        assert!(caps.resources.is_none());
        assert!(caps.tasks.is_none());
    }

    #[tokio::test]
    async fn registering_a_tool_declares_the_tools_capability() {
        let registry = Registry::new();
        let handler: Arc<dyn ToolHandler> = Arc::new(|_args: Option<HashMap<String, serde_json::Value>>| async {
            Ok(CallToolResult::text("ok"))
        });
        registry.tools.insert(
            "echo",
            ToolEntry::new(Tool::new("echo").with_input_schema(ToolInputSchema::empty()), handler),
        );
        let caps = negotiate_server_capabilities(&registry, &CapabilityConfig::default());
        assert!(caps.tools.is_some());
        assert!(caps.resources.is_none());
    }

    #[tokio::test]
    async fn task_augmented_methods_declare_the_tasks_capability() {
        let registry = Registry::new();
        let handler: Arc<dyn ResourceHandler> = Arc::new(|_uri: &str| async {
            Ok(ReadResourceResult { contents: vec![] })
        });
        registry.resources.insert(
            "log",
            ResourceEntry::new(
                Resource {
                    name: "log".to_string(),
                    title: None,
                    uri: "file:///log".to_string(),
                    description: None,
                    mime_type: None,
                    annotations: None,
                    size: None,
                },
                handler,
            ),
        );
        let config = CapabilityConfig {
            task_augmented_methods: vec!["tools/call".to_string()],
            completions: true,
        };
        let caps = negotiate_server_capabilities(&registry, &config);
        assert_eq!(caps.tasks.unwrap().requests, Some(vec!["tools/call".to_string()]));
        assert!(caps.completions.is_some());
        assert!(caps.resources.unwrap().subscribe.unwrap());
    }
}
