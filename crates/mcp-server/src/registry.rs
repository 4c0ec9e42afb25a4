//! Registered tools, prompts, and resources (§3 Primitives, §4.8), each
//! paired with the handler that actually answers an invocation.
//!
//! Registration never requires reflection: a tool/prompt/resource is just a
//! metadata value plus a boxed handler trait object, assembled by
//! [`crate::builder::ServerBuilder`] (§9 "attribute-driven DI wiring" ->
//! explicit registration builder).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mcp_protocol::prompts::{GetPromptResult, Prompt, PromptInput};
use mcp_protocol::resources::{ReadResourceResult, Resource, ResourceTemplate};
use mcp_protocol::tools::{CallToolResult, Tool};
use mcp_session::{PrimitiveCollection, PrimitiveMetadata, UriTemplate};
use serde_json::Value;

use crate::error::ServerResult;

/// Answers `tools/call` for one registered [`Tool`].
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Invoke the tool with caller-supplied arguments.
    async fn call(&self, arguments: Option<HashMap<String, Value>>) -> ServerResult<CallToolResult>;
}

#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Fn(Option<HashMap<String, Value>>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = ServerResult<CallToolResult>> + Send,
{
    async fn call(&self, arguments: Option<HashMap<String, Value>>) -> ServerResult<CallToolResult> {
        self(arguments).await
    }
}

/// Answers `prompts/get` for one registered [`Prompt`].
#[async_trait]
pub trait PromptHandler: Send + Sync {
    /// Render the prompt with caller-supplied argument values.
    async fn get(&self, arguments: Option<PromptInput>) -> ServerResult<GetPromptResult>;
}

#[async_trait]
impl<F, Fut> PromptHandler for F
where
    F: Fn(Option<PromptInput>) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = ServerResult<GetPromptResult>> + Send,
{
    async fn get(&self, arguments: Option<PromptInput>) -> ServerResult<GetPromptResult> {
        self(arguments).await
    }
}

/// Answers `resources/read` for one registered [`Resource`] or
/// [`ResourceTemplate`] instance.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// Read the resource (or the template instance) addressed by `uri`.
    async fn read(&self, uri: &str) -> ServerResult<ReadResourceResult>;
}

#[async_trait]
impl<F, Fut> ResourceHandler for F
where
    F: Fn(&str) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = ServerResult<ReadResourceResult>> + Send,
{
    async fn read(&self, uri: &str) -> ServerResult<ReadResourceResult> {
        self(uri).await
    }
}

/// A registered tool: its wire metadata, the handler that runs it, and the
/// open metadata bag a filter (e.g. authorization) can consult (§3, §4.7).
#[derive(Clone)]
pub struct ToolEntry {
    /// The `Tool` advertised on `tools/list`.
    pub tool: Tool,
    /// Runs the tool on `tools/call`.
    pub handler: Arc<dyn ToolHandler>,
    /// Authorization/filter metadata, keyed by whatever a registered filter
    /// expects (e.g. `"requires_scope"`).
    pub metadata: HashMap<String, Value>,
}

impl ToolEntry {
    /// Pair a tool with its handler and an empty metadata bag.
    #[must_use]
    pub fn new(tool: Tool, handler: Arc<dyn ToolHandler>) -> Self {
        Self {
            tool,
            handler,
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata entry for filters to consult.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The [`PrimitiveMetadata`] a filter context should carry for this
    /// entry once matched.
    #[must_use]
    pub fn primitive_metadata(&self) -> PrimitiveMetadata {
        PrimitiveMetadata {
            name: self.tool.name.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// A registered prompt: metadata, handler, and authorization bag.
#[derive(Clone)]
pub struct PromptEntry {
    /// The `Prompt` advertised on `prompts/list`.
    pub prompt: Prompt,
    /// Renders the prompt on `prompts/get`.
    pub handler: Arc<dyn PromptHandler>,
    /// Authorization/filter metadata.
    pub metadata: HashMap<String, Value>,
}

impl PromptEntry {
    /// Pair a prompt with its handler and an empty metadata bag.
    #[must_use]
    pub fn new(prompt: Prompt, handler: Arc<dyn PromptHandler>) -> Self {
        Self {
            prompt,
            handler,
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata entry for filters to consult.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The [`PrimitiveMetadata`] a filter context should carry once matched.
    #[must_use]
    pub fn primitive_metadata(&self) -> PrimitiveMetadata {
        PrimitiveMetadata {
            name: self.prompt.name.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// A registered concrete resource, addressed by an exact URI.
#[derive(Clone)]
pub struct ResourceEntry {
    /// The `Resource` advertised on `resources/list`.
    pub resource: Resource,
    /// Reads the resource on `resources/read`.
    pub handler: Arc<dyn ResourceHandler>,
    /// Authorization/filter metadata.
    pub metadata: HashMap<String, Value>,
}

impl ResourceEntry {
    /// Pair a resource with its handler and an empty metadata bag.
    #[must_use]
    pub fn new(resource: Resource, handler: Arc<dyn ResourceHandler>) -> Self {
        Self {
            resource,
            handler,
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata entry for filters to consult.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The [`PrimitiveMetadata`] a filter context should carry once matched.
    #[must_use]
    pub fn primitive_metadata(&self) -> PrimitiveMetadata {
        PrimitiveMetadata {
            name: self.resource.name.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// A registered resource template, matched against request URIs with
/// [`UriTemplate`] (§4.8).
#[derive(Clone)]
pub struct ResourceTemplateEntry {
    /// The `ResourceTemplate` advertised on `resources/templates/list`.
    pub template: ResourceTemplate,
    /// The precompiled matcher for `template.uri_template`.
    pub matcher: UriTemplate,
    /// Reads a resource instance matching the template.
    pub handler: Arc<dyn ResourceHandler>,
    /// Authorization/filter metadata.
    pub metadata: HashMap<String, Value>,
}

impl ResourceTemplateEntry {
    /// Pair a resource template with its handler, precompiling the matcher.
    #[must_use]
    pub fn new(template: ResourceTemplate, handler: Arc<dyn ResourceHandler>) -> Self {
        let matcher = UriTemplate::parse(&template.uri_template);
        Self {
            template,
            matcher,
            handler,
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata entry for filters to consult.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// The [`PrimitiveMetadata`] a filter context should carry once matched.
    #[must_use]
    pub fn primitive_metadata(&self) -> PrimitiveMetadata {
        PrimitiveMetadata {
            name: self.template.name.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// The full set of primitive collections a server session dispatches
/// against, shared between the builder, the method handlers, and any
/// change-notification wiring.
#[derive(Clone)]
pub struct Registry {
    /// Registered tools, keyed by `Tool::name`.
    pub tools: Arc<PrimitiveCollection<ToolEntry>>,
    /// Registered prompts, keyed by `Prompt::name`.
    pub prompts: Arc<PrimitiveCollection<PromptEntry>>,
    /// Registered concrete resources, keyed by `Resource::name`.
    pub resources: Arc<PrimitiveCollection<ResourceEntry>>,
    /// Registered resource templates, keyed by `ResourceTemplate::name`.
    pub resource_templates: Arc<PrimitiveCollection<ResourceTemplateEntry>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            tools: Arc::new(PrimitiveCollection::new()),
            prompts: Arc::new(PrimitiveCollection::new()),
            resources: Arc::new(PrimitiveCollection::new()),
            resource_templates: Arc::new(PrimitiveCollection::new()),
        }
    }
}

impl Registry {
    /// Build an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the resource template (and its captured variables) matching
    /// `uri`, if any. Concrete resources are checked by the caller first;
    /// this is the fallback for templated reads (§4.8, §11).
    #[must_use]
    pub fn match_resource_template(&self, uri: &str) -> Option<ResourceTemplateEntry> {
        self.resource_templates
            .list()
            .into_iter()
            .find(|entry| entry.matcher.matches(uri).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_protocol::content::TextContent;
    use mcp_protocol::core::Role;
    use mcp_protocol::prompts::PromptMessage;
    use mcp_protocol::tools::ToolInputSchema;

    #[tokio::test]
    async fn tool_entry_handler_is_callable_through_the_trait_object() {
        let tool = Tool::new("double").with_input_schema(ToolInputSchema::empty());
        let handler: Arc<dyn ToolHandler> = Arc::new(|_args: Option<HashMap<String, Value>>| async {
            Ok(CallToolResult::text("42"))
        });
        let entry = ToolEntry::new(tool, handler);
        let result = entry.handler.call(None).await.unwrap();
        assert!(!result.is_error.unwrap_or(false));
    }

    #[tokio::test]
    async fn registry_matches_resource_template_by_uri() {
        let registry = Registry::new();
        let template = ResourceTemplate {
            name: "log".to_string(),
            title: None,
            uri_template: "file:///logs/{date}.log".to_string(),
            description: None,
            mime_type: None,
            annotations: None,
        };
        let handler: Arc<dyn ResourceHandler> = Arc::new(|_uri: &str| async {
            Ok(ReadResourceResult {
                contents: vec![mcp_protocol::content::ResourceContent::Text(
                    mcp_protocol::content::TextResourceContents {
                        uri: "file:///logs/2025-01-01.log".to_string(),
                        mime_type: None,
                        text: "ok".to_string(),
                    },
                )],
            })
        });
        registry
            .resource_templates
            .insert("log", ResourceTemplateEntry::new(template, handler));

        let matched = registry.match_resource_template("file:///logs/2025-01-01.log");
        assert!(matched.is_some());
        assert!(registry.match_resource_template("file:///other").is_none());
    }

    #[tokio::test]
    async fn prompt_entry_renders_through_the_trait_object() {
        let prompt = Prompt {
            name: "greet".to_string(),
            title: None,
            description: None,
            arguments: None,
        };
        let handler: Arc<dyn PromptHandler> = Arc::new(|_args: Option<PromptInput>| async {
            Ok(GetPromptResult {
                description: None,
                messages: vec![PromptMessage {
                    role: Role::User,
                    content: mcp_protocol::content::ContentBlock::Text(TextContent::new("hi")),
                }],
            })
        });
        let entry = PromptEntry::new(prompt, handler);
        let result = entry.handler.get(None).await.unwrap();
        assert_eq!(result.messages.len(), 1);
    }
}
