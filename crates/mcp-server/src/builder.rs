//! Declarative server assembly (§4.11, §9 "attribute-driven DI wiring" ->
//! explicit registration builder): accumulate tools, prompts, resources,
//! and cross-cutting filters, then [`ServerBuilder::build`] spawns a
//! [`Session`] over a transport, registers every method this server
//! answers, and hands back a ready-to-use [`ServerSession`].

use std::sync::Arc;

use mcp_protocol::core::Implementation;
use mcp_protocol::logging::LogLevel;
use mcp_protocol::resources::{Resource, ResourceTemplate};
use mcp_protocol::tools::Tool;
use mcp_session::{AuthorizationFilter, FilterContext, HandlerFilter, InMemoryTaskStore, MethodHandler, RequestHandler, Session, TaskStore};
use mcp_transport::Transport;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::capabilities::{negotiate_server_capabilities, CapabilityConfig};
use crate::completion::CompletionHandler;
use crate::error::ServerResult;
use crate::handlers::{self, PrimitiveKind, PrimitiveMatcherFilter};
use crate::registry::{
    PromptEntry, PromptHandler, Registry, ResourceEntry, ResourceHandler, ResourceTemplateEntry, ToolEntry, ToolHandler,
};
use crate::session::ServerSession;
use crate::subscriptions::Subscriptions;
use crate::tasks::TaskDispatcher;

/// Accumulates a server's registered primitives and cross-cutting policy
/// before spawning a [`ServerSession`] over a transport.
pub struct ServerBuilder {
    server_info: Implementation,
    instructions: Option<String>,
    registry: Registry,
    completion_handler: Option<Arc<dyn CompletionHandler>>,
    authorization: Option<Arc<AuthorizationFilter>>,
    task_augmented_methods: Vec<String>,
    task_store: Option<Arc<dyn TaskStore>>,
}

impl ServerBuilder {
    /// Start a new builder announcing `server_info` at `initialize`.
    #[must_use]
    pub fn new(server_info: Implementation) -> Self {
        Self {
            server_info,
            instructions: None,
            registry: Registry::new(),
            completion_handler: None,
            authorization: None,
            task_augmented_methods: Vec::new(),
            task_store: None,
        }
    }

    /// Attach usage instructions, echoed back in `InitializeResult`.
    #[must_use]
    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Register a tool behind a plain handler.
    #[must_use]
    pub fn tool(self, tool: Tool, handler: Arc<dyn ToolHandler>) -> Self {
        self.tool_entry(ToolEntry::new(tool, handler))
    }

    /// Register a tool via a fully constructed [`ToolEntry`] (e.g. one
    /// carrying authorization metadata).
    #[must_use]
    pub fn tool_entry(self, entry: ToolEntry) -> Self {
        self.registry.tools.insert(entry.tool.name.clone(), entry);
        self
    }

    /// Register a prompt behind a plain handler.
    #[must_use]
    pub fn prompt(self, prompt: mcp_protocol::prompts::Prompt, handler: Arc<dyn PromptHandler>) -> Self {
        self.prompt_entry(PromptEntry::new(prompt, handler))
    }

    /// Register a prompt via a fully constructed [`PromptEntry`].
    #[must_use]
    pub fn prompt_entry(self, entry: PromptEntry) -> Self {
        self.registry.prompts.insert(entry.prompt.name.clone(), entry);
        self
    }

    /// Register a concrete resource behind a plain handler.
    #[must_use]
    pub fn resource(self, resource: Resource, handler: Arc<dyn ResourceHandler>) -> Self {
        self.resource_entry(ResourceEntry::new(resource, handler))
    }

    /// Register a concrete resource via a fully constructed [`ResourceEntry`].
    #[must_use]
    pub fn resource_entry(self, entry: ResourceEntry) -> Self {
        self.registry.resources.insert(entry.resource.name.clone(), entry);
        self
    }

    /// Register a resource template behind a plain handler.
    #[must_use]
    pub fn resource_template(self, template: ResourceTemplate, handler: Arc<dyn ResourceHandler>) -> Self {
        self.resource_template_entry(ResourceTemplateEntry::new(template, handler))
    }

    /// Register a resource template via a fully constructed
    /// [`ResourceTemplateEntry`].
    #[must_use]
    pub fn resource_template_entry(self, entry: ResourceTemplateEntry) -> Self {
        self.registry.resource_templates.insert(entry.template.name.clone(), entry);
        self
    }

    /// Register the server's single `completion/complete` handler.
    #[must_use]
    pub fn completion_handler(mut self, handler: Arc<dyn CompletionHandler>) -> Self {
        self.completion_handler = Some(handler);
        self
    }

    /// Wire an authorization policy across every invocation and list method
    /// (§4.7, §8). A caller's invocation of a primitive the policy rejects
    /// gets [`mcp_session::SessionError::Forbidden`]; the same primitive is
    /// also dropped from the corresponding `*/list` result.
    #[must_use]
    pub fn authorization(mut self, policy: Arc<dyn Fn(&FilterContext) -> bool + Send + Sync>) -> Self {
        self.authorization = Some(Arc::new(AuthorizationFilter::new(policy)));
        self
    }

    /// Offer `_meta.task` augmentation (§4.9, §9) for `method` (e.g.
    /// `"tools/call"`). Declaring at least one such method is what causes
    /// [`negotiate_server_capabilities`] to advertise the `tasks` capability.
    #[must_use]
    pub fn task_augmented(mut self, method: impl Into<String>) -> Self {
        self.task_augmented_methods.push(method.into());
        self
    }

    /// Use a caller-supplied task store instead of the default in-memory one.
    #[must_use]
    pub fn task_store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.task_store = Some(store);
        self
    }

    /// Spawn the dispatch session over `transport`, register every method,
    /// and return a ready-to-use [`ServerSession`].
    ///
    /// # Errors
    ///
    /// Returns whatever [`Session::spawn`] returns.
    pub async fn build(self, transport: Box<dyn Transport>) -> ServerResult<ServerSession> {
        let session = Session::spawn(transport).await?;
        let registry = self.registry;
        let session_id: Arc<str> = Uuid::new_v4().to_string().into();
        let task_store: Arc<dyn TaskStore> = self.task_store.unwrap_or_else(|| InMemoryTaskStore::shared());
        let dispatcher = TaskDispatcher::new(task_store, session_id.clone());
        let subscriptions = Subscriptions::new();
        let log_level = Arc::new(RwLock::new(LogLevel::Info));

        let config = CapabilityConfig {
            task_augmented_methods: self.task_augmented_methods.clone(),
            completions: self.completion_handler.is_some(),
        };
        let capabilities = negotiate_server_capabilities(&registry, &config);

        session.register_method("ping", MethodHandler::new(handlers::ping_handler(), Vec::new()));

        session.register_method(
            "tools/list",
            MethodHandler::new(handlers::list_tools_handler(registry.clone(), self.authorization.clone()), Vec::new()),
        );
        session.register_method(
            "tools/call",
            self.invocation_method(
                registry.clone(),
                PrimitiveKind::Tool,
                handlers::call_tool_handler(registry.clone()),
                &dispatcher,
                "tools/call",
            ),
        );

        session.register_method(
            "prompts/list",
            MethodHandler::new(handlers::list_prompts_handler(registry.clone(), self.authorization.clone()), Vec::new()),
        );
        session.register_method(
            "prompts/get",
            self.invocation_method(
                registry.clone(),
                PrimitiveKind::Prompt,
                handlers::get_prompt_handler(registry.clone()),
                &dispatcher,
                "prompts/get",
            ),
        );

        session.register_method(
            "resources/list",
            MethodHandler::new(handlers::list_resources_handler(registry.clone(), self.authorization.clone()), Vec::new()),
        );
        session.register_method(
            "resources/templates/list",
            MethodHandler::new(
                handlers::list_resource_templates_handler(registry.clone(), self.authorization.clone()),
                Vec::new(),
            ),
        );
        session.register_method(
            "resources/read",
            self.invocation_method(
                registry.clone(),
                PrimitiveKind::Resource,
                handlers::read_resource_handler(registry.clone()),
                &dispatcher,
                "resources/read",
            ),
        );
        session.register_method(
            "resources/subscribe",
            MethodHandler::new(handlers::subscribe_handler(subscriptions.clone()), Vec::new()),
        );
        session.register_method(
            "resources/unsubscribe",
            MethodHandler::new(handlers::unsubscribe_handler(subscriptions.clone()), Vec::new()),
        );

        if let Some(handler) = self.completion_handler.clone() {
            session.register_method(
                "completion/complete",
                MethodHandler::new(handlers::complete_handler(handler), Vec::new()),
            );
        }

        session.register_method(
            "logging/setLevel",
            MethodHandler::new(handlers::set_level_handler(log_level.clone()), Vec::new()),
        );

        session.register_method("tasks/get", MethodHandler::new(handlers::tasks_get_handler(dispatcher.clone()), Vec::new()));
        session.register_method(
            "tasks/result",
            MethodHandler::new(handlers::tasks_result_handler(dispatcher.clone()), Vec::new()),
        );
        session.register_method(
            "tasks/cancel",
            MethodHandler::new(handlers::tasks_cancel_handler(dispatcher.clone()), Vec::new()),
        );
        session.register_method("tasks/list", MethodHandler::new(handlers::tasks_list_handler(dispatcher.clone()), Vec::new()));

        session.register_method("initialize", MethodHandler::new(initialize_handler(self.server_info, self.instructions, capabilities), Vec::new()));
        session.on_notification("notifications/initialized", Arc::new(|_params: Option<serde_json::Value>| {}));

        Ok(ServerSession::new(session, registry, subscriptions, dispatcher, log_level))
    }

    /// Wrap `base` with the [`PrimitiveMatcherFilter`] for `kind`, the
    /// authorization filter if one was registered, and task augmentation if
    /// `method` was declared with [`Self::task_augmented`] (§4.7, §4.9).
    fn invocation_method(
        &self,
        registry: Registry,
        kind: PrimitiveKind,
        base: Arc<dyn RequestHandler>,
        dispatcher: &TaskDispatcher,
        method: &str,
    ) -> MethodHandler {
        let base = if self.task_augmented_methods.iter().any(|m| m == method) {
            dispatcher.augment(base)
        } else {
            base
        };

        let mut filters: Vec<Arc<dyn HandlerFilter>> = vec![Arc::new(PrimitiveMatcherFilter::new(registry, kind))];
        if let Some(authorization) = &self.authorization {
            filters.push(authorization.clone());
        }

        MethodHandler::new(base, filters)
    }
}

fn initialize_handler(
    server_info: Implementation,
    instructions: Option<String>,
    capabilities: mcp_protocol::capabilities::ServerCapabilities,
) -> Arc<dyn RequestHandler> {
    Arc::new(move |_ctx: &mut FilterContext| {
        let result = mcp_protocol::initialization::InitializeResult {
            protocol_version: mcp_protocol::PROTOCOL_VERSION.to_string(),
            capabilities: capabilities.clone(),
            server_info: server_info.clone(),
            instructions: instructions.clone(),
        };
        async move { serde_json::to_value(result).map_err(|error| mcp_session::SessionError::Core(error.into())) }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_protocol::tools::{CallToolResult, ToolInputSchema};
    use mcp_stdio::StdioTransport;
    use std::collections::HashMap;

    #[tokio::test]
    async fn build_registers_every_declared_method() {
        let (_client_io, server_io) = tokio::io::duplex(16 * 1024);
        let (server_read, server_write) = tokio::io::split(server_io);
        let transport = StdioTransport::from_raw(server_read, server_write).unwrap();

        let tool_handler: Arc<dyn ToolHandler> = Arc::new(|_args: Option<HashMap<String, serde_json::Value>>| async {
            Ok(CallToolResult::text("ok"))
        });
        let server = ServerBuilder::new(Implementation {
            name: "demo".to_string(),
            ..Implementation::default()
        })
        .tool(Tool::new("echo").with_input_schema(ToolInputSchema::empty()), tool_handler)
        .build(Box::new(transport))
        .await
        .unwrap();

        assert!(!server.raw().is_closed());
    }
}
