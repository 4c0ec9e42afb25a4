//! Builds the base [`RequestHandler`] for every method a server session
//! answers (§4.11), wired against a [`Registry`], the subscription
//! bookkeeping, the logging level, and an optional completion handler.
//! Invocation methods (`tools/call`, `prompts/get`, `resources/read`) also
//! get a [`PrimitiveMatcherFilter`] prepended so a caller-supplied
//! authorization filter can inspect `ctx.matched_primitive` (§4.7).

use std::sync::Arc;

use async_trait::async_trait;
use mcp_core::JsonRpcError;
use mcp_protocol::completion::{CompleteRequest, CompleteResult};
use mcp_protocol::core::EmptyResult;
use mcp_protocol::logging::{LogLevel, SetLevelRequest};
use mcp_protocol::prompts::{GetPromptRequest, GetPromptResult, ListPromptsRequest, ListPromptsResult};
use mcp_protocol::resources::{
    ListResourceTemplatesRequest, ListResourceTemplatesResult, ListResourcesRequest, ListResourcesResult,
    ReadResourceRequest, ReadResourceResult, SubscribeRequest, UnsubscribeRequest,
};
use mcp_protocol::tasks::{
    CancelTaskRequest, CancelTaskResult, GetTaskRequest, GetTaskResult, GetTaskResultRequest,
    GetTaskResultResult, ListTasksRequest, ListTasksResult,
};
use mcp_protocol::tools::{CallToolRequest, CallToolResult, ListToolsRequest, ListToolsResult};
use mcp_protocol::ErrorCode;
use mcp_session::{
    AuthorizationFilter, FilterContext, HandlerFilter, MethodHandler, RequestHandler, SessionError, SessionResult,
};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::completion::CompletionHandler;
use crate::error::ServerError;
use crate::registry::Registry;
use crate::subscriptions::Subscriptions;
use crate::tasks::TaskDispatcher;

fn deserialize_params<T: DeserializeOwned>(ctx: &FilterContext) -> Result<T, SessionError> {
    serde_json::from_value(ctx.params.clone().unwrap_or(Value::Null))
        .map_err(|error| SessionError::Protocol(JsonRpcError::new(ErrorCode::InvalidParams.code(), error.to_string())))
}

fn serialize_result<T: Serialize>(value: T) -> Result<Value, SessionError> {
    serde_json::to_value(value).map_err(|error| SessionError::Core(error.into()))
}

/// Whether `primitive` should appear in a list result: `true` when no
/// authorization filter is wired in, otherwise the filter's own policy
/// decides — the same policy an invocation of this primitive would be
/// checked against (§4.7, §8).
fn passes_authorization(
    auth: &Option<Arc<AuthorizationFilter>>,
    method: &str,
    primitive: &mcp_session::PrimitiveMetadata,
    caller_identity: Option<&str>,
) -> bool {
    auth.as_ref().map_or(true, |filter| filter.allows(method, primitive, caller_identity))
}

/// Looks up the invoked primitive by name/uri before the base handler
/// runs, so filters registered ahead of it (authorization in particular)
/// can make decisions based on `ctx.matched_primitive` (§4.7).
pub struct PrimitiveMatcherFilter {
    registry: Registry,
    kind: PrimitiveKind,
}

/// Which params field names the invoked primitive, and which collection
/// to resolve it against.
#[derive(Clone, Copy)]
pub enum PrimitiveKind {
    /// `tools/call`: matched by `params.name` against registered tools.
    Tool,
    /// `prompts/get`: matched by `params.name` against registered prompts.
    Prompt,
    /// `resources/read`: matched by `params.uri`, concrete resources first
    /// then templates.
    Resource,
}

impl PrimitiveMatcherFilter {
    /// Build a matcher for `kind` against `registry`.
    #[must_use]
    pub fn new(registry: Registry, kind: PrimitiveKind) -> Self {
        Self { registry, kind }
    }
}

#[async_trait]
impl HandlerFilter for PrimitiveMatcherFilter {
    async fn call(&self, ctx: &mut FilterContext, next: &dyn RequestHandler) -> SessionResult<Value> {
        let field = match self.kind {
            PrimitiveKind::Tool | PrimitiveKind::Prompt => "name",
            PrimitiveKind::Resource => "uri",
        };
        let key = ctx.params.as_ref().and_then(|p| p.get(field)).and_then(|v| v.as_str().map(str::to_string));

        if let Some(key) = key {
            ctx.matched_primitive = match self.kind {
                PrimitiveKind::Tool => self.registry.tools.get(&key).map(|e| e.primitive_metadata()),
                PrimitiveKind::Prompt => self.registry.prompts.get(&key).map(|e| e.primitive_metadata()),
                PrimitiveKind::Resource => self
                    .registry
                    .resources
                    .get(&key)
                    .map(|e| e.primitive_metadata())
                    .or_else(|| self.registry.match_resource_template(&key).map(|e| e.primitive_metadata())),
            };
        }

        next.handle(ctx).await
    }
}

/// `ping` (§11): no params, empty result.
#[must_use]
pub fn ping_handler() -> Arc<dyn RequestHandler> {
    Arc::new(|_ctx: &mut FilterContext| async { serialize_result(EmptyResult::default()) })
}

/// `tools/list`. Entries whose metadata fails `auth`'s policy are omitted,
/// so a caller never sees a tool it could not then call (§4.7, §8).
#[must_use]
pub fn list_tools_handler(registry: Registry, auth: Option<Arc<AuthorizationFilter>>) -> Arc<dyn RequestHandler> {
    Arc::new(move |ctx: &mut FilterContext| {
        let registry = registry.clone();
        let auth = auth.clone();
        let caller_identity = ctx.caller_identity.clone();
        let params_result = deserialize_params::<ListToolsRequest>(ctx);
        async move {
            let _request = params_result?;
            let tools = registry
                .tools
                .list()
                .into_iter()
                .filter(|entry| {
                    passes_authorization(&auth, "tools/call", &entry.primitive_metadata(), caller_identity.as_deref())
                })
                .map(|entry| entry.tool)
                .collect();
            serialize_result(ListToolsResult { tools, next_cursor: None })
        }
    })
}

/// `tools/call`.
#[must_use]
pub fn call_tool_handler(registry: Registry) -> Arc<dyn RequestHandler> {
    Arc::new(move |ctx: &mut FilterContext| {
        let registry = registry.clone();
        let params_result = deserialize_params::<CallToolRequest>(ctx);
        async move {
            let request = params_result?;
            let entry = registry
                .tools
                .get(&request.name)
                .ok_or_else(|| SessionError::from(ServerError::NotFound { kind: "tool", name: request.name.clone() }))?;
            let result: CallToolResult = entry
                .handler
                .call(request.arguments)
                .await
                .map_err(|error| SessionError::from(ServerError::sanitize("tools/call", error)))?;
            serialize_result(result)
        }
    })
}

/// `prompts/list`. Entries whose metadata fails `auth`'s policy are omitted
/// (§4.7, §8).
#[must_use]
pub fn list_prompts_handler(registry: Registry, auth: Option<Arc<AuthorizationFilter>>) -> Arc<dyn RequestHandler> {
    Arc::new(move |ctx: &mut FilterContext| {
        let registry = registry.clone();
        let auth = auth.clone();
        let caller_identity = ctx.caller_identity.clone();
        let params_result = deserialize_params::<ListPromptsRequest>(ctx);
        async move {
            let _request = params_result?;
            let prompts = registry
                .prompts
                .list()
                .into_iter()
                .filter(|entry| {
                    passes_authorization(&auth, "prompts/get", &entry.primitive_metadata(), caller_identity.as_deref())
                })
                .map(|entry| entry.prompt)
                .collect();
            serialize_result(ListPromptsResult { prompts, next_cursor: None })
        }
    })
}

/// `prompts/get`.
#[must_use]
pub fn get_prompt_handler(registry: Registry) -> Arc<dyn RequestHandler> {
    Arc::new(move |ctx: &mut FilterContext| {
        let registry = registry.clone();
        let params_result = deserialize_params::<GetPromptRequest>(ctx);
        async move {
            let request = params_result?;
            let entry = registry.prompts.get(&request.name).ok_or_else(|| {
                SessionError::from(ServerError::NotFound { kind: "prompt", name: request.name.clone() })
            })?;
            let result: GetPromptResult = entry
                .handler
                .get(request.arguments)
                .await
                .map_err(|error| SessionError::from(ServerError::sanitize("prompts/get", error)))?;
            serialize_result(result)
        }
    })
}

/// `resources/list`. Entries whose metadata fails `auth`'s policy are
/// omitted (§4.7, §8).
#[must_use]
pub fn list_resources_handler(registry: Registry, auth: Option<Arc<AuthorizationFilter>>) -> Arc<dyn RequestHandler> {
    Arc::new(move |ctx: &mut FilterContext| {
        let registry = registry.clone();
        let auth = auth.clone();
        let caller_identity = ctx.caller_identity.clone();
        let params_result = deserialize_params::<ListResourcesRequest>(ctx);
        async move {
            let _request = params_result?;
            let resources = registry
                .resources
                .list()
                .into_iter()
                .filter(|entry| {
                    passes_authorization(&auth, "resources/read", &entry.primitive_metadata(), caller_identity.as_deref())
                })
                .map(|entry| entry.resource)
                .collect();
            serialize_result(ListResourcesResult { resources, next_cursor: None })
        }
    })
}

/// `resources/templates/list`. Entries whose metadata fails `auth`'s policy
/// are omitted (§4.7, §8).
#[must_use]
pub fn list_resource_templates_handler(
    registry: Registry,
    auth: Option<Arc<AuthorizationFilter>>,
) -> Arc<dyn RequestHandler> {
    Arc::new(move |ctx: &mut FilterContext| {
        let registry = registry.clone();
        let auth = auth.clone();
        let caller_identity = ctx.caller_identity.clone();
        let params_result = deserialize_params::<ListResourceTemplatesRequest>(ctx);
        async move {
            let _request = params_result?;
            let resource_templates = registry
                .resource_templates
                .list()
                .into_iter()
                .filter(|entry| {
                    passes_authorization(&auth, "resources/read", &entry.primitive_metadata(), caller_identity.as_deref())
                })
                .map(|entry| entry.template)
                .collect();
            serialize_result(ListResourceTemplatesResult { resource_templates, next_cursor: None })
        }
    })
}

/// `resources/read`: a concrete resource match wins over a template match
/// (§4.8, §11).
#[must_use]
pub fn read_resource_handler(registry: Registry) -> Arc<dyn RequestHandler> {
    Arc::new(move |ctx: &mut FilterContext| {
        let registry = registry.clone();
        let params_result = deserialize_params::<ReadResourceRequest>(ctx);
        async move {
            let request = params_result?;
            if let Some(entry) = registry.resources.list().into_iter().find(|e| e.resource.uri == request.uri) {
                let result: ReadResourceResult = entry
                    .handler
                    .read(&request.uri)
                    .await
                    .map_err(|error| SessionError::from(ServerError::sanitize("resources/read", error)))?;
                return serialize_result(result);
            }
            if let Some(entry) = registry.match_resource_template(&request.uri) {
                let result: ReadResourceResult = entry
                    .handler
                    .read(&request.uri)
                    .await
                    .map_err(|error| SessionError::from(ServerError::sanitize("resources/read", error)))?;
                return serialize_result(result);
            }
            Err(SessionError::from(ServerError::NotFound { kind: "resource", name: request.uri }))
        }
    })
}

/// `resources/subscribe` (§11).
#[must_use]
pub fn subscribe_handler(subscriptions: Subscriptions) -> Arc<dyn RequestHandler> {
    Arc::new(move |ctx: &mut FilterContext| {
        let subscriptions = subscriptions.clone();
        let params_result = deserialize_params::<SubscribeRequest>(ctx);
        async move {
            let request = params_result?;
            subscriptions.subscribe(request.uri);
            serialize_result(EmptyResult::default())
        }
    })
}

/// `resources/unsubscribe` (§11).
#[must_use]
pub fn unsubscribe_handler(subscriptions: Subscriptions) -> Arc<dyn RequestHandler> {
    Arc::new(move |ctx: &mut FilterContext| {
        let subscriptions = subscriptions.clone();
        let params_result = deserialize_params::<UnsubscribeRequest>(ctx);
        async move {
            let request = params_result?;
            subscriptions.unsubscribe(&request.uri);
            serialize_result(EmptyResult::default())
        }
    })
}

/// `completion/complete` (§11).
#[must_use]
pub fn complete_handler(handler: Arc<dyn CompletionHandler>) -> Arc<dyn RequestHandler> {
    Arc::new(move |ctx: &mut FilterContext| {
        let handler = handler.clone();
        let params_result = deserialize_params::<CompleteRequest>(ctx);
        async move {
            let request = params_result?;
            let result: CompleteResult = handler
                .complete(request)
                .await
                .map_err(|error| SessionError::from(ServerError::sanitize("completion/complete", error)))?;
            serialize_result(result)
        }
    })
}

/// `logging/setLevel` (§11).
#[must_use]
pub fn set_level_handler(level: Arc<RwLock<LogLevel>>) -> Arc<dyn RequestHandler> {
    Arc::new(move |ctx: &mut FilterContext| {
        let level = level.clone();
        let params_result = deserialize_params::<SetLevelRequest>(ctx);
        async move {
            let request = params_result?;
            *level.write() = request.level;
            serialize_result(EmptyResult::default())
        }
    })
}

/// `tasks/get` (§4.9).
#[must_use]
pub fn tasks_get_handler(dispatcher: TaskDispatcher) -> Arc<dyn RequestHandler> {
    Arc::new(move |ctx: &mut FilterContext| {
        let dispatcher = dispatcher.clone();
        let params_result = deserialize_params::<GetTaskRequest>(ctx);
        async move {
            let request = params_result?;
            let task = dispatcher
                .store()
                .get(dispatcher.session_id(), &request.task_id)
                .await
                .map_err(|error| SessionError::from(ServerError::from(error)))?;
            serialize_result(GetTaskResult { task })
        }
    })
}

/// `tasks/result` (§4.9).
#[must_use]
pub fn tasks_result_handler(dispatcher: TaskDispatcher) -> Arc<dyn RequestHandler> {
    Arc::new(move |ctx: &mut FilterContext| {
        let dispatcher = dispatcher.clone();
        let params_result = deserialize_params::<GetTaskResultRequest>(ctx);
        async move {
            let request = params_result?;
            let result = dispatcher
                .store()
                .result(dispatcher.session_id(), &request.task_id)
                .await
                .map_err(|error| SessionError::from(ServerError::from(error)))?;
            serialize_result(GetTaskResultResult { result })
        }
    })
}

/// `tasks/cancel` (§4.9).
#[must_use]
pub fn tasks_cancel_handler(dispatcher: TaskDispatcher) -> Arc<dyn RequestHandler> {
    Arc::new(move |ctx: &mut FilterContext| {
        let dispatcher = dispatcher.clone();
        let params_result = deserialize_params::<CancelTaskRequest>(ctx);
        async move {
            let request = params_result?;
            dispatcher.cancel_inflight(&request.task_id);
            let task = dispatcher
                .store()
                .cancel(dispatcher.session_id(), &request.task_id)
                .await
                .map_err(|error| SessionError::from(ServerError::from(error)))?;
            serialize_result(CancelTaskResult { task })
        }
    })
}

/// `tasks/list` (§4.9).
#[must_use]
pub fn tasks_list_handler(dispatcher: TaskDispatcher) -> Arc<dyn RequestHandler> {
    Arc::new(move |ctx: &mut FilterContext| {
        let dispatcher = dispatcher.clone();
        let params_result = deserialize_params::<ListTasksRequest>(ctx);
        async move {
            let _request = params_result?;
            let tasks = dispatcher.store().list(dispatcher.session_id()).await;
            serialize_result(ListTasksResult { tasks, next_cursor: None })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_protocol::tools::ToolInputSchema;
    use std::collections::HashMap;

    #[tokio::test]
    async fn ping_returns_empty_result() {
        let handler = ping_handler();
        let mut ctx = FilterContext::new("ping", None);
        let result = handler.handle(&mut ctx).await.unwrap();
        assert_eq!(result, serde_json::json!({}));
    }

    #[tokio::test]
    async fn call_tool_reports_not_found_for_unregistered_name() {
        let registry = Registry::new();
        let handler = call_tool_handler(registry);
        let mut ctx = FilterContext::new("tools/call", Some(serde_json::json!({ "name": "missing" })));
        let err = handler.handle(&mut ctx).await.unwrap_err();
        assert!(matches!(err, SessionError::Protocol(_)));
    }

    #[tokio::test]
    async fn call_tool_dispatches_to_the_registered_handler() {
        let registry = Registry::new();
        let tool_handler: Arc<dyn crate::registry::ToolHandler> =
            Arc::new(|_args: Option<HashMap<String, Value>>| async { Ok(CallToolResult::text("42")) });
        registry.tools.insert(
            "answer",
            crate::registry::ToolEntry::new(
                mcp_protocol::tools::Tool::new("answer").with_input_schema(ToolInputSchema::empty()),
                tool_handler,
            ),
        );
        let handler = call_tool_handler(registry);
        let mut ctx = FilterContext::new("tools/call", Some(serde_json::json!({ "name": "answer" })));
        let result = handler.handle(&mut ctx).await.unwrap();
        let parsed: CallToolResult = serde_json::from_value(result).unwrap();
        assert!(!parsed.is_error.unwrap_or(false));
    }

    #[tokio::test]
    async fn primitive_matcher_populates_matched_primitive_for_a_registered_tool() {
        let registry = Registry::new();
        let tool_handler: Arc<dyn crate::registry::ToolHandler> =
            Arc::new(|_args: Option<HashMap<String, Value>>| async { Ok(CallToolResult::text("ok")) });
        registry.tools.insert(
            "danger",
            crate::registry::ToolEntry::new(
                mcp_protocol::tools::Tool::new("danger").with_input_schema(ToolInputSchema::empty()),
                tool_handler,
            )
            .with_metadata("requires_scope", serde_json::json!("admin")),
        );
        let filter = PrimitiveMatcherFilter::new(registry.clone(), PrimitiveKind::Tool);
        let base = call_tool_handler(registry);
        let mut ctx = FilterContext::new("tools/call", Some(serde_json::json!({ "name": "danger" })));
        filter.call(&mut ctx, base.as_ref()).await.unwrap();
        let matched = ctx.matched_primitive.expect("matched");
        assert_eq!(matched.name, "danger");
        assert_eq!(matched.metadata.get("requires_scope"), Some(&serde_json::json!("admin")));
    }

    fn admin_only_policy() -> Arc<dyn Fn(&FilterContext) -> bool + Send + Sync> {
        Arc::new(|ctx: &FilterContext| {
            ctx.matched_primitive
                .as_ref()
                .and_then(|p| p.metadata.get("requires_scope"))
                .is_none()
        })
    }

    #[tokio::test]
    async fn list_tools_omits_entries_the_caller_is_not_authorized_to_call() {
        let registry = Registry::new();
        let tool_handler: Arc<dyn crate::registry::ToolHandler> =
            Arc::new(|_args: Option<HashMap<String, Value>>| async { Ok(CallToolResult::text("ok")) });
        for name in ["open_a", "open_b", "secret_a", "secret_b", "secret_c"] {
            let mut entry = crate::registry::ToolEntry::new(
                mcp_protocol::tools::Tool::new(name).with_input_schema(ToolInputSchema::empty()),
                tool_handler.clone(),
            );
            if name.starts_with("secret") {
                entry = entry.with_metadata("requires_scope", serde_json::json!("admin"));
            }
            registry.tools.insert(name, entry);
        }

        let auth = Arc::new(AuthorizationFilter::new(admin_only_policy()));
        let list_handler = list_tools_handler(registry.clone(), Some(auth.clone()));
        let mut ctx = FilterContext::new("tools/list", None);
        let result = list_handler.handle(&mut ctx).await.unwrap();
        let parsed: ListToolsResult = serde_json::from_value(result).unwrap();
        assert_eq!(parsed.tools.len(), 2);
        assert!(parsed.tools.iter().all(|tool| !tool.name.starts_with("secret")));
        assert!(auth.was_invoked());
    }

    #[tokio::test]
    async fn call_tool_is_forbidden_for_an_entry_the_policy_rejects() {
        let registry = Registry::new();
        let tool_handler: Arc<dyn crate::registry::ToolHandler> =
            Arc::new(|_args: Option<HashMap<String, Value>>| async { Ok(CallToolResult::text("ok")) });
        registry.tools.insert(
            "secret_a",
            crate::registry::ToolEntry::new(
                mcp_protocol::tools::Tool::new("secret_a").with_input_schema(ToolInputSchema::empty()),
                tool_handler,
            )
            .with_metadata("requires_scope", serde_json::json!("admin")),
        );

        let method_handler = MethodHandler::new(
            call_tool_handler(registry.clone()),
            vec![
                Arc::new(PrimitiveMatcherFilter::new(registry, PrimitiveKind::Tool)),
                Arc::new(AuthorizationFilter::new(admin_only_policy())),
            ],
        );
        let mut ctx = FilterContext::new("tools/call", Some(serde_json::json!({ "name": "secret_a" })));
        let err = method_handler.dispatch(&mut ctx).await.unwrap_err();
        assert!(matches!(err, SessionError::Forbidden(_)));
    }
}
