//! The client session convenience API (§4.10): wraps [`mcp_session::Session`]
//! with typed request/response methods for the tool/prompt/resource/task
//! surface, drives the `initialize`/`initialized` handshake, and answers
//! server-initiated sampling/elicitation/roots requests through whatever
//! handlers were registered.

use std::sync::Arc;
use std::time::Duration;

use mcp_core::JsonRpcError;
use mcp_protocol::capabilities::ServerCapabilities;
use mcp_protocol::completion::{CompleteRequest, CompleteResult};
use mcp_protocol::core::{EmptyResult, Implementation};
use mcp_protocol::elicitation::{ElicitRequest, ElicitResult};
use mcp_protocol::initialization::{InitializeRequest, InitializeResult};
use mcp_protocol::logging::{LogLevel, SetLevelRequest};
use mcp_protocol::prompts::{GetPromptRequest, GetPromptResult, ListPromptsRequest, ListPromptsResult};
use mcp_protocol::resources::{
    ListResourceTemplatesRequest, ListResourceTemplatesResult, ListResourcesRequest,
    ListResourcesResult, ReadResourceRequest, ReadResourceResult, SubscribeRequest,
    UnsubscribeRequest,
};
use mcp_protocol::roots::ListRootsResult;
use mcp_protocol::sampling::CreateMessageRequest;
use mcp_protocol::tasks::{
    CancelTaskRequest, CancelTaskResult, GetTaskRequest, GetTaskResult, GetTaskResultRequest,
    GetTaskResultResult, ListTasksRequest, ListTasksResult,
};
use mcp_protocol::tools::{CallToolRequest, CallToolResult, ListToolsRequest, ListToolsResult};
use mcp_protocol::{ErrorCode, PROTOCOL_VERSION};
use mcp_session::{FilterContext, MethodHandler, NotificationHandler, RequestHandler, Session, SessionError};
use mcp_transport::Transport;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::capabilities::negotiate;
use crate::error::{ClientError, ClientResult};
use crate::handlers::HandlerRegistry;

/// Bounded deadline for the `initialize` handshake (§4.6: "tens of
/// seconds").
const DEFAULT_INITIALIZE_TIMEOUT: Duration = Duration::from_secs(30);

/// A client's view of one MCP connection: the underlying dispatch session,
/// the handlers it answers server-initiated requests with, and the
/// capabilities the peer declared once `initialize` completes.
#[derive(Clone)]
pub struct ClientSession {
    session: Session,
    handlers: HandlerRegistry,
    server_capabilities: Arc<RwLock<Option<ServerCapabilities>>>,
}

impl ClientSession {
    /// Connect `transport` and wire `handlers` in to answer sampling,
    /// elicitation, and roots requests from the peer. Does not perform the
    /// `initialize` handshake — call [`Self::initialize`] next.
    ///
    /// # Errors
    ///
    /// Returns whatever [`Session::spawn`] returns.
    pub async fn connect(transport: Box<dyn Transport>, handlers: HandlerRegistry) -> ClientResult<Self> {
        let session = Session::spawn(transport).await?;

        if let Some(handler) = handlers.sampling.clone() {
            session.register_method(
                "sampling/createMessage",
                MethodHandler::new(sampling_handler(handler), Vec::new()),
            );
        }
        if let Some(handler) = handlers.elicitation.clone() {
            session.register_method(
                "elicitation/create",
                MethodHandler::new(elicitation_handler(handler), Vec::new()),
            );
        }
        if let Some(provider) = handlers.roots.clone() {
            session.register_method("roots/list", MethodHandler::new(roots_handler(provider), Vec::new()));
        }

        Ok(Self {
            session,
            handlers,
            server_capabilities: Arc::new(RwLock::new(None)),
        })
    }

    /// Perform the `initialize` / `notifications/initialized` handshake
    /// with a default bounded timeout (§4.6).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InitializationTimeout`] if the server doesn't
    /// answer in time, or [`ClientError::ProtocolVersionMismatch`] if it
    /// answers with a version this client doesn't speak.
    pub async fn initialize(&self, client_info: Implementation) -> ClientResult<InitializeResult> {
        self.initialize_with_timeout(client_info, DEFAULT_INITIALIZE_TIMEOUT).await
    }

    /// As [`Self::initialize`], with an explicit deadline.
    ///
    /// # Errors
    ///
    /// See [`Self::initialize`].
    pub async fn initialize_with_timeout(
        &self,
        client_info: Implementation,
        timeout: Duration,
    ) -> ClientResult<InitializeResult> {
        let request = InitializeRequest {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: negotiate(&self.handlers),
            client_info,
        };
        let params = serde_json::to_value(&request).map_err(mcp_core::Error::from)?;

        let result: InitializeResult = tokio::time::timeout(timeout, self.call_typed("initialize", Some(params)))
            .await
            .map_err(|_| ClientError::InitializationTimeout)??;

        if result.protocol_version != PROTOCOL_VERSION {
            return Err(ClientError::ProtocolVersionMismatch {
                requested: PROTOCOL_VERSION.to_string(),
                offered: result.protocol_version,
            });
        }

        *self.server_capabilities.write() = Some(result.capabilities.clone());
        self.session.notify("notifications/initialized", None)?;
        Ok(result)
    }

    /// The capabilities the server declared, once [`Self::initialize`] has
    /// completed. `None` before then.
    #[must_use]
    pub fn server_capabilities(&self) -> Option<ServerCapabilities> {
        self.server_capabilities.read().clone()
    }

    /// Register a handler for an arbitrary notification method not already
    /// covered by a dedicated `on_*` method below.
    pub fn on_notification(&self, method: impl Into<String>, handler: Arc<dyn NotificationHandler>) {
        self.session.on_notification(method, handler);
    }

    /// `ping`: a liveness check with no parameters and an empty result
    /// (§11).
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the call fails.
    pub async fn ping(&self) -> ClientResult<()> {
        self.call_typed::<EmptyResult>("ping", None).await?;
        Ok(())
    }

    /// `tools/list`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the call fails.
    pub async fn list_tools(&self, request: ListToolsRequest) -> ClientResult<ListToolsResult> {
        self.call_typed("tools/list", Some(serde_json::to_value(request).map_err(mcp_core::Error::from)?))
            .await
    }

    /// `tools/call`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the call fails.
    pub async fn call_tool(&self, request: CallToolRequest) -> ClientResult<CallToolResult> {
        self.call_typed("tools/call", Some(serde_json::to_value(request).map_err(mcp_core::Error::from)?))
            .await
    }

    /// `prompts/list`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the call fails.
    pub async fn list_prompts(&self, request: ListPromptsRequest) -> ClientResult<ListPromptsResult> {
        self.call_typed(
            "prompts/list",
            Some(serde_json::to_value(request).map_err(mcp_core::Error::from)?),
        )
        .await
    }

    /// `prompts/get`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the call fails.
    pub async fn get_prompt(&self, request: GetPromptRequest) -> ClientResult<GetPromptResult> {
        self.call_typed("prompts/get", Some(serde_json::to_value(request).map_err(mcp_core::Error::from)?))
            .await
    }

    /// `resources/list`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the call fails.
    pub async fn list_resources(&self, request: ListResourcesRequest) -> ClientResult<ListResourcesResult> {
        self.call_typed(
            "resources/list",
            Some(serde_json::to_value(request).map_err(mcp_core::Error::from)?),
        )
        .await
    }

    /// `resources/templates/list`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the call fails.
    pub async fn list_resource_templates(
        &self,
        request: ListResourceTemplatesRequest,
    ) -> ClientResult<ListResourceTemplatesResult> {
        self.call_typed(
            "resources/templates/list",
            Some(serde_json::to_value(request).map_err(mcp_core::Error::from)?),
        )
        .await
    }

    /// `resources/read`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the call fails.
    pub async fn read_resource(&self, request: ReadResourceRequest) -> ClientResult<ReadResourceResult> {
        self.call_typed(
            "resources/read",
            Some(serde_json::to_value(request).map_err(mcp_core::Error::from)?),
        )
        .await
    }

    /// `resources/subscribe` (§11).
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the call fails.
    pub async fn subscribe(&self, uri: impl Into<String>) -> ClientResult<()> {
        let request = SubscribeRequest { uri: uri.into() };
        self.call_typed::<EmptyResult>(
            "resources/subscribe",
            Some(serde_json::to_value(request).map_err(mcp_core::Error::from)?),
        )
        .await?;
        Ok(())
    }

    /// `resources/unsubscribe` (§11).
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the call fails.
    pub async fn unsubscribe(&self, uri: impl Into<String>) -> ClientResult<()> {
        let request = UnsubscribeRequest { uri: uri.into() };
        self.call_typed::<EmptyResult>(
            "resources/unsubscribe",
            Some(serde_json::to_value(request).map_err(mcp_core::Error::from)?),
        )
        .await?;
        Ok(())
    }

    /// `completion/complete` (§11).
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the call fails.
    pub async fn complete(&self, request: CompleteRequest) -> ClientResult<CompleteResult> {
        self.call_typed(
            "completion/complete",
            Some(serde_json::to_value(request).map_err(mcp_core::Error::from)?),
        )
        .await
    }

    /// `logging/setLevel` (§11).
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the call fails.
    pub async fn set_logging_level(&self, level: LogLevel) -> ClientResult<()> {
        let request = SetLevelRequest { level };
        self.call_typed::<EmptyResult>(
            "logging/setLevel",
            Some(serde_json::to_value(request).map_err(mcp_core::Error::from)?),
        )
        .await?;
        Ok(())
    }

    /// `tasks/get` (§4.9).
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the call fails.
    pub async fn get_task(&self, task_id: impl Into<String>) -> ClientResult<GetTaskResult> {
        let request = GetTaskRequest { task_id: task_id.into() };
        self.call_typed("tasks/get", Some(serde_json::to_value(request).map_err(mcp_core::Error::from)?))
            .await
    }

    /// `tasks/result` (§4.9).
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the call fails.
    pub async fn get_task_result(&self, task_id: impl Into<String>) -> ClientResult<GetTaskResultResult> {
        let request = GetTaskResultRequest { task_id: task_id.into() };
        self.call_typed(
            "tasks/result",
            Some(serde_json::to_value(request).map_err(mcp_core::Error::from)?),
        )
        .await
    }

    /// `tasks/cancel` (§4.9).
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the call fails.
    pub async fn cancel_task(&self, task_id: impl Into<String>) -> ClientResult<CancelTaskResult> {
        let request = CancelTaskRequest { task_id: task_id.into() };
        self.call_typed(
            "tasks/cancel",
            Some(serde_json::to_value(request).map_err(mcp_core::Error::from)?),
        )
        .await
    }

    /// `tasks/list` (§4.9).
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the call fails.
    pub async fn list_tasks(&self, request: ListTasksRequest) -> ClientResult<ListTasksResult> {
        self.call_typed("tasks/list", Some(serde_json::to_value(request).map_err(mcp_core::Error::from)?))
            .await
    }

    /// The underlying dispatch session, for callers that need
    /// lower-level access (custom methods, filters, cancellation tokens).
    #[must_use]
    pub fn raw(&self) -> &Session {
        &self.session
    }

    async fn call_typed<T: DeserializeOwned>(&self, method: &str, params: Option<Value>) -> ClientResult<T> {
        let value = self.session.call(method, params).await.map_err(|error| match error {
            SessionError::Protocol(wire) => ClientError::from_protocol(wire),
            other => ClientError::Session(other),
        })?;
        serde_json::from_value(value).map_err(|error| ClientError::Session(SessionError::Core(error.into())))
    }
}

fn deserialize_params<T: DeserializeOwned>(ctx: &FilterContext) -> Result<T, SessionError> {
    serde_json::from_value(ctx.params.clone().unwrap_or(Value::Null))
        .map_err(|error| SessionError::Protocol(JsonRpcError::new(ErrorCode::InvalidParams.code(), error.to_string())))
}

fn serialize_result<T: Serialize>(value: T) -> Result<Value, SessionError> {
    serde_json::to_value(value).map_err(|error| SessionError::Core(error.into()))
}

fn sampling_handler(handler: Arc<dyn crate::handlers::SamplingHandler>) -> Arc<dyn RequestHandler> {
    Arc::new(move |ctx: &mut FilterContext| {
        let handler = handler.clone();
        let params_result = deserialize_params::<CreateMessageRequest>(ctx);
        async move {
            let request = params_result?;
            let result = handler.create_message(request).await.map_err(SessionError::from)?;
            serialize_result(result)
        }
    })
}

fn elicitation_handler(handler: Arc<dyn crate::handlers::ElicitationHandler>) -> Arc<dyn RequestHandler> {
    Arc::new(move |ctx: &mut FilterContext| {
        let handler = handler.clone();
        let params_result = deserialize_params::<ElicitRequest>(ctx);
        async move {
            let request = params_result?;
            let result: ElicitResult = handler.elicit(request).await.map_err(SessionError::from)?;
            serialize_result(result)
        }
    })
}

fn roots_handler(provider: Arc<dyn crate::handlers::RootsProvider>) -> Arc<dyn RequestHandler> {
    Arc::new(move |_ctx: &mut FilterContext| {
        let provider = provider.clone();
        async move {
            let result: ListRootsResult = provider.list_roots().await.map_err(SessionError::from)?;
            serialize_result(result)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mcp_core::{JsonRpcMessage, JsonRpcRequest, JsonRpcResponse};
    use mcp_protocol::capabilities::ClientCapabilities;
    use mcp_protocol::content::{ContentBlock, TextContent};
    use mcp_protocol::core::Role;
    use mcp_protocol::sampling::{CreateMessageResult, StopReason};
    use mcp_stdio::StdioTransport;
    use tokio::io::{AsyncWriteExt, BufReader, AsyncBufReadExt};

    struct EchoSampling;

    #[async_trait]
    impl crate::handlers::SamplingHandler for EchoSampling {
        async fn create_message(&self, request: CreateMessageRequest) -> ClientResult<mcp_protocol::sampling::CreateMessageResult> {
            Ok(CreateMessageResult {
                role: Role::Assistant,
                content: request.messages.into_iter().next().map(|m| m.content).unwrap_or(ContentBlock::Text(TextContent::new(""))),
                model: "test-model".to_string(),
                stop_reason: Some(StopReason::EndTurn),
            })
        }
    }

    fn duplex_pair() -> (StdioTransport, tokio::io::DuplexStream, tokio::io::DuplexStream) {
        let (client_io, server_io) = tokio::io::duplex(16 * 1024);
        let (client_read, client_write) = tokio::io::split(client_io);
        let client = StdioTransport::from_raw(client_read, client_write).unwrap();
        let (server_read, server_write) = tokio::io::split(server_io);
        (client, server_read_to_duplex(server_read), server_write)
    }

    fn server_read_to_duplex(_r: impl Sized) -> tokio::io::DuplexStream {
        unreachable!()
    }

    #[tokio::test]
    async fn negotiate_declares_sampling_when_registered() {
        let handlers = HandlerRegistry::new().with_sampling(Arc::new(EchoSampling));
        let caps: ClientCapabilities = negotiate(&handlers);
        assert!(caps.sampling.is_some());
        assert!(caps.roots.is_none());
    }

    #[tokio::test]
    async fn initialize_rejects_a_mismatched_protocol_version() {
        let (client_io, server_io) = tokio::io::duplex(16 * 1024);
        let (client_read, client_write) = tokio::io::split(client_io);
        let client_transport = StdioTransport::from_raw(client_read, client_write).unwrap();
        let (mut server_read, mut server_write) = tokio::io::split(server_io);

        let client = ClientSession::connect(Box::new(client_transport), HandlerRegistry::new())
            .await
            .unwrap();

        let server_task = tokio::spawn(async move {
            let mut reader = BufReader::new(&mut server_read);
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            let parsed = JsonRpcMessage::parse(line.trim()).unwrap();
            let JsonRpcMessage::Request(JsonRpcRequest { id, .. }) = parsed else { panic!("expected request") };
            let result = InitializeResult {
                protocol_version: "1999-01-01".to_string(),
                capabilities: ServerCapabilities::default(),
                server_info: Implementation::default(),
                instructions: None,
            };
            let response = JsonRpcResponse::success(serde_json::to_value(result).unwrap(), id);
            let mut out = JsonRpcMessage::Response(response).to_line();
            out.push('\n');
            server_write.write_all(out.as_bytes()).await.unwrap();
        });

        let result = client.initialize(Implementation::default()).await;
        server_task.await.unwrap();
        assert!(matches!(result, Err(ClientError::ProtocolVersionMismatch { .. })));
    }
}
