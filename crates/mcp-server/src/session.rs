//! The server session convenience API (§4.11): wraps [`Session`] with the
//! registry/subscription/task bookkeeping [`crate::builder::ServerBuilder`]
//! assembles, server-to-client requests (sampling, elicitation, roots), and
//! the proactive notifications a server pushes outside of request/response
//! (`*/list_changed`, `resources/updated`, `notifications/message`,
//! `notifications/tasks/status`).

use std::sync::Arc;

use mcp_protocol::elicitation::{ElicitRequest, ElicitResult};
use mcp_protocol::logging::{LogLevel, LoggingMessageNotification};
use mcp_protocol::resources::ResourceUpdatedNotification;
use mcp_protocol::roots::ListRootsResult;
use mcp_protocol::sampling::{CreateMessageRequest, CreateMessageResult};
use mcp_protocol::tasks::{Task, TaskStatusNotification};
use mcp_session::{NotificationHandler, Session, SessionError};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ServerError, ServerResult};
use crate::registry::Registry;
use crate::subscriptions::Subscriptions;
use crate::tasks::TaskDispatcher;

/// A live server connection: the dispatch session plus everything
/// [`crate::builder::ServerBuilder::build`] wired into it.
#[derive(Clone)]
pub struct ServerSession {
    session: Session,
    registry: Registry,
    subscriptions: Subscriptions,
    tasks: TaskDispatcher,
    log_level: Arc<RwLock<LogLevel>>,
}

impl ServerSession {
    /// Assemble a session from its already-spawned parts, wiring each
    /// primitive collection's change hook to emit the matching
    /// `*/list_changed` notification (§4.8).
    #[must_use]
    pub fn new(
        session: Session,
        registry: Registry,
        subscriptions: Subscriptions,
        tasks: TaskDispatcher,
        log_level: Arc<RwLock<LogLevel>>,
    ) -> Self {
        let tools_session = session.clone();
        registry.tools.on_change(Arc::new(move || {
            let _ = tools_session.notify("notifications/tools/list_changed", None);
        }));

        let prompts_session = session.clone();
        registry.prompts.on_change(Arc::new(move || {
            let _ = prompts_session.notify("notifications/prompts/list_changed", None);
        }));

        let resources_session = session.clone();
        registry.resources.on_change(Arc::new(move || {
            let _ = resources_session.notify("notifications/resources/list_changed", None);
        }));
        let resource_templates_session = session.clone();
        registry.resource_templates.on_change(Arc::new(move || {
            let _ = resource_templates_session.notify("notifications/resources/list_changed", None);
        }));

        Self {
            session,
            registry,
            subscriptions,
            tasks,
            log_level,
        }
    }

    /// The underlying dispatch session, for callers that need lower-level
    /// access (custom methods, filters, cancellation tokens).
    #[must_use]
    pub fn raw(&self) -> &Session {
        &self.session
    }

    /// The registered tools/prompts/resources this session dispatches
    /// against.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Which resource URIs the peer currently subscribes to.
    #[must_use]
    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    /// Task storage and in-flight cancellation bookkeeping for this session.
    #[must_use]
    pub fn tasks(&self) -> &TaskDispatcher {
        &self.tasks
    }

    /// Register a handler for an arbitrary notification method not already
    /// covered by a dedicated method handler (e.g. `notifications/cancelled`
    /// is handled by [`Session`] itself; this is for application-level
    /// notifications a caller sends).
    pub fn on_notification(&self, method: impl Into<String>, handler: Arc<dyn NotificationHandler>) {
        self.session.on_notification(method, handler);
    }

    /// Emit `notifications/resources/updated` for `uri`, but only if the peer
    /// currently subscribes to it (§11) — a caller invoking this for every
    /// resource write, subscribed or not, still never over-notifies.
    ///
    /// # Errors
    ///
    /// Returns a [`ServerError`] if the underlying notification send fails.
    pub fn notify_resource_updated(&self, uri: impl Into<String>) -> ServerResult<()> {
        let uri = uri.into();
        if !self.subscriptions.is_subscribed(&uri) {
            return Ok(());
        }
        self.session
            .notify(
                "notifications/resources/updated",
                serialize(ResourceUpdatedNotification { uri })?,
            )
            .map_err(ServerError::from)
    }

    /// Push a task's current status to the peer proactively (§9), so it need
    /// not poll `tasks/get` to observe a transition.
    ///
    /// # Errors
    ///
    /// Returns a [`ServerError`] if the underlying notification send fails.
    pub fn notify_task_status(&self, task: Task) -> ServerResult<()> {
        self.session
            .notify("notifications/tasks/status", serialize(TaskStatusNotification { task })?)
            .map_err(ServerError::from)
    }

    /// Emit a `notifications/message` log entry, but only if `level` is at
    /// or above the level the peer last requested via `logging/setLevel`
    /// (Info until then).
    ///
    /// # Errors
    ///
    /// Returns a [`ServerError`] if the underlying notification send fails.
    pub fn log(&self, level: LogLevel, data: Value, logger: Option<String>) -> ServerResult<()> {
        if level < *self.log_level.read() {
            return Ok(());
        }
        self.session
            .notify("notifications/message", serialize(LoggingMessageNotification { level, data, logger })?)
            .map_err(ServerError::from)
    }

    /// `sampling/createMessage`: ask the peer's LLM to generate a message
    /// (§4.11 server-initiated requests). Fails if the peer never declared
    /// the `sampling` capability, but this crate does not enforce that
    /// itself — callers should check `initialize`'s negotiated
    /// `ClientCapabilities` first.
    ///
    /// # Errors
    ///
    /// Returns a [`ServerError`] if the call fails.
    pub async fn request_sampling(&self, request: CreateMessageRequest) -> ServerResult<CreateMessageResult> {
        self.call_typed("sampling/createMessage", request).await
    }

    /// `elicitation/create`: ask the peer to collect structured input from
    /// its user (§4.11).
    ///
    /// # Errors
    ///
    /// Returns a [`ServerError`] if the call fails.
    pub async fn request_elicitation(&self, request: ElicitRequest) -> ServerResult<ElicitResult> {
        self.call_typed("elicitation/create", request).await
    }

    /// `roots/list`: ask the peer which filesystem roots it exposes (§4.11).
    ///
    /// # Errors
    ///
    /// Returns a [`ServerError`] if the call fails.
    pub async fn request_roots_list(&self) -> ServerResult<ListRootsResult> {
        let value = self.session.call("roots/list", None).await.map_err(ServerError::from)?;
        serde_json::from_value(value).map_err(|error| ServerError::from(SessionError::Core(error.into())))
    }

    async fn call_typed<Req: serde::Serialize, Res: DeserializeOwned>(&self, method: &str, request: Req) -> ServerResult<Res> {
        let params = serde_json::to_value(request).map_err(|error| ServerError::from(SessionError::Core(error.into())))?;
        let value = self.session.call(method, Some(params)).await.map_err(ServerError::from)?;
        serde_json::from_value(value).map_err(|error| ServerError::from(SessionError::Core(error.into())))
    }
}

fn serialize<T: serde::Serialize>(value: T) -> ServerResult<Option<Value>> {
    serde_json::to_value(value)
        .map(Some)
        .map_err(|error| ServerError::from(SessionError::Core(error.into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_session::InMemoryTaskStore;
    use mcp_stdio::StdioTransport;

    async fn spawn_pair() -> ServerSession {
        let (_client_io, server_io) = tokio::io::duplex(16 * 1024);
        let (server_read, server_write) = tokio::io::split(server_io);
        let transport = StdioTransport::from_raw(server_read, server_write).unwrap();

        let session = Session::spawn(Box::new(transport)).await.unwrap();
        let registry = Registry::new();
        let subscriptions = Subscriptions::new();
        let dispatcher = TaskDispatcher::new(InMemoryTaskStore::shared(), "session-1");
        let log_level = Arc::new(RwLock::new(LogLevel::Info));
        ServerSession::new(session, registry, subscriptions, dispatcher, log_level)
    }

    #[tokio::test]
    async fn notify_resource_updated_is_a_no_op_without_a_subscriber() {
        let server = spawn_pair().await;
        server.notify_resource_updated("file:///log").unwrap();
    }

    #[tokio::test]
    async fn notify_resource_updated_sends_once_subscribed() {
        let server = spawn_pair().await;
        server.subscriptions().subscribe("file:///log");
        server.notify_resource_updated("file:///log").unwrap();
    }

    #[tokio::test]
    async fn log_below_threshold_is_suppressed() {
        let server = spawn_pair().await;
        assert!(server.tasks().store().list("session-1").await.is_empty());
        server.log(LogLevel::Debug, serde_json::json!("quiet"), None).unwrap();
    }
}
