//! Task-augmented dispatch (§4.9, §9, SEP-1686): wraps a normal method
//! handler so a request carrying `_meta.task` runs in the background and
//! answers immediately with a [`CreateTaskResult`], instead of blocking the
//! caller until the real work finishes.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use mcp_protocol::tasks::{CreateTaskResult, TaskMetadata, TaskStatus};
use mcp_session::{FilterContext, PrimitiveMetadata, RequestHandler, SessionError, SessionResult, TaskStore};
use tokio_util::sync::CancellationToken;

/// Scopes task creation/lookup to one server session and lets
/// `tasks/cancel` reach an in-flight background invocation.
#[derive(Clone)]
pub struct TaskDispatcher {
    store: Arc<dyn TaskStore>,
    session_id: Arc<str>,
    inflight: Arc<DashMap<String, CancellationToken>>,
}

impl TaskDispatcher {
    /// Scope task storage to `session_id` — every task this dispatcher
    /// creates or augments is invisible from any other session (§9
    /// Security considerations).
    #[must_use]
    pub fn new(store: Arc<dyn TaskStore>, session_id: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            session_id: session_id.into(),
            inflight: Arc::new(DashMap::new()),
        }
    }

    /// The underlying store, for `tasks/get`/`tasks/result`/`tasks/cancel`/
    /// `tasks/list` handlers to share.
    #[must_use]
    pub fn store(&self) -> Arc<dyn TaskStore> {
        self.store.clone()
    }

    /// This dispatcher's session scope.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Cancel the in-flight invocation backing `task_id`, if one is still
    /// running (§4.9).
    pub fn cancel_inflight(&self, task_id: &str) {
        if let Some((_, token)) = self.inflight.remove(task_id) {
            token.cancel();
        }
    }

    /// Wrap `base` so that a request carrying `_meta.task` is dispatched
    /// as a background task: the store records a new
    /// [`Task`](mcp_protocol::tasks::Task), `base` runs detached with its
    /// own cancellation token, and the caller receives a
    /// [`CreateTaskResult`] immediately instead of `base`'s normal result.
    /// Requests without `_meta.task` run inline, unaffected.
    #[must_use]
    pub fn augment(&self, base: Arc<dyn RequestHandler>) -> Arc<dyn RequestHandler> {
        Arc::new(Augmented {
            base,
            store: self.store.clone(),
            session_id: self.session_id.clone(),
            inflight: self.inflight.clone(),
        })
    }
}

struct Augmented {
    base: Arc<dyn RequestHandler>,
    store: Arc<dyn TaskStore>,
    session_id: Arc<str>,
    inflight: Arc<DashMap<String, CancellationToken>>,
}

#[async_trait]
impl RequestHandler for Augmented {
    async fn handle(&self, ctx: &mut FilterContext) -> SessionResult<serde_json::Value> {
        let Some(meta) = extract_task_metadata(ctx) else {
            return self.base.handle(ctx).await;
        };

        let task = self.store.create(&self.session_id, meta.ttl, None).await;
        let task_id = task.task_id.clone();
        let cancel = CancellationToken::new();
        self.inflight.insert(task_id.clone(), cancel.clone());

        let owned = OwnedContext {
            method: ctx.method.clone(),
            params: ctx.params.clone(),
            matched_primitive: ctx.matched_primitive.clone(),
            caller_identity: ctx.caller_identity.clone(),
            items: ctx.items.clone(),
        };
        tokio::spawn(run_task(
            owned,
            self.base.clone(),
            self.store.clone(),
            self.session_id.clone(),
            task_id,
            cancel,
            self.inflight.clone(),
        ));

        let result = CreateTaskResult { task };
        serde_json::to_value(result).map_err(|error| SessionError::Core(error.into()))
    }
}

/// The parts of a [`FilterContext`] that outlive the request that created
/// them, carried into the detached task.
struct OwnedContext {
    method: String,
    params: Option<serde_json::Value>,
    matched_primitive: Option<PrimitiveMetadata>,
    caller_identity: Option<String>,
    items: std::collections::HashMap<String, serde_json::Value>,
}

async fn run_task(
    owned: OwnedContext,
    base: Arc<dyn RequestHandler>,
    store: Arc<dyn TaskStore>,
    session_id: Arc<str>,
    task_id: String,
    cancel: CancellationToken,
    inflight: Arc<DashMap<String, CancellationToken>>,
) {
    let mut ctx = FilterContext {
        method: owned.method,
        params: owned.params,
        matched_primitive: owned.matched_primitive,
        caller_identity: owned.caller_identity,
        items: owned.items,
        cancel: cancel.clone(),
    };

    let outcome = tokio::select! {
        result = base.handle(&mut ctx) => Some(result),
        () = cancel.cancelled() => None,
    };

    inflight.remove(&task_id);

    match outcome {
        Some(Ok(value)) => {
            let _ = store.complete(&session_id, &task_id, TaskStatus::Completed, value).await;
        }
        Some(Err(error)) => {
            let message = error.into_wire_error().message;
            let _ = store
                .complete(&session_id, &task_id, TaskStatus::Failed, serde_json::json!({ "message": message }))
                .await;
        }
        None => {
            let _ = store.cancel(&session_id, &task_id).await;
        }
    }
}

fn extract_task_metadata(ctx: &FilterContext) -> Option<TaskMetadata> {
    ctx.params
        .as_ref()?
        .get("_meta")?
        .get("task")
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_session::InMemoryTaskStore;

    #[tokio::test]
    async fn request_without_task_metadata_runs_inline() {
        let dispatcher = TaskDispatcher::new(InMemoryTaskStore::shared(), "session-1");
        let base: Arc<dyn RequestHandler> = Arc::new(|_ctx: &mut FilterContext| async { Ok(serde_json::json!(42)) });
        let augmented = dispatcher.augment(base);
        let mut ctx = FilterContext::new("tools/call", None);
        let result = augmented.handle(&mut ctx).await.unwrap();
        assert_eq!(result, serde_json::json!(42));
    }

    #[tokio::test]
    async fn request_with_task_metadata_returns_a_create_task_result_immediately() {
        let dispatcher = TaskDispatcher::new(InMemoryTaskStore::shared(), "session-1");
        let (gate_tx, gate_rx) = tokio::sync::oneshot::channel::<()>();
        let gate_rx = Arc::new(tokio::sync::Mutex::new(Some(gate_rx)));
        let base: Arc<dyn RequestHandler> = Arc::new(move |_ctx: &mut FilterContext| {
            let gate_rx = gate_rx.clone();
            async move {
                if let Some(rx) = gate_rx.lock().await.take() {
                    let _ = rx.await;
                }
                Ok(serde_json::json!("done"))
            }
        });
        let augmented = dispatcher.augment(base);

        let mut ctx = FilterContext::new("tools/call", Some(serde_json::json!({ "_meta": { "task": {} } })));
        let result = augmented.handle(&mut ctx).await.unwrap();
        let task: CreateTaskResult = serde_json::from_value(result).unwrap();
        assert_eq!(task.task.status, TaskStatus::Working);

        let _ = gate_tx.send(());
    }
}
