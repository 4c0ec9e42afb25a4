//! Long-running task storage (§4.9, §3 Task record).
//!
//! Storage is pluggable: this crate ships [`InMemoryTaskStore`] to full
//! fidelity. A durable backend (e.g. file-based with retrying lock
//! acquisition) is left to an application to provide as an
//! [`TaskStore`] implementation — the retry count/delay such a backend
//! would use are implementation-tunable (§9 Open question).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use mcp_protocol::tasks::{Task, TaskStatus};
use parking_lot::RwLock;
use uuid::Uuid;

/// A task record plus the session it's scoped to, so a lookup from a
/// different session never observes it (§4.9 session isolation, §9
/// Security considerations).
#[derive(Debug, Clone)]
struct StoredTask {
    task: Task,
    session_id: String,
    result: Option<serde_json::Value>,
}

/// Errors raised by a [`TaskStore`] implementation.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TaskStoreError {
    /// No task exists with the given id, or it exists but belongs to a
    /// different session (indistinguishable from the caller's perspective,
    /// by design — session isolation must not leak existence).
    #[error("task not found: {0}")]
    NotFound(String),

    /// `tasks/result` was called before the task reached a terminal status.
    #[error("task {0} has not completed")]
    NotTerminal(String),
}

/// Result alias for task store operations.
pub type TaskStoreResult<T> = std::result::Result<T, TaskStoreError>;

/// Pluggable storage for task-augmented invocations (§4.9).
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create a new task owned by `session_id`, returning its initial
    /// (`Working`) record.
    async fn create(&self, session_id: &str, ttl: Option<u64>, poll_interval: Option<u64>) -> Task;

    /// Look up a task by id, scoped to `session_id`.
    async fn get(&self, session_id: &str, task_id: &str) -> TaskStoreResult<Task>;

    /// Update a task's status and status message. A no-op if the task is
    /// already terminal (§3: "once terminal, status and result are
    /// immutable").
    async fn update_status(
        &self,
        session_id: &str,
        task_id: &str,
        status: TaskStatus,
        status_message: Option<String>,
    ) -> TaskStoreResult<Task>;

    /// Record a task's terminal result. Only valid when transitioning into
    /// [`TaskStatus::Completed`] or [`TaskStatus::Failed`].
    async fn complete(
        &self,
        session_id: &str,
        task_id: &str,
        status: TaskStatus,
        result: serde_json::Value,
    ) -> TaskStoreResult<Task>;

    /// Fetch the terminal result of a completed task.
    async fn result(&self, session_id: &str, task_id: &str) -> TaskStoreResult<serde_json::Value>;

    /// Cancel a task. A no-op returning the current state if already
    /// terminal (§4.9: "cancel on a terminal task is a no-op").
    async fn cancel(&self, session_id: &str, task_id: &str) -> TaskStoreResult<Task>;

    /// List every non-expired task owned by `session_id`, in creation
    /// order.
    async fn list(&self, session_id: &str) -> Vec<Task>;
}

/// The reference in-memory [`TaskStore`], backed by a single lock. Expired
/// tasks (past `ttl` measured from `created_at`) are treated as absent by
/// every lookup and lazily swept on each mutation.
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: RwLock<HashMap<String, StoredTask>>,
}

impl InMemoryTaskStore {
    /// Build an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap in an `Arc` for sharing across the session.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn is_expired(task: &Task, now: chrono::DateTime<Utc>) -> bool {
        let Some(ttl_ms) = task.ttl else { return false };
        let Ok(created) = chrono::DateTime::parse_from_rfc3339(&task.created_at) else {
            return false;
        };
        let age = now.signed_duration_since(created.with_timezone(&Utc));
        age.num_milliseconds() > i64::try_from(ttl_ms).unwrap_or(i64::MAX)
    }

    fn sweep_expired(&self) {
        let now = Utc::now();
        self.tasks.write().retain(|_, stored| !Self::is_expired(&stored.task, now));
    }

    fn find(&self, session_id: &str, task_id: &str) -> TaskStoreResult<Task> {
        self.sweep_expired();
        let tasks = self.tasks.read();
        tasks
            .get(task_id)
            .filter(|stored| stored.session_id == session_id)
            .map(|stored| stored.task.clone())
            .ok_or_else(|| TaskStoreError::NotFound(task_id.to_string()))
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, session_id: &str, ttl: Option<u64>, poll_interval: Option<u64>) -> Task {
        self.sweep_expired();
        let now = Utc::now().to_rfc3339();
        let task = Task {
            task_id: Uuid::new_v4().to_string(),
            status: TaskStatus::Working,
            status_message: None,
            created_at: now.clone(),
            last_updated_at: now,
            ttl,
            poll_interval,
        };
        self.tasks.write().insert(
            task.task_id.clone(),
            StoredTask {
                task: task.clone(),
                session_id: session_id.to_string(),
                result: None,
            },
        );
        task
    }

    async fn get(&self, session_id: &str, task_id: &str) -> TaskStoreResult<Task> {
        self.find(session_id, task_id)
    }

    async fn update_status(
        &self,
        session_id: &str,
        task_id: &str,
        status: TaskStatus,
        status_message: Option<String>,
    ) -> TaskStoreResult<Task> {
        self.sweep_expired();
        let mut tasks = self.tasks.write();
        let stored = tasks
            .get_mut(task_id)
            .filter(|stored| stored.session_id == session_id)
            .ok_or_else(|| TaskStoreError::NotFound(task_id.to_string()))?;
        if stored.task.status.is_terminal() {
            return Ok(stored.task.clone());
        }
        stored.task.status = status;
        stored.task.status_message = status_message;
        stored.task.last_updated_at = Utc::now().to_rfc3339();
        Ok(stored.task.clone())
    }

    async fn complete(
        &self,
        session_id: &str,
        task_id: &str,
        status: TaskStatus,
        result: serde_json::Value,
    ) -> TaskStoreResult<Task> {
        self.sweep_expired();
        let mut tasks = self.tasks.write();
        let stored = tasks
            .get_mut(task_id)
            .filter(|stored| stored.session_id == session_id)
            .ok_or_else(|| TaskStoreError::NotFound(task_id.to_string()))?;
        if stored.task.status.is_terminal() {
            return Ok(stored.task.clone());
        }
        stored.task.status = status;
        stored.task.last_updated_at = Utc::now().to_rfc3339();
        stored.result = Some(result);
        Ok(stored.task.clone())
    }

    async fn result(&self, session_id: &str, task_id: &str) -> TaskStoreResult<serde_json::Value> {
        self.sweep_expired();
        let tasks = self.tasks.read();
        let stored = tasks
            .get(task_id)
            .filter(|stored| stored.session_id == session_id)
            .ok_or_else(|| TaskStoreError::NotFound(task_id.to_string()))?;
        if !stored.task.status.is_terminal() {
            return Err(TaskStoreError::NotTerminal(task_id.to_string()));
        }
        Ok(stored.result.clone().unwrap_or(serde_json::Value::Null))
    }

    async fn cancel(&self, session_id: &str, task_id: &str) -> TaskStoreResult<Task> {
        self.sweep_expired();
        let mut tasks = self.tasks.write();
        let stored = tasks
            .get_mut(task_id)
            .filter(|stored| stored.session_id == session_id)
            .ok_or_else(|| TaskStoreError::NotFound(task_id.to_string()))?;
        if !stored.task.status.is_terminal() {
            stored.task.status = TaskStatus::Cancelled;
            stored.task.last_updated_at = Utc::now().to_rfc3339();
        }
        Ok(stored.task.clone())
    }

    async fn list(&self, session_id: &str) -> Vec<Task> {
        self.sweep_expired();
        self.tasks
            .read()
            .values()
            .filter(|stored| stored.session_id == session_id)
            .map(|stored| stored.task.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let store = InMemoryTaskStore::new();
        let task = store.create("session-1", None, None).await;
        let fetched = store.get("session-1", &task.task_id).await.unwrap();
        assert_eq!(fetched.status, TaskStatus::Working);
    }

    #[tokio::test]
    async fn task_is_invisible_from_a_different_session() {
        let store = InMemoryTaskStore::new();
        let task = store.create("session-1", None, None).await;
        let result = store.get("session-2", &task.task_id).await;
        assert!(matches!(result, Err(TaskStoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn terminal_status_is_immutable() {
        let store = InMemoryTaskStore::new();
        let task = store.create("session-1", None, None).await;
        store
            .complete("session-1", &task.task_id, TaskStatus::Completed, serde_json::json!(42))
            .await
            .unwrap();
        let after = store
            .update_status("session-1", &task.task_id, TaskStatus::Working, None)
            .await
            .unwrap();
        assert_eq!(after.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn cancel_on_terminal_task_is_a_no_op() {
        let store = InMemoryTaskStore::new();
        let task = store.create("session-1", None, None).await;
        store
            .complete("session-1", &task.task_id, TaskStatus::Completed, serde_json::json!(null))
            .await
            .unwrap();
        let after = store.cancel("session-1", &task.task_id).await.unwrap();
        assert_eq!(after.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn result_before_terminal_status_errors() {
        let store = InMemoryTaskStore::new();
        let task = store.create("session-1", None, None).await;
        let result = store.result("session-1", &task.task_id).await;
        assert!(matches!(result, Err(TaskStoreError::NotTerminal(_))));
    }

    #[tokio::test]
    async fn list_scopes_to_one_session() {
        let store = InMemoryTaskStore::new();
        store.create("session-1", None, None).await;
        store.create("session-1", None, None).await;
        store.create("session-2", None, None).await;
        assert_eq!(store.list("session-1").await.len(), 2);
        assert_eq!(store.list("session-2").await.len(), 1);
    }
}
