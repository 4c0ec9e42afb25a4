//! Long-running task augmentation (§9, SEP-1686).
//!
//! Any request a server declares support for via `ServerCapabilities::tasks`
//! can be augmented with `task` metadata in its params; the receiver then
//! answers immediately with a [`CreateTaskResult`] instead of the method's
//! normal result, and the caller polls `tasks/get`/`tasks/result` (or waits
//! on `tasks/cancel`) until the task reaches a terminal status.

use serde::{Deserialize, Serialize};

use crate::core::Cursor;

/// Where a task currently stands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// The task is actively running.
    Working,
    /// The task is blocked on user input (e.g. an elicitation).
    InputRequired,
    /// Terminal: the task finished and a result is available.
    Completed,
    /// Terminal: the task ended in an error.
    Failed,
    /// Terminal: the task was cancelled before completion.
    Cancelled,
}

impl TaskStatus {
    /// `true` for [`Self::Completed`], [`Self::Failed`], and
    /// [`Self::Cancelled`] — no further status transitions are valid.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// The inverse of [`Self::is_terminal`].
    #[must_use]
    pub const fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Whether moving from `self` to `next` is a legal transition. Terminal
    /// states accept no further transitions; active states accept any.
    #[must_use]
    pub const fn can_transition_to(self, _next: Self) -> bool {
        self.is_active()
    }
}

/// A long-running operation tracked by task id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    /// Cryptographically-random identifier; the primary access control
    /// mechanism for this task (§9 Security considerations).
    #[serde(rename = "taskId")]
    pub task_id: String,
    /// Current status.
    pub status: TaskStatus,
    /// Freeform status detail: a progress note, a cancellation reason, or a
    /// failure diagnostic depending on `status`.
    #[serde(rename = "statusMessage", skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    /// RFC 3339 creation time. Task TTL is measured from here, not from the
    /// last update.
    #[serde(rename = "createdAt")]
    pub created_at: String,
    /// RFC 3339 time of the most recent status change.
    #[serde(rename = "lastUpdatedAt")]
    pub last_updated_at: String,
    /// Milliseconds from `created_at` after which the task may be deleted.
    /// `None` means unlimited retention.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
    /// Suggested polling interval in milliseconds.
    #[serde(rename = "pollInterval", skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<u64>,
}

/// Carried in a request's params to opt it into task-augmented execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskMetadata {
    /// Requested TTL in milliseconds; the receiver may override it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

/// Immediate response to a task-augmented request, carrying the new task in
/// its initial (usually [`TaskStatus::Working`]) state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskResult {
    /// The newly created task.
    pub task: Task,
}

/// `tasks/get` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTaskRequest {
    /// The task to look up.
    #[serde(rename = "taskId")]
    pub task_id: String,
}

/// `tasks/get` result: the task's current state, with no result payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTaskResult {
    /// The task.
    pub task: Task,
}

/// `tasks/result` request: fetch the terminal result of a completed task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTaskResultRequest {
    /// The task whose result to fetch.
    #[serde(rename = "taskId")]
    pub task_id: String,
}

/// `tasks/result` result: the original method's result, wrapped. The
/// receiver must reject this call until `task.status.is_terminal()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTaskResultResult {
    /// The original request's result value, exactly as the non-augmented
    /// method would have returned it.
    pub result: serde_json::Value,
}

/// `tasks/cancel` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelTaskRequest {
    /// The task to cancel.
    #[serde(rename = "taskId")]
    pub task_id: String,
}

/// `tasks/cancel` result: the task's state immediately after the cancel
/// request was applied (typically [`TaskStatus::Cancelled`], but a task that
/// raced to completion first may legitimately return [`TaskStatus::Completed`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelTaskResult {
    /// The task after cancellation was attempted.
    pub task: Task,
}

/// `tasks/list` request.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListTasksRequest {
    /// Pagination cursor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}

/// `tasks/list` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListTasksResult {
    /// Tasks visible to the caller, scoped to its own session (§9 Security
    /// considerations: task ids and listings never cross sessions).
    pub tasks: Vec<Task>,
    /// Cursor for the next page, if any.
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<Cursor>,
}

/// `notifications/tasks/status` (§9): pushed proactively to a task's owning
/// session so it need not poll `tasks/get` to observe status changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusNotification {
    /// The task whose status changed.
    pub task: Task,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_reject_transitions() {
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Working));
        assert!(TaskStatus::Working.can_transition_to(TaskStatus::Completed));
    }

    #[test]
    fn task_serializes_with_camel_case_fields() {
        let task = Task {
            task_id: "task-1".to_string(),
            status: TaskStatus::Working,
            status_message: None,
            created_at: "2025-11-25T10:30:00Z".to_string(),
            last_updated_at: "2025-11-25T10:30:00Z".to_string(),
            ttl: Some(60_000),
            poll_interval: Some(5_000),
        };
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["taskId"], "task-1");
        assert_eq!(value["pollInterval"], 5000);
    }
}
