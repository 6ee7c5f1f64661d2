//! Change notifications for tasks.
//!
//! Events describe an already-committed change. They are published
//! fire-and-forget after the write, so nothing here participates in the
//! storage transaction.

use serde::{Deserialize, Serialize};

use super::task::{Task, TaskId, Timestamp, UserId, WorkspaceId};

/// Topic on which task change events are published.
pub const TASK_EVENTS_TOPIC: &str = "task.events";

// =============================================================================
// Event ID
// =============================================================================

/// Unique identifier for an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(uuid::Uuid);

impl EventId {
    /// Generates a new random `EventId`.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

// =============================================================================
// Task Event
// =============================================================================

/// Kind of change an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskEventKind {
    /// A task was created.
    #[serde(rename = "task.created")]
    Created,
    /// A task's title was changed through the conditional update.
    #[serde(rename = "task.updated")]
    Updated,
}

impl TaskEventKind {
    /// Returns the wire name of the event kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "task.created",
            Self::Updated => "task.updated",
        }
    }
}

impl std::fmt::Display for TaskEventKind {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Reference to the task version an event was produced for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskVersionRef {
    /// Task identifier.
    pub id: TaskId,
    /// Version after the change.
    pub version: u64,
}

/// A task change event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEvent {
    /// Unique identifier of this event.
    pub event_id: EventId,
    /// Kind of change.
    #[serde(rename = "type")]
    pub kind: TaskEventKind,
    /// Task and version produced by the change.
    pub task: TaskVersionRef,
    /// Workspace the task belongs to.
    pub workspace_id: WorkspaceId,
    /// Caller that performed the change.
    pub user_id: UserId,
    /// When the change was committed.
    pub occurred_at: Timestamp,
}

impl TaskEvent {
    /// Builds an event for a committed change to `task`.
    ///
    /// The event id is generated here; `occurred_at` is taken from the task's
    /// `updated_at`, which the store set at commit time.
    #[must_use]
    pub fn for_task(kind: TaskEventKind, task: &Task, user_id: UserId) -> Self {
        Self {
            event_id: EventId::generate(),
            kind,
            task: TaskVersionRef {
                id: task.task_id.clone(),
                version: task.version,
            },
            workspace_id: task.workspace_id.clone(),
            user_id,
            occurred_at: task.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_event_wire_format() {
        let task = Task::new(
            TaskId::new("t1"),
            WorkspaceId::new("w1"),
            "Title",
            Timestamp::now(),
        )
        .with_version(6);

        let event = TaskEvent::for_task(TaskEventKind::Updated, &task, UserId::new("u999"));
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "task.updated");
        assert_eq!(json["task"]["id"], "t1");
        assert_eq!(json["task"]["version"], 6);
        assert_eq!(json["workspaceId"], "w1");
        assert_eq!(json["userId"], "u999");
        assert!(json["eventId"].is_string());
    }

    #[rstest]
    #[case(TaskEventKind::Created, "task.created")]
    #[case(TaskEventKind::Updated, "task.updated")]
    fn test_event_kind_as_str(#[case] kind: TaskEventKind, #[case] expected: &str) {
        assert_eq!(kind.as_str(), expected);
        assert_eq!(kind.to_string(), expected);
    }
}
