//! Domain module for task tracking.
//!
//! This module contains domain models and value objects.

pub mod event;
pub mod task;

pub use event::{EventId, TASK_EVENTS_TOPIC, TaskEvent, TaskEventKind, TaskVersionRef};
pub use task::{Task, TaskId, Timestamp, UserId, VersionMismatch, WorkspaceId};
