//! Task domain model.
//!
//! This module contains the core domain model for task tracking: identifier
//! newtypes, the `Task` entity, and the version arithmetic used for
//! optimistic concurrency control.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// Value Objects - Newtypes
// =============================================================================

/// Unique identifier for a task.
///
/// Task identifiers are opaque strings. Newly created tasks receive a
/// time-ordered UUID rendered as text, but any non-empty string (such as the
/// seeded `t1`) is a valid identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Creates a `TaskId` from an existing identifier string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Generates a new `TaskId` from a time-ordered UUID (v7).
    ///
    /// **Note**: This is an impure function (side effect: time + random).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identifier of the tenant that owns a task.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    /// Creates a `WorkspaceId` from a string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkspaceId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for WorkspaceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identifier of the authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Creates a `UserId` from a string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// A timestamp wrapper for `DateTime<Utc>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a `Timestamp` from a `DateTime<Utc>`.
    #[must_use]
    pub const fn from_datetime(datetime: DateTime<Utc>) -> Self {
        Self(datetime)
    }

    /// Returns the inner `DateTime<Utc>`.
    #[must_use]
    pub const fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Returns the current time as a `Timestamp`.
    ///
    /// **Note**: This is an impure function (side effect: system clock).
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Formats the timestamp as RFC 3339 with millisecond precision.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.to_rfc3339())
    }
}

// =============================================================================
// Version Mismatch
// =============================================================================

/// Raised when a writer's expected version differs from the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Expected version {expected}, found {found}")]
pub struct VersionMismatch {
    /// Version the writer declared via `If-Match`.
    pub expected: u64,
    /// Version currently stored.
    pub found: u64,
}

// =============================================================================
// Task
// =============================================================================

/// The task entity.
///
/// `version` is the concurrency-control token: it starts at 1 and grows by
/// exactly one on every accepted mutation. `task_id` and `workspace_id` never
/// change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_field_names)]
pub struct Task {
    /// Unique identifier for the task.
    pub task_id: TaskId,
    /// Tenant that owns the task.
    pub workspace_id: WorkspaceId,
    /// Title of the task.
    pub title: String,
    /// Version number for optimistic locking.
    pub version: u64,
    /// Timestamp when the task was created.
    pub created_at: Timestamp,
    /// Timestamp when the task was last updated.
    pub updated_at: Timestamp,
}

impl Task {
    /// Creates a new task at version 1.
    ///
    /// This is a pure function; identifiers and the timestamp are supplied by
    /// the caller.
    #[must_use]
    pub fn new(
        task_id: TaskId,
        workspace_id: WorkspaceId,
        title: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            task_id,
            workspace_id,
            title: title.into(),
            version: 1,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Returns the task with the given version.
    ///
    /// Used to restore persisted tasks and to seed fixtures; it does not
    /// represent a mutation.
    #[must_use]
    pub fn with_version(self, version: u64) -> Self {
        Self { version, ..self }
    }

    /// Returns `true` if the task belongs to the given workspace.
    #[must_use]
    pub fn belongs_to(&self, workspace_id: &WorkspaceId) -> bool {
        &self.workspace_id == workspace_id
    }

    /// Applies a title change guarded by the caller's expected version.
    ///
    /// On success the returned task carries the new title, `version + 1`, and
    /// `updated_at = timestamp`. The receiver is never modified, so a
    /// mismatch leaves stored state untouched.
    ///
    /// # Errors
    ///
    /// Returns [`VersionMismatch`] when `expected_version` differs from the
    /// current version.
    pub fn retitle(
        &self,
        expected_version: u64,
        title: impl Into<String>,
        timestamp: Timestamp,
    ) -> Result<Self, VersionMismatch> {
        if self.version != expected_version {
            return Err(VersionMismatch {
                expected: expected_version,
                found: self.version,
            });
        }

        Ok(Self {
            title: title.into(),
            version: self.version + 1,
            updated_at: timestamp,
            ..self.clone()
        })
    }

    /// Returns `true` if the title contains `query`, ignoring case.
    #[must_use]
    pub fn title_matches(&self, query: &str) -> bool {
        self.title.to_lowercase().contains(&query.to_lowercase())
    }
}

// =============================================================================
// Tests
// =============================================================================
