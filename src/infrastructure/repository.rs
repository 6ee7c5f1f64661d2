//! Repository traits for domain entities.
//!
//! Repository methods return boxed futures that own everything they touch,
//! so a call can be built once and awaited later from any handler without
//! borrowing the repository across the await.

use futures::future::BoxFuture;
use thiserror::Error;

use crate::domain::{Task, TaskId, Timestamp, VersionMismatch, WorkspaceId};

// =============================================================================
// Repository Error
// =============================================================================

/// Errors that can occur during repository operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// Entity was not found (or lives in another workspace).
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Optimistic locking conflict.
    #[error("Version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: u64, found: u64 },

    /// Database connection or query error.
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<VersionMismatch> for RepositoryError {
    fn from(mismatch: VersionMismatch) -> Self {
        Self::VersionConflict {
            expected: mismatch.expected,
            found: mismatch.found,
        }
    }
}

// =============================================================================
// Task Filter
// =============================================================================

/// Optional narrowing applied by [`TaskRepository::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Case-insensitive substring the title must contain.
    pub query: Option<String>,
}

impl TaskFilter {
    /// A filter that matches every task in the workspace.
    #[must_use]
    pub const fn all() -> Self {
        Self { query: None }
    }

    /// A filter on title substring. Blank queries match everything.
    #[must_use]
    pub fn title_contains(query: impl Into<String>) -> Self {
        let query: String = query.into();
        let trimmed = query.trim();
        Self {
            query: (!trimmed.is_empty()).then(|| trimmed.to_string()),
        }
    }

    /// Returns `true` if `task` passes the filter.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        self.query
            .as_deref()
            .is_none_or(|query| task.title_matches(query))
    }
}

// =============================================================================
// Task Repository
// =============================================================================

/// Repository trait for Task entities.
///
/// Every read and write is scoped to a workspace; a task owned by another
/// workspace is reported exactly like a missing one.
pub trait TaskRepository: Send + Sync {
    /// Finds a task by its ID within a workspace.
    ///
    /// Returns `Ok(None)` when the task does not exist or is owned by a
    /// different workspace.
    fn find_by_id(
        &self,
        workspace_id: &WorkspaceId,
        id: &TaskId,
    ) -> BoxFuture<'static, Result<Option<Task>, RepositoryError>>;

    /// Lists the tasks of a workspace ordered by creation time.
    fn list(
        &self,
        workspace_id: &WorkspaceId,
        filter: TaskFilter,
    ) -> BoxFuture<'static, Result<Vec<Task>, RepositoryError>>;

    /// Inserts a new task.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::VersionConflict { expected: 0, found: 1 }`
    /// if a task with the same ID already exists.
    fn insert(&self, task: &Task) -> BoxFuture<'static, Result<(), RepositoryError>>;

    /// Conditionally replaces the title of a task.
    ///
    /// Reading the stored version, comparing it with `expected_version`, and
    /// writing the new title with `version + 1` happen as one atomic step:
    /// two callers presenting the same expected version can never both
    /// succeed.
    ///
    /// # Errors
    ///
    /// - `RepositoryError::NotFound` if the task is absent from the workspace
    /// - `RepositoryError::VersionConflict` if the stored version differs
    fn update_title(
        &self,
        workspace_id: &WorkspaceId,
        id: &TaskId,
        title: String,
        expected_version: u64,
        timestamp: Timestamp,
    ) -> BoxFuture<'static, Result<Task, RepositoryError>>;

    /// Checks that the backing storage is reachable.
    fn ping(&self) -> BoxFuture<'static, Result<(), RepositoryError>>;
}

// =============================================================================
// Tests
// =============================================================================
