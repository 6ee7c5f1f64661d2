//! In-memory repository implementation.
//!
//! This module provides an in-memory implementation of `TaskRepository`,
//! suitable for development, tests, and the demo deployment.
//!
//! # Features
//!
//! - Thread-safe with `Arc<RwLock<...>>`
//! - Optimistic locking: the version check and the write run under one
//!   write guard, so concurrent updates of the same task are serialized
//! - All operations return owned futures

use std::collections::HashMap;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::domain::{Task, TaskId, Timestamp, WorkspaceId};
use crate::infrastructure::{RepositoryError, TaskFilter, TaskRepository};

// =============================================================================
// In-Memory Task Repository
// =============================================================================

/// In-memory implementation of `TaskRepository`.
///
/// Uses a `HashMap` keyed by task ID, wrapped in `Arc<RwLock<...>>` so that
/// clones share the same storage.
///
/// # Example
///
/// ```ignore
/// use infrastructure::in_memory::InMemoryTaskRepository;
///
/// let repository = InMemoryTaskRepository::new();
/// let task = Task::new(TaskId::generate(), WorkspaceId::new("w1"), "My Task", Timestamp::now());
///
/// repository.insert(&task).await?;
/// let found = repository.find_by_id(&task.workspace_id, &task.task_id).await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskRepository {
    tasks: Arc<RwLock<HashMap<TaskId, Task>>>,
}

impl InMemoryTaskRepository {
    /// Creates a new empty in-memory task repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository pre-populated with `tasks`.
    ///
    /// Tasks keep the versions they carry, which lets fixtures start from an
    /// arbitrary version. A later task with a duplicate ID replaces the
    /// earlier one.
    #[must_use]
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let map = tasks
            .into_iter()
            .map(|task| (task.task_id.clone(), task))
            .collect();
        Self {
            tasks: Arc::new(RwLock::new(map)),
        }
    }
}

#[allow(clippy::significant_drop_tightening)]
impl TaskRepository for InMemoryTaskRepository {
    fn find_by_id(
        &self,
        workspace_id: &WorkspaceId,
        id: &TaskId,
    ) -> BoxFuture<'static, Result<Option<Task>, RepositoryError>> {
        let tasks = Arc::clone(&self.tasks);
        let workspace_id = workspace_id.clone();
        let id = id.clone();
        async move {
            let guard = tasks.read().await;
            Ok(guard
                .get(&id)
                .filter(|task| task.belongs_to(&workspace_id))
                .cloned())
        }
        .boxed()
    }

    fn list(
        &self,
        workspace_id: &WorkspaceId,
        filter: TaskFilter,
    ) -> BoxFuture<'static, Result<Vec<Task>, RepositoryError>> {
        let tasks = Arc::clone(&self.tasks);
        let workspace_id = workspace_id.clone();
        async move {
            let guard = tasks.read().await;
            let mut matching: Vec<Task> = guard
                .values()
                .filter(|task| task.belongs_to(&workspace_id) && filter.matches(task))
                .cloned()
                .collect();
            drop(guard);

            matching.sort_by(|left, right| {
                left.created_at
                    .cmp(&right.created_at)
                    .then_with(|| left.task_id.cmp(&right.task_id))
            });
            Ok(matching)
        }
        .boxed()
    }

    fn insert(&self, task: &Task) -> BoxFuture<'static, Result<(), RepositoryError>> {
        let tasks = Arc::clone(&self.tasks);
        let task = task.clone();
        async move {
            let mut guard = tasks.write().await;
            if guard.contains_key(&task.task_id) {
                return Err(RepositoryError::VersionConflict {
                    expected: 0,
                    found: 1,
                });
            }
            guard.insert(task.task_id.clone(), task);
            Ok(())
        }
        .boxed()
    }

    fn update_title(
        &self,
        workspace_id: &WorkspaceId,
        id: &TaskId,
        title: String,
        expected_version: u64,
        timestamp: Timestamp,
    ) -> BoxFuture<'static, Result<Task, RepositoryError>> {
        let tasks = Arc::clone(&self.tasks);
        let workspace_id = workspace_id.clone();
        let id = id.clone();
        async move {
            // Check and write under the same guard.
            let mut guard = tasks.write().await;
            let current = guard
                .get(&id)
                .filter(|task| task.belongs_to(&workspace_id))
                .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

            let updated = current.retitle(expected_version, title, timestamp)?;
            guard.insert(id, updated.clone());
            Ok(updated)
        }
        .boxed()
    }

    fn ping(&self) -> BoxFuture<'static, Result<(), RepositoryError>> {
        futures::future::ready(Ok(())).boxed()
    }
}

// =============================================================================
// Tests
// =============================================================================
