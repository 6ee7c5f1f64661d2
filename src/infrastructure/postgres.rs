//! `PostgreSQL` repository implementation.
//!
//! This module provides a `PostgreSQL`-backed `TaskRepository` using `sqlx`.
//!
//! # Features
//!
//! - Connection pooling with `sqlx::PgPool`
//! - Every operation runs in its own transaction that first sets
//!   `app.current_workspace_id`, which the row-level-security policy on
//!   `tasks` compares against `workspace_id`
//! - Optimistic locking through a single conditional `UPDATE ... WHERE
//!   version = $expected`; Postgres row locks serialize racing writers
//!
//! # Table Schema
//!
//! See `migrations/0001_create_tasks.sql`:
//!
//! ```sql
//! CREATE TABLE tasks (
//!     id TEXT PRIMARY KEY,
//!     workspace_id TEXT NOT NULL,
//!     title TEXT NOT NULL,
//!     version BIGINT NOT NULL DEFAULT 1 CHECK (version >= 1),
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::{Task, TaskId, Timestamp, WorkspaceId};
use crate::infrastructure::{RepositoryError, TaskFilter, TaskRepository};

/// Session setting read by the row-level-security policy.
pub const WORKSPACE_SETTING: &str = "app.current_workspace_id";

const TASK_COLUMNS: &str = "id, workspace_id, title, version, created_at, updated_at";

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: String,
    workspace_id: String,
    title: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = RepositoryError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let version = u64::try_from(row.version).map_err(|_| {
            RepositoryError::DatabaseError(format!(
                "Task {} has negative version {}",
                row.id, row.version
            ))
        })?;

        Ok(Self {
            task_id: TaskId::new(row.id),
            workspace_id: WorkspaceId::new(row.workspace_id),
            title: row.title,
            version,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[allow(clippy::needless_pass_by_value)]
fn database_error(error: sqlx::Error) -> RepositoryError {
    RepositoryError::DatabaseError(error.to_string())
}

fn version_to_database(version: u64) -> Result<i64, RepositoryError> {
    i64::try_from(version)
        .map_err(|_| RepositoryError::DatabaseError(format!("Version {version} exceeds BIGINT")))
}

/// Opens a transaction scoped to `workspace_id` for row-level security.
///
/// The setting is transaction-local (`is_local = true`), so it is dropped
/// when the connection returns to the pool.
async fn begin_scoped(
    pool: &PgPool,
    workspace_id: &WorkspaceId,
) -> Result<Transaction<'static, Postgres>, RepositoryError> {
    let mut transaction = pool.begin().await.map_err(database_error)?;

    sqlx::query("SELECT set_config($1, $2, true)")
        .bind(WORKSPACE_SETTING)
        .bind(workspace_id.as_str())
        .execute(&mut *transaction)
        .await
        .map_err(database_error)?;

    Ok(transaction)
}

// =============================================================================
// PostgreSQL Task Repository
// =============================================================================

/// `PostgreSQL` implementation of `TaskRepository`.
///
/// # Example
///
/// ```ignore
/// use infrastructure::postgres::PostgresTaskRepository;
///
/// let pool = PgPool::connect("postgres://localhost/tasks").await?;
/// let repository = PostgresTaskRepository::new(pool);
///
/// let task = repository
///     .update_title(&workspace_id, &task_id, "New title".into(), 5, Timestamp::now())
///     .await?;
/// assert_eq!(task.version, 6);
/// ```
#[derive(Debug, Clone)]
pub struct PostgresTaskRepository {
    pool: PgPool,
}

impl PostgresTaskRepository {
    /// Creates a new `PostgreSQL` task repository with the given connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Inserts `tasks` unless a row with the same ID already exists.
    ///
    /// Used for demo seeding; existing rows (and their versions) are kept.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DatabaseError` if any insert fails.
    pub async fn seed(&self, tasks: &[Task]) -> Result<u64, RepositoryError> {
        let mut inserted = 0;
        for task in tasks {
            let mut transaction = begin_scoped(&self.pool, &task.workspace_id).await?;
            let result = sqlx::query(
                "INSERT INTO tasks (id, workspace_id, title, version, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(task.task_id.as_str())
            .bind(task.workspace_id.as_str())
            .bind(&task.title)
            .bind(version_to_database(task.version)?)
            .bind(task.created_at.as_datetime())
            .bind(task.updated_at.as_datetime())
            .execute(&mut *transaction)
            .await
            .map_err(database_error)?;
            transaction.commit().await.map_err(database_error)?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }
}

impl TaskRepository for PostgresTaskRepository {
    fn find_by_id(
        &self,
        workspace_id: &WorkspaceId,
        id: &TaskId,
    ) -> BoxFuture<'static, Result<Option<Task>, RepositoryError>> {
        let pool = self.pool.clone();
        let workspace_id = workspace_id.clone();
        let id = id.clone();
        async move {
            let mut transaction = begin_scoped(&pool, &workspace_id).await?;
            let row: Option<TaskRow> = sqlx::query_as(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1 AND workspace_id = $2"
            ))
            .bind(id.as_str())
            .bind(workspace_id.as_str())
            .fetch_optional(&mut *transaction)
            .await
            .map_err(database_error)?;
            transaction.commit().await.map_err(database_error)?;

            row.map(Task::try_from).transpose()
        }
        .boxed()
    }

    fn list(
        &self,
        workspace_id: &WorkspaceId,
        filter: TaskFilter,
    ) -> BoxFuture<'static, Result<Vec<Task>, RepositoryError>> {
        let pool = self.pool.clone();
        let workspace_id = workspace_id.clone();
        async move {
            let mut transaction = begin_scoped(&pool, &workspace_id).await?;
            // strpos avoids LIKE wildcard escaping for user-supplied text.
            let rows: Vec<TaskRow> = sqlx::query_as(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks \
                 WHERE workspace_id = $1 \
                   AND ($2::text IS NULL OR strpos(lower(title), lower($2::text)) > 0) \
                 ORDER BY created_at, id"
            ))
            .bind(workspace_id.as_str())
            .bind(filter.query.as_deref())
            .fetch_all(&mut *transaction)
            .await
            .map_err(database_error)?;
            transaction.commit().await.map_err(database_error)?;

            rows.into_iter().map(Task::try_from).collect()
        }
        .boxed()
    }

    fn insert(&self, task: &Task) -> BoxFuture<'static, Result<(), RepositoryError>> {
        let pool = self.pool.clone();
        let task = task.clone();
        async move {
            let version = version_to_database(task.version)?;
            let mut transaction = begin_scoped(&pool, &task.workspace_id).await?;
            let inserted: Option<(String,)> = sqlx::query_as(
                "INSERT INTO tasks (id, workspace_id, title, version, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (id) DO NOTHING \
                 RETURNING id",
            )
            .bind(task.task_id.as_str())
            .bind(task.workspace_id.as_str())
            .bind(&task.title)
            .bind(version)
            .bind(task.created_at.as_datetime())
            .bind(task.updated_at.as_datetime())
            .fetch_optional(&mut *transaction)
            .await
            .map_err(database_error)?;
            transaction.commit().await.map_err(database_error)?;

            if inserted.is_none() {
                return Err(RepositoryError::VersionConflict {
                    expected: 0,
                    found: 1,
                });
            }
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
        let pool = self.pool.clone();
        let workspace_id = workspace_id.clone();
        let id = id.clone();
        async move {
            // An expected version beyond BIGINT can never match a stored row.
            let expected = i64::try_from(expected_version).unwrap_or(-1);

            let mut transaction = begin_scoped(&pool, &workspace_id).await?;
            let updated: Option<TaskRow> = sqlx::query_as(&format!(
                "UPDATE tasks SET title = $1, version = version + 1, updated_at = $2 \
                 WHERE id = $3 AND workspace_id = $4 AND version = $5 \
                 RETURNING {TASK_COLUMNS}"
            ))
            .bind(&title)
            .bind(timestamp.as_datetime())
            .bind(id.as_str())
            .bind(workspace_id.as_str())
            .bind(expected)
            .fetch_optional(&mut *transaction)
            .await
            .map_err(database_error)?;

            if let Some(row) = updated {
                transaction.commit().await.map_err(database_error)?;
                return Task::try_from(row);
            }

            // Zero rows: classify as missing or stale. Nothing was written.
            let current: Option<(i64,)> =
                sqlx::query_as("SELECT version FROM tasks WHERE id = $1 AND workspace_id = $2")
                    .bind(id.as_str())
                    .bind(workspace_id.as_str())
                    .fetch_optional(&mut *transaction)
                    .await
                    .map_err(database_error)?;
            transaction.rollback().await.map_err(database_error)?;

            match current {
                None => Err(RepositoryError::NotFound(id.to_string())),
                Some((found,)) => {
                    tracing::debug!(
                        task_id = %id,
                        expected = expected_version,
                        found,
                        "Conditional update matched no row"
                    );
                    Err(RepositoryError::VersionConflict {
                        expected: expected_version,
                        found: u64::try_from(found).unwrap_or_default(),
                    })
                }
            }
        }
        .boxed()
    }

    fn ping(&self) -> BoxFuture<'static, Result<(), RepositoryError>> {
        let pool = self.pool.clone();
        async move {
            sqlx::query("SELECT 1")
                .execute(&pool)
                .await
                .map(|_| ())
                .map_err(database_error)
        }
        .boxed()
    }
}

// =============================================================================
// Tests
// =============================================================================
