//! Read-only task endpoints, scoped to the caller's workspace.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};

use super::context::RequestContext;
use super::dto::{ListTasksQuery, TaskResponse};
use super::error::ApiErrorResponse;
use super::handlers::{AppState, etag_headers};
use crate::domain::TaskId;
use crate::infrastructure::TaskFilter;

/// Lists the caller's tasks, optionally filtered with `?query=`.
///
/// # Errors
///
/// Returns [`ApiErrorResponse`] if the repository fails.
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<Vec<TaskResponse>>, ApiErrorResponse> {
    let filter = query
        .query
        .map_or_else(TaskFilter::all, TaskFilter::title_contains);

    let tasks = state
        .task_repository
        .list(&context.workspace_id, filter)
        .await
        .map_err(|error| context.fail(error))?;

    tracing::debug!(
        workspace_id = %context.workspace_id,
        count = tasks.len(),
        "Listed tasks"
    );

    Ok(Json(tasks.iter().map(TaskResponse::from).collect()))
}

/// Returns one task with its version as `ETag`.
///
/// A task in another workspace is reported as 404, same as a missing one.
///
/// # Errors
///
/// Returns [`ApiErrorResponse`] with `NAO_ENCONTRADO` if absent.
pub async fn get_task(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Path(task_id): Path<String>,
) -> Result<Response, ApiErrorResponse> {
    let task_id = TaskId::new(task_id);

    let task = state
        .task_repository
        .find_by_id(&context.workspace_id, &task_id)
        .await
        .map_err(|error| context.fail(error))?
        .ok_or_else(|| {
            tracing::warn!(
                task_id = %task_id,
                workspace_id = %context.workspace_id,
                trace_id = %context.trace_id,
                "Task not found or not accessible"
            );
            context.fail(ApiErrorResponse::not_found(format!(
                "Task {task_id} not found or access denied"
            )))
        })?;

    Ok((etag_headers(task.version), Json(TaskResponse::from(&task))).into_response())
}
