//! HTTP handlers for task creation and health probes.
//!
//! Reads live in [`super::query`]; the conditional update lives in
//! [`super::transaction`].

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json, extract::State};

use super::context::{Authenticator, RequestContext};
use super::dto::{CreateTaskRequest, TaskResponse, validate_title};
use super::error::{ApiErrorResponse, FieldError};
use crate::domain::{Task, TaskEvent, TaskEventKind, TaskId, Timestamp};
use crate::infrastructure::{
    NotificationSink, Repositories, TaskRepository, publish_best_effort,
};

// =============================================================================
// Application State
// =============================================================================

/// Shared application dependencies.
///
/// Uses trait objects so the storage backend, the notification sink and the
/// authentication strategy can all be selected at runtime.
#[derive(Clone)]
pub struct AppState {
    /// Task repository for persistence.
    pub task_repository: Arc<dyn TaskRepository>,
    /// Destination for change events.
    pub notification_sink: Arc<dyn NotificationSink>,
    /// Caller identity resolution.
    pub authenticator: Arc<dyn Authenticator>,
}

impl AppState {
    /// Creates a new `AppState` from its parts.
    #[must_use]
    pub fn new(
        repositories: Repositories,
        notification_sink: Arc<dyn NotificationSink>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            task_repository: repositories.task_repository,
            notification_sink,
            authenticator,
        }
    }

    /// Publishes an event for a committed change. Failures are only logged.
    pub(crate) fn notify(&self, kind: TaskEventKind, task: &Task, context: &RequestContext) {
        let event = TaskEvent::for_task(kind, task, context.user_id.clone());
        publish_best_effort(self.notification_sink.as_ref(), event);
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AppState")
            .field("task_repository", &"Arc<dyn TaskRepository>")
            .field("notification_sink", &"Arc<dyn NotificationSink>")
            .field("authenticator", &"Arc<dyn Authenticator>")
            .finish()
    }
}

/// Headers for a single-task response: the version as `ETag`.
pub(crate) fn etag_headers(version: u64) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::ETAG, HeaderValue::from(version));
    headers
}

/// Maps a malformed JSON body to a 400 validation error.
pub(crate) fn body_rejection(rejection: &JsonRejection) -> ApiErrorResponse {
    ApiErrorResponse::validation_error(
        "Invalid request body",
        vec![FieldError::new("body", rejection.body_text())],
    )
}

// =============================================================================
// POST /tasks Handler
// =============================================================================

/// Creates a new task in the caller's workspace.
///
/// # Request Body
///
/// ```json
/// { "title": "Task title" }
/// ```
///
/// # Response
///
/// - **201 Created**: Task created at version 1, `ETag: 1`
/// - **400 Bad Request**: Validation error
/// - **500 Internal Server Error**: Database error
///
/// # Errors
///
/// Returns [`ApiErrorResponse`] for an invalid title or a repository failure.
pub async fn create_task(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    body: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<Response, ApiErrorResponse> {
    let Json(request) = body.map_err(|rejection| context.fail(body_rejection(&rejection)))?;
    let title = validate_title(&request.title).map_err(|error| context.fail(error))?;

    let task = Task::new(
        TaskId::generate(),
        context.workspace_id.clone(),
        title,
        Timestamp::now(),
    );

    state
        .task_repository
        .insert(&task)
        .await
        .map_err(|error| context.fail(error))?;

    tracing::info!(
        task_id = %task.task_id,
        workspace_id = %task.workspace_id,
        trace_id = %context.trace_id,
        "Task created"
    );
    state.notify(TaskEventKind::Created, &task, &context);

    Ok((
        StatusCode::CREATED,
        etag_headers(task.version),
        Json(TaskResponse::from(&task)),
    )
        .into_response())
}

// =============================================================================
// Health Handlers
// =============================================================================

/// Health check response body.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
}

/// Liveness endpoint.
///
/// ```json
/// { "status": "healthy", "version": "0.1.0" }
/// ```
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness response body.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(untagged)]
pub enum ReadinessResponse {
    Ready {
        status: &'static str,
        dependencies: &'static str,
    },
    Unhealthy {
        status: &'static str,
        reason: &'static str,
    },
}

/// Readiness endpoint: 200 when storage answers, 503 otherwise.
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    match state.task_repository.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessResponse::Ready {
                status: "ready",
                dependencies: "ok",
            }),
        ),
        Err(error) => {
            tracing::error!(error = %error, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse::Unhealthy {
                    status: "unhealthy",
                    reason: "DB connection failed",
                }),
            )
        }
    }
}
