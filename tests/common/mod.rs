//! Common test helpers for integration tests.
//!
//! Builds routers over in-memory state and sends requests through them with
//! `tower::ServiceExt::oneshot`, so middleware (trace id, authentication,
//! CORS) runs exactly as in the server.
//!
//! # Note
//!
//! The `#![allow(dead_code)]` attribute is necessary because Rust compiles each
//! integration test file as a separate crate. Helpers used only by one test
//! file would otherwise generate dead code warnings in the others.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use futures::FutureExt;
use futures::future::BoxFuture;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use arcane_tasks_api::api::{
    AppState, Authenticator, StaticAuthenticator, build_router, cors_layer,
};
use arcane_tasks_api::domain::{Task, TaskId, Timestamp, UserId, WorkspaceId};
use arcane_tasks_api::infrastructure::factory::demo_tasks;
use arcane_tasks_api::infrastructure::{
    InMemoryTaskRepository, NotificationSink, RecordingNotificationSink, Repositories,
    RepositoryError, TaskFilter, TaskRepository,
};

pub const CORS_ORIGIN: &str = "http://localhost:3001";

// =============================================================================
// Application Builders
// =============================================================================

/// Router plus handles for inspecting side effects.
pub struct TestApp {
    pub router: Router,
    pub repository: InMemoryTaskRepository,
    pub sink: RecordingNotificationSink,
}

/// Builds a router from explicit parts.
pub fn router_with(
    task_repository: Arc<dyn TaskRepository>,
    notification_sink: Arc<dyn NotificationSink>,
    authenticator: Arc<dyn Authenticator>,
) -> Router {
    let state = AppState::new(
        Repositories { task_repository },
        notification_sink,
        authenticator,
    );
    build_router(state, cors_layer(&[CORS_ORIGIN.to_string()]))
}

fn default_authenticator() -> Arc<dyn Authenticator> {
    Arc::new(StaticAuthenticator::new(
        UserId::new("u999"),
        WorkspaceId::new("w1"),
    ))
}

/// App over an in-memory store seeded with `t1` (v5) and `t2` (v3) in `w1`,
/// authenticated as `u999` in `w1`.
pub fn seeded_app() -> TestApp {
    app_with_sink(RecordingNotificationSink::new())
}

/// Like [`seeded_app`] but publishing to `sink`.
pub fn app_with_sink(sink: RecordingNotificationSink) -> TestApp {
    let repository = InMemoryTaskRepository::with_tasks(demo_tasks());
    let router = router_with(
        Arc::new(repository.clone()),
        Arc::new(sink.clone()),
        default_authenticator(),
    );
    TestApp {
        router,
        repository,
        sink,
    }
}

/// App over `repository` with the given authenticator.
pub fn app_with_authenticator(
    repository: InMemoryTaskRepository,
    authenticator: Arc<dyn Authenticator>,
) -> TestApp {
    let sink = RecordingNotificationSink::new();
    let router = router_with(
        Arc::new(repository.clone()),
        Arc::new(sink.clone()),
        authenticator,
    );
    TestApp {
        router,
        repository,
        sink,
    }
}

/// A task in `workspace` at `version`.
pub fn task_in(id: &str, workspace: &str, title: &str, version: u64) -> Task {
    Task::new(
        TaskId::new(id),
        WorkspaceId::new(workspace),
        title,
        Timestamp::now(),
    )
    .with_version(version)
}

// =============================================================================
// Request Helpers
// =============================================================================

/// Status, headers and JSON body (or `Null`) of a response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// Value of `name` as a string, if present.
    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn etag(&self) -> Option<&str> {
        self.header(header::ETAG)
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.header("x-trace-id")
    }

    pub fn error_code(&self) -> Option<&str> {
        self.body["code"].as_str()
    }
}

/// Sends a request with optional extra headers and JSON body.
pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }

    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn get(router: &Router, uri: &str) -> TestResponse {
    send(router, Method::GET, uri, &[], None).await
}

/// `PUT` with an `If-Match` header and a `{ "title": ... }` body.
pub async fn put_title(router: &Router, uri: &str, if_match: &str, title: &str) -> TestResponse {
    send(
        router,
        Method::PUT,
        uri,
        &[("if-match", if_match)],
        Some(serde_json::json!({ "title": title })),
    )
    .await
}

// =============================================================================
// Failing Repository
// =============================================================================

/// Repository whose every call fails as if the database were unreachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRepository;

fn unavailable<T: Send + 'static>() -> BoxFuture<'static, Result<T, RepositoryError>> {
    async { Err(RepositoryError::DatabaseError("connection refused".to_string())) }.boxed()
}

impl TaskRepository for UnavailableRepository {
    fn find_by_id(
        &self,
        _workspace_id: &WorkspaceId,
        _id: &TaskId,
    ) -> BoxFuture<'static, Result<Option<Task>, RepositoryError>> {
        unavailable()
    }

    fn list(
        &self,
        _workspace_id: &WorkspaceId,
        _filter: TaskFilter,
    ) -> BoxFuture<'static, Result<Vec<Task>, RepositoryError>> {
        unavailable()
    }

    fn insert(&self, _task: &Task) -> BoxFuture<'static, Result<(), RepositoryError>> {
        unavailable()
    }

    fn update_title(
        &self,
        _workspace_id: &WorkspaceId,
        _id: &TaskId,
        _title: String,
        _expected_version: u64,
        _timestamp: Timestamp,
    ) -> BoxFuture<'static, Result<Task, RepositoryError>> {
        unavailable()
    }

    fn ping(&self) -> BoxFuture<'static, Result<(), RepositoryError>> {
        unavailable()
    }
}
