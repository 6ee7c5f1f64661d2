//! Router assembly.
//!
//! Task routes are served both at the root and under `/api/v1`. Health
//! probes are public; every task route passes through authentication.

use axum::Router;
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::middleware;
use axum::routing::get;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::context::{
    TRACE_ID_HEADER, USER_ID_HEADER, WORKSPACE_ID_HEADER, auth_middleware, trace_middleware,
};
use super::handlers::{AppState, create_task, health_check, readiness_check};
use super::query::{get_task, list_tasks};
use super::transaction::update_task;

/// Versioned prefix the browser client uses.
pub const API_PREFIX: &str = "/api/v1";

fn task_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/{id}", get(get_task).put(update_task))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Builds the full application router.
///
/// Layers, innermost first: authentication (task routes only), CORS, the
/// trace id middleware, request tracing. Preflight responses carry
/// `X-Trace-ID` too.
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    let tasks = task_routes(&state);

    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness_check))
        .merge(tasks.clone())
        .nest(API_PREFIX, tasks)
        .layer(cors)
        .layer(middleware::from_fn(trace_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Builds the CORS layer for `allowed_origins`.
///
/// A lone `*` allows any origin. Origins that are not valid header values
/// are logged and skipped.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::IF_MATCH,
            header::AUTHORIZATION,
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static(WORKSPACE_ID_HEADER),
            HeaderName::from_static(TRACE_ID_HEADER),
        ])
        .expose_headers([header::ETAG, HeaderName::from_static(TRACE_ID_HEADER)]);

    if allowed_origins.iter().any(|origin| origin == "*") {
        if allowed_origins.len() > 1 {
            tracing::warn!(origins = ?allowed_origins, "'*' overrides the other CORS origins");
        }
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::error!(origin = %origin, "Invalid CORS origin; skipping");
                None
            }
        })
        .collect();

    tracing::info!(origins = ?allowed_origins, "CORS configured");
    cors.allow_origin(AllowOrigin::list(allowed))
}
