//! API module for HTTP handlers.
//!
//! This module contains route definitions, middleware and request/response handlers.

pub mod context;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod query;
pub mod routes;
pub mod transaction;

pub use context::{
    AuthError, Authenticator, HeaderAuthenticator, Identity, RequestContext, StaticAuthenticator,
    TraceId, auth_middleware, trace_middleware,
};
pub use dto::{CreateTaskRequest, ListTasksQuery, TaskResponse, UpdateTaskRequest};
pub use error::{ApiError, ApiErrorResponse, FieldError, ValidationError};
pub use handlers::{
    AppState, HealthResponse, ReadinessResponse, create_task, health_check, readiness_check,
};
pub use query::{get_task, list_tasks};
pub use routes::{API_PREFIX, build_router, cors_layer};
pub use transaction::{IfMatchError, parse_if_match, update_task};
