//! Request context: trace identifiers and caller identity.
//!
//! Two middlewares run in order. [`trace_middleware`] assigns every request
//! a trace id and echoes it as `X-Trace-ID`. [`auth_middleware`] asks the
//! configured [`Authenticator`] who the caller is and stores a
//! [`RequestContext`] in the request extensions for handlers to extract.

use axum::body::Body;
use axum::extract::State;
use axum::http::header::HeaderName;
use axum::http::{HeaderMap, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::Instrument;

use super::error::ApiErrorResponse;
use super::handlers::AppState;
use crate::domain::{UserId, WorkspaceId};

/// Response (and optional request) header carrying the trace id.
pub const TRACE_ID_HEADER: &str = "x-trace-id";
/// Header naming the caller in header authentication mode.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Header naming the caller's workspace in header authentication mode.
pub const WORKSPACE_ID_HEADER: &str = "x-workspace-id";

const MAX_TRACE_ID_LENGTH: usize = 128;

// =============================================================================
// Trace ID
// =============================================================================

/// Trace identifier assigned to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generates a fresh random trace id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Reuses a caller-supplied id when it is short printable ASCII.
    fn from_headers(headers: &HeaderMap) -> Option<Self> {
        header_string(headers, TRACE_ID_HEADER)
            .map(|value| value.trim().to_string())
            .filter(|value| {
                !value.is_empty()
                    && value.len() <= MAX_TRACE_ID_LENGTH
                    && value.bytes().all(|byte| byte.is_ascii_graphic())
            })
            .map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn add_trace_id_header(response: &mut Response, trace_id: &TraceId) {
    if let Ok(value) = HeaderValue::from_str(trace_id.as_str()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(TRACE_ID_HEADER), value);
    }
}

/// Middleware that assigns a trace id, logs the request and echoes
/// `X-Trace-ID` on the response.
pub async fn trace_middleware(mut request: Request<Body>, next: Next) -> Response {
    let trace_id = TraceId::from_headers(request.headers()).unwrap_or_else(TraceId::generate);
    request.extensions_mut().insert(trace_id.clone());

    let span = tracing::info_span!("request", trace_id = %trace_id.as_str());
    tracing::debug!(
        parent: &span,
        method = %request.method(),
        uri = %request.uri(),
        "Incoming request"
    );

    let mut response = next.run(request).instrument(span.clone()).await;
    tracing::debug!(parent: &span, status = response.status().as_u16(), "Request completed");

    add_trace_id_header(&mut response, &trace_id);
    response
}

// =============================================================================
// Authentication
// =============================================================================

/// Caller identity produced by an [`Authenticator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub workspace_id: WorkspaceId,
}

/// Per-request context handed to handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Authenticated caller.
    pub user_id: UserId,
    /// Workspace every storage access is scoped to.
    pub workspace_id: WorkspaceId,
    /// Trace id also returned as `X-Trace-ID`.
    pub trace_id: String,
}

impl RequestContext {
    #[must_use]
    pub fn new(identity: Identity, trace_id: &TraceId) -> Self {
        Self {
            user_id: identity.user_id,
            workspace_id: identity.workspace_id,
            trace_id: trace_id.0.clone(),
        }
    }

    /// Stamps this request's trace id on an error response.
    #[must_use]
    pub fn fail(&self, error: impl Into<ApiErrorResponse>) -> ApiErrorResponse {
        error.into().with_trace_id(&self.trace_id)
    }
}

/// Reasons an identity could not be established.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// A required identity header was absent or empty.
    #[error("Missing {0} header")]
    MissingHeader(&'static str),

    /// An identity header was not valid UTF-8.
    #[error("Invalid {0} header")]
    InvalidHeader(&'static str),
}

/// Resolves the caller of a request.
pub trait Authenticator: Send + Sync {
    /// Derives the caller identity from request headers.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if the identity cannot be established.
    fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, AuthError>;
}

/// Authenticator that returns the same configured identity for every request.
#[derive(Debug, Clone)]
pub struct StaticAuthenticator {
    identity: Identity,
}

impl StaticAuthenticator {
    #[must_use]
    pub fn new(user_id: UserId, workspace_id: WorkspaceId) -> Self {
        Self {
            identity: Identity {
                user_id,
                workspace_id,
            },
        }
    }
}

impl Authenticator for StaticAuthenticator {
    fn authenticate(&self, _headers: &HeaderMap) -> Result<Identity, AuthError> {
        Ok(self.identity.clone())
    }
}

/// Authenticator that trusts `X-User-Id` and `X-Workspace-Id` headers.
///
/// Intended to sit behind a gateway that has already verified the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderAuthenticator;

impl HeaderAuthenticator {
    fn required(headers: &HeaderMap, name: &'static str) -> Result<String, AuthError> {
        let value = headers.get(name).ok_or(AuthError::MissingHeader(name))?;
        let value = value
            .to_str()
            .map_err(|_| AuthError::InvalidHeader(name))?
            .trim();
        if value.is_empty() {
            return Err(AuthError::MissingHeader(name));
        }
        Ok(value.to_string())
    }
}

impl Authenticator for HeaderAuthenticator {
    fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        Ok(Identity {
            user_id: UserId::new(Self::required(headers, USER_ID_HEADER)?),
            workspace_id: WorkspaceId::new(Self::required(headers, WORKSPACE_ID_HEADER)?),
        })
    }
}

/// Middleware that authenticates the caller and inserts a [`RequestContext`].
///
/// Must run inside [`trace_middleware`]; a missing trace id is generated.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let trace_id = request
        .extensions()
        .get::<TraceId>()
        .cloned()
        .unwrap_or_else(TraceId::generate);

    match state.authenticator.authenticate(request.headers()) {
        Ok(identity) => {
            let context = RequestContext::new(identity, &trace_id);
            tracing::debug!(
                user_id = %context.user_id,
                workspace_id = %context.workspace_id,
                "Caller authenticated"
            );
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(error) => {
            tracing::warn!(error = %error, "Authentication failed");
            ApiErrorResponse::unauthorized(error.to_string())
                .with_trace_id(trace_id.0)
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[rstest]
    fn test_static_authenticator_ignores_headers() {
        let authenticator = StaticAuthenticator::new(UserId::new("u999"), WorkspaceId::new("w1"));
        let identity = authenticator
            .authenticate(&headers(&[(USER_ID_HEADER, "someone-else")]))
            .unwrap();
        assert_eq!(identity.user_id, UserId::new("u999"));
        assert_eq!(identity.workspace_id, WorkspaceId::new("w1"));
    }

    #[rstest]
    fn test_header_authenticator_reads_identity() {
        let identity = HeaderAuthenticator
            .authenticate(&headers(&[
                (USER_ID_HEADER, "u1"),
                (WORKSPACE_ID_HEADER, " w2 "),
            ]))
            .unwrap();
        assert_eq!(identity.user_id, UserId::new("u1"));
        assert_eq!(identity.workspace_id, WorkspaceId::new("w2"));
    }

    #[rstest]
    #[case(&[(WORKSPACE_ID_HEADER, "w1")], USER_ID_HEADER)]
    #[case(&[(USER_ID_HEADER, "u1")], WORKSPACE_ID_HEADER)]
    #[case(&[(USER_ID_HEADER, "u1"), (WORKSPACE_ID_HEADER, "  ")], WORKSPACE_ID_HEADER)]
    fn test_header_authenticator_missing(
        #[case] pairs: &[(&'static str, &str)],
        #[case] missing: &'static str,
    ) {
        assert_eq!(
            HeaderAuthenticator.authenticate(&headers(pairs)),
            Err(AuthError::MissingHeader(missing))
        );
    }

    #[rstest]
    #[case("abc-123", Some("abc-123"))]
    #[case("  padded  ", Some("padded"))]
    #[case("", None)]
    #[case("has space", None)]
    fn test_trace_id_from_headers(#[case] value: &str, #[case] expected: Option<&str>) {
        let trace_id = TraceId::from_headers(&headers(&[(TRACE_ID_HEADER, value)]));
        assert_eq!(trace_id.as_ref().map(TraceId::as_str), expected);
    }

    #[rstest]
    fn test_request_context_fail_stamps_trace_id() {
        let context = RequestContext::new(
            Identity {
                user_id: UserId::new("u1"),
                workspace_id: WorkspaceId::new("w1"),
            },
            &TraceId("trace-7".to_string()),
        );
        let response = context.fail(ApiErrorResponse::not_found("gone"));
        assert_eq!(response.error.trace_id.as_deref(), Some("trace-7"));
    }
}
