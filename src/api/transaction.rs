//! Conditional task update.
//!
//! # Endpoints
//!
//! - `PUT /tasks/{id}` - Replace the title if `If-Match` names the current version
//!
//! The expected version is read from `If-Match` and handed to the
//! repository, which compares and writes in one atomic step. There is no
//! read-then-write in this handler: a separate lookup followed by a save
//! would let two writers with the same version both succeed.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};

use super::context::RequestContext;
use super::dto::{TaskResponse, UpdateTaskRequest, validate_title};
use super::error::ApiErrorResponse;
use super::handlers::{AppState, body_rejection, etag_headers};
use crate::domain::{TaskEventKind, TaskId, Timestamp};
use crate::infrastructure::RepositoryError;

// =============================================================================
// If-Match Parsing
// =============================================================================

/// Why an `If-Match` header could not be turned into a version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IfMatchError {
    /// Header absent.
    Missing,
    /// Header present but not a non-negative integer; carries the raw text.
    Invalid(String),
}

impl From<IfMatchError> for ApiErrorResponse {
    fn from(error: IfMatchError) -> Self {
        match error {
            IfMatchError::Missing => Self::missing_version(),
            IfMatchError::Invalid(raw) => Self::invalid_version(&raw),
        }
    }
}

/// Extracts the expected version from `If-Match`.
///
/// Accepts a bare integer (`5`) or a quoted one (`"5"`), with surrounding
/// whitespace. Weak validators, `*`, lists and signs are rejected.
///
/// # Errors
///
/// Returns `IfMatchError::Missing` when the header is absent and
/// `IfMatchError::Invalid` otherwise.
pub fn parse_if_match(headers: &HeaderMap) -> Result<u64, IfMatchError> {
    let value = headers.get(header::IF_MATCH).ok_or(IfMatchError::Missing)?;
    let raw = value
        .to_str()
        .map_err(|_| IfMatchError::Invalid(String::from_utf8_lossy(value.as_bytes()).into_owned()))?;

    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed);

    if unquoted.is_empty() || !unquoted.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(IfMatchError::Invalid(raw.to_string()));
    }

    unquoted
        .parse::<u64>()
        .map_err(|_| IfMatchError::Invalid(raw.to_string()))
}

// =============================================================================
// PUT /tasks/{id} Handler
// =============================================================================

/// Replaces the title of a task if the caller's version is current.
///
/// # Request
///
/// ```text
/// PUT /tasks/t1
/// If-Match: 5
///
/// { "title": "New title" }
/// ```
///
/// # Response
///
/// - **200 OK**: Updated task, `ETag: <new version>`
/// - **400 Bad Request**: `VERSAO_FALTANTE`, `VERSAO_INVALIDA` or `VALIDATION_ERROR`
/// - **404 Not Found**: `NAO_ENCONTRADO`
/// - **409 Conflict**: `CONFLITO_CONCORRENCIA`
///
/// # Errors
///
/// Returns [`ApiErrorResponse`] for each failure listed above.
pub async fn update_task(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> Result<Response, ApiErrorResponse> {
    let task_id = TaskId::new(task_id);
    let expected_version = parse_if_match(&headers).map_err(|error| {
        tracing::warn!(task_id = %task_id, trace_id = %context.trace_id, ?error, "Rejected If-Match");
        context.fail(error)
    })?;

    let Json(request) = body.map_err(|rejection| context.fail(body_rejection(&rejection)))?;
    let title = validate_title(&request.title).map_err(|error| context.fail(error))?;

    let result = state
        .task_repository
        .update_title(
            &context.workspace_id,
            &task_id,
            title,
            expected_version,
            Timestamp::now(),
        )
        .await;

    let task = match result {
        Ok(task) => task,
        Err(RepositoryError::VersionConflict { expected, found }) => {
            tracing::warn!(
                task_id = %task_id,
                expected,
                found,
                trace_id = %context.trace_id,
                "Optimistic concurrency conflict"
            );
            return Err(context.fail(RepositoryError::VersionConflict { expected, found }));
        }
        Err(error) => return Err(context.fail(error)),
    };

    tracing::info!(
        task_id = %task.task_id,
        new_version = task.version,
        trace_id = %context.trace_id,
        "Task updated"
    );
    state.notify(TaskEventKind::Updated, &task, &context);

    Ok((etag_headers(task.version), Json(TaskResponse::from(&task))).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use rstest::rstest;

    fn with_if_match(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_MATCH, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[rstest]
    fn test_parse_if_match_missing() {
        assert_eq!(parse_if_match(&HeaderMap::new()), Err(IfMatchError::Missing));
    }

    #[rstest]
    #[case("5", 5)]
    #[case(" 5 ", 5)]
    #[case("\"5\"", 5)]
    #[case("0", 0)]
    #[case("007", 7)]
    #[case("18446744073709551615", u64::MAX)]
    fn test_parse_if_match_valid(#[case] value: &str, #[case] expected: u64) {
        assert_eq!(parse_if_match(&with_if_match(value)), Ok(expected));
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("*")]
    #[case("-1")]
    #[case("+5")]
    #[case("5abc")]
    #[case("1.5")]
    #[case("W/\"5\"")]
    #[case("\"5")]
    #[case("\"\"")]
    #[case("18446744073709551616")]
    fn test_parse_if_match_invalid(#[case] value: &str) {
        assert!(matches!(
            parse_if_match(&with_if_match(value)),
            Err(IfMatchError::Invalid(_))
        ));
    }

    #[rstest]
    fn test_if_match_error_codes() {
        let response: ApiErrorResponse = IfMatchError::Missing.into();
        assert_eq!(response.error.code, "VERSAO_FALTANTE");

        let response: ApiErrorResponse = IfMatchError::Invalid("abc".to_string()).into();
        assert_eq!(response.error.code, "VERSAO_INVALIDA");
    }
}
