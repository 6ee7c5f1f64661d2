//! Data Transfer Objects for API requests and responses.
//!
//! This module contains DTOs that are separate from domain models,
//! providing a clean API contract.

use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use crate::domain::Task;

/// Maximum title length in characters.
pub const MAX_TITLE_LENGTH: usize = 200;

// =============================================================================
// Task DTOs
// =============================================================================

/// Request DTO for creating a new task.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskRequest {
    /// Title of the task.
    pub title: String,
}

/// Request DTO for the conditional title update.
///
/// The expected version travels in the `If-Match` header, not in the body.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTaskRequest {
    /// New title for the task.
    pub title: String,
}

/// Query string for `GET /tasks`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListTasksQuery {
    /// Case-insensitive title substring.
    #[serde(default)]
    pub query: Option<String>,
}

/// Response DTO for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    /// Task ID.
    pub id: String,
    /// Owning workspace.
    pub workspace_id: String,
    /// Title of the task.
    pub title: String,
    /// Current version.
    pub version: u64,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Last update timestamp (RFC 3339).
    pub updated_at: String,
}

impl From<&Task> for TaskResponse {
    fn from(task: &Task) -> Self {
        Self {
            id: task.task_id.to_string(),
            workspace_id: task.workspace_id.to_string(),
            title: task.title.clone(),
            version: task.version,
            created_at: task.created_at.to_rfc3339(),
            updated_at: task.updated_at.to_rfc3339(),
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Validates a task title.
///
/// # Validation Rules
///
/// - Title must not be empty after trimming
/// - Title must not exceed 200 characters
///
/// # Errors
///
/// Returns `ValidationError` on the `title` field if a rule is broken.
pub fn validate_title(title: &str) -> Result<String, ValidationError> {
    let title = title.trim();

    if title.is_empty() {
        return Err(ValidationError::single("title", "Title is required"));
    }

    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ValidationError::single(
            "title",
            "Title must not exceed 200 characters",
        ));
    }

    Ok(title.to_string())
}
