//! # arcane-tasks-api
//!
//! Task-tracking REST backend with optimistic concurrency control.
//!
//! Every task carries a version that is exposed as `ETag`. A client updates a
//! task by echoing that version in `If-Match`; the store compares and writes
//! in one atomic step, so of two writers holding the same version exactly
//! one succeeds and the other receives `409 CONFLITO_CONCORRENCIA`.
//!
//! ## Modules
//!
//! - [`domain`]: tasks, identifiers and change events
//! - [`infrastructure`]: in-memory and `PostgreSQL` repositories, the
//!   repository factory and the notification sink
//! - [`api`]: axum handlers, middleware and router
//! - [`config`]: server settings read from the environment

pub mod api;
pub mod config;
pub mod domain;
pub mod infrastructure;
