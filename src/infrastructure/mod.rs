//! Infrastructure module for external services.
//!
//! This module contains the task repositories, the repository factory,
//! and the notification side-channel.

pub mod factory;
pub mod in_memory;
pub mod notification;
pub mod postgres;
pub mod repository;

pub use factory::{
    ConfigurationError, FactoryError, Repositories, RepositoryConfig, RepositoryFactory,
    StorageMode,
};
pub use in_memory::InMemoryTaskRepository;
pub use notification::{
    NotificationError, NotificationSink, QueueNotificationSink, RecordingNotificationSink,
    publish_best_effort,
};
pub use postgres::PostgresTaskRepository;
pub use repository::{RepositoryError, TaskFilter, TaskRepository};
