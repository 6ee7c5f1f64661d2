//! Repository factory for runtime backend selection.
//!
//! This module creates the task repository based on environment configuration.
//! It supports switching between the `InMemory` and `PostgreSQL` backends at
//! runtime, and optionally seeds the demo tasks.
//!
//! # Environment Variables
//!
//! - `STORAGE_MODE`: `in_memory` (default) | `postgres`
//! - `DATABASE_URL`: `PostgreSQL` connection URL (required when `STORAGE_MODE=postgres`)
//! - `DATABASE_MAX_CONNECTIONS`: pool size (default 10)
//! - `SEED_DEMO_TASKS`: `true` (default) | `false`
//! - `RUN_MIGRATIONS`: `true` (default) | `false`
//!
//! # Example
//!
//! ```ignore
//! use infrastructure::factory::{RepositoryConfig, RepositoryFactory};
//!
//! let config = RepositoryConfig::from_env()?;
//! let factory = RepositoryFactory::new(config);
//! let repositories = factory.create().await?;
//!
//! let task = repositories.task_repository.find_by_id(&workspace_id, &task_id).await?;
//! ```

use std::env;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Duration;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use super::{InMemoryTaskRepository, PostgresTaskRepository, TaskRepository};
use crate::domain::{Task, TaskId, Timestamp, WorkspaceId};

/// Default `PostgreSQL` pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

// =============================================================================
// Configuration Types
// =============================================================================

/// Storage mode for task data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageMode {
    /// In-memory storage. Suitable for testing and development.
    #[default]
    InMemory,
    /// `PostgreSQL` storage with row-level security.
    Postgres,
}

impl FromStr for StorageMode {
    type Err = ConfigurationError;

    /// Parses a storage mode from a string.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::InvalidStorageMode` if the string is not recognized.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(Self::InMemory),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            _ => Err(ConfigurationError::InvalidStorageMode(value.to_string())),
        }
    }
}

/// Configuration for repository factory.
///
/// Use `RepositoryConfigBuilder` for a fluent API to construct this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Storage mode for tasks.
    pub storage_mode: StorageMode,
    /// `PostgreSQL` connection URL (required when `storage_mode` is `Postgres`).
    pub database_url: Option<String>,
    /// Maximum number of pooled `PostgreSQL` connections.
    pub max_connections: u32,
    /// Whether the demo tasks are inserted at startup.
    pub seed_demo_tasks: bool,
    /// Whether embedded migrations run at startup (`PostgreSQL` only).
    pub run_migrations: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            storage_mode: StorageMode::default(),
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            seed_demo_tasks: true,
            run_migrations: true,
        }
    }
}

impl RepositoryConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RepositoryConfigBuilder {
        RepositoryConfigBuilder::default()
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if:
    /// - `STORAGE_MODE` contains an invalid value
    /// - `DATABASE_URL` is missing when `STORAGE_MODE=postgres`
    /// - a numeric or boolean variable cannot be parsed
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Creates a configuration through `lookup`, treating blank values as unset.
    ///
    /// # Errors
    ///
    /// Same as [`RepositoryConfig::from_env`].
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigurationError> {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let storage_mode = get("STORAGE_MODE")
            .map(|value| value.parse())
            .transpose()?
            .unwrap_or(defaults.storage_mode);

        let max_connections = match get("DATABASE_MAX_CONNECTIONS") {
            Some(value) => value
                .parse::<u32>()
                .ok()
                .filter(|count| *count > 0)
                .ok_or(ConfigurationError::InvalidValue {
                    name: "DATABASE_MAX_CONNECTIONS",
                    value,
                })?,
            None => defaults.max_connections,
        };

        let flag = |name: &'static str, default: bool| {
            get(name).map_or(Ok(default), |value| parse_flag(name, &value))
        };

        let config = Self {
            storage_mode,
            database_url: get("DATABASE_URL"),
            max_connections,
            seed_demo_tasks: flag("SEED_DEMO_TASKS", defaults.seed_demo_tasks)?,
            run_migrations: flag("RUN_MIGRATIONS", defaults.run_migrations)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the database URL is missing for `Postgres`.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.storage_mode == StorageMode::Postgres && self.database_url.is_none() {
            return Err(ConfigurationError::MissingDatabaseUrl);
        }
        Ok(())
    }
}

/// Parses a boolean flag such as `SEED_DEMO_TASKS`.
///
/// # Errors
///
/// Returns `ConfigurationError::InvalidValue` for anything other than the
/// usual true/false spellings.
pub fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigurationError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigurationError::InvalidValue {
            name,
            value: value.to_string(),
        }),
    }
}

/// Builder for `RepositoryConfig`.
///
/// # Example
///
/// ```ignore
/// let config = RepositoryConfig::builder()
///     .storage_mode(StorageMode::Postgres)
///     .database_url("postgres://localhost/tasks")
///     .seed_demo_tasks(false)
///     .build()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct RepositoryConfigBuilder {
    config: RepositoryConfig,
}

impl RepositoryConfigBuilder {
    /// Sets the storage mode.
    #[must_use]
    pub const fn storage_mode(mut self, mode: StorageMode) -> Self {
        self.config.storage_mode = mode;
        self
    }

    /// Sets the `PostgreSQL` database URL.
    #[must_use]
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = Some(url.into());
        self
    }

    /// Sets the pool size.
    #[must_use]
    pub const fn max_connections(mut self, count: u32) -> Self {
        self.config.max_connections = count;
        self
    }

    #[must_use]
    pub const fn seed_demo_tasks(mut self, enabled: bool) -> Self {
        self.config.seed_demo_tasks = enabled;
        self
    }

    #[must_use]
    pub const fn run_migrations(mut self, enabled: bool) -> Self {
        self.config.run_migrations = enabled;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the configuration is invalid.
    pub fn build(self) -> Result<RepositoryConfig, ConfigurationError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while reading configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Invalid storage mode value.
    #[error("Invalid storage mode: '{0}'. Expected 'in_memory' or 'postgres'")]
    InvalidStorageMode(String),

    /// Missing `DATABASE_URL` when storage mode is Postgres.
    #[error("DATABASE_URL environment variable is required when STORAGE_MODE=postgres")]
    MissingDatabaseUrl,

    /// A variable held a value that could not be parsed.
    #[error("Invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },
}

/// Errors that can occur during factory initialization.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    DatabaseConnection(String),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Demo data could not be inserted.
    #[error("Seeding error: {0}")]
    Seed(String),
}

// =============================================================================
// Demo Data
// =============================================================================

/// Workspace that owns the demo tasks.
pub const DEMO_WORKSPACE_ID: &str = "w1";

/// The two demo tasks: `t1` at version 5 and `t2` at version 3.
///
/// `t2` is created one millisecond after `t1` so listing order is stable.
#[must_use]
pub fn demo_tasks() -> Vec<Task> {
    let workspace_id = WorkspaceId::new(DEMO_WORKSPACE_ID);
    let first = Timestamp::now();
    let second = Timestamp::from_datetime(*first.as_datetime() + Duration::milliseconds(1));

    vec![
        Task::new(
            TaskId::new("t1"),
            workspace_id.clone(),
            "Implementar Concorrência Otimista (PUT /tasks/{id})",
            first,
        )
        .with_version(5),
        Task::new(
            TaskId::new("t2"),
            workspace_id,
            "Configurar RLS no PostgreSQL",
            second,
        )
        .with_version(3),
    ]
}

// =============================================================================
// Repository Factory
// =============================================================================

/// Collection of initialized repositories.
#[derive(Clone)]
pub struct Repositories {
    /// Task repository shared by every handler.
    pub task_repository: Arc<dyn TaskRepository>,
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Repositories")
            .field("task_repository", &"Arc<dyn TaskRepository>")
            .finish()
    }
}

/// Factory for creating repository instances based on configuration.
#[derive(Debug, Clone)]
pub struct RepositoryFactory {
    config: RepositoryConfig,
}

impl RepositoryFactory {
    /// Creates a new repository factory with the given configuration.
    #[must_use]
    pub const fn new(config: RepositoryConfig) -> Self {
        Self { config }
    }

    /// Creates a new repository factory from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `FactoryError::Configuration` if environment configuration is invalid.
    pub fn from_env() -> Result<Self, FactoryError> {
        let config = RepositoryConfig::from_env()?;
        Ok(Self::new(config))
    }

    /// Returns the configuration used by this factory.
    #[must_use]
    pub const fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Creates the repositories based on the configuration.
    ///
    /// # Errors
    ///
    /// Returns `FactoryError` if connecting, migrating or seeding `PostgreSQL` fails.
    pub async fn create(&self) -> Result<Repositories, FactoryError> {
        let task_repository: Arc<dyn TaskRepository> = match self.config.storage_mode {
            StorageMode::InMemory => Arc::new(self.create_in_memory_repository()),
            StorageMode::Postgres => {
                let pool = self.create_postgres_pool().await?;
                Arc::new(self.create_postgres_repository(pool).await?)
            }
        };

        Ok(Repositories { task_repository })
    }

    fn create_in_memory_repository(&self) -> InMemoryTaskRepository {
        if self.config.seed_demo_tasks {
            tracing::info!(workspace_id = DEMO_WORKSPACE_ID, "Seeding demo tasks in memory");
            InMemoryTaskRepository::with_tasks(demo_tasks())
        } else {
            InMemoryTaskRepository::new()
        }
    }

    /// Creates a `PostgreSQL` connection pool.
    async fn create_postgres_pool(&self) -> Result<PgPool, FactoryError> {
        let database_url = self
            .config
            .database_url
            .as_ref()
            .ok_or(ConfigurationError::MissingDatabaseUrl)?;

        PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .connect(database_url)
            .await
            .map_err(|error| FactoryError::DatabaseConnection(error.to_string()))
    }

    async fn create_postgres_repository(
        &self,
        pool: PgPool,
    ) -> Result<PostgresTaskRepository, FactoryError> {
        if self.config.run_migrations {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|error| FactoryError::Migration(error.to_string()))?;
            tracing::info!("Database migrations applied");
        }

        let repository = PostgresTaskRepository::new(pool);

        if self.config.seed_demo_tasks {
            let inserted = repository
                .seed(&demo_tasks())
                .await
                .map_err(|error| FactoryError::Seed(error.to_string()))?;
            tracing::info!(inserted, workspace_id = DEMO_WORKSPACE_ID, "Seeded demo tasks");
        }

        Ok(repository)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::TaskFilter;
    use rstest::rstest;

    // -------------------------------------------------------------------------
    // StorageMode Tests
    // -------------------------------------------------------------------------

    #[rstest]
    #[case("in_memory", StorageMode::InMemory)]
    #[case("memory", StorageMode::InMemory)]
    #[case("IN_MEMORY", StorageMode::InMemory)]
    #[case("postgres", StorageMode::Postgres)]
    #[case("pg", StorageMode::Postgres)]
    #[case(" Postgres ", StorageMode::Postgres)]
    fn test_storage_mode_from_str_valid(#[case] input: &str, #[case] expected: StorageMode) {
        let result: Result<StorageMode, _> = input.parse();
        assert_eq!(result, Ok(expected));
    }

    #[rstest]
    #[case("redis")]
    #[case("mysql")]
    #[case("")]
    fn test_storage_mode_from_str_invalid(#[case] input: &str) {
        let result: Result<StorageMode, _> = input.parse();
        assert_eq!(
            result,
            Err(ConfigurationError::InvalidStorageMode(input.to_string()))
        );
    }

    // -------------------------------------------------------------------------
    // RepositoryConfig Tests
    // -------------------------------------------------------------------------

    #[rstest]
    fn test_repository_config_default() {
        let config = RepositoryConfig::default();
        assert_eq!(config.storage_mode, StorageMode::InMemory);
        assert_eq!(config.database_url, None);
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert!(config.seed_demo_tasks);
        assert!(config.run_migrations);
    }

    #[rstest]
    fn test_builder_missing_database_url() {
        let result = RepositoryConfig::builder()
            .storage_mode(StorageMode::Postgres)
            .build();
        assert_eq!(result, Err(ConfigurationError::MissingDatabaseUrl));
    }

    #[rstest]
    fn test_builder_full_configuration() {
        let config = RepositoryConfig::builder()
            .storage_mode(StorageMode::Postgres)
            .database_url("postgres://localhost/tasks")
            .max_connections(4)
            .seed_demo_tasks(false)
            .run_migrations(false)
            .build()
            .unwrap();

        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/tasks")
        );
        assert_eq!(config.max_connections, 4);
        assert!(!config.seed_demo_tasks);
        assert!(!config.run_migrations);
    }

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: std::collections::HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[rstest]
    fn test_from_lookup_defaults_when_unset() {
        let config = RepositoryConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, RepositoryConfig::default());
    }

    #[rstest]
    fn test_from_lookup_blank_values_are_unset() {
        let config = RepositoryConfig::from_lookup(lookup(&[
            ("STORAGE_MODE", " "),
            ("DATABASE_URL", ""),
            ("DATABASE_MAX_CONNECTIONS", ""),
            ("SEED_DEMO_TASKS", ""),
            ("RUN_MIGRATIONS", "  "),
        ]))
        .unwrap();
        assert_eq!(config, RepositoryConfig::default());
    }

    #[rstest]
    fn test_from_lookup_postgres() {
        let config = RepositoryConfig::from_lookup(lookup(&[
            ("STORAGE_MODE", "postgres"),
            ("DATABASE_URL", " postgres://localhost/tasks "),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("SEED_DEMO_TASKS", "false"),
            ("RUN_MIGRATIONS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.storage_mode, StorageMode::Postgres);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/tasks")
        );
        assert_eq!(config.max_connections, 4);
        assert!(!config.seed_demo_tasks);
        assert!(!config.run_migrations);
    }

    #[rstest]
    #[case(&[("STORAGE_MODE", "redis")], ConfigurationError::InvalidStorageMode("redis".to_string()))]
    #[case(&[("STORAGE_MODE", "postgres")], ConfigurationError::MissingDatabaseUrl)]
    #[case(&[("STORAGE_MODE", "postgres"), ("DATABASE_URL", "  ")], ConfigurationError::MissingDatabaseUrl)]
    #[case(
        &[("DATABASE_MAX_CONNECTIONS", "0")],
        ConfigurationError::InvalidValue { name: "DATABASE_MAX_CONNECTIONS", value: "0".to_string() }
    )]
    #[case(
        &[("DATABASE_MAX_CONNECTIONS", "many")],
        ConfigurationError::InvalidValue { name: "DATABASE_MAX_CONNECTIONS", value: "many".to_string() }
    )]
    #[case(
        &[("SEED_DEMO_TASKS", "maybe")],
        ConfigurationError::InvalidValue { name: "SEED_DEMO_TASKS", value: "maybe".to_string() }
    )]
    fn test_from_lookup_invalid(
        #[case] pairs: &[(&str, &str)],
        #[case] expected: ConfigurationError,
    ) {
        assert_eq!(RepositoryConfig::from_lookup(lookup(pairs)), Err(expected));
    }

    #[rstest]
    #[case("true", true)]
    #[case("1", true)]
    #[case("ON", true)]
    #[case("false", false)]
    #[case(" no ", false)]
    fn test_parse_flag(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(parse_flag("SEED_DEMO_TASKS", input), Ok(expected));
    }

    #[rstest]
    fn test_parse_flag_invalid() {
        let error = parse_flag("RUN_MIGRATIONS", "maybe").unwrap_err();
        assert!(error.to_string().contains("RUN_MIGRATIONS"));
        assert!(error.to_string().contains("maybe"));
    }

    // -------------------------------------------------------------------------
    // Demo Data Tests
    // -------------------------------------------------------------------------

    #[rstest]
    fn test_demo_tasks() {
        let tasks = demo_tasks();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].task_id, TaskId::new("t1"));
        assert_eq!(tasks[0].version, 5);
        assert_eq!(tasks[1].task_id, TaskId::new("t2"));
        assert_eq!(tasks[1].version, 3);
        assert!(tasks[0].created_at < tasks[1].created_at);
        assert!(
            tasks
                .iter()
                .all(|task| task.belongs_to(&WorkspaceId::new(DEMO_WORKSPACE_ID)))
        );
    }

    // -------------------------------------------------------------------------
    // RepositoryFactory Tests
    // -------------------------------------------------------------------------

    #[rstest]
    #[tokio::test]
    async fn test_repository_factory_create_in_memory_seeded() {
        let factory = RepositoryFactory::new(RepositoryConfig::default());
        let repositories = factory.create().await.unwrap();

        let tasks = repositories
            .task_repository
            .list(&WorkspaceId::new(DEMO_WORKSPACE_ID), TaskFilter::all())
            .await
            .unwrap();
        let ids: Vec<&str> = tasks.iter().map(|task| task.task_id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2"]);
    }

    #[rstest]
    #[tokio::test]
    async fn test_repository_factory_create_in_memory_empty() {
        let config = RepositoryConfig::builder()
            .seed_demo_tasks(false)
            .build()
            .unwrap();
        let repositories = RepositoryFactory::new(config).create().await.unwrap();

        let tasks = repositories
            .task_repository
            .list(&WorkspaceId::new(DEMO_WORKSPACE_ID), TaskFilter::all())
            .await
            .unwrap();
        assert!(tasks.is_empty());
    }

    #[rstest]
    fn test_factory_error_display() {
        let error = FactoryError::Configuration(ConfigurationError::MissingDatabaseUrl);
        assert!(error.to_string().contains("Configuration"));

        let error = FactoryError::DatabaseConnection("connection refused".to_string());
        assert!(error.to_string().contains("connection refused"));

        let error = FactoryError::Migration("checksum mismatch".to_string());
        assert!(error.to_string().contains("checksum mismatch"));
    }

    #[rstest]
    #[tokio::test]
    async fn test_repositories_debug() {
        let repositories = RepositoryFactory::new(RepositoryConfig::default())
            .create()
            .await
            .unwrap();

        let debug_string = format!("{repositories:?}");
        assert!(debug_string.contains("Repositories"));
        assert!(debug_string.contains("task_repository"));
    }

    // -------------------------------------------------------------------------
    // Integration Tests (require external services)
    // -------------------------------------------------------------------------

    #[rstest]
    #[tokio::test]
    #[ignore = "Requires PostgreSQL instance"]
    async fn test_repository_factory_create_postgres() {
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/test".into());
        let config = RepositoryConfig::builder()
            .storage_mode(StorageMode::Postgres)
            .database_url(database_url)
            .build()
            .unwrap();

        let repositories = RepositoryFactory::new(config).create().await.unwrap();
        repositories.task_repository.ping().await.unwrap();

        let seeded = repositories
            .task_repository
            .find_by_id(&WorkspaceId::new(DEMO_WORKSPACE_ID), &TaskId::new("t1"))
            .await
            .unwrap();
        assert!(seeded.is_some());
    }
}
