//! ArcaneTasks API server.
//!
//! # Environment Variables
//!
//! - `STORAGE_MODE`: `in_memory` (default) | `postgres`
//! - `DATABASE_URL`: `PostgreSQL` connection URL (required when `STORAGE_MODE=postgres`)
//! - `DATABASE_MAX_CONNECTIONS`, `SEED_DEMO_TASKS`, `RUN_MIGRATIONS`: storage tuning
//! - `RUST_LOG`: Logging filter (default: `arcane_tasks_api=debug,tower_http=info`)
//! - `LOG_FORMAT`: `pretty` (default) | `json`
//! - `HOST` / `PORT`: bind address (default: `0.0.0.0:3000`)
//! - `CORS_ALLOWED_ORIGINS`, `AUTH_MODE`, `AUTH_USER_ID`, `AUTH_WORKSPACE_ID`,
//!   `NOTIFICATION_QUEUE_CAPACITY`: see [`arcane_tasks_api::config`]

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use arcane_tasks_api::api::{API_PREFIX, AppState, build_router, cors_layer};
use arcane_tasks_api::config::{LogFormat, ServerConfig};
use arcane_tasks_api::infrastructure::{QueueNotificationSink, RepositoryFactory};

const DEFAULT_LOG_FILTER: &str = "arcane_tasks_api=debug,tower_http=info";
const NOTIFICATION_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let server_config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("Configuration error: {error}");
            std::process::exit(1);
        }
    };

    init_tracing(server_config.log_format);
    tracing::info!("Starting ArcaneTasks API");

    let factory = match RepositoryFactory::from_env() {
        Ok(factory) => factory,
        Err(error) => {
            tracing::error!("Configuration error: {}", error);
            std::process::exit(1);
        }
    };

    tracing::info!(
        storage_mode = ?factory.config().storage_mode,
        seed_demo_tasks = factory.config().seed_demo_tasks,
        auth_mode = ?server_config.auth_mode,
        "Configuration loaded"
    );

    let repositories = match factory.create().await {
        Ok(repositories) => {
            tracing::info!("Repositories initialized successfully");
            repositories
        }
        Err(error) => {
            tracing::error!("Failed to initialize repositories: {}", error);
            std::process::exit(1);
        }
    };

    let (notification_sink, notification_worker) =
        QueueNotificationSink::spawn(server_config.notification_queue_capacity);

    let application_state = AppState::new(
        repositories,
        Arc::new(notification_sink),
        server_config.authenticator(),
    );
    let application = build_router(
        application_state,
        cors_layer(&server_config.cors_allowed_origins),
    );

    let address = match server_config.socket_address() {
        Ok(address) => address,
        Err(error) => {
            tracing::error!(%error, "Invalid server address");
            std::process::exit(1);
        }
    };

    let listener = match TcpListener::bind(address).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(%error, "Failed to bind to address {}", address);
            std::process::exit(1);
        }
    };

    match listener.local_addr() {
        Ok(address) => tracing::info!(
            "Listening on {} (routes also under {})",
            address,
            API_PREFIX
        ),
        Err(error) => tracing::warn!(%error, "Could not determine local address"),
    }

    // `serve` drops the router, and with it the last sink handle, on return.
    if let Err(error) = axum::serve(listener, application)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(%error, "Server error");
        std::process::exit(1);
    }

    match tokio::time::timeout(NOTIFICATION_DRAIN_TIMEOUT, notification_worker).await {
        Ok(Ok(delivered)) => tracing::info!(delivered, "Notification queue drained"),
        Ok(Err(error)) => tracing::warn!(%error, "Notification worker did not finish cleanly"),
        Err(_) => tracing::warn!("Timed out draining the notification queue"),
    }

    tracing::info!("Server shutdown complete");
}

/// Completes on SIGINT (Ctrl+C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::warn!(%error, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::warn!(%error, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
