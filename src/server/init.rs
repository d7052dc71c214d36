//! Server initialization and run loop

use super::config::AppConfig;
use anyhow::{Context, Result};
use axum::{Extension, Router};
use fleetops_core::{
    EventBus, MemoryStore, Orchestrator, RecordStore, RemoteExecutor, SessionManager,
    SqliteStore, TaskService,
};
use fleetops_ssh::{RusshConnector, SshConnector, TerminalSize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Shared services behind the HTTP, WebSocket and CLI surfaces.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn RecordStore>,
    pub bus: EventBus,
    pub tasks: Arc<TaskService>,
    pub sessions: Arc<SessionManager>,
    /// Size used when a terminal client does not ask for one
    pub terminal_size: TerminalSize,
}

impl AppContext {
    /// Wire the engine together around a store and an SSH transport
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn RecordStore>,
        connector: Arc<dyn SshConnector>,
    ) -> Self {
        let bus = EventBus::new(config.event_bus.subscriber_capacity);
        let executor = Arc::new(RemoteExecutor::new(
            store.clone(),
            bus.clone(),
            connector.clone(),
        ));
        let orchestrator = Arc::new(Orchestrator::new(store.clone(), bus.clone(), executor));
        let tasks = Arc::new(TaskService::new(
            store.clone(),
            bus.clone(),
            orchestrator,
            config.execution.concurrency,
        ));
        let sessions = Arc::new(SessionManager::new(
            connector,
            config.terminal.term_type.clone(),
        ));

        Self {
            store,
            bus,
            tasks,
            sessions,
            terminal_size: TerminalSize::new(
                config.terminal.default_cols,
                config.terminal.default_rows,
            ),
        }
    }

    /// Open the configured store and the `russh` transport
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let store = open_store(config).await?;
        let connector: Arc<dyn SshConnector> = Arc::new(RusshConnector::new(Duration::from_secs(
            config.execution.connect_timeout_secs,
        )));
        Ok(Self::new(config, store, connector))
    }
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn RecordStore>> {
    if config.database.in_memory {
        info!("Using in-memory record store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let store = SqliteStore::from_path(&config.database.path)
        .await
        .with_context(|| format!("Failed to open database {}", config.database.path.display()))?;
    Ok(Arc::new(store))
}

/// Build the main router with all endpoints
pub fn build_router(ctx: &AppContext) -> Router {
    Router::new()
        .merge(crate::api::api_router())
        .merge(crate::websocket::websocket_router())
        .layer(Extension(ctx.store.clone()))
        .layer(Extension(ctx.bus.clone()))
        .layer(Extension(ctx.tasks.clone()))
        .layer(Extension(ctx.sessions.clone()))
        .layer(Extension(ctx.terminal_size))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve until a shutdown signal arrives
pub async fn run(config: AppConfig) -> Result<()> {
    let ctx = AppContext::from_config(&config).await?;
    let app = build_router(&ctx);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    let closed = ctx.sessions.close_all().await;
    if closed > 0 {
        info!(sessions = closed, "Closed interactive sessions");
    }

    info!("fleetops shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received SIGTERM signal"),
    }
}
