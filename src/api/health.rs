//! Health check endpoints
//!
//! - `/health`: simple "healthy" + version (for load balancers)
//! - `/health/detailed`: record store, event bus and terminal session state

use axum::extract::Extension;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use fleetops_core::{EventBus, RecordStore, SessionManager};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Simple health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed health response with per-component checks
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub store: StoreHealth,
    pub event_bus_subscribers: usize,
    pub terminal_sessions: usize,
}

/// Record store probe
#[derive(Debug, Serialize)]
pub struct StoreHealth {
    pub backend: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn detailed_health(
    Extension(store): Extension<Arc<dyn RecordStore>>,
    Extension(bus): Extension<EventBus>,
    Extension(sessions): Extension<Arc<SessionManager>>,
) -> Json<DetailedHealthResponse> {
    let started = Instant::now();
    let store_health = match store.list_hosts().await {
        Ok(_) => StoreHealth {
            backend: store.name().to_string(),
            status: "healthy",
            latency_ms: Some(started.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => StoreHealth {
            backend: store.name().to_string(),
            status: "unhealthy",
            latency_ms: None,
            error: Some(e.to_string()),
        },
    };

    let status = if store_health.error.is_none() {
        "healthy"
    } else {
        "degraded"
    };

    Json(DetailedHealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        store: store_health,
        event_bus_subscribers: bus.subscriber_count(),
        terminal_sessions: sessions.list_sessions().await.len(),
    })
}

/// Health check routes
pub fn health_routes() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/detailed", get(detailed_health))
}
