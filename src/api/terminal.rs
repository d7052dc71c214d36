//! Interactive session control over plain HTTP
//!
//! Every operation is a silent no-op on an unknown session id.

use axum::{
    extract::{Extension, Path},
    routing::{delete, get, post},
    Json, Router,
};
use fleetops_core::{SessionInfo, SessionManager};
use fleetops_ssh::TerminalSize;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::response::{ok, ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct InputRequest {
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub struct ResizeRequest {
    pub cols: u32,
    pub rows: u32,
}

#[derive(Debug, Serialize)]
pub struct CloseResponse {
    /// Whether a live session was torn down
    pub closed: bool,
}

async fn list_sessions(
    Extension(sessions): Extension<Arc<SessionManager>>,
) -> ApiResult<Vec<SessionInfo>> {
    ok(sessions.list_sessions().await)
}

async fn send_input(
    Extension(sessions): Extension<Arc<SessionManager>>,
    Path(id): Path<String>,
    Json(request): Json<InputRequest>,
) -> ApiResult<()> {
    sessions.write(&id, request.data.as_bytes()).await;
    ok(())
}

async fn resize(
    Extension(sessions): Extension<Arc<SessionManager>>,
    Path(id): Path<String>,
    Json(request): Json<ResizeRequest>,
) -> ApiResult<()> {
    if request.cols == 0 || request.rows == 0 {
        return Err(ApiError::bad_request("cols and rows must be at least 1"));
    }
    sessions
        .resize(&id, TerminalSize::new(request.cols, request.rows))
        .await;
    ok(())
}

async fn close_session(
    Extension(sessions): Extension<Arc<SessionManager>>,
    Path(id): Path<String>,
) -> ApiResult<CloseResponse> {
    let closed = sessions.close_session(&id).await;
    ok(CloseResponse { closed })
}

/// Terminal session routes
pub fn terminal_routes() -> Router {
    Router::new()
        .route("/api/v1/terminal/sessions", get(list_sessions))
        .route("/api/v1/terminal/sessions/:id", delete(close_session))
        .route("/api/v1/terminal/sessions/:id/input", post(send_input))
        .route("/api/v1/terminal/sessions/:id/resize", post(resize))
}
