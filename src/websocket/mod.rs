//! WebSocket module for fleetops
//!
//! Provides real-time communication endpoints:
//! - /ws/tasks/:id/stream - Live events of one task
//! - /ws/terminal - Interactive shell on a host

pub mod task_stream;
pub mod terminal;

pub use task_stream::task_stream_handler;
pub use terminal::terminal_handler;

use axum::{routing::get, Router};

/// Create the WebSocket router
pub fn websocket_router() -> Router {
    Router::new()
        .route("/ws/tasks/:id/stream", get(task_stream_handler))
        .route("/ws/terminal", get(terminal_handler))
}
