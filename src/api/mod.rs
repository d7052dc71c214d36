//! REST API for fleetops
//!
//! Handlers pull shared services from `Extension` layers installed by the
//! server and answer with the [`ApiResponse`] envelope.

pub mod health;
pub mod hosts;
pub mod response;
pub mod tasks;
pub mod terminal;


pub use health::health_routes;
pub use hosts::hosts_routes;
pub use tasks::tasks_routes;
pub use terminal::terminal_routes;

use axum::Router;

/// Every REST route
pub fn api_router() -> Router {
    Router::new()
        .merge(health_routes())
        .merge(hosts_routes())
        .merge(tasks_routes())
        .merge(terminal_routes())
}
