//! Task submission and status endpoints

use axum::{
    extract::{Extension, Path},
    routing::{get, post},
    Json, Router,
};
use fleetops_core::{SubmitTask, Task, TaskService, TaskStatusReport};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::response::{ok, ApiResult};

/// Returned when a task has been accepted
#[derive(Debug, Serialize)]
pub struct TaskAccepted {
    pub task_id: Uuid,
}

async fn submit_task(
    Extension(tasks): Extension<Arc<TaskService>>,
    Json(request): Json<SubmitTask>,
) -> ApiResult<TaskAccepted> {
    let task_id = tasks.submit_task(request).await?;
    ok(TaskAccepted { task_id })
}

async fn list_tasks(Extension(tasks): Extension<Arc<TaskService>>) -> ApiResult<Vec<Task>> {
    ok(tasks.list_tasks().await?)
}

async fn get_task(
    Extension(tasks): Extension<Arc<TaskService>>,
    Path(id): Path<Uuid>,
) -> ApiResult<TaskStatusReport> {
    ok(tasks.get_task_status(id).await?)
}

async fn rerun_task(
    Extension(tasks): Extension<Arc<TaskService>>,
    Path(id): Path<Uuid>,
) -> ApiResult<TaskAccepted> {
    let task_id = tasks.rerun_task(id).await?;
    ok(TaskAccepted { task_id })
}

/// Task routes
pub fn tasks_routes() -> Router {
    Router::new()
        .route("/api/v1/tasks", get(list_tasks).post(submit_task))
        .route("/api/v1/tasks/:id", get(get_task))
        .route("/api/v1/tasks/:id/rerun", post(rerun_task))
}
