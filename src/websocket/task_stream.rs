//! Live task output
//!
//! Every bus event of one task is forwarded as a JSON text frame until
//! either side goes away.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Path,
    },
    response::IntoResponse,
};
use fleetops_core::{Subscription, TaskService};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// WebSocket upgrade handler
pub async fn task_stream_handler(
    ws: WebSocketUpgrade,
    Path(task_id): Path<Uuid>,
    Extension(tasks): Extension<Arc<TaskService>>,
) -> impl IntoResponse {
    // subscribe before the upgrade completes so nothing published meanwhile is lost
    let subscription = tasks.subscribe(task_id);
    ws.on_upgrade(move |socket| handle_socket(socket, task_id, subscription))
}

async fn handle_socket(socket: WebSocket, task_id: Uuid, mut subscription: Subscription) {
    info!(task_id = %task_id, subscriber = subscription.id(), "Task stream opened");
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else { break };
                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(task_id = %task_id, error = %e, "Failed to serialize event");
                        continue;
                    }
                };
                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            msg = receiver.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    debug!(task_id = %task_id, subscriber = subscription.id(), "Task stream closed");
    // dropping the subscription unregisters it from the bus
}
