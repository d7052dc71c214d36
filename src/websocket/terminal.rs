//! Interactive terminal over WebSocket
//!
//! `GET /ws/terminal?host_id=..&session_id=..&cols=..&rows=..`
//!
//! Client frames use the tagged terminal protocol (`0x00` input, `0x01` JSON
//! control); text and binary messages are decoded the same way. Shell output
//! goes back as binary messages.

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Extension, Query,
    },
    response::IntoResponse,
};
use fleetops_core::{run_bridge, EventBus, RecordStore, SessionManager};
use fleetops_ssh::TerminalSize;
use futures_util::{future, SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Connection parameters
#[derive(Debug, Deserialize)]
pub struct TerminalQuery {
    pub host_id: Uuid,
    /// Reattach to or name a session; a random id is used when absent
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub cols: Option<u32>,
    #[serde(default)]
    pub rows: Option<u32>,
}

impl TerminalQuery {
    fn size(&self, default: TerminalSize) -> TerminalSize {
        TerminalSize::new(
            self.cols.filter(|c| *c > 0).unwrap_or(default.cols),
            self.rows.filter(|r| *r > 0).unwrap_or(default.rows),
        )
    }
}

struct TerminalServices {
    store: Arc<dyn RecordStore>,
    sessions: Arc<SessionManager>,
    bus: EventBus,
}

/// WebSocket upgrade handler
pub async fn terminal_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<TerminalQuery>,
    Extension(store): Extension<Arc<dyn RecordStore>>,
    Extension(sessions): Extension<Arc<SessionManager>>,
    Extension(bus): Extension<EventBus>,
    Extension(default_size): Extension<TerminalSize>,
) -> impl IntoResponse {
    let services = TerminalServices {
        store,
        sessions,
        bus,
    };
    let size = query.size(default_size);
    ws.on_upgrade(move |socket| handle_socket(socket, query, size, services))
}

async fn handle_socket(
    mut socket: WebSocket,
    query: TerminalQuery,
    size: TerminalSize,
    services: TerminalServices,
) {
    let session_id = query
        .session_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let host = match services.store.get_host(query.host_id).await {
        Ok(host) => host,
        Err(e) => {
            warn!(host_id = %query.host_id, error = %e, "Terminal requested for unknown host");
            close(&mut socket, close_code::POLICY, "host not found").await;
            return;
        }
    };

    let process = match services
        .sessions
        .create_session(&session_id, &host, size)
        .await
    {
        Ok(process) => process,
        Err(e) => {
            warn!(session_id = %session_id, host_id = %host.id, error = %e, "Failed to open shell");
            close(&mut socket, close_code::ERROR, "failed to open session").await;
            return;
        }
    };

    let (sender, receiver) = socket.split();
    let incoming = receiver
        .take_while(|msg| future::ready(matches!(msg, Ok(m) if !matches!(m, Message::Close(_)))))
        .filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(text.into_bytes()),
                Ok(Message::Binary(bytes)) => Some(bytes),
                _ => None,
            })
        });
    let outgoing = sender
        .with(|bytes: Vec<u8>| future::ready(Ok::<_, axum::Error>(Message::Binary(bytes))));

    let end = run_bridge(
        &services.sessions,
        &services.bus,
        &session_id,
        process,
        Box::pin(incoming),
        Box::pin(outgoing),
    )
    .await;

    info!(session_id = %session_id, end = ?end, "Terminal connection finished");
}

async fn close(socket: &mut WebSocket, code: u16, reason: &'static str) {
    let frame = CloseFrame {
        code,
        reason: reason.into(),
    };
    // the client may already be gone
    let _ = socket.send(Message::Close(Some(frame))).await;
}
