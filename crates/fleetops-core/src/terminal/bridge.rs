use fleetops_ssh::PtyProcess;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::frame::{ClientFrame, FrameError};
use crate::event_bus::{Event, EventBus, EventStatus};
use crate::session::SessionManager;

/// Which side ended a bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeEnd {
    /// Client stream ended or stopped accepting output
    ClientClosed,
    /// Shell output ended
    ProcessExited,
}

/// Relay between a terminal client and a live shell.
///
/// Client frames are decoded and applied through the session manager in
/// arrival order; shell output is forwarded verbatim. Whichever side ends
/// first stops the other, and the session is then closed.
pub async fn run_bridge<I, O>(
    sessions: &SessionManager,
    bus: &EventBus,
    session_id: &str,
    process: Arc<dyn PtyProcess>,
    mut incoming: I,
    mut outgoing: O,
) -> BridgeEnd
where
    I: Stream<Item = Vec<u8>> + Unpin,
    O: Sink<Vec<u8>> + Unpin,
    O::Error: Display,
{
    bus.publish(Event::session(
        session_id,
        EventStatus::Connected,
        "--- Session connected ---",
    ));

    let client_to_shell = async {
        while let Some(bytes) = incoming.next().await {
            match ClientFrame::decode(&bytes) {
                Ok(ClientFrame::Input(data)) => sessions.write(session_id, &data).await,
                Ok(ClientFrame::Resize(size)) => sessions.resize(session_id, size).await,
                Err(FrameError::Empty) => {}
                Err(e) => warn!(session_id, error = %e, "Dropping terminal frame"),
            }
        }
        BridgeEnd::ClientClosed
    };

    let shell_to_client = async {
        while let Some(chunk) = process.read().await {
            if let Err(e) = outgoing.send(chunk).await {
                debug!(session_id, error = %e, "Client stopped accepting output");
                return BridgeEnd::ClientClosed;
            }
        }
        BridgeEnd::ProcessExited
    };

    let end = tokio::select! {
        end = client_to_shell => end,
        end = shell_to_client => end,
    };

    sessions.close_session(session_id).await;
    bus.publish(Event::session(
        session_id,
        EventStatus::Closed,
        "--- Session closed ---",
    ));
    info!(session_id, ?end, "Terminal bridge finished");
    end
}
