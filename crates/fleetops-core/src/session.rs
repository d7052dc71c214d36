//! Interactive Session Manager
//!
//! Registry of live pseudo-terminal shells keyed by a client-chosen session
//! id. One id maps to at most one shell; creating an id that is already live
//! hands back the existing shell.

use chrono::{DateTime, Utc};
use fleetops_ssh::{PtyProcess, SshConnector, TerminalSize};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::model::Host;

/// Default terminal type requested for new shells
pub const DEFAULT_TERM_TYPE: &str = "xterm";

struct LiveSession {
    host_id: Uuid,
    process: Arc<dyn PtyProcess>,
    opened_at: DateTime<Utc>,
}

/// Summary view of a live session (for list endpoints).
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    /// Session ID
    pub session_id: String,
    /// Host the shell runs on
    pub host_id: Uuid,
    /// Current terminal size
    pub size: TerminalSize,
    /// When the shell was opened
    pub opened_at: DateTime<Utc>,
}

/// Owns every live interactive shell.
pub struct SessionManager {
    connector: Arc<dyn SshConnector>,
    term_type: String,
    sessions: Mutex<HashMap<String, LiveSession>>,
    /// Per-id gates for shells that are still connecting
    opening: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(connector: Arc<dyn SshConnector>, term_type: impl Into<String>) -> Self {
        Self {
            connector,
            term_type: term_type.into(),
            sessions: Mutex::new(HashMap::new()),
            opening: Mutex::new(HashMap::new()),
        }
    }

    /// Get the live shell for `session_id`, opening one on `host` if absent.
    ///
    /// Connecting happens outside the table lock so traffic to other sessions
    /// is never held up by a slow host. Callers for the same id queue on a
    /// per-id gate and reuse whatever the first one opened.
    pub async fn create_session(
        &self,
        session_id: &str,
        host: &Host,
        size: TerminalSize,
    ) -> Result<Arc<dyn PtyProcess>> {
        if let Some(process) = self.process(session_id).await {
            debug!(session_id, "Reusing live session");
            return Ok(process);
        }

        let gate = self
            .opening
            .lock()
            .await
            .entry(session_id.to_string())
            .or_default()
            .clone();
        let opened = {
            let _turn = gate.lock().await;
            self.open_once(session_id, host, size).await
        };

        let mut opening = self.opening.lock().await;
        if opening
            .get(session_id)
            .is_some_and(|current| Arc::ptr_eq(current, &gate))
            && Arc::strong_count(&gate) == 2
        {
            opening.remove(session_id);
        }
        opened
    }

    async fn open_once(
        &self,
        session_id: &str,
        host: &Host,
        size: TerminalSize,
    ) -> Result<Arc<dyn PtyProcess>> {
        if let Some(process) = self.process(session_id).await {
            debug!(session_id, "Reusing live session");
            return Ok(process);
        }

        let process = self
            .connector
            .open_pty(&host.connection_params(), &self.term_type, size)
            .await?;

        let mut sessions = self.sessions.lock().await;
        if let Some(live) = sessions.get(session_id) {
            // lost a race with a caller whose gate was already released
            let existing = live.process.clone();
            drop(sessions);
            process.terminate().await;
            return Ok(existing);
        }
        sessions.insert(
            session_id.to_string(),
            LiveSession {
                host_id: host.id,
                process: process.clone(),
                opened_at: Utc::now(),
            },
        );
        drop(sessions);

        info!(session_id, host_id = %host.id, cols = size.cols, rows = size.rows, "Session opened");
        Ok(process)
    }

    /// Tear a session down. Returns `false` if it was not live.
    pub async fn close_session(&self, session_id: &str) -> bool {
        // unregister first so a concurrent close finds nothing
        let removed = self.sessions.lock().await.remove(session_id);
        match removed {
            Some(live) => {
                live.process.terminate().await;
                info!(session_id, "Session closed");
                true
            }
            None => false,
        }
    }

    /// Forward input to a session; dropped if the session is not live.
    pub async fn write(&self, session_id: &str, data: &[u8]) {
        let Some(process) = self.process(session_id).await else {
            return;
        };
        if let Err(e) = process.write(data).await {
            debug!(session_id, error = %e, "Input not delivered");
        }
    }

    /// Resize a session's terminal; dropped if the session is not live.
    pub async fn resize(&self, session_id: &str, size: TerminalSize) {
        let Some(process) = self.process(session_id).await else {
            return;
        };
        if let Err(e) = process.resize(size).await {
            debug!(session_id, error = %e, "Resize not delivered");
        }
    }

    /// Whether a session is live
    pub async fn is_active(&self, session_id: &str) -> bool {
        self.sessions.lock().await.contains_key(session_id)
    }

    /// All live sessions
    pub async fn list_sessions(&self) -> Vec<SessionInfo> {
        let sessions = self.sessions.lock().await;
        let mut list: Vec<SessionInfo> = sessions
            .iter()
            .map(|(id, live)| SessionInfo {
                session_id: id.clone(),
                host_id: live.host_id,
                size: live.process.size(),
                opened_at: live.opened_at,
            })
            .collect();
        list.sort_by_key(|s| s.opened_at);
        list
    }

    /// Close every live session (shutdown). Returns how many were closed.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<(String, LiveSession)> = self.sessions.lock().await.drain().collect();
        let count = drained.len();
        for (session_id, live) in drained {
            live.process.terminate().await;
            debug!(session_id, "Session closed on shutdown");
        }
        count
    }

    async fn process(&self, session_id: &str) -> Option<Arc<dyn PtyProcess>> {
        self.sessions
            .lock()
            .await
            .get(session_id)
            .map(|live| live.process.clone())
    }
}
