use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::model::HostStatus;

/// What an event is about. Serialised as a single `task_id` or `session_id`
/// field on the event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Topic {
    /// A dispatched task
    #[serde(rename = "task_id")]
    Task(Uuid),
    /// An interactive terminal session
    #[serde(rename = "session_id")]
    Session(String),
}

/// Status label carried by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// Host started, or output from a running host
    Running,
    /// Host finished with exit code zero
    Success,
    /// Host failed
    Failed,
    /// Host abandoned
    Cancelled,
    /// Task stopped after a failed batch
    Paused,
    /// Terminal session bridged
    Connected,
    /// Terminal session torn down
    Closed,
}

impl From<HostStatus> for EventStatus {
    fn from(status: HostStatus) -> Self {
        match status {
            // pending rows are never announced; treat as in progress
            HostStatus::Pending | HostStatus::Running => Self::Running,
            HostStatus::Success => Self::Success,
            HostStatus::Failed => Self::Failed,
            HostStatus::Cancelled => Self::Cancelled,
        }
    }
}

/// One published line of telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    /// Correlation key
    #[serde(flatten)]
    pub topic: Topic,
    /// Host the line came from, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_id: Option<Uuid>,
    /// Status label
    pub status: EventStatus,
    /// Text line
    pub line: String,
    /// Publish time
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Event on a task topic
    pub fn task(
        task_id: Uuid,
        host_id: Option<Uuid>,
        status: EventStatus,
        line: impl Into<String>,
    ) -> Self {
        Self {
            topic: Topic::Task(task_id),
            host_id,
            status,
            line: line.into(),
            timestamp: Utc::now(),
        }
    }

    /// Event on a session topic
    pub fn session(session_id: impl Into<String>, status: EventStatus, line: impl Into<String>) -> Self {
        Self {
            topic: Topic::Session(session_id.into()),
            host_id: None,
            status,
            line: line.into(),
            timestamp: Utc::now(),
        }
    }

    /// Task ID, for task events
    #[must_use]
    pub fn task_id(&self) -> Option<Uuid> {
        match &self.topic {
            Topic::Task(id) => Some(*id),
            Topic::Session(_) => None,
        }
    }
}
