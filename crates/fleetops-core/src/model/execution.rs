use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Status of one host within a task.
///
/// Moves only forward: `pending -> running -> {success, failed, cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostStatus {
    /// Waiting for its batch
    Pending,
    /// Command in flight
    Running,
    /// Exited with status zero
    Success,
    /// Non-zero exit, or the host could not be reached
    Failed,
    /// Abandoned while running
    Cancelled,
}

impl HostStatus {
    /// Stable string form used in storage and events
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether no further transition is possible
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }

    /// Whether `self -> next` is a legal step
    #[must_use]
    pub fn can_transition_to(&self, next: HostStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Success)
                | (Self::Running, Self::Failed)
                | (Self::Running, Self::Cancelled)
        )
    }
}

impl fmt::Display for HostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(Error::Internal(format!("unknown host status: {}", other))),
        }
    }
}

/// One task's execution on one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostExecution {
    /// Unique execution ID
    pub id: Uuid,
    /// Owning task
    pub task_id: Uuid,
    /// Target host
    pub host_id: Uuid,
    /// Index of the host in the task's target list; batches follow this order
    pub position: u32,
    /// Current status
    pub status: HostStatus,
    /// Remote exit code, once the command finished
    pub exit_code: Option<i32>,
    /// Connection or execution error text
    pub error: Option<String>,
    /// When the execution moved to `running`
    pub started_at: Option<DateTime<Utc>>,
    /// When the execution reached a terminal status
    pub finished_at: Option<DateTime<Utc>>,
}

impl HostExecution {
    /// New pending execution
    pub fn pending(task_id: Uuid, host_id: Uuid, position: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            host_id,
            position,
            status: HostStatus::Pending,
            exit_code: None,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    fn transition(&mut self, next: HostStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// `pending -> running`
    pub fn start(&mut self) -> Result<()> {
        self.transition(HostStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// `running -> success | failed`, decided by the exit code
    pub fn complete(&mut self, exit_code: i32) -> Result<()> {
        let next = if exit_code == 0 {
            HostStatus::Success
        } else {
            HostStatus::Failed
        };
        self.transition(next)?;
        self.exit_code = Some(exit_code);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// `running -> failed` with error text
    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        self.transition(HostStatus::Failed)?;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
        Ok(())
    }
}

/// Task-level state derived from its executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// No host has started yet
    Pending,
    /// Some host is running or still waiting for its batch
    Running,
    /// Stopped after a failed batch; the remaining hosts will not run
    Paused,
    /// Every host reached a terminal status
    Completed,
}

/// Aggregate host statuses into a task state.
///
/// `Paused` is never derived here: it is not visible in the rows and is
/// layered on by whoever observed the dispatch stop.
#[must_use]
pub fn aggregate_state(executions: &[HostExecution]) -> TaskState {
    if executions.iter().all(|e| e.status.is_terminal()) {
        TaskState::Completed
    } else if executions.iter().all(|e| e.status == HostStatus::Pending) {
        TaskState::Pending
    } else {
        TaskState::Running
    }
}
