use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::error::Error;

/// How a task's hosts are grouped for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// One target, one batch
    Single,
    /// All targets in one batch (default)
    #[default]
    Broadcast,
    /// Sequential batches of `batch_size` hosts
    Batch,
}

impl DispatchMode {
    /// Stable string form used in storage
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Broadcast => "broadcast",
            Self::Batch => "batch",
        }
    }
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DispatchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Self::Single),
            "broadcast" => Ok(Self::Broadcast),
            "batch" => Ok(Self::Batch),
            other => Err(Error::InvalidRequest(format!(
                "unknown dispatch mode: {}",
                other
            ))),
        }
    }
}

/// What happens after a batch in which some host failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep going with the next batch
    Continue,
    /// Stop before the next batch; remaining hosts stay pending
    PauseOnFail,
}

impl FailurePolicy {
    /// Stable string form used in storage
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::PauseOnFail => "pause_on_fail",
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "continue" => Ok(Self::Continue),
            "pause_on_fail" => Ok(Self::PauseOnFail),
            other => Err(Error::InvalidRequest(format!(
                "unknown failure policy: {}",
                other
            ))),
        }
    }
}

/// A command to run on a set of hosts.
///
/// Immutable once stored; re-running produces a new task via [`Task::rerun`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID
    pub id: Uuid,
    /// Human-readable name
    pub name: String,
    /// Shell command line
    pub command: String,
    /// Dispatch mode
    pub mode: DispatchMode,
    /// Hosts per batch (only honoured in `batch` mode)
    pub batch_size: Option<u32>,
    /// Pause between batches, in seconds
    pub batch_interval_secs: Option<u64>,
    /// Failure policy between batches (unset behaves like `continue`)
    pub failure_policy: Option<FailurePolicy>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create a broadcast task
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            command: command.into(),
            mode: DispatchMode::Broadcast,
            batch_size: None,
            batch_interval_secs: None,
            failure_policy: None,
            created_at: Utc::now(),
        }
    }

    /// Set dispatch mode
    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set batch size
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Set the pause between batches
    pub fn with_batch_interval(mut self, secs: u64) -> Self {
        self.batch_interval_secs = Some(secs);
        self
    }

    /// Set failure policy
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = Some(policy);
        self
    }

    /// Effective batch size for `host_count` targets.
    ///
    /// Only `batch` mode with a positive size splits the targets; anything
    /// else is a single batch holding every host.
    #[must_use]
    pub fn batch_size_for(&self, host_count: usize) -> usize {
        match (self.mode, self.batch_size) {
            (DispatchMode::Batch, Some(size)) if size > 0 => size as usize,
            _ => host_count,
        }
    }

    /// Delay to observe between batches, if any
    #[must_use]
    pub fn batch_interval(&self) -> Option<Duration> {
        self.batch_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Whether a failed batch stops the task
    #[must_use]
    pub fn pauses_on_failure(&self) -> bool {
        self.failure_policy == Some(FailurePolicy::PauseOnFail)
    }

    /// A fresh copy of this task with a new identity.
    #[must_use]
    pub fn rerun(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            ..self.clone()
        }
    }
}
