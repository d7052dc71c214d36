//! Caller-facing task API
//!
//! Validates and records submissions, starts dispatch in the background and
//! answers status queries by aggregating the per-host rows.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::event_bus::{EventBus, Subscription};
use crate::model::{
    aggregate_state, DispatchMode, FailurePolicy, HostExecution, HostStatus, Task, TaskState,
};
use crate::orchestrator::{DispatchOutcome, Orchestrator};
use crate::store::RecordStore;

/// Default number of hosts in flight per dispatch
pub const DEFAULT_CONCURRENCY: usize = 5;

/// A task submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmitTask {
    /// Display name; defaults to the command
    #[serde(default)]
    pub name: Option<String>,
    /// Shell command line
    pub command: String,
    /// Target hosts, in dispatch order
    pub host_ids: Vec<Uuid>,
    /// Dispatch mode
    #[serde(default)]
    pub mode: DispatchMode,
    /// Hosts per batch (`batch` mode)
    #[serde(default)]
    pub batch_size: Option<u32>,
    /// Seconds between batches
    #[serde(default)]
    pub batch_interval_secs: Option<u64>,
    /// Failure policy between batches
    #[serde(default)]
    pub failure_policy: Option<FailurePolicy>,
}

impl SubmitTask {
    /// Broadcast `command` to `host_ids`
    pub fn new(command: impl Into<String>, host_ids: Vec<Uuid>) -> Self {
        Self {
            command: command.into(),
            host_ids,
            ..Default::default()
        }
    }

    fn into_task(self) -> Result<(Task, Vec<Uuid>)> {
        let command = self.command.trim();
        if command.is_empty() {
            return Err(Error::InvalidRequest("command must not be empty".into()));
        }

        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| command.to_string());
        let task = Task {
            batch_size: self.batch_size,
            batch_interval_secs: self.batch_interval_secs,
            failure_policy: self.failure_policy,
            ..Task::new(name, command).with_mode(self.mode)
        };
        Ok((task, self.host_ids))
    }
}

/// Aggregated view of one task.
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatusReport {
    /// The task
    pub task: Task,
    /// Task-level state
    pub state: TaskState,
    /// Per-host rows, in target order
    pub hosts: Vec<HostExecution>,
}

impl TaskStatusReport {
    /// Number of hosts with the given status
    #[must_use]
    pub fn count(&self, status: HostStatus) -> usize {
        self.hosts.iter().filter(|h| h.status == status).count()
    }
}

/// Entry point for submitting and observing tasks.
pub struct TaskService {
    store: Arc<dyn RecordStore>,
    bus: EventBus,
    orchestrator: Arc<Orchestrator>,
    concurrency: usize,
}

impl TaskService {
    /// Create a new task service
    pub fn new(
        store: Arc<dyn RecordStore>,
        bus: EventBus,
        orchestrator: Arc<Orchestrator>,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            bus,
            orchestrator,
            concurrency: concurrency.max(1),
        }
    }

    /// Record a task and start dispatching it in the background.
    pub async fn submit_task(&self, request: SubmitTask) -> Result<Uuid> {
        let (task_id, _dispatch) = self.launch(request).await?;
        Ok(task_id)
    }

    /// Like [`submit_task`](Self::submit_task), but hands back the dispatch
    /// handle so the caller can wait for it.
    pub async fn launch(&self, request: SubmitTask) -> Result<(Uuid, JoinHandle<DispatchOutcome>)> {
        let (task, host_ids) = request.into_task()?;
        for host_id in &host_ids {
            self.store.get_host(*host_id).await.map_err(|e| match e {
                Error::HostNotFound(id) => Error::InvalidRequest(format!("unknown host: {}", id)),
                other => other,
            })?;
        }
        self.start(task, host_ids).await
    }

    /// Start a fresh copy of an existing task on the same hosts.
    ///
    /// The original task and its rows are left untouched.
    pub async fn rerun_task(&self, task_id: Uuid) -> Result<Uuid> {
        let original = self.store.get_task(task_id).await?;
        let host_ids = self
            .store
            .list_host_executions(task_id)
            .await?
            .into_iter()
            .map(|row| row.host_id)
            .collect();

        let copy = original.rerun();
        info!(task_id = %task_id, rerun_id = %copy.id, "Re-running task");
        let (new_id, _dispatch) = self.start(copy, host_ids).await?;
        Ok(new_id)
    }

    async fn start(
        &self,
        task: Task,
        host_ids: Vec<Uuid>,
    ) -> Result<(Uuid, JoinHandle<DispatchOutcome>)> {
        self.store.create_task(&task).await?;
        let mut executions = Vec::with_capacity(host_ids.len());
        for (position, host_id) in host_ids.into_iter().enumerate() {
            let position = u32::try_from(position)
                .map_err(|_| Error::InvalidRequest("too many target hosts".into()))?;
            let execution = HostExecution::pending(task.id, host_id, position);
            self.store.create_host_execution(&execution).await?;
            executions.push(execution);
        }

        info!(task_id = %task.id, hosts = executions.len(), mode = %task.mode, "Task submitted");

        let task_id = task.id;
        let orchestrator = self.orchestrator.clone();
        let concurrency = self.concurrency;
        let dispatch = tokio::spawn(async move {
            orchestrator.dispatch(&task, executions, concurrency).await
        });
        Ok((task_id, dispatch))
    }

    /// Task plus per-host rows and aggregated state.
    pub async fn get_task_status(&self, task_id: Uuid) -> Result<TaskStatusReport> {
        let task = self.store.get_task(task_id).await?;
        let hosts = self.store.list_host_executions(task_id).await?;

        let state = match aggregate_state(&hosts) {
            TaskState::Completed => TaskState::Completed,
            _ if self.orchestrator.is_paused(task_id) => TaskState::Paused,
            other => other,
        };

        Ok(TaskStatusReport { task, state, hosts })
    }

    /// All tasks, newest first
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        self.store.list_tasks().await
    }

    /// Live events of one task, from now on
    #[must_use]
    pub fn subscribe(&self, task_id: Uuid) -> Subscription {
        self.bus.subscribe_task(task_id)
    }

    /// Stop a subscription. Unknown ids are ignored.
    pub fn unsubscribe(&self, subscription_id: u64) -> bool {
        self.bus.unsubscribe(subscription_id)
    }
}
