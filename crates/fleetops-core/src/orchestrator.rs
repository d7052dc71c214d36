//! Execution Orchestrator
//!
//! Splits a task's hosts into ordered batches and drives the executor over
//! them: hosts inside a batch run concurrently under a per-dispatch
//! semaphore, batches run one after another, and a failed batch stops the
//! task when its policy says so.

use dashmap::DashSet;
use futures::future::join_all;
use std::ops::Range;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::event_bus::{Event, EventBus, EventStatus};
use crate::executor::RemoteExecutor;
use crate::model::{HostExecution, HostStatus, Task};
use crate::store::RecordStore;

/// Split `total` targets into contiguous batches of `batch_size`.
///
/// A size of zero means a single batch holding everything. No targets, no
/// batches.
#[must_use]
pub fn plan_batches(total: usize, batch_size: usize) -> Vec<Range<usize>> {
    if total == 0 {
        return Vec::new();
    }
    let size = if batch_size == 0 { total } else { batch_size };
    (0..total)
        .step_by(size)
        .map(|start| start..(start + size).min(total))
        .collect()
}

/// How a dispatch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Batches planned
    pub batches_total: usize,
    /// Batches that actually ran
    pub batches_run: usize,
    /// Stopped early by the pause-on-fail policy
    pub paused: bool,
}

/// Batch dispatcher.
pub struct Orchestrator {
    store: Arc<dyn RecordStore>,
    bus: EventBus,
    executor: Arc<RemoteExecutor>,
    /// Ids of tasks whose dispatch stopped after a failed batch. Paused tasks
    /// are never resumed, so entries are never removed: the set grows by one
    /// id per paused task for the life of the process and is empty again
    /// after a restart. Tasks that run to the end are not recorded.
    paused: DashSet<Uuid>,
}

impl Orchestrator {
    /// Create a new orchestrator
    pub fn new(store: Arc<dyn RecordStore>, bus: EventBus, executor: Arc<RemoteExecutor>) -> Self {
        Self {
            store,
            bus,
            executor,
            paused: DashSet::new(),
        }
    }

    /// Whether a dispatch of this task stopped after a failed batch.
    ///
    /// Kept in memory only and never cleared; see the `paused` field.
    #[must_use]
    pub fn is_paused(&self, task_id: Uuid) -> bool {
        self.paused.contains(&task_id)
    }

    /// Run `executions` (pending rows of `task`, in target order) batch by
    /// batch, with at most `concurrency_limit` hosts in flight at a time.
    pub async fn dispatch(
        &self,
        task: &Task,
        executions: Vec<HostExecution>,
        concurrency_limit: usize,
    ) -> DispatchOutcome {
        let batches = plan_batches(executions.len(), task.batch_size_for(executions.len()));
        let semaphore = Semaphore::new(concurrency_limit.max(1));
        let mut outcome = DispatchOutcome {
            batches_total: batches.len(),
            batches_run: 0,
            paused: false,
        };

        info!(
            task_id = %task.id,
            mode = %task.mode,
            hosts = executions.len(),
            batches = batches.len(),
            "Dispatching task"
        );

        let mut remaining = executions.into_iter();
        for (index, range) in batches.iter().enumerate() {
            let batch: Vec<HostExecution> = remaining.by_ref().take(range.len()).collect();
            let batch_ids: Vec<Uuid> = batch.iter().map(|e| e.id).collect();

            debug!(task_id = %task.id, batch = index + 1, hosts = batch.len(), "Starting batch");
            let workers = batch
                .into_iter()
                .map(|execution| self.run_worker(task, execution, &semaphore));
            join_all(workers).await;
            outcome.batches_run += 1;

            if task.pauses_on_failure() && self.batch_failed(task.id, &batch_ids).await {
                warn!(task_id = %task.id, batch = index + 1, "Batch failed, pausing task");
                self.paused.insert(task.id);
                self.bus.publish(Event::task(
                    task.id,
                    None,
                    EventStatus::Paused,
                    "--- Batch failed, pausing task ---",
                ));
                outcome.paused = true;
                break;
            }

            let is_last = index + 1 == batches.len();
            if let Some(delay) = task.batch_interval().filter(|_| !is_last) {
                debug!(task_id = %task.id, delay_secs = delay.as_secs(), "Waiting before next batch");
                tokio::time::sleep(delay).await;
            }
        }

        info!(
            task_id = %task.id,
            batches_run = outcome.batches_run,
            paused = outcome.paused,
            "Dispatch finished"
        );
        outcome
    }

    async fn run_worker(
        &self,
        task: &Task,
        execution: HostExecution,
        semaphore: &Semaphore,
    ) -> HostExecution {
        // the semaphore is never closed
        let _permit = semaphore.acquire().await.ok();

        match self.store.get_host(execution.host_id).await {
            Ok(host) => {
                self.executor
                    .execute(task.id, execution, &host.connection_params(), &task.command)
                    .await
            }
            Err(e) => {
                warn!(task_id = %task.id, host_id = %execution.host_id, error = %e, "Cannot resolve host");
                self.executor.reject(task.id, execution, &e.to_string()).await
            }
        }
    }

    /// Whether any row of the batch just run ended in `failed`. Only that
    /// batch counts, not earlier ones.
    async fn batch_failed(&self, task_id: Uuid, batch_ids: &[Uuid]) -> bool {
        match self.store.list_host_executions(task_id).await {
            Ok(rows) => rows
                .iter()
                .filter(|row| batch_ids.contains(&row.id))
                .any(|row| row.status == HostStatus::Failed),
            Err(e) => {
                // unreadable results count as a failure
                error!(task_id = %task_id, error = %e, "Could not read batch results");
                true
            }
        }
    }
}

#[cfg(test)]
mod tests;
