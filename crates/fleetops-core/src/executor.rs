//! Remote Command Executor
//!
//! Runs one command on one host over a connection opened just for that
//! command, keeps the host's execution row current and streams what happened
//! to the event bus.

use fleetops_ssh::{CommandOutput, ConnectionParams, SshConnector};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use crate::event_bus::{Event, EventBus, EventStatus};
use crate::model::HostExecution;
use crate::store::RecordStore;

/// Executes commands on single hosts and records the result.
pub struct RemoteExecutor {
    store: Arc<dyn RecordStore>,
    bus: EventBus,
    connector: Arc<dyn SshConnector>,
}

impl RemoteExecutor {
    /// Create a new executor
    pub fn new(
        store: Arc<dyn RecordStore>,
        bus: EventBus,
        connector: Arc<dyn SshConnector>,
    ) -> Self {
        Self {
            store,
            bus,
            connector,
        }
    }

    /// Run `command` for one pending execution row.
    ///
    /// The row moves to `running` (and a start event goes out) before any
    /// connection attempt. Connection, authentication and channel errors end
    /// in `failed` with the error text; a completed command ends in `success`
    /// or `failed` by exit code. The final row is always written back.
    #[instrument(skip_all, fields(task_id = %task_id, host_id = %execution.host_id))]
    pub async fn execute(
        &self,
        task_id: Uuid,
        mut execution: HostExecution,
        params: &ConnectionParams,
        command: &str,
    ) -> HostExecution {
        if let Err(e) = execution.start() {
            warn!(execution_id = %execution.id, error = %e, "Execution is not pending, skipping");
            return execution;
        }
        self.persist(&execution).await;

        let host_id = Some(execution.host_id);
        self.emit(Event::task(
            task_id,
            host_id,
            EventStatus::Running,
            format!("--- Start executing on {} ---", params.address),
        ));

        let outcome = AssertUnwindSafe(self.connector.exec(params, command))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                Err(fleetops_ssh::Error::Channel(
                    "ssh transport panicked".to_string(),
                ))
            });

        match outcome {
            Ok(output) => self.record_output(task_id, &mut execution, output),
            Err(e) => {
                let message = e.to_string();
                warn!(endpoint = %params.endpoint(), error = %message, "Remote execution failed");
                if let Err(e) = execution.fail(message.as_str()) {
                    error!(execution_id = %execution.id, error = %e, "Could not mark execution failed");
                }
                self.emit(Event::task(
                    task_id,
                    host_id,
                    EventStatus::Failed,
                    format!("Error: {}", message),
                ));
            }
        }

        self.persist(&execution).await;
        execution
    }

    /// Fail a pending execution whose host could not be resolved, without
    /// connecting anywhere.
    pub async fn reject(
        &self,
        task_id: Uuid,
        mut execution: HostExecution,
        reason: &str,
    ) -> HostExecution {
        if let Err(e) = execution.start().and_then(|_| execution.fail(reason)) {
            warn!(execution_id = %execution.id, error = %e, "Execution is not pending, skipping");
            return execution;
        }
        self.emit(Event::task(
            task_id,
            Some(execution.host_id),
            EventStatus::Failed,
            format!("Error: {}", reason),
        ));
        self.persist(&execution).await;
        execution
    }

    fn record_output(&self, task_id: Uuid, execution: &mut HostExecution, output: CommandOutput) {
        let host_id = Some(execution.host_id);

        if !output.stdout.is_empty() {
            self.emit(Event::task(task_id, host_id, EventStatus::Running, output.stdout));
        }
        if !output.stderr.is_empty() {
            self.emit(Event::task(task_id, host_id, EventStatus::Running, output.stderr));
        }

        if let Err(e) = execution.complete(output.exit_code) {
            error!(execution_id = %execution.id, error = %e, "Could not record exit code");
        }
        debug!(exit_code = output.exit_code, status = %execution.status, "Remote command finished");

        self.emit(Event::task(
            task_id,
            host_id,
            execution.status.into(),
            format!("--- Finished with exit code {} ---", output.exit_code),
        ));
    }

    fn emit(&self, event: Event) {
        self.bus.publish(event);
    }

    async fn persist(&self, execution: &HostExecution) {
        if let Err(e) = self.store.update_host_execution(execution).await {
            error!(
                execution_id = %execution.id,
                store = self.store.name(),
                error = %e,
                "Failed to persist host execution"
            );
        }
    }
}

#[cfg(test)]
mod tests;
