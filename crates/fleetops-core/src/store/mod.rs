//! Record persistence
//!
//! The engine only needs a handful of operations from storage: create and
//! fetch tasks and hosts, create per-host execution rows, list them for a
//! task, and update one row at a time. [`RecordStore`] captures that; the
//! SQLite store is the durable backend and [`MemoryStore`] backs tests and
//! throwaway runs.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{Host, HostExecution, Task};

/// Storage backend for hosts, tasks and host executions.
///
/// Implementations must give read-your-writes within one caller and must
/// update a single execution row without touching any other row.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a new host
    async fn create_host(&self, host: &Host) -> Result<()>;

    /// Fetch a host by ID
    async fn get_host(&self, id: Uuid) -> Result<Host>;

    /// All hosts, oldest first
    async fn list_hosts(&self) -> Result<Vec<Host>>;

    /// Persist a new task
    async fn create_task(&self, task: &Task) -> Result<()>;

    /// Fetch a task by ID
    async fn get_task(&self, id: Uuid) -> Result<Task>;

    /// All tasks, newest first
    async fn list_tasks(&self) -> Result<Vec<Task>>;

    /// Persist a new host execution row
    async fn create_host_execution(&self, execution: &HostExecution) -> Result<()>;

    /// Fetch one host execution row
    async fn get_host_execution(&self, id: Uuid) -> Result<HostExecution>;

    /// Execution rows of a task, in target order
    async fn list_host_executions(&self, task_id: Uuid) -> Result<Vec<HostExecution>>;

    /// Overwrite the mutable fields (status, exit code, error, timestamps)
    /// of one execution row
    async fn update_host_execution(&self, execution: &HostExecution) -> Result<()>;

    /// Backend name (for logging)
    fn name(&self) -> &str;
}
