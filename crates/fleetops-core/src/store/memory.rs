use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::RecordStore;
use crate::error::{Error, Result};
use crate::model::{Host, HostExecution, Task};

/// In-process store. Contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    hosts: RwLock<HashMap<Uuid, Host>>,
    tasks: RwLock<HashMap<Uuid, Task>>,
    executions: RwLock<HashMap<Uuid, HostExecution>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create_host(&self, host: &Host) -> Result<()> {
        self.hosts.write().await.insert(host.id, host.clone());
        Ok(())
    }

    async fn get_host(&self, id: Uuid) -> Result<Host> {
        self.hosts
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(Error::HostNotFound(id))
    }

    async fn list_hosts(&self) -> Result<Vec<Host>> {
        let mut hosts: Vec<Host> = self.hosts.read().await.values().cloned().collect();
        hosts.sort_by_key(|h| h.created_at);
        Ok(hosts)
    }

    async fn create_task(&self, task: &Task) -> Result<()> {
        self.tasks.write().await.insert(task.id, task.clone());
        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> Result<Task> {
        self.tasks
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(Error::TaskNotFound(id))
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self.tasks.read().await.values().cloned().collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn create_host_execution(&self, execution: &HostExecution) -> Result<()> {
        self.executions
            .write()
            .await
            .insert(execution.id, execution.clone());
        Ok(())
    }

    async fn get_host_execution(&self, id: Uuid) -> Result<HostExecution> {
        self.executions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(Error::ExecutionNotFound(id))
    }

    async fn list_host_executions(&self, task_id: Uuid) -> Result<Vec<HostExecution>> {
        let mut rows: Vec<HostExecution> = self
            .executions
            .read()
            .await
            .values()
            .filter(|e| e.task_id == task_id)
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.position);
        Ok(rows)
    }

    async fn update_host_execution(&self, execution: &HostExecution) -> Result<()> {
        let mut rows = self.executions.write().await;
        let row = rows
            .get_mut(&execution.id)
            .ok_or(Error::ExecutionNotFound(execution.id))?;
        row.status = execution.status;
        row.exit_code = execution.exit_code;
        row.error = execution.error.clone();
        row.started_at = execution.started_at;
        row.finished_at = execution.finished_at;
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HostAuth, HostStatus};

    #[tokio::test]
    async fn test_host_round_trip() {
        let store = MemoryStore::new();
        let host = Host::new("web-1", "10.0.0.1", "ops", HostAuth::password("pw"));
        store.create_host(&host).await.unwrap();

        let fetched = store.get_host(host.id).await.unwrap();
        assert_eq!(fetched.name, "web-1");
        assert!(store.get_host(Uuid::new_v4()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_executions_listed_in_target_order() {
        let store = MemoryStore::new();
        let task = Task::new("t", "true");
        store.create_task(&task).await.unwrap();

        for position in [2, 0, 1] {
            let row = HostExecution::pending(task.id, Uuid::new_v4(), position);
            store.create_host_execution(&row).await.unwrap();
        }
        // a row of another task is not listed
        store
            .create_host_execution(&HostExecution::pending(Uuid::new_v4(), Uuid::new_v4(), 0))
            .await
            .unwrap();

        let rows = store.list_host_executions(task.id).await.unwrap();
        let positions: Vec<u32> = rows.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_update_touches_one_row() {
        let store = MemoryStore::new();
        let task_id = Uuid::new_v4();
        let mut first = HostExecution::pending(task_id, Uuid::new_v4(), 0);
        let second = HostExecution::pending(task_id, Uuid::new_v4(), 1);
        store.create_host_execution(&first).await.unwrap();
        store.create_host_execution(&second).await.unwrap();

        first.start().unwrap();
        first.complete(0).unwrap();
        store.update_host_execution(&first).await.unwrap();

        assert_eq!(
            store.get_host_execution(first.id).await.unwrap().status,
            HostStatus::Success
        );
        assert_eq!(
            store.get_host_execution(second.id).await.unwrap().status,
            HostStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_update_unknown_row() {
        let store = MemoryStore::new();
        let row = HostExecution::pending(Uuid::new_v4(), Uuid::new_v4(), 0);
        let err = store.update_host_execution(&row).await.unwrap_err();
        assert!(matches!(err, Error::ExecutionNotFound(id) if id == row.id));
    }
}
