use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::debug;
use uuid::Uuid;

use super::rows::{ExecutionRow, HostRow, TaskRow};
use super::SqliteStore;
use crate::error::{Error, Result};
use crate::model::{Host, HostAuth, HostExecution, Task};
use crate::store::RecordStore;

#[async_trait]
impl RecordStore for SqliteStore {
    async fn create_host(&self, host: &Host) -> Result<()> {
        let (secret, key_path) = match &host.auth {
            HostAuth::Password(password) => (Some(password.expose_secret().to_string()), None),
            HostAuth::PrivateKey {
                key_path,
                passphrase,
            } => (
                passphrase.as_ref().map(|p| p.expose_secret().to_string()),
                Some(key_path.clone()),
            ),
        };
        let tags_json = serde_json::to_string(&host.tags)?;

        sqlx::query(
            r#"
            INSERT INTO hosts (
                id, name, address, port, username,
                auth_kind, secret, key_path, tags_json, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(host.id.to_string())
        .bind(&host.name)
        .bind(&host.address)
        .bind(i64::from(host.port))
        .bind(&host.username)
        .bind(host.auth.kind())
        .bind(secret)
        .bind(key_path)
        .bind(tags_json)
        .bind(host.created_at)
        .execute(&self.pool)
        .await?;

        debug!(host_id = %host.id, "Created host");
        Ok(())
    }

    async fn get_host(&self, id: Uuid) -> Result<Host> {
        let row: HostRow = sqlx::query_as("SELECT * FROM hosts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::HostNotFound(id))?;

        row.try_into()
    }

    async fn list_hosts(&self) -> Result<Vec<Host>> {
        let rows: Vec<HostRow> = sqlx::query_as("SELECT * FROM hosts ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn create_task(&self, task: &Task) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tasks (
                id, name, command, mode, batch_size,
                batch_interval_secs, failure_policy, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(task.id.to_string())
        .bind(&task.name)
        .bind(&task.command)
        .bind(task.mode.as_str())
        .bind(task.batch_size.map(i64::from))
        .bind(
            task.batch_interval_secs
                .map(|s| i64::try_from(s).unwrap_or(i64::MAX)),
        )
        .bind(task.failure_policy.map(|p| p.as_str()))
        .bind(task.created_at)
        .execute(&self.pool)
        .await?;

        debug!(task_id = %task.id, "Created task");
        Ok(())
    }

    async fn get_task(&self, id: Uuid) -> Result<Task> {
        let row: TaskRow = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::TaskNotFound(id))?;

        row.try_into()
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        let rows: Vec<TaskRow> = sqlx::query_as("SELECT * FROM tasks ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn create_host_execution(&self, execution: &HostExecution) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO host_executions (
                id, task_id, host_id, position, status,
                exit_code, error, started_at, finished_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(execution.id.to_string())
        .bind(execution.task_id.to_string())
        .bind(execution.host_id.to_string())
        .bind(i64::from(execution.position))
        .bind(execution.status.as_str())
        .bind(execution.exit_code.map(i64::from))
        .bind(&execution.error)
        .bind(execution.started_at)
        .bind(execution.finished_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_host_execution(&self, id: Uuid) -> Result<HostExecution> {
        let row: ExecutionRow = sqlx::query_as("SELECT * FROM host_executions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::ExecutionNotFound(id))?;

        row.try_into()
    }

    async fn list_host_executions(&self, task_id: Uuid) -> Result<Vec<HostExecution>> {
        let rows: Vec<ExecutionRow> = sqlx::query_as(
            "SELECT * FROM host_executions WHERE task_id = ? ORDER BY position ASC",
        )
        .bind(task_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn update_host_execution(&self, execution: &HostExecution) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE host_executions SET
                status = ?, exit_code = ?, error = ?, started_at = ?, finished_at = ?
            WHERE id = ?
            "#,
        )
        .bind(execution.status.as_str())
        .bind(execution.exit_code.map(i64::from))
        .bind(&execution.error)
        .bind(execution.started_at)
        .bind(execution.finished_at)
        .bind(execution.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::ExecutionNotFound(execution.id));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
