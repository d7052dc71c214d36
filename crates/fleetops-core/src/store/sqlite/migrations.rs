use super::SqliteStore;
use crate::error::Result;

impl SqliteStore {
    /// Run database migrations
    pub(super) async fn migrate(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS hosts (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                address TEXT NOT NULL,
                port INTEGER NOT NULL DEFAULT 22,
                username TEXT NOT NULL,
                auth_kind TEXT NOT NULL,
                secret TEXT,
                key_path TEXT,
                tags_json TEXT NOT NULL DEFAULT '[]',
                created_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                command TEXT NOT NULL,
                mode TEXT NOT NULL,
                batch_size INTEGER,
                batch_interval_secs INTEGER,
                failure_policy TEXT,
                created_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS host_executions (
                id TEXT PRIMARY KEY,
                task_id TEXT NOT NULL,
                host_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                status TEXT NOT NULL,
                exit_code INTEGER,
                error TEXT,
                started_at TIMESTAMP,
                finished_at TIMESTAMP,
                FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_host_executions_task ON host_executions(task_id, position)",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_created ON tasks(created_at)")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }
}
