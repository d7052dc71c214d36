use chrono::{DateTime, Utc};
use secrecy::SecretString;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{Host, HostAuth, HostExecution, Task};

fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::Internal(format!("Invalid {} ID: {}", what, e)))
}

fn narrow<T: TryFrom<i64>>(value: i64, column: &str) -> Result<T> {
    T::try_from(value).map_err(|_| Error::Internal(format!("{} out of range: {}", column, value)))
}

/// Internal row type for `hosts`
#[derive(FromRow)]
pub(super) struct HostRow {
    pub id: String,
    pub name: String,
    pub address: String,
    pub port: i64,
    pub username: String,
    pub auth_kind: String,
    pub secret: Option<String>,
    pub key_path: Option<String>,
    pub tags_json: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<HostRow> for Host {
    type Error = Error;

    fn try_from(row: HostRow) -> Result<Self> {
        let auth = match row.auth_kind.as_str() {
            "password" => HostAuth::Password(SecretString::from(row.secret.unwrap_or_default())),
            "private_key" => HostAuth::PrivateKey {
                key_path: row.key_path.ok_or_else(|| {
                    Error::Internal(format!("host {} has no key path", row.id))
                })?,
                passphrase: row.secret.map(SecretString::from),
            },
            other => return Err(Error::Internal(format!("unknown auth kind: {}", other))),
        };

        Ok(Host {
            id: parse_id(&row.id, "host")?,
            name: row.name,
            address: row.address,
            port: narrow(row.port, "port")?,
            username: row.username,
            auth,
            tags: serde_json::from_str(&row.tags_json)?,
            created_at: row.created_at,
        })
    }
}

/// Internal row type for `tasks`
#[derive(FromRow)]
pub(super) struct TaskRow {
    pub id: String,
    pub name: String,
    pub command: String,
    pub mode: String,
    pub batch_size: Option<i64>,
    pub batch_interval_secs: Option<i64>,
    pub failure_policy: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = Error;

    fn try_from(row: TaskRow) -> Result<Self> {
        Ok(Task {
            id: parse_id(&row.id, "task")?,
            name: row.name,
            command: row.command,
            mode: row.mode.parse()?,
            batch_size: row
                .batch_size
                .map(|v| narrow(v, "batch_size"))
                .transpose()?,
            batch_interval_secs: row
                .batch_interval_secs
                .map(|v| narrow(v, "batch_interval_secs"))
                .transpose()?,
            failure_policy: row.failure_policy.map(|p| p.parse()).transpose()?,
            created_at: row.created_at,
        })
    }
}

/// Internal row type for `host_executions`
#[derive(FromRow)]
pub(super) struct ExecutionRow {
    pub id: String,
    pub task_id: String,
    pub host_id: String,
    pub position: i64,
    pub status: String,
    pub exit_code: Option<i64>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<ExecutionRow> for HostExecution {
    type Error = Error;

    fn try_from(row: ExecutionRow) -> Result<Self> {
        Ok(HostExecution {
            id: parse_id(&row.id, "execution")?,
            task_id: parse_id(&row.task_id, "task")?,
            host_id: parse_id(&row.host_id, "host")?,
            position: narrow(row.position, "position")?,
            status: row.status.parse()?,
            exit_code: row.exit_code.map(|c| narrow(c, "exit_code")).transpose()?,
            error: row.error,
            started_at: row.started_at,
            finished_at: row.finished_at,
        })
    }
}
