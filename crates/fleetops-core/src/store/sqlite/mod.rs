//! SQLite record store
//!
//! Durable backend for hosts, tasks and host executions.

mod migrations;
mod queries;
mod rows;

#[cfg(test)]
mod tests;

use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use std::path::Path;
use tracing::info;

use crate::error::{Error, Result};

/// SQLite-based record store
#[derive(Clone)]
pub struct SqliteStore {
    pub(super) pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if needed) a store at the given database path
    pub async fn from_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Internal(format!("Failed to create directory: {}", e)))?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(path = %path.display(), "SQLite record store ready");
        Ok(store)
    }
}
