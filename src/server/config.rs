//! Configuration structures
//!
//! Mirrors the sections of `config/default.toml`.

use serde::Deserialize;
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub execution: ExecutionConfig,
    pub event_bus: EventBusConfig,
    pub terminal: TerminalConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Record storage
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file, created on demand
    pub path: PathBuf,
    /// Keep records in process memory instead of SQLite
    #[serde(default)]
    pub in_memory: bool,
}

/// Remote command dispatch
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Hosts in flight per dispatch
    pub concurrency: usize,
    /// SSH connection setup timeout
    pub connect_timeout_secs: u64,
}

/// Event bus
#[derive(Debug, Clone, Deserialize)]
pub struct EventBusConfig {
    /// Per-subscriber queue depth
    pub subscriber_capacity: usize,
}

/// Interactive terminals
#[derive(Debug, Clone, Deserialize)]
pub struct TerminalConfig {
    pub term_type: String,
    pub default_cols: u32,
    pub default_rows: u32,
}

/// Log output
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

#[cfg(test)]
impl AppConfig {
    /// Embedded defaults with the in-memory store
    pub fn for_tests() -> Self {
        let mut config: Self = ::config::Config::builder()
            .add_source(::config::File::from_str(
                super::loader::DEFAULT_CONFIG,
                ::config::FileFormat::Toml,
            ))
            .build()
            .and_then(|c| c.try_deserialize())
            .unwrap();
        config.database.in_memory = true;
        config
    }
}
