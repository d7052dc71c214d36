//! Startup configuration validation

use super::config::AppConfig;
use super::loader::environment_name;
use anyhow::{bail, Result};
use tracing::warn;

/// Reject settings the server cannot run with and warn about risky ones
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.execution.concurrency == 0 {
        bail!("execution.concurrency must be at least 1");
    }
    if config.event_bus.subscriber_capacity == 0 {
        bail!("event_bus.subscriber_capacity must be at least 1");
    }
    if config.terminal.default_cols == 0 || config.terminal.default_rows == 0 {
        bail!(
            "terminal size must be at least 1x1, got {}x{}",
            config.terminal.default_cols,
            config.terminal.default_rows
        );
    }

    validate_production_config(config);
    Ok(())
}

fn validate_production_config(config: &AppConfig) {
    if environment_name().to_lowercase() != "production" {
        return;
    }

    if config.server.host == "0.0.0.0" {
        warn!(
            "SECURITY WARNING: Server is binding to all interfaces (0.0.0.0) in production. \
             Consider binding to 127.0.0.1 and using a reverse proxy."
        );
    }

    if config.database.in_memory {
        warn!("Records are kept in memory only; task history is lost on restart");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&AppConfig::for_tests()).is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = AppConfig::for_tests();
        config.execution.concurrency = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let mut config = AppConfig::for_tests();
        config.event_bus.subscriber_capacity = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_terminal_size_rejected() {
        let mut config = AppConfig::for_tests();
        config.terminal.default_rows = 0;
        assert!(validate_config(&config).is_err());
    }
}
