//! Error types for fleetops-ssh

use std::time::Duration;
use thiserror::Error;

/// SSH transport error
#[derive(Debug, Error)]
pub enum Error {
    /// TCP connection or handshake could not be established
    #[error("connection to {endpoint} failed: {message}")]
    Connect {
        /// `address:port` that was dialled
        endpoint: String,
        /// Underlying failure
        message: String,
    },

    /// Connection setup did not finish in time
    #[error("connection timed out after {0:?}")]
    Timeout(Duration),

    /// Server rejected the supplied credentials
    #[error("authentication failed for user '{username}'")]
    AuthenticationFailed {
        /// Login name that was rejected
        username: String,
    },

    /// Private key could not be loaded
    #[error("private key error: {0}")]
    Key(String),

    /// Channel closed or misbehaved
    #[error("channel error: {0}")]
    Channel(String),

    /// Protocol-level error from the SSH client
    #[error("ssh protocol error: {0}")]
    Protocol(#[from] russh::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
