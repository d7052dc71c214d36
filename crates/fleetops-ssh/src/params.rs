//! Connection parameters and value types shared by every transport.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How to authenticate against a host.
///
/// Secrets stay wrapped in [`SecretString`] so they never show up in `Debug`
/// output or logs.
#[derive(Debug, Clone)]
pub enum Credential {
    /// Password authentication
    Password(SecretString),
    /// Public key authentication with a key file on the server running fleetops
    PrivateKey {
        /// Path to the private key
        path: PathBuf,
        /// Passphrase for an encrypted key
        passphrase: Option<SecretString>,
    },
}

/// Everything needed to open an SSH connection to one host.
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    /// Hostname or IP address
    pub address: String,
    /// SSH port
    pub port: u16,
    /// Login name
    pub username: String,
    /// Authentication method
    pub credential: Credential,
}

impl ConnectionParams {
    /// Create connection parameters
    pub fn new(
        address: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        credential: Credential,
    ) -> Self {
        Self {
            address: address.into(),
            port,
            username: username.into(),
            credential,
        }
    }

    /// `address:port`, used in logs and error messages
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Negotiated size of a pseudo-terminal, in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    /// Columns
    pub cols: u32,
    /// Rows
    pub rows: u32,
}

impl TerminalSize {
    /// Create a terminal size
    #[must_use]
    pub const fn new(cols: u32, rows: u32) -> Self {
        Self { cols, rows }
    }
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

/// Captured result of a command that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output, lossily decoded as UTF-8
    pub stdout: String,
    /// Standard error, lossily decoded as UTF-8
    pub stderr: String,
    /// Remote exit status (`-1` when the process was killed by a signal)
    pub exit_code: i32,
}

impl CommandOutput {
    /// Whether the command exited with status zero
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}
