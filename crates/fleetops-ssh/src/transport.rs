//! Transport traits.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::params::{CommandOutput, ConnectionParams, TerminalSize};

/// Opens SSH connections.
///
/// Implementations must not share a connection between two `exec` calls:
/// a failure on one host's connection can never leak into a sibling.
#[async_trait]
pub trait SshConnector: Send + Sync {
    /// Connect, run `command` to completion and disconnect.
    async fn exec(&self, params: &ConnectionParams, command: &str) -> Result<CommandOutput>;

    /// Connect and start an interactive shell on a pseudo-terminal.
    async fn open_pty(
        &self,
        params: &ConnectionParams,
        term_type: &str,
        size: TerminalSize,
    ) -> Result<Arc<dyn PtyProcess>>;
}

/// A live remote shell attached to a pseudo-terminal.
#[async_trait]
pub trait PtyProcess: Send + Sync {
    /// Forward raw bytes to the shell's input.
    async fn write(&self, data: &[u8]) -> Result<()>;

    /// Change the negotiated terminal size.
    async fn resize(&self, size: TerminalSize) -> Result<()>;

    /// Next chunk of terminal output; `None` once the shell has exited.
    async fn read(&self) -> Option<Vec<u8>>;

    /// Stop the shell and drop the connection. Never fails.
    async fn terminate(&self);

    /// Last size requested for this terminal.
    fn size(&self) -> TerminalSize;
}
