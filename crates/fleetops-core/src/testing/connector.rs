use async_trait::async_trait;
use fleetops_ssh::{
    CommandOutput, ConnectionParams, Error as SshError, PtyProcess, Result as SshResult,
    SshConnector, TerminalSize,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::lock;
use super::pty::FakePty;

/// Scripted result of a command on one address.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Command ran and exited
    Exit {
        /// Captured stdout
        stdout: String,
        /// Captured stderr
        stderr: String,
        /// Exit code
        code: i32,
    },
    /// Connection could not be established
    Unreachable(String),
}

impl Outcome {
    /// Exit 0 with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self::Exit {
            stdout: stdout.into(),
            stderr: String::new(),
            code: 0,
        }
    }

    /// Non-zero exit with the given stderr
    pub fn exit(code: i32, stderr: impl Into<String>) -> Self {
        Self::Exit {
            stdout: String::new(),
            stderr: stderr.into(),
            code,
        }
    }
}

/// Timeline entry of a fake `exec`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// Command started on the address
    Started(String),
    /// Command finished on the address
    Finished(String),
}

/// Scripted [`SshConnector`].
///
/// Addresses without a script exit 0 with `ok\n`.
pub struct FakeConnector {
    outcomes: Mutex<HashMap<String, Outcome>>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: Mutex<Vec<Call>>,
    ptys: Mutex<Vec<Arc<FakePty>>>,
}

impl FakeConnector {
    /// Connector where every command succeeds immediately
    #[must_use]
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(HashMap::new()),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            ptys: Mutex::new(Vec::new()),
        }
    }

    /// Make every command and shell open take `delay`
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Script the outcome for one address
    pub fn script(&self, address: impl Into<String>, outcome: Outcome) {
        lock(&self.outcomes).insert(address.into(), outcome);
    }

    /// Highest number of commands that were in flight at once
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Start/finish timeline of every `exec`
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    /// Addresses `exec` was called for, in start order
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .filter_map(|c| match c {
                Call::Started(address) => Some(address.clone()),
                Call::Finished(_) => None,
            })
            .collect()
    }

    /// Every shell opened so far
    #[must_use]
    pub fn ptys(&self) -> Vec<Arc<FakePty>> {
        lock(&self.ptys).clone()
    }

    fn outcome_for(&self, address: &str) -> Outcome {
        lock(&self.outcomes)
            .get(address)
            .cloned()
            .unwrap_or_else(|| Outcome::ok("ok\n"))
    }

    fn unreachable(address: &str, message: String) -> SshError {
        SshError::Connect {
            endpoint: address.to_string(),
            message,
        }
    }
}

impl Default for FakeConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SshConnector for FakeConnector {
    async fn exec(&self, params: &ConnectionParams, _command: &str) -> SshResult<CommandOutput> {
        let address = params.address.clone();
        lock(&self.calls).push(Call::Started(address.clone()));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        lock(&self.calls).push(Call::Finished(address.clone()));

        match self.outcome_for(&address) {
            Outcome::Exit {
                stdout,
                stderr,
                code,
            } => Ok(CommandOutput {
                stdout,
                stderr,
                exit_code: code,
            }),
            Outcome::Unreachable(message) => Err(Self::unreachable(&address, message)),
        }
    }

    async fn open_pty(
        &self,
        params: &ConnectionParams,
        _term_type: &str,
        size: TerminalSize,
    ) -> SshResult<Arc<dyn PtyProcess>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Outcome::Unreachable(message) = self.outcome_for(&params.address) {
            return Err(Self::unreachable(&params.address, message));
        }

        let pty = FakePty::new(size);
        lock(&self.ptys).push(pty.clone());
        Ok(pty as Arc<dyn PtyProcess>)
    }
}
