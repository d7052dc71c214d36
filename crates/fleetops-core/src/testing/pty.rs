use async_trait::async_trait;
use fleetops_ssh::{Error as SshError, PtyProcess, Result as SshResult, TerminalSize};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use super::lock;

/// Something a client did to a [`FakePty`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PtyOp {
    /// Bytes written to the shell's input
    Write(Vec<u8>),
    /// Terminal resized
    Resize(TerminalSize),
    /// Shell terminated
    Terminate,
}

/// In-memory shell: records input, replays scripted output.
pub struct FakePty {
    ops: Mutex<Vec<PtyOp>>,
    size: Mutex<TerminalSize>,
    output_tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    output_rx: AsyncMutex<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl FakePty {
    /// New shell with the given size
    #[must_use]
    pub fn new(size: TerminalSize) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            ops: Mutex::new(Vec::new()),
            size: Mutex::new(size),
            output_tx: Mutex::new(Some(tx)),
            output_rx: AsyncMutex::new(rx),
        })
    }

    /// Queue output for the reader
    pub fn emit(&self, bytes: &[u8]) {
        if let Some(tx) = lock(&self.output_tx).as_ref() {
            let _ = tx.send(bytes.to_vec());
        }
    }

    /// End the output stream, as if the remote shell exited
    pub fn finish(&self) {
        lock(&self.output_tx).take();
    }

    /// Everything done to this shell, in order
    #[must_use]
    pub fn ops(&self) -> Vec<PtyOp> {
        lock(&self.ops).clone()
    }

    /// Concatenation of all input written
    #[must_use]
    pub fn written(&self) -> Vec<u8> {
        lock(&self.ops)
            .iter()
            .filter_map(|op| match op {
                PtyOp::Write(bytes) => Some(bytes.as_slice()),
                _ => None,
            })
            .flatten()
            .copied()
            .collect()
    }

    /// Number of terminate calls
    #[must_use]
    pub fn terminations(&self) -> usize {
        lock(&self.ops)
            .iter()
            .filter(|op| **op == PtyOp::Terminate)
            .count()
    }
}

#[async_trait]
impl PtyProcess for FakePty {
    async fn write(&self, data: &[u8]) -> SshResult<()> {
        if lock(&self.output_tx).is_none() {
            return Err(SshError::Channel("shell has already exited".into()));
        }
        lock(&self.ops).push(PtyOp::Write(data.to_vec()));
        Ok(())
    }

    async fn resize(&self, size: TerminalSize) -> SshResult<()> {
        lock(&self.ops).push(PtyOp::Resize(size));
        *lock(&self.size) = size;
        Ok(())
    }

    async fn read(&self) -> Option<Vec<u8>> {
        self.output_rx.lock().await.recv().await
    }

    async fn terminate(&self) {
        lock(&self.ops).push(PtyOp::Terminate);
        self.finish();
    }

    fn size(&self) -> TerminalSize {
        *lock(&self.size)
    }
}
