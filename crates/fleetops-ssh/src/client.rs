//! `russh`-backed transport
//!
//! Every [`RusshConnector::exec`] call pays for a full connection setup and
//! tears the connection down afterwards. Interactive shells keep their
//! connection for as long as the [`RusshPty`] lives; the SSH channel is owned
//! by a pump task and the handle talks to it through queues.

use async_trait::async_trait;
use russh::client::{self, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use russh_keys::key;
use secrecy::ExposeSecret;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::params::{CommandOutput, ConnectionParams, Credential, TerminalSize};
use crate::transport::{PtyProcess, SshConnector};

/// Default connection setup timeout
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Queue depth between a [`RusshPty`] and its pump task
const PTY_QUEUE_DEPTH: usize = 64;

/// Client-side handler. Host keys are accepted and logged by fingerprint.
struct ClientHandler {
    endpoint: String,
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        debug!(
            endpoint = %self.endpoint,
            fingerprint = %server_public_key.fingerprint(),
            "Accepting server host key"
        );
        Ok(true)
    }
}

/// Production [`SshConnector`] built on `russh`.
#[derive(Clone)]
pub struct RusshConnector {
    config: Arc<client::Config>,
    connect_timeout: Duration,
}

impl RusshConnector {
    /// Create a connector with the given connection setup timeout
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            config: Arc::new(client::Config::default()),
            connect_timeout,
        }
    }

    /// Open and authenticate a connection within the setup timeout.
    async fn connect(&self, params: &ConnectionParams) -> Result<Handle<ClientHandler>> {
        self.within_timeout(self.establish(params)).await
    }

    async fn establish(&self, params: &ConnectionParams) -> Result<Handle<ClientHandler>> {
        let endpoint = params.endpoint();
        let handler = ClientHandler {
            endpoint: endpoint.clone(),
        };

        let mut handle = client::connect(
            self.config.clone(),
            (params.address.as_str(), params.port),
            handler,
        )
        .await
        .map_err(|e| Error::Connect {
            endpoint: endpoint.clone(),
            message: e.to_string(),
        })?;

        let authenticated = match &params.credential {
            Credential::Password(password) => {
                handle
                    .authenticate_password(params.username.as_str(), password.expose_secret())
                    .await?
            }
            Credential::PrivateKey { path, passphrase } => {
                let key_pair = russh_keys::load_secret_key(
                    path,
                    passphrase.as_ref().map(|p| p.expose_secret()),
                )
                .map_err(|e| Error::Key(format!("{}: {}", path.display(), e)))?;
                handle
                    .authenticate_publickey(params.username.as_str(), Arc::new(key_pair))
                    .await?
            }
        };

        if !authenticated {
            return Err(Error::AuthenticationFailed {
                username: params.username.clone(),
            });
        }

        debug!(endpoint = %endpoint, user = %params.username, "SSH connection established");
        Ok(handle)
    }

    async fn within_timeout<T>(
        &self,
        setup: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::time::timeout(self.connect_timeout, setup)
            .await
            .map_err(|_| Error::Timeout(self.connect_timeout))?
    }
}

impl Default for RusshConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
    }
}

#[async_trait]
impl SshConnector for RusshConnector {
    async fn exec(&self, params: &ConnectionParams, command: &str) -> Result<CommandOutput> {
        let handle = self.connect(params).await?;
        let result = run_on_channel(&handle, command).await;
        if let Err(e) = handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
        {
            debug!(endpoint = %params.endpoint(), error = %e, "Disconnect after exec failed");
        }
        result
    }

    async fn open_pty(
        &self,
        params: &ConnectionParams,
        term_type: &str,
        size: TerminalSize,
    ) -> Result<Arc<dyn PtyProcess>> {
        let handle = self.connect(params).await?;
        let channel = self
            .within_timeout(open_shell(&handle, term_type, size))
            .await?;

        info!(endpoint = %params.endpoint(), cols = size.cols, rows = size.rows, "Interactive shell opened");
        Ok(RusshPty::spawn(handle, channel, size))
    }
}

/// Open a session channel with a pseudo-terminal and start a login shell on it.
async fn open_shell(
    handle: &Handle<ClientHandler>,
    term_type: &str,
    size: TerminalSize,
) -> Result<Channel<Msg>> {
    let channel = handle.channel_open_session().await?;
    channel
        .request_pty(true, term_type, size.cols, size.rows, 0, 0, &[])
        .await?;
    channel.request_shell(true).await?;
    Ok(channel)
}

/// Run one command on a fresh session channel and collect its output.
async fn run_on_channel(handle: &Handle<ClientHandler>, command: &str) -> Result<CommandOutput> {
    let mut channel = handle.channel_open_session().await?;
    channel.exec(true, command).await?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_code = None;

    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
            // ext == 1 is SSH_EXTENDED_DATA_STDERR
            ChannelMsg::ExtendedData { ref data, ext } if ext == 1 => {
                stderr.extend_from_slice(data)
            }
            ChannelMsg::ExitStatus { exit_status } => {
                exit_code = Some(i32::try_from(exit_status).unwrap_or(i32::MAX));
            }
            ChannelMsg::ExitSignal { .. } => exit_code = Some(-1),
            _ => {}
        }
    }

    let exit_code = exit_code
        .ok_or_else(|| Error::Channel("remote command ended without an exit status".into()))?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_code,
    })
}

enum PtyControl {
    Input(Vec<u8>),
    Resize(TerminalSize),
    Terminate,
}

/// Interactive shell over `russh`.
///
/// Input, resize and terminate requests go through one queue, so they reach
/// the remote side in the order they were issued.
pub struct RusshPty {
    control: mpsc::Sender<PtyControl>,
    output: AsyncMutex<mpsc::Receiver<Vec<u8>>>,
    size: Mutex<TerminalSize>,
}

impl RusshPty {
    fn spawn(
        handle: Handle<ClientHandler>,
        channel: Channel<Msg>,
        size: TerminalSize,
    ) -> Arc<dyn PtyProcess> {
        let (control_tx, control_rx) = mpsc::channel(PTY_QUEUE_DEPTH);
        let (output_tx, output_rx) = mpsc::channel(PTY_QUEUE_DEPTH);

        tokio::spawn(pump(handle, channel, control_rx, output_tx));

        Arc::new(Self {
            control: control_tx,
            output: AsyncMutex::new(output_rx),
            size: Mutex::new(size),
        })
    }

    async fn send(&self, control: PtyControl) -> Result<()> {
        self.control
            .send(control)
            .await
            .map_err(|_| Error::Channel("shell has already exited".into()))
    }
}

#[async_trait]
impl PtyProcess for RusshPty {
    async fn write(&self, data: &[u8]) -> Result<()> {
        self.send(PtyControl::Input(data.to_vec())).await
    }

    async fn resize(&self, size: TerminalSize) -> Result<()> {
        self.send(PtyControl::Resize(size)).await?;
        *self.size.lock().unwrap_or_else(|e| e.into_inner()) = size;
        Ok(())
    }

    async fn read(&self) -> Option<Vec<u8>> {
        self.output.lock().await.recv().await
    }

    async fn terminate(&self) {
        // The pump may already be gone; nothing left to stop then.
        let _ = self.control.send(PtyControl::Terminate).await;
    }

    fn size(&self) -> TerminalSize {
        *self.size.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Owns the channel: forwards queued control requests to the server and
/// server output to the reader until either side ends.
async fn pump(
    handle: Handle<ClientHandler>,
    mut channel: Channel<Msg>,
    mut control: mpsc::Receiver<PtyControl>,
    output: mpsc::Sender<Vec<u8>>,
) {
    loop {
        tokio::select! {
            request = control.recv() => match request {
                Some(PtyControl::Input(data)) => {
                    if let Err(e) = channel.data(&data[..]).await {
                        warn!(error = %e, "Failed to write to remote shell");
                        break;
                    }
                }
                Some(PtyControl::Resize(size)) => {
                    if let Err(e) = channel.window_change(size.cols, size.rows, 0, 0).await {
                        debug!(error = %e, "Window change rejected");
                    }
                }
                Some(PtyControl::Terminate) | None => {
                    let _ = channel.close().await;
                    break;
                }
            },
            msg = channel.wait() => match msg {
                Some(ChannelMsg::Data { data }) | Some(ChannelMsg::ExtendedData { data, .. }) => {
                    if output.send(data.to_vec()).await.is_err() {
                        break;
                    }
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => break,
                Some(_) => {}
            },
        }
    }

    if let Err(e) = handle
        .disconnect(Disconnect::ByApplication, "", "English")
        .await
    {
        debug!(error = %e, "Disconnect of interactive shell failed");
    }
    debug!("Interactive shell pump finished");
}
