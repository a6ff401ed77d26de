//! SSH transport used by the terminal and SFTP relays
//!
//! The relays only see the traits in this module. `RusshConnector` is the
//! real implementation; tests plug in in-process fakes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client;
use russh::{ChannelMsg, Disconnect};
use russh_sftp::client::SftpSession;
use shared_types::{FsItemKind, RemoteItem, SshConnectRequest, TerminalSize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, watch};

const TERM: &str = "xterm-256color";
const SHELL_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum SshError {
    #[error("{0}")]
    InvalidCredentials(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("All configured authentication methods failed")]
    AuthenticationFailed,

    #[error("{0}")]
    Connect(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("{0}")]
    Sftp(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<russh::Error> for SshError {
    fn from(e: russh::Error) -> Self {
        SshError::Connect(e.to_string())
    }
}

impl From<russh_sftp::client::error::Error> for SshError {
    fn from(e: russh_sftp::client::error::Error) -> Self {
        SshError::Sftp(e.to_string())
    }
}

/// Validated connection parameters
#[derive(Clone)]
pub struct SshCredentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SshCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl SshCredentials {
    pub fn from_request(req: SshConnectRequest, default_port: u16) -> Result<Self, SshError> {
        let host = req.host.trim().to_string();
        if host.is_empty() {
            return Err(SshError::InvalidCredentials("Host is required".to_string()));
        }
        if req.username.trim().is_empty() {
            return Err(SshError::InvalidCredentials(
                "Username is required".to_string(),
            ));
        }
        Ok(Self {
            host,
            port: req.port.unwrap_or(default_port),
            username: req.username,
            password: req.password,
        })
    }
}

/// Input to a remote shell
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Data(Vec<u8>),
    Resize(TerminalSize),
    Close,
}

/// Output of a remote shell
#[derive(Debug, Clone, PartialEq)]
pub enum ShellEvent {
    Data(Vec<u8>),
    Closed,
}

/// Both ends of an interactive shell. Dropping `commands` closes the shell.
pub struct ShellHandle {
    pub commands: mpsc::Sender<ShellCommand>,
    pub events: mpsc::Receiver<ShellEvent>,
}

impl ShellHandle {
    pub fn channel_pair() -> (
        Self,
        mpsc::Receiver<ShellCommand>,
        mpsc::Sender<ShellEvent>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::channel(SHELL_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(SHELL_CHANNEL_CAPACITY);
        (
            Self {
                commands: cmd_tx,
                events: event_rx,
            },
            cmd_rx,
            event_tx,
        )
    }
}

#[async_trait]
pub trait ShellConnector: Send + Sync {
    async fn open_shell(
        &self,
        creds: &SshCredentials,
        size: TerminalSize,
    ) -> Result<ShellHandle, SshError>;
}

#[async_trait]
pub trait SftpConnector: Send + Sync {
    async fn open_sftp(&self, creds: &SshCredentials)
        -> Result<Box<dyn RemoteFileSystem>, SshError>;
}

/// File operations on the remote side of an SFTP session
#[async_trait]
pub trait RemoteFileSystem: Send + Sync {
    async fn list_dir(&self, path: &str) -> Result<Vec<RemoteItem>, SshError>;
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, SshError>;
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), SshError>;
    async fn create_dir(&self, path: &str) -> Result<(), SshError>;
    async fn remove_dir(&self, path: &str) -> Result<(), SshError>;
    async fn remove_file(&self, path: &str) -> Result<(), SshError>;
    async fn rename(&self, from: &str, to: &str) -> Result<(), SshError>;
    async fn close(&self) -> Result<(), SshError>;

    /// Flips to `true` (or drops its sender) when the transport goes away.
    fn closed(&self) -> Option<watch::Receiver<bool>> {
        None
    }
}

/// Join remote path segments with `/` regardless of the host platform.
pub fn posix_join(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if dir.is_empty() {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Last segment of a remote path
pub fn posix_basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Parent of a remote path, `/` for top-level entries
pub fn posix_parent(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => trimmed[..idx].to_string(),
    }
}

// ============================================================================
// russh implementation
// ============================================================================

/// Accepts any host key. The handler lives as long as the connection, so
/// dropping `closed` tells watchers the transport is gone.
struct AcceptingClient {
    closed: watch::Sender<bool>,
}

#[async_trait]
impl client::Handler for AcceptingClient {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }

    async fn channel_close(
        &mut self,
        _channel: russh::ChannelId,
        _session: &mut client::Session,
    ) -> Result<(), Self::Error> {
        self.closed.send_replace(true);
        Ok(())
    }
}

/// Password-authenticated SSH over russh
#[derive(Debug, Clone)]
pub struct RusshConnector {
    connect_timeout: Duration,
}

impl RusshConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    async fn connect(
        &self,
        creds: &SshCredentials,
    ) -> Result<(client::Handle<AcceptingClient>, watch::Receiver<bool>), SshError> {
        let config = Arc::new(client::Config::default());
        let (closed_tx, closed_rx) = watch::channel(false);
        let addr = (creds.host.clone(), creds.port);
        let username = creds.username.clone();
        let password = creds.password.clone();

        let connect = async move {
            let handler = AcceptingClient { closed: closed_tx };
            let mut session = client::connect(config, addr, handler).await?;
            if !session.authenticate_password(username, password).await? {
                return Err(SshError::AuthenticationFailed);
            }
            Ok((session, closed_rx))
        };

        tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| SshError::Timeout(self.connect_timeout))?
    }
}

#[async_trait]
impl ShellConnector for RusshConnector {
    async fn open_shell(
        &self,
        creds: &SshCredentials,
        size: TerminalSize,
    ) -> Result<ShellHandle, SshError> {
        let (session, _closed) = self.connect(creds).await?;
        let mut channel = session.channel_open_session().await?;
        channel
            .request_pty(
                false,
                TERM,
                u32::from(size.cols),
                u32::from(size.rows),
                0,
                0,
                &[],
            )
            .await?;
        channel.request_shell(true).await?;

        tracing::info!(host = %creds.host, port = creds.port, "SSH shell opened");

        let (handle, mut cmd_rx, event_tx) = ShellHandle::channel_pair();
        let host = creds.host.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    cmd = cmd_rx.recv() => match cmd {
                        Some(ShellCommand::Data(bytes)) => {
                            if let Err(e) = channel.data(&bytes[..]).await {
                                tracing::warn!(host = %host, error = %e, "SSH write failed");
                                break;
                            }
                        }
                        Some(ShellCommand::Resize(size)) => {
                            if let Err(e) = channel
                                .window_change(u32::from(size.cols), u32::from(size.rows), 0, 0)
                                .await
                            {
                                tracing::warn!(host = %host, error = %e, "SSH resize failed");
                            }
                        }
                        Some(ShellCommand::Close) | None => break,
                    },
                    msg = channel.wait() => match msg {
                        Some(ChannelMsg::Data { data }) => {
                            if event_tx.send(ShellEvent::Data(data.to_vec())).await.is_err() {
                                break;
                            }
                        }
                        Some(ChannelMsg::ExtendedData { data, .. }) => {
                            if event_tx.send(ShellEvent::Data(data.to_vec())).await.is_err() {
                                break;
                            }
                        }
                        Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => break,
                        Some(_) => {}
                    },
                }
            }

            let _ = channel.eof().await;
            if let Err(e) = session
                .disconnect(Disconnect::ByApplication, "", "en")
                .await
            {
                tracing::debug!(host = %host, error = %e, "SSH disconnect failed");
            }
            tracing::info!(host = %host, "SSH shell closed");
            let _ = event_tx.send(ShellEvent::Closed).await;
        });

        Ok(handle)
    }
}

#[async_trait]
impl SftpConnector for RusshConnector {
    async fn open_sftp(
        &self,
        creds: &SshCredentials,
    ) -> Result<Box<dyn RemoteFileSystem>, SshError> {
        let (session, closed) = self.connect(creds).await?;
        let channel = session.channel_open_session().await?;
        channel.request_subsystem(true, "sftp").await?;
        let sftp = SftpSession::new(channel.into_stream()).await?;

        tracing::info!(host = %creds.host, port = creds.port, "SFTP session opened");
        Ok(Box::new(RusshRemoteFs {
            session,
            sftp,
            closed,
        }))
    }
}

struct RusshRemoteFs {
    session: client::Handle<AcceptingClient>,
    sftp: SftpSession,
    closed: watch::Receiver<bool>,
}

#[async_trait]
impl RemoteFileSystem for RusshRemoteFs {
    async fn list_dir(&self, path: &str) -> Result<Vec<RemoteItem>, SshError> {
        let entries = self.sftp.read_dir(path).await?;
        let mut items = Vec::new();
        for entry in entries {
            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }
            let metadata = entry.metadata();
            items.push(RemoteItem {
                path: posix_join(path, &name),
                kind: if entry.file_type().is_dir() {
                    FsItemKind::Folder
                } else {
                    FsItemKind::File
                },
                size: metadata.size.unwrap_or(0),
                modified: metadata.mtime.map(u64::from).unwrap_or(0),
                name,
            });
        }
        Ok(items)
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, SshError> {
        let mut file = self.sftp.open(path).await?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), SshError> {
        let mut file = self.sftp.create(path).await?;
        file.write_all(data).await?;
        file.shutdown().await?;
        Ok(())
    }

    async fn create_dir(&self, path: &str) -> Result<(), SshError> {
        Ok(self.sftp.create_dir(path).await?)
    }

    async fn remove_dir(&self, path: &str) -> Result<(), SshError> {
        Ok(self.sftp.remove_dir(path).await?)
    }

    async fn remove_file(&self, path: &str) -> Result<(), SshError> {
        Ok(self.sftp.remove_file(path).await?)
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), SshError> {
        Ok(self.sftp.rename(from, to).await?)
    }

    async fn close(&self) -> Result<(), SshError> {
        let _ = self.sftp.close().await;
        self.session
            .disconnect(Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }

    fn closed(&self) -> Option<watch::Receiver<bool>> {
        Some(self.closed.clone())
    }
}
