//! TerminalSessionActor - pairs one browser terminal with one SSH shell
//!
//! The WebSocket handler feeds decoded client frames in as messages and
//! drains server frames from the `outbound` channel. Shell output is pumped
//! by a spawned task; when the shell ends the task reports back to the actor
//! so the browser sees `status: disconnected` and may connect again.

use std::sync::Arc;

use async_trait::async_trait;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use shared_types::{ConnectionStatus, SshConnectRequest, TerminalServerMsg, TerminalSize};
use tokio::sync::mpsc;

use crate::sessions::SessionRegistry;
use crate::ssh::{ShellCommand, ShellConnector, ShellEvent, SshCredentials};

const DEFAULT_SIZE: TerminalSize = TerminalSize { rows: 24, cols: 80 };

#[derive(Debug, Default)]
pub struct TerminalSessionActor;

/// Arguments for spawning TerminalSessionActor
#[derive(Clone)]
pub struct TerminalSessionArguments {
    pub session_id: String,
    pub connector: Arc<dyn ShellConnector>,
    pub sessions: Arc<SessionRegistry>,
    pub outbound: mpsc::UnboundedSender<TerminalServerMsg>,
    pub default_port: u16,
}

pub struct TerminalSessionState {
    session_id: String,
    connector: Arc<dyn ShellConnector>,
    sessions: Arc<SessionRegistry>,
    outbound: mpsc::UnboundedSender<TerminalServerMsg>,
    default_port: u16,
    /// Input side of the live shell, if any
    shell: Option<mpsc::Sender<ShellCommand>>,
    /// Bumped per shell so a late close from an old shell is ignored
    generation: u64,
    size: TerminalSize,
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug)]
pub enum TerminalSessionMsg {
    Connect(SshConnectRequest),
    /// Keystrokes from the browser
    Input(String),
    Resize(TerminalSize),
    Disconnect,
    /// Internal: the pump task saw the shell end
    ShellClosed { generation: u64 },
    GetInfo {
        reply: RpcReplyPort<TerminalSessionInfo>,
    },
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TerminalSessionInfo {
    pub session_id: String,
    pub connected: bool,
    pub rows: u16,
    pub cols: u16,
}

// ============================================================================
// Actor Implementation
// ============================================================================

#[async_trait]
impl Actor for TerminalSessionActor {
    type Msg = TerminalSessionMsg;
    type State = TerminalSessionState;
    type Arguments = TerminalSessionArguments;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        Ok(TerminalSessionState {
            session_id: args.session_id,
            connector: args.connector,
            sessions: args.sessions,
            outbound: args.outbound,
            default_port: args.default_port,
            shell: None,
            generation: 0,
            size: DEFAULT_SIZE,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            TerminalSessionMsg::Connect(request) => {
                self.handle_connect(myself, request, state).await;
            }

            TerminalSessionMsg::Input(data) => {
                if let Some(ref shell) = state.shell {
                    if shell.send(ShellCommand::Data(data.into_bytes())).await.is_err() {
                        tracing::debug!(session_id = %state.session_id, "Shell input dropped");
                    }
                }
            }

            TerminalSessionMsg::Resize(size) => {
                // Transient 0x0 layouts in the browser must not reach the PTY.
                let size = TerminalSize {
                    rows: size.rows.max(2),
                    cols: size.cols.max(2),
                };
                state.size = size;
                if let Some(ref shell) = state.shell {
                    let _ = shell.send(ShellCommand::Resize(size)).await;
                }
            }

            TerminalSessionMsg::Disconnect => {
                if let Some(ref shell) = state.shell {
                    let _ = shell.send(ShellCommand::Close).await;
                }
            }

            TerminalSessionMsg::ShellClosed { generation } => {
                if generation == state.generation && state.shell.take().is_some() {
                    let _ = state.sessions.mark_disconnected(&state.session_id).await;
                    send(state, TerminalServerMsg::Status(ConnectionStatus::Disconnected));
                    tracing::info!(session_id = %state.session_id, "Terminal session disconnected");
                }
            }

            TerminalSessionMsg::GetInfo { reply } => {
                let _ = reply.send(TerminalSessionInfo {
                    session_id: state.session_id.clone(),
                    connected: state.shell.is_some(),
                    rows: state.size.rows,
                    cols: state.size.cols,
                });
            }
        }

        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if let Some(shell) = state.shell.take() {
            let _ = shell.try_send(ShellCommand::Close);
        }
        state.sessions.remove(&state.session_id).await;
        tracing::info!(session_id = %state.session_id, "TerminalSessionActor stopped");
        Ok(())
    }
}

impl TerminalSessionActor {
    async fn handle_connect(
        &self,
        myself: ActorRef<TerminalSessionMsg>,
        request: SshConnectRequest,
        state: &mut TerminalSessionState,
    ) {
        if state.shell.is_some() {
            send(
                state,
                TerminalServerMsg::Error("Already connected".to_string()),
            );
            return;
        }

        let creds = match SshCredentials::from_request(request, state.default_port) {
            Ok(creds) => creds,
            Err(e) => {
                send(state, TerminalServerMsg::Error(format!("Connection Error: {e}")));
                return;
            }
        };

        tracing::info!(
            session_id = %state.session_id,
            host = %creds.host,
            port = creds.port,
            "Opening SSH shell"
        );

        let handle = match state.connector.open_shell(&creds, state.size).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(session_id = %state.session_id, error = %e, "SSH connect failed");
                send(state, TerminalServerMsg::Error(format!("Connection Error: {e}")));
                return;
            }
        };

        state.generation += 1;
        state.shell = Some(handle.commands);
        let _ = state
            .sessions
            .mark_connected(&state.session_id, &creds.host, &creds.username)
            .await;
        send(state, TerminalServerMsg::Status(ConnectionStatus::Connected));

        let generation = state.generation;
        let outbound = state.outbound.clone();
        let mut events = handle.events;
        tokio::spawn(async move {
            let mut decoder = Utf8Decoder::default();
            while let Some(event) = events.recv().await {
                match event {
                    ShellEvent::Data(bytes) => {
                        let text = decoder.push(&bytes);
                        if !text.is_empty() && outbound.send(TerminalServerMsg::Data(text)).is_err()
                        {
                            break;
                        }
                    }
                    ShellEvent::Closed => break,
                }
            }
            let _ = myself.cast(TerminalSessionMsg::ShellClosed { generation });
        });
    }
}

fn send(state: &TerminalSessionState, msg: TerminalServerMsg) {
    if state.outbound.send(msg).is_err() {
        tracing::debug!(session_id = %state.session_id, "Terminal socket already closed");
    }
}

/// Turns a byte stream into text without splitting multi-byte characters
/// across frames.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                let text = text.to_string();
                self.pending.clear();
                text
            }
            Err(e) if e.error_len().is_none() => {
                // Incomplete sequence at the end: keep it for the next chunk.
                let valid = e.valid_up_to();
                let text = String::from_utf8_lossy(&self.pending[..valid]).into_owned();
                self.pending.drain(..valid);
                text
            }
            Err(_) => {
                let text = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                text
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
