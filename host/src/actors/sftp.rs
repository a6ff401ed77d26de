//! SftpSessionActor - runs file operations for one browser SFTP client
//!
//! Requests are processed one at a time in arrival order. Every failure of an
//! individual operation is reported as `operation_error` and the session stays
//! usable. When the SSH transport itself goes away the browser is told
//! `status: disconnected` and may connect again.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use shared_types::{
    ConnectionStatus, OperationSuccess, RemoteItem, SftpClientMsg, SftpServerMsg,
    SshConnectRequest,
};
use tokio::sync::{mpsc, watch};

use crate::sessions::SessionRegistry;
use crate::ssh::{
    posix_basename, posix_join, posix_parent, RemoteFileSystem, SftpConnector, SshCredentials,
    SshError,
};
use crate::vfs::unique_name;

#[derive(Debug, Default)]
pub struct SftpSessionActor;

#[derive(Clone)]
pub struct SftpSessionArguments {
    pub session_id: String,
    pub connector: Arc<dyn SftpConnector>,
    pub sessions: Arc<SessionRegistry>,
    pub outbound: mpsc::UnboundedSender<SftpServerMsg>,
    pub default_port: u16,
}

pub struct SftpSessionState {
    session_id: String,
    connector: Arc<dyn SftpConnector>,
    sessions: Arc<SessionRegistry>,
    outbound: mpsc::UnboundedSender<SftpServerMsg>,
    default_port: u16,
    remote: Option<Box<dyn RemoteFileSystem>>,
    /// Bumped per connection so a late close from an old transport is ignored
    generation: u64,
}

#[derive(Debug)]
pub enum SftpSessionMsg {
    /// A decoded frame from the browser
    Request(SftpClientMsg),
    /// Internal: the watcher saw the transport close
    RemoteClosed { generation: u64 },
    IsConnected { reply: RpcReplyPort<bool> },
}

#[async_trait]
impl Actor for SftpSessionActor {
    type Msg = SftpSessionMsg;
    type State = SftpSessionState;
    type Arguments = SftpSessionArguments;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        Ok(SftpSessionState {
            session_id: args.session_id,
            connector: args.connector,
            sessions: args.sessions,
            outbound: args.outbound,
            default_port: args.default_port,
            remote: None,
            generation: 0,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SftpSessionMsg::Request(SftpClientMsg::Connect(request)) => {
                self.handle_connect(myself, request, state).await;
            }
            SftpSessionMsg::RemoteClosed { generation } => {
                if generation == state.generation && state.remote.take().is_some() {
                    let _ = state.sessions.mark_disconnected(&state.session_id).await;
                    send(state, SftpServerMsg::Status(ConnectionStatus::Disconnected));
                    tracing::info!(session_id = %state.session_id, "SFTP transport closed");
                }
            }
            SftpSessionMsg::Request(SftpClientMsg::Disconnect) => {
                if let Some(remote) = state.remote.take() {
                    if let Err(e) = remote.close().await {
                        tracing::debug!(session_id = %state.session_id, error = %e, "SFTP close failed");
                    }
                    let _ = state.sessions.mark_disconnected(&state.session_id).await;
                    send(state, SftpServerMsg::Status(ConnectionStatus::Disconnected));
                }
            }
            SftpSessionMsg::Request(request) => {
                let reply = match state.remote.as_deref() {
                    Some(remote) => run_operation(remote, request).await,
                    None => SftpServerMsg::Error("Not connected".to_string()),
                };
                send(state, reply);
            }
            SftpSessionMsg::IsConnected { reply } => {
                let _ = reply.send(state.remote.is_some());
            }
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        _myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if let Some(remote) = state.remote.take() {
            let _ = remote.close().await;
        }
        state.sessions.remove(&state.session_id).await;
        tracing::info!(session_id = %state.session_id, "SftpSessionActor stopped");
        Ok(())
    }
}

impl SftpSessionActor {
    async fn handle_connect(
        &self,
        myself: ActorRef<SftpSessionMsg>,
        request: SshConnectRequest,
        state: &mut SftpSessionState,
    ) {
        if state.remote.is_some() {
            send(state, SftpServerMsg::Error("Already connected".to_string()));
            return;
        }

        let creds = match SshCredentials::from_request(request, state.default_port) {
            Ok(creds) => creds,
            Err(e) => {
                send(state, SftpServerMsg::Error(format!("Connection Error: {e}")));
                return;
            }
        };

        match state.connector.open_sftp(&creds).await {
            Ok(remote) => {
                state.generation += 1;
                if let Some(closed) = remote.closed() {
                    watch_transport(myself, closed, state.generation);
                }
                state.remote = Some(remote);
                let _ = state
                    .sessions
                    .mark_connected(&state.session_id, &creds.host, &creds.username)
                    .await;
                send(state, SftpServerMsg::Status(ConnectionStatus::Connected));
                tracing::info!(session_id = %state.session_id, host = %creds.host, "SFTP connected");
            }
            Err(e @ SshError::Sftp(_)) => {
                send(state, SftpServerMsg::Error(format!("SFTP Error: {e}")));
            }
            Err(e) => {
                tracing::warn!(session_id = %state.session_id, error = %e, "SFTP connect failed");
                send(state, SftpServerMsg::Error(format!("Connection Error: {e}")));
            }
        }
    }
}

/// Report back once the transport signals close or its sender is dropped.
fn watch_transport(
    myself: ActorRef<SftpSessionMsg>,
    mut closed: watch::Receiver<bool>,
    generation: u64,
) {
    tokio::spawn(async move {
        loop {
            let is_closed = *closed.borrow_and_update();
            if is_closed || closed.changed().await.is_err() {
                break;
            }
        }
        let _ = myself.cast(SftpSessionMsg::RemoteClosed { generation });
    });
}

fn send(state: &SftpSessionState, msg: SftpServerMsg) {
    if state.outbound.send(msg).is_err() {
        tracing::debug!(session_id = %state.session_id, "SFTP socket already closed");
    }
}

fn success(message: String, dir_to_refresh: Option<String>) -> SftpServerMsg {
    SftpServerMsg::OperationSuccess(OperationSuccess {
        is_local: dir_to_refresh.as_ref().map(|_| false),
        message,
        dir_to_refresh,
    })
}

fn failure(operation: &str, target: &str, e: SshError) -> SftpServerMsg {
    tracing::warn!(operation, target, error = %e, "SFTP operation failed");
    let name = match posix_basename(target) {
        "" => target,
        name => name,
    };
    SftpServerMsg::OperationError(format!("Failed to {operation} {name}: {e}"))
}

/// Split `name.ext` for numbering; folders and dotfiles keep the whole name.
fn split_extension(base_name: &str, is_folder: bool) -> (&str, &str) {
    if is_folder {
        return (base_name, "");
    }
    match base_name.rfind('.') {
        Some(0) | None => (base_name, ""),
        Some(idx) => base_name.split_at(idx),
    }
}

fn sort_listing(items: &mut [RemoteItem]) {
    items.sort_by(|a, b| {
        b.kind
            .is_folder()
            .cmp(&a.kind.is_folder())
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

async fn run_operation(remote: &dyn RemoteFileSystem, request: SftpClientMsg) -> SftpServerMsg {
    match request {
        SftpClientMsg::List { path } => match remote.list_dir(&path).await {
            Ok(mut items) => {
                sort_listing(&mut items);
                SftpServerMsg::List { path, items }
            }
            Err(e) => failure("list", &path, e),
        },

        SftpClientMsg::GetContent { path } => match remote.read_file(&path).await {
            Ok(bytes) => SftpServerMsg::FileContent {
                content: String::from_utf8_lossy(&bytes).into_owned(),
                path,
            },
            Err(e) => failure("get content for", &path, e),
        },

        SftpClientMsg::FindUniqueName {
            parent_dir,
            base_name,
            is_folder,
        } => match remote.list_dir(&parent_dir).await {
            Ok(items) => {
                let existing: HashSet<String> = items.into_iter().map(|i| i.name).collect();
                let name = if existing.contains(&base_name) {
                    let (stem, ext) = split_extension(&base_name, is_folder);
                    unique_name(stem, ext, |candidate| existing.contains(candidate))
                } else {
                    base_name
                };
                SftpServerMsg::UniqueNameFound {
                    name,
                    parent_dir,
                    is_folder,
                }
            }
            Err(e) => failure("find unique name in", &parent_dir, e),
        },

        SftpClientMsg::CreateFolder { parent_dir, name } => {
            let path = posix_join(&parent_dir, &name);
            match remote.create_dir(&path).await {
                Ok(()) => success(format!("Created folder {name}"), Some(parent_dir)),
                Err(e) => failure("create folder", &path, e),
            }
        }

        SftpClientMsg::CreateFile { parent_dir, name } => {
            let path = posix_join(&parent_dir, &name);
            match remote.write_file(&path, &[]).await {
                Ok(()) => success(format!("Created file {name}"), Some(parent_dir)),
                Err(e) => failure("create file", &path, e),
            }
        }

        SftpClientMsg::Delete { item } => {
            let result = if item.kind.is_folder() {
                remote.remove_dir(&item.path).await
            } else {
                remote.remove_file(&item.path).await
            };
            match result {
                Ok(()) => success(
                    format!("Deleted {}", item.name),
                    Some(posix_parent(&item.path)),
                ),
                Err(e) => failure("delete", &item.path, e),
            }
        }

        SftpClientMsg::Rename { item, new_name } => {
            let parent = posix_parent(&item.path);
            let new_path = posix_join(&parent, &new_name);
            match remote.rename(&item.path, &new_path).await {
                Ok(()) => success(
                    format!("Renamed {} to {new_name}", item.name),
                    Some(parent),
                ),
                Err(e) => failure("rename", &item.path, e),
            }
        }

        SftpClientMsg::SaveContent { path, content } => {
            match remote.write_file(&path, content.as_bytes()).await {
                Ok(()) => success(
                    format!("Saved {} successfully.", posix_basename(&path)),
                    None,
                ),
                Err(e) => failure("save content to", &path, e),
            }
        }

        SftpClientMsg::Connect(_) | SftpClientMsg::Disconnect => {
            SftpServerMsg::Error("Unexpected session request".to_string())
        }
    }
}
