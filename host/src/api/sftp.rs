//! SFTP WebSocket handler
//!
//! Same lifecycle as the terminal relay: one `SftpSessionActor` per socket,
//! stopped when the socket goes away.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use ractor::Actor;
use shared_types::{SessionKind, SftpClientMsg, SftpServerMsg};
use tokio::sync::mpsc;

use crate::actors::sftp::{SftpSessionActor, SftpSessionArguments, SftpSessionMsg};
use crate::api::ApiState;
use crate::app_state::AppState;
use crate::sessions::new_session_id;

/// WebSocket handler for `/ws/sftp`
pub async fn sftp_websocket(
    ws: WebSocketUpgrade,
    State(state): State<ApiState>,
) -> impl IntoResponse {
    let app_state = state.app_state.clone();
    ws.on_upgrade(move |socket| handle_sftp_socket(socket, app_state))
}

async fn handle_sftp_socket(socket: WebSocket, app_state: Arc<AppState>) {
    let session_id = new_session_id(SessionKind::Sftp);
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<SftpServerMsg>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::error!("Failed to serialize SFTP WS message: {}", e),
            }
        }
    });

    let spawned = Actor::spawn(
        None,
        SftpSessionActor,
        SftpSessionArguments {
            session_id: session_id.clone(),
            connector: app_state.sftp_connector.clone(),
            sessions: app_state.sessions.clone(),
            outbound: tx.clone(),
            default_port: app_state.config.ssh_default_port,
        },
    )
    .await;
    let actor = match spawned {
        Ok((actor, _handle)) => actor,
        Err(e) => {
            tracing::error!(session_id = %session_id, error = %e, "Failed to spawn SFTP session");
            let _ = tx.send(SftpServerMsg::Error(format!(
                "Failed to create SFTP session: {e}"
            )));
            drop(tx);
            let _ = writer.await;
            return;
        }
    };

    if let Err(e) = app_state
        .sessions
        .register(&session_id, SessionKind::Sftp, actor.get_cell())
        .await
    {
        tracing::error!(session_id = %session_id, error = %e, "Failed to register SFTP session");
    }
    tracing::info!(session_id = %session_id, "SFTP socket opened");

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<SftpClientMsg>(&text) {
                Ok(request) => {
                    if actor.cast(SftpSessionMsg::Request(request)).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(session_id = %session_id, error = %e, "Malformed SFTP frame");
                    let _ = tx.send(SftpServerMsg::Error(
                        "Invalid message format received.".to_string(),
                    ));
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    tracing::info!(session_id = %session_id, "SFTP socket closed");
    actor.stop(None);
    writer.abort();
}
