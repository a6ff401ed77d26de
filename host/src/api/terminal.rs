//! Terminal WebSocket handler - relays one browser terminal to one SSH shell
//!
//! Each socket gets its own `TerminalSessionActor`, registered in the session
//! registry for as long as the socket is open.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use ractor::Actor;
use shared_types::{SessionKind, TerminalClientMsg, TerminalServerMsg};
use tokio::sync::mpsc;

use crate::actors::terminal::{
    TerminalSessionActor, TerminalSessionArguments, TerminalSessionMsg,
};
use crate::api::ApiState;
use crate::app_state::AppState;
use crate::sessions::new_session_id;

/// WebSocket handler for `/ws/terminus`
pub async fn terminus_websocket(
    ws: WebSocketUpgrade,
    State(state): State<ApiState>,
) -> impl IntoResponse {
    let app_state = state.app_state.clone();
    ws.on_upgrade(move |socket| handle_terminus_socket(socket, app_state))
}

async fn handle_terminus_socket(socket: WebSocket, app_state: Arc<AppState>) {
    let session_id = new_session_id(SessionKind::Terminal);
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<TerminalServerMsg>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("Failed to serialize terminal WS message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let (actor, _handle) = match Actor::spawn(
        None,
        TerminalSessionActor,
        TerminalSessionArguments {
            session_id: session_id.clone(),
            connector: app_state.shell_connector.clone(),
            sessions: app_state.sessions.clone(),
            outbound: tx.clone(),
            default_port: app_state.config.ssh_default_port,
        },
    )
    .await
    {
        Ok(spawned) => spawned,
        Err(e) => {
            tracing::error!(session_id = %session_id, error = %e, "Failed to spawn terminal session");
            let _ = tx.send(TerminalServerMsg::Error(format!(
                "Failed to create terminal session: {e}"
            )));
            drop(tx);
            let _ = writer.await;
            return;
        }
    };

    if let Err(e) = app_state
        .sessions
        .register(&session_id, SessionKind::Terminal, actor.get_cell())
        .await
    {
        tracing::error!(session_id = %session_id, error = %e, "Failed to register terminal session");
    }
    tracing::info!(session_id = %session_id, "Terminal socket opened");

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                let command = match serde_json::from_str::<TerminalClientMsg>(&text) {
                    Ok(TerminalClientMsg::Connect(request)) => TerminalSessionMsg::Connect(request),
                    Ok(TerminalClientMsg::Data(data)) => TerminalSessionMsg::Input(data),
                    Ok(TerminalClientMsg::Resize(size)) => TerminalSessionMsg::Resize(size),
                    Ok(TerminalClientMsg::Disconnect) => TerminalSessionMsg::Disconnect,
                    Err(e) => {
                        tracing::warn!(session_id = %session_id, error = %e, "Malformed terminal frame");
                        let _ = tx.send(TerminalServerMsg::Error(
                            "Invalid message format received.".to_string(),
                        ));
                        continue;
                    }
                };
                if actor.cast(command).is_err() {
                    break;
                }
            }
            Message::Close(_) => {
                break;
            }
            _ => {}
        }
    }

    tracing::info!(session_id = %session_id, "Terminal socket closed");
    actor.stop(None);
    writer.abort();
}
