//! In-memory registry of live WebSocket <-> SSH/SFTP pairings

use std::collections::HashMap;

use ractor::ActorCell;
use shared_types::{SessionInfo, SessionKind};
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Session already registered: {0}")]
    Duplicate(String),
}

struct SessionEntry {
    info: SessionInfo,
    actor: ActorCell,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

/// Fresh connection id, e.g. `term-3f2a...`
pub fn new_session_id(kind: SessionKind) -> String {
    let prefix = match kind {
        SessionKind::Terminal => "term",
        SessionKind::Sftp => "sftp",
    };
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(
        &self,
        id: &str,
        kind: SessionKind,
        actor: ActorCell,
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(id) {
            return Err(SessionError::Duplicate(id.to_string()));
        }
        sessions.insert(
            id.to_string(),
            SessionEntry {
                info: SessionInfo {
                    id: id.to_string(),
                    kind,
                    host: None,
                    username: None,
                    connected: false,
                    opened_at: chrono::Utc::now().to_rfc3339(),
                },
                actor,
            },
        );
        tracing::debug!(session_id = %id, ?kind, "Session registered");
        Ok(())
    }

    pub async fn mark_connected(
        &self,
        id: &str,
        host: &str,
        username: &str,
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::UnknownSession(id.to_string()))?;
        entry.info.connected = true;
        entry.info.host = Some(host.to_string());
        entry.info.username = Some(username.to_string());
        Ok(())
    }

    pub async fn mark_disconnected(&self, id: &str) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::UnknownSession(id.to_string()))?;
        entry.info.connected = false;
        Ok(())
    }

    pub async fn remove(&self, id: &str) -> Option<SessionInfo> {
        let removed = self.sessions.write().await.remove(id).map(|e| e.info);
        if removed.is_some() {
            tracing::debug!(session_id = %id, "Session removed");
        }
        removed
    }

    pub async fn get(&self, id: &str) -> Option<SessionInfo> {
        self.sessions.read().await.get(id).map(|e| e.info.clone())
    }

    pub async fn list(&self) -> Vec<SessionInfo> {
        let sessions = self.sessions.read().await;
        let mut infos: Vec<_> = sessions.values().map(|e| e.info.clone()).collect();
        infos.sort_by(|a, b| a.opened_at.cmp(&b.opened_at).then(a.id.cmp(&b.id)));
        infos
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Stop every session actor; each one removes itself on the way out.
    pub async fn stop_all(&self) {
        let actors: Vec<ActorCell> = self
            .sessions
            .read()
            .await
            .values()
            .map(|e| e.actor.clone())
            .collect();
        for actor in actors {
            actor.stop(Some("host shutdown".to_string()));
        }
    }
}
