//! External app launcher
//!
//! Spawns `<runtime> <app path> --launched-by-host <args...>` and keeps track
//! of the children until they exit or the host shuts down.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::vfs::VirtualFs;

const LAUNCHED_BY_HOST_FLAG: &str = "--launched-by-host";

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Missing path in request body")]
    MissingPath,

    #[error("App path escapes the launch root: {0}")]
    PathEscapes(String),

    #[error("App not found: {0}")]
    NotFound(String),

    #[error("Failed to start {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// A child process started by the launcher
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchedApp {
    pub id: String,
    pub pid: Option<u32>,
    pub name: String,
    pub path: String,
    pub started_at: String,
}

struct TrackedChild {
    info: LaunchedApp,
    kill_tx: oneshot::Sender<()>,
    waiter: JoinHandle<()>,
}

#[derive(Clone)]
pub struct Launcher {
    launch_root: PathBuf,
    runtime: String,
    children: Arc<Mutex<HashMap<String, TrackedChild>>>,
}

impl Launcher {
    pub fn new(launch_root: impl Into<PathBuf>, runtime: impl Into<String>) -> Self {
        Self {
            launch_root: launch_root.into(),
            runtime: runtime.into(),
            children: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn launch(
        &self,
        relative_app_path: &str,
        args: &[String],
    ) -> Result<LaunchedApp, LaunchError> {
        if relative_app_path.trim().is_empty() {
            return Err(LaunchError::MissingPath);
        }

        let app_path = VirtualFs::new(&self.launch_root)
            .resolve(relative_app_path)
            .map_err(|_| LaunchError::PathEscapes(relative_app_path.to_string()))?;
        if !app_path.exists() {
            return Err(LaunchError::NotFound(relative_app_path.to_string()));
        }

        let name = app_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| relative_app_path.to_string());

        tracing::info!(
            runtime = %self.runtime,
            app = %name,
            path = %app_path.display(),
            "Spawning external app"
        );

        let mut child = Command::new(&self.runtime)
            .arg(&app_path)
            .arg(LAUNCHED_BY_HOST_FLAG)
            .args(args)
            .current_dir(&self.launch_root)
            .env("NODE_PATH", self.launch_root.join("node_modules"))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| LaunchError::Spawn {
                name: name.clone(),
                source,
            })?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(name.clone(), "stdout", stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(name.clone(), "stderr", stderr));
        }

        let info = LaunchedApp {
            id: uuid::Uuid::new_v4().simple().to_string(),
            pid: child.id(),
            name: name.clone(),
            path: relative_app_path.to_string(),
            started_at: chrono::Utc::now().to_rfc3339(),
        };

        // Hold the table lock until the entry is in, so a fast exit cannot
        // try to remove it first.
        let mut children = self.children.lock().await;
        let (kill_tx, kill_rx) = oneshot::channel();
        let table = self.children.clone();
        let child_id = info.id.clone();
        let waiter = tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => match status {
                    Ok(status) if status.success() => {
                        tracing::info!(app = %name, "External app exited");
                    }
                    Ok(status) => {
                        tracing::warn!(app = %name, status = %status, "External app exited with failure");
                    }
                    Err(e) => {
                        tracing::error!(app = %name, error = %e, "Failed waiting for external app");
                    }
                },
                _ = kill_rx => {
                    if let Err(e) = child.kill().await {
                        tracing::warn!(app = %name, error = %e, "Failed to kill external app");
                    }
                }
            }
            table.lock().await.remove(&child_id);
        });

        children.insert(
            info.id.clone(),
            TrackedChild {
                info: info.clone(),
                kill_tx,
                waiter,
            },
        );
        Ok(info)
    }

    pub async fn running(&self) -> Vec<LaunchedApp> {
        let children = self.children.lock().await;
        let mut apps: Vec<_> = children.values().map(|c| c.info.clone()).collect();
        apps.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        apps
    }

    /// Kill every tracked child and wait for them to be reaped.
    pub async fn shutdown(&self) {
        let drained: Vec<TrackedChild> = {
            let mut children = self.children.lock().await;
            children.drain().map(|(_, c)| c).collect()
        };
        if drained.is_empty() {
            return;
        }

        tracing::info!(count = drained.len(), "Stopping external apps");
        let mut waiters = Vec::with_capacity(drained.len());
        for child in drained {
            let _ = child.kill_tx.send(());
            waiters.push(child.waiter);
        }
        for waiter in waiters {
            let _ = waiter.await;
        }
    }
}

async fn forward_output<R>(app: String, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if stream == "stderr" {
            tracing::warn!(app = %app, stream, "{line}");
        } else {
            tracing::info!(app = %app, stream, "{line}");
        }
    }
}
