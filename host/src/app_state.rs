use std::collections::HashMap;
use std::sync::Arc;

use ractor::{Actor, ActorRef};
use tokio::sync::Mutex;

use crate::actors::desktop::{DesktopActor, DesktopActorMsg, DesktopArguments};
use crate::config::Config;
use crate::launcher::Launcher;
use crate::registry::AppRegistry;
use crate::sessions::SessionRegistry;
use crate::ssh::{RusshConnector, SftpConnector, ShellConnector};
use crate::vfs::VirtualFs;

/// Everything the HTTP and WebSocket handlers share
pub struct AppState {
    pub config: Config,
    pub vfs: VirtualFs,
    pub registry: AppRegistry,
    pub launcher: Launcher,
    pub sessions: Arc<SessionRegistry>,
    pub shell_connector: Arc<dyn ShellConnector>,
    pub sftp_connector: Arc<dyn SftpConnector>,
    pub http_client: reqwest::Client,
    desktops: Mutex<DesktopTable>,
}

/// Live desktop actors with a use counter for least-recently-used eviction
#[derive(Default)]
struct DesktopTable {
    entries: HashMap<String, DesktopEntry>,
    clock: u64,
}

struct DesktopEntry {
    actor: ActorRef<DesktopActorMsg>,
    last_used: u64,
}

impl DesktopTable {
    fn touch(&mut self, desktop_id: &str) -> Option<ActorRef<DesktopActorMsg>> {
        self.clock += 1;
        let clock = self.clock;
        self.entries.get_mut(desktop_id).map(|entry| {
            entry.last_used = clock;
            entry.actor.clone()
        })
    }

    /// Stop least recently used desktops until one more fits under `max`.
    fn make_room(&mut self, max: usize) {
        while self.entries.len() >= max.max(1) {
            let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            if let Some(entry) = self.entries.remove(&oldest) {
                tracing::info!(desktop_id = %oldest, "Evicting idle desktop");
                entry.actor.stop(None);
            }
        }
    }
}

impl AppState {
    /// State backed by real SSH connections.
    pub fn new(config: Config) -> Self {
        let connector = Arc::new(RusshConnector::new(config.ssh_connect_timeout));
        Self::with_connectors(config, connector.clone(), connector)
    }

    pub fn with_connectors(
        config: Config,
        shell_connector: Arc<dyn ShellConnector>,
        sftp_connector: Arc<dyn SftpConnector>,
    ) -> Self {
        Self {
            vfs: VirtualFs::new(&config.fs_root),
            registry: AppRegistry::new(
                &config.apps_dir,
                config.external_apps_path(),
                config.pinned_apps_path(),
            ),
            launcher: Launcher::new(&config.launch_root, &config.app_runtime),
            sessions: Arc::new(SessionRegistry::new()),
            shell_connector,
            sftp_connector,
            http_client: reqwest::Client::new(),
            desktops: Mutex::new(DesktopTable::default()),
            config,
        }
    }

    /// Desktop actor for `desktop_id`, spawned on first use. At most
    /// `config.max_desktops` stay alive; the least recently used goes first.
    pub async fn get_or_create_desktop(
        &self,
        desktop_id: &str,
    ) -> Result<ActorRef<DesktopActorMsg>, String> {
        let mut desktops = self.desktops.lock().await;
        if let Some(desktop) = desktops.touch(desktop_id) {
            return Ok(desktop);
        }

        let external_apps = match self.registry.installed().await {
            Ok(apps) => apps,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read external app registry");
                Vec::new()
            }
        };

        let (desktop, _) = Actor::spawn(
            None,
            DesktopActor,
            DesktopArguments {
                desktop_id: desktop_id.to_string(),
                external_apps,
            },
        )
        .await
        .map_err(|e| e.to_string())?;

        desktops.make_room(self.config.max_desktops);
        let last_used = desktops.clock;
        desktops.entries.insert(
            desktop_id.to_string(),
            DesktopEntry {
                actor: desktop.clone(),
                last_used,
            },
        );
        Ok(desktop)
    }

    /// Push the current external app list to every live desktop.
    pub async fn refresh_desktop_apps(&self) {
        let apps = match self.registry.installed().await {
            Ok(apps) => apps,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read external app registry");
                return;
            }
        };
        let desktops = self.desktops.lock().await;
        for entry in desktops.entries.values() {
            let _ = entry.actor.cast(DesktopActorMsg::SetExternalApps { apps: apps.clone() });
        }
    }

    /// Stop sessions, desktops and launched apps.
    pub async fn shutdown(&self) {
        self.sessions.stop_all().await;
        for (_, entry) in self.desktops.lock().await.entries.drain() {
            entry.actor.stop(None);
        }
        self.launcher.shutdown().await;
    }
}
