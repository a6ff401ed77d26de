//! App registries: discovered apps, installed external apps and pinned apps
//!
//! `external-apps.json` and `pinned-apps.json` live in the data directory.
//! Every write goes through one mutex and lands via temp file + rename, so
//! concurrent requests never observe a half-written registry.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use shared_types::{AvailableApp, InstalledApp};
use tokio::fs;
use tokio::sync::Mutex;

const DEFAULT_DISCOVERED_DESCRIPTION: &str = "A discovered application.";
const DEFAULT_INSTALLED_DESCRIPTION: &str = "An installed external application.";
const DEFAULT_VERSION: &str = "1.0.0";
const ENTRY_POINT: &str = "main.js";

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("App \"{0}\" is already installed.")]
    AlreadyInstalled(String),

    #[error("App \"{0}\" is not installed.")]
    NotInstalled(String),

    #[error("Registry file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Body of `POST /api/install`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstallRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    pub version: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PackageJson {
    description: Option<String>,
    version: Option<String>,
}

#[derive(Debug)]
pub struct AppRegistry {
    apps_dir: PathBuf,
    external_apps_path: PathBuf,
    pinned_apps_path: PathBuf,
    write_lock: Mutex<()>,
}

impl AppRegistry {
    pub fn new(
        apps_dir: impl Into<PathBuf>,
        external_apps_path: impl Into<PathBuf>,
        pinned_apps_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            apps_dir: apps_dir.into(),
            external_apps_path: external_apps_path.into(),
            pinned_apps_path: pinned_apps_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Scan the apps directory for installable apps.
    pub async fn discover_available(&self) -> Result<Vec<AvailableApp>, RegistryError> {
        let installed_ids: HashSet<String> =
            self.installed().await?.into_iter().map(|a| a.id).collect();

        let mut read_dir = match fs::read_dir(&self.apps_dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let apps_dir_name = self
            .apps_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut apps = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            if !entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let dir_name = entry.file_name().to_string_lossy().to_string();

            let package = match read_package_json(&entry.path()).await {
                Some(package) => package,
                None => {
                    tracing::debug!(dir = %dir_name, "Skipping app directory without package.json");
                    continue;
                }
            };

            let id = dir_name.to_lowercase();
            apps.push(AvailableApp {
                is_installed: installed_ids.contains(&id),
                id,
                name: dir_name.clone(),
                description: package
                    .description
                    .unwrap_or_else(|| DEFAULT_DISCOVERED_DESCRIPTION.to_string()),
                version: package.version.unwrap_or_else(|| DEFAULT_VERSION.to_string()),
                is_external: true,
                path: format!("{apps_dir_name}/{dir_name}"),
            });
        }

        apps.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(apps)
    }

    /// Contents of `external-apps.json`. A missing file is an empty registry.
    /// Installed apps; entries that do not parse are skipped with a warning.
    pub async fn installed(&self) -> Result<Vec<InstalledApp>, RegistryError> {
        let raw: Vec<Value> = read_json_list(&self.external_apps_path).await?;
        Ok(raw
            .into_iter()
            .filter_map(|entry| match serde_json::from_value(entry) {
                Ok(app) => Some(app),
                Err(e) => {
                    tracing::warn!(
                        path = %self.external_apps_path.display(),
                        error = %e,
                        "Skipping malformed external app entry"
                    );
                    None
                }
            })
            .collect())
    }

    pub async fn install(&self, request: InstallRequest) -> Result<InstalledApp, RegistryError> {
        if request.id.trim().is_empty()
            || request.name.trim().is_empty()
            || request.path.trim().is_empty()
        {
            return Err(RegistryError::InvalidRequest(
                "Missing required app details for installation.".to_string(),
            ));
        }

        let _guard = self.write_lock.lock().await;
        // Raw entries, so hand-edited ones survive the rewrite untouched.
        let mut registry: Vec<Value> = read_json_list(&self.external_apps_path).await?;
        if registry.iter().any(|app| entry_id(app) == Some(request.id.as_str())) {
            return Err(RegistryError::AlreadyInstalled(request.name));
        }

        let entry = InstalledApp {
            icon: request.id.clone(),
            id: request.id,
            name: request.name,
            is_external: true,
            external_path: format!("{}/{ENTRY_POINT}", request.path.trim_end_matches('/')),
            version: request
                .version
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            description: request
                .description
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| DEFAULT_INSTALLED_DESCRIPTION.to_string()),
        };
        registry.push(serde_json::to_value(&entry)?);
        write_json_atomic(&self.external_apps_path, &registry).await?;

        tracing::info!(app_id = %entry.id, "Installed external app");
        Ok(entry)
    }

    pub async fn uninstall(&self, id: &str) -> Result<InstalledApp, RegistryError> {
        let _guard = self.write_lock.lock().await;
        let mut registry: Vec<Value> = read_json_list(&self.external_apps_path).await?;
        let position = registry
            .iter()
            .position(|app| entry_id(app) == Some(id))
            .ok_or_else(|| RegistryError::NotInstalled(id.to_string()))?;
        let removed: InstalledApp = serde_json::from_value(registry.remove(position))?;
        write_json_atomic(&self.external_apps_path, &registry).await?;

        tracing::info!(app_id = %id, "Uninstalled external app");
        Ok(removed)
    }

    pub async fn pinned(&self) -> Result<Vec<String>, RegistryError> {
        read_json_list(&self.pinned_apps_path).await
    }

    /// Replace the pinned list, dropping repeated ids.
    pub async fn set_pinned(&self, ids: Vec<String>) -> Result<Vec<String>, RegistryError> {
        let mut seen = HashSet::new();
        let ids: Vec<String> = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();

        let _guard = self.write_lock.lock().await;
        write_json_atomic(&self.pinned_apps_path, &ids).await?;
        Ok(ids)
    }
}

async fn read_package_json(app_dir: &Path) -> Option<PackageJson> {
    let raw = fs::read_to_string(app_dir.join("package.json")).await.ok()?;
    serde_json::from_str(&raw).ok()
}

fn entry_id(entry: &Value) -> Option<&str> {
    entry.get("id").and_then(Value::as_str)
}

async fn read_json_list<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<Vec<T>, RegistryError> {
    match fs::read_to_string(path).await {
        Ok(raw) if raw.trim().is_empty() => Ok(Vec::new()),
        Ok(raw) => Ok(serde_json::from_str(&raw)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

async fn write_json_atomic<T: serde::Serialize>(
    path: &Path,
    value: &T,
) -> Result<(), RegistryError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let body = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension(format!("json.tmp-{}", uuid::Uuid::new_v4().simple()));
    fs::write(&tmp, body).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}
