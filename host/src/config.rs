use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_MAX_DESKTOPS: usize = 32;

/// Runtime configuration of the host process
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP/WebSocket server binds to
    pub bind_addr: IpAddr,
    /// Port the HTTP/WebSocket server listens on
    pub port: u16,
    /// Root directory of the virtual filesystem
    pub fs_root: PathBuf,
    /// Directory holding `external-apps.json` and `pinned-apps.json`
    pub data_dir: PathBuf,
    /// Directory scanned for installable external apps
    pub apps_dir: PathBuf,
    /// Directory external app paths are resolved against when launching
    pub launch_root: PathBuf,
    /// Program used to run an external app directory
    pub app_runtime: String,
    /// How long an SSH connect may take before it is abandoned
    pub ssh_connect_timeout: Duration,
    /// Port used when the browser does not send one
    pub ssh_default_port: u16,
    /// CORS origins allowed to call the API (`*` allows any)
    pub allowed_origins: Vec<String>,
    /// Upper bound for JSON request bodies
    pub max_body_bytes: usize,
    /// Live desktop actors kept before the least recently used is stopped
    pub max_desktops: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let cwd = std::env::current_dir()?;

        Ok(Self {
            bind_addr: env_parse("WEBDESK_BIND", IpAddr::from([127, 0, 0, 1]))?,
            port: env_parse("WEBDESK_PORT", 3001)?,
            fs_root: env_path("WEBDESK_FS_ROOT", &cwd, "virtual-fs"),
            data_dir: env_path("WEBDESK_DATA_DIR", &cwd, "data"),
            apps_dir: env_path("WEBDESK_APPS_DIR", &cwd, "apps"),
            launch_root: cwd.clone(),
            app_runtime: env_str("WEBDESK_APP_RUNTIME", "electron"),
            ssh_connect_timeout: Duration::from_secs(env_parse(
                "WEBDESK_SSH_CONNECT_TIMEOUT_SECS",
                20,
            )?),
            ssh_default_port: env_parse("WEBDESK_SSH_DEFAULT_PORT", 22)?,
            allowed_origins: env_csv(
                "WEBDESK_ALLOWED_ORIGINS",
                &["http://localhost:5173", "http://127.0.0.1:5173"],
            ),
            max_body_bytes: env_parse("WEBDESK_MAX_BODY_BYTES", 50 * 1024 * 1024)?,
            max_desktops: env_parse("WEBDESK_MAX_DESKTOPS", DEFAULT_MAX_DESKTOPS)?,
        })
    }

    /// Configuration with every directory placed under `root`.
    pub fn for_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            bind_addr: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            fs_root: root.join("virtual-fs"),
            data_dir: root.join("data"),
            apps_dir: root.join("apps"),
            launch_root: root.to_path_buf(),
            app_runtime: "electron".to_string(),
            ssh_connect_timeout: Duration::from_secs(20),
            ssh_default_port: 22,
            allowed_origins: vec!["*".to_string()],
            max_body_bytes: 50 * 1024 * 1024,
            max_desktops: DEFAULT_MAX_DESKTOPS,
        }
    }

    pub fn external_apps_path(&self) -> PathBuf {
        self.data_dir.join("external-apps.json")
    }

    pub fn pinned_apps_path(&self) -> PathBuf {
        self.data_dir.join("pinned-apps.json")
    }
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_path(key: &str, base: &Path, default: &str) -> PathBuf {
    let raw = env_str(key, default);
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("Failed to parse env var {key}={val}: {e}")),
        Err(_) => Ok(default),
    }
}

fn env_csv(key: &str, default: &[&str]) -> Vec<String> {
    match std::env::var(key) {
        Ok(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(ToString::to_string)
            .collect(),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}
