//! Shared types between the host process and the browser shell
//!
//! These types cross the wire as JSON:
//! - HTTP request/response bodies of the filesystem and app APIs
//! - Terminal and SFTP WebSocket frames
//! - Window manager state rendered by the UI
//!
//! TypeScript bindings are exported with ts-rs into `bindings/generated.ts`.

use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

// ============================================================================
// Virtual Filesystem
// ============================================================================

/// Kind of a filesystem entry as the UI sees it
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "generated.ts")]
pub enum FsItemKind {
    File,
    Folder,
}

impl FsItemKind {
    pub fn is_folder(self) -> bool {
        matches!(self, FsItemKind::Folder)
    }
}

/// A file or folder in the virtual filesystem
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "generated.ts")]
pub struct FsItem {
    pub name: String,
    /// Path relative to the virtual filesystem root, always `/`-separated
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FsItemKind,
    /// Raw JSON of `.app` shortcut files, so the desktop can draw their icons
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub content: Option<String>,
}

/// Contents of a `.app` shortcut file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "generated.ts")]
pub struct AppShortcut {
    pub app_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub is_external: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub external_path: Option<String>,
}

/// Contents of a `.lnk` file pointing at another item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "generated.ts")]
pub struct LinkShortcut {
    pub target: String,
    #[serde(rename = "type")]
    pub kind: FsItemKind,
}

// ============================================================================
// App Registry
// ============================================================================

/// An app found in the apps directory that can be installed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "generated.ts")]
pub struct AvailableApp {
    pub id: String,
    pub name: String,
    pub description: String,
    pub version: String,
    pub is_external: bool,
    pub path: String,
    pub is_installed: bool,
}

/// An entry of `external-apps.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "generated.ts")]
pub struct InstalledApp {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default = "default_true")]
    pub is_external: bool,
    #[serde(default)]
    pub external_path: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: String,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_true() -> bool {
    true
}

/// App definition known to the window manager
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "generated.ts")]
pub struct AppDefinition {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub default_width: i32,
    pub default_height: i32,
    #[serde(default)]
    pub allow_multiple_instances: bool,
    #[serde(default)]
    pub file_extensions: Vec<String>,
    #[serde(default)]
    pub is_external: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub external_path: Option<String>,
}

// ============================================================================
// UI State
// ============================================================================

/// Desktop state - all windows and their positions
#[derive(Debug, Clone, Serialize, Deserialize, Default, TS)]
#[ts(export, export_to = "generated.ts")]
pub struct DesktopState {
    pub windows: Vec<WindowState>,
    pub active_window: Option<String>,
    pub apps: Vec<AppDefinition>,
}

/// Geometry remembered while a window is maximized
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "generated.ts")]
pub struct WindowBounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Individual window state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "generated.ts")]
pub struct WindowState {
    pub id: String,
    pub app_id: String,
    pub title: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub z_index: u32,
    pub minimized: bool,
    pub maximized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub restore_bounds: Option<WindowBounds>,
    #[ts(type = "unknown")]
    pub props: serde_json::Value, // App-specific data
}

// ============================================================================
// Remote Sessions
// ============================================================================

/// Credentials sent by the browser to open an SSH or SFTP session
#[derive(Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "generated.ts")]
pub struct SshConnectRequest {
    pub host: String,
    #[serde(default, deserialize_with = "deserialize_port")]
    #[ts(type = "number | string | null")]
    pub port: Option<u16>,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SshConnectRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshConnectRequest")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Browsers send the port as a number or as the raw text of an input field.
fn deserialize_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPort {
        Number(u64),
        Text(String),
    }

    Ok(match Option::<RawPort>::deserialize(deserializer)? {
        Some(RawPort::Number(n)) => u16::try_from(n).ok().filter(|p| *p != 0),
        Some(RawPort::Text(s)) => s.trim().parse::<u16>().ok().filter(|p| *p != 0),
        None => None,
    })
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "generated.ts")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "generated.ts")]
pub struct TerminalSize {
    pub rows: u16,
    pub cols: u16,
}

/// Terminal WebSocket: browser -> host
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
#[ts(export, export_to = "generated.ts")]
pub enum TerminalClientMsg {
    Connect(SshConnectRequest),
    Data(String),
    Resize(TerminalSize),
    Disconnect,
}

/// Terminal WebSocket: host -> browser
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
#[ts(export, export_to = "generated.ts")]
pub enum TerminalServerMsg {
    Status(ConnectionStatus),
    Data(String),
    Error(String),
}

/// An entry on the remote side of an SFTP session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "generated.ts")]
pub struct RemoteItem {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FsItemKind,
    #[serde(default)]
    pub size: u64,
    /// Modification time in seconds since the epoch
    #[serde(default)]
    pub modified: u64,
}

/// SFTP WebSocket: browser -> host
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
#[ts(export, export_to = "generated.ts")]
pub enum SftpClientMsg {
    Connect(SshConnectRequest),
    List {
        path: String,
    },
    GetContent {
        path: String,
    },
    #[serde(rename_all = "camelCase")]
    FindUniqueName {
        parent_dir: String,
        base_name: String,
        #[serde(default)]
        is_folder: bool,
    },
    #[serde(rename_all = "camelCase")]
    CreateFolder { parent_dir: String, name: String },
    #[serde(rename_all = "camelCase")]
    CreateFile { parent_dir: String, name: String },
    Delete {
        item: RemoteItem,
    },
    #[serde(rename_all = "camelCase")]
    Rename { item: RemoteItem, new_name: String },
    SaveContent {
        path: String,
        content: String,
    },
    Disconnect,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "generated.ts")]
pub struct OperationSuccess {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub dir_to_refresh: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub is_local: Option<bool>,
}

/// SFTP WebSocket: host -> browser
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
#[ts(export, export_to = "generated.ts")]
pub enum SftpServerMsg {
    Status(ConnectionStatus),
    Error(String),
    OperationError(String),
    OperationSuccess(OperationSuccess),
    List {
        path: String,
        items: Vec<RemoteItem>,
    },
    FileContent {
        path: String,
        content: String,
    },
    #[serde(rename_all = "camelCase")]
    UniqueNameFound {
        name: String,
        parent_dir: String,
        is_folder: bool,
    },
}

/// Kind of a live remote session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "generated.ts")]
pub enum SessionKind {
    Terminal,
    Sftp,
}

/// Snapshot of a live WebSocket <-> SSH pairing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "generated.ts")]
pub struct SessionInfo {
    pub id: String,
    pub kind: SessionKind,
    pub host: Option<String>,
    pub username: Option<String>,
    pub connected: bool,
    pub opened_at: String,
}

// ============================================================================
// Tests
// ============================================================================
