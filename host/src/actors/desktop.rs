//! DesktopActor - owns the window manager state of one desktop
//!
//! The browser renders whatever this actor reports: which windows are open,
//! where they are, which one has focus and which apps can be opened.
//! State lives in memory for the lifetime of the host process.

use async_trait::async_trait;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use shared_types::{AppDefinition, InstalledApp, WindowBounds, WindowState};

/// Actor that manages desktop window state
#[derive(Debug, Default)]
pub struct DesktopActor;

/// Arguments for spawning DesktopActor
#[derive(Debug, Clone)]
pub struct DesktopArguments {
    pub desktop_id: String,
    pub external_apps: Vec<InstalledApp>,
}

/// State for DesktopActor
pub struct DesktopState {
    desktop_id: String,
    windows: Vec<WindowState>,
    apps: Vec<AppDefinition>,
    active_window: Option<String>,
    next_z_index: u32,
}

pub const FIRST_Z_INDEX: u32 = 10;
pub const DEFAULT_POSITION: (i32, i32) = (50, 50);
pub const DEFAULT_SIZE: (i32, i32) = (600, 400);
pub const MIN_WINDOW_WIDTH: i32 = 200;
pub const MIN_WINDOW_HEIGHT: i32 = 160;

// ============================================================================
// Messages
// ============================================================================

/// Messages handled by DesktopActor
#[derive(Debug)]
pub enum DesktopActorMsg {
    /// Open a window for an app, or surface the existing single instance
    OpenWindow {
        app_id: String,
        title: Option<String>,
        props: Option<serde_json::Value>,
        reply: RpcReplyPort<Result<WindowState, DesktopError>>,
    },
    /// Open a window from an already resolved definition (`.app` overrides)
    OpenDefinition {
        app: AppDefinition,
        props: Option<serde_json::Value>,
        reply: RpcReplyPort<Result<WindowState, DesktopError>>,
    },
    CloseWindow {
        window_id: String,
        reply: RpcReplyPort<Result<(), DesktopError>>,
    },
    MoveWindow {
        window_id: String,
        x: i32,
        y: i32,
        reply: RpcReplyPort<Result<WindowState, DesktopError>>,
    },
    ResizeWindow {
        window_id: String,
        width: i32,
        height: i32,
        reply: RpcReplyPort<Result<WindowState, DesktopError>>,
    },
    /// Bring a window to the front
    FocusWindow {
        window_id: String,
        reply: RpcReplyPort<Result<WindowState, DesktopError>>,
    },
    ToggleMaximize {
        window_id: String,
        reply: RpcReplyPort<Result<WindowState, DesktopError>>,
    },
    ToggleMinimize {
        window_id: String,
        reply: RpcReplyPort<Result<WindowState, DesktopError>>,
    },
    GetDesktopState {
        reply: RpcReplyPort<shared_types::DesktopState>,
    },
    /// Look up an app definition by id
    GetApp {
        app_id: String,
        reply: RpcReplyPort<Option<AppDefinition>>,
    },
    /// Replace the installed external apps in the catalog
    SetExternalApps { apps: Vec<InstalledApp> },
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error, Clone)]
pub enum DesktopError {
    #[error("Window not found: {0}")]
    WindowNotFound(String),

    #[error("App not found: {0}")]
    AppNotFound(String),

    #[error("App {app_id} is external and runs outside the desktop")]
    ExternalApp {
        app_id: String,
        external_path: Option<String>,
    },
}

// ============================================================================
// App catalog
// ============================================================================

fn builtin(
    id: &str,
    name: &str,
    (width, height): (i32, i32),
    allow_multiple_instances: bool,
    file_extensions: &[&str],
) -> AppDefinition {
    AppDefinition {
        id: id.to_string(),
        name: name.to_string(),
        icon: id.to_string(),
        default_width: width,
        default_height: height,
        allow_multiple_instances,
        file_extensions: file_extensions.iter().map(|e| e.to_string()).collect(),
        is_external: false,
        external_path: None,
    }
}

/// Apps every desktop ships with
pub fn builtin_apps() -> Vec<AppDefinition> {
    vec![
        builtin("fileExplorer", "File Explorer", (800, 600), false, &[]),
        builtin("notebook", "Notebook", (600, 500), true, &[".txt", ".log"]),
        builtin("terminus", "Terminus SSH", (800, 500), true, &[]),
        builtin("sftp", "SFTP Client", (950, 650), false, &[]),
        builtin("settings", "Settings", (700, 500), false, &[]),
        builtin("appStore", "App Store", (750, 550), false, &[]),
    ]
}

fn external_definition(app: &InstalledApp) -> AppDefinition {
    AppDefinition {
        id: app.id.clone(),
        name: or_id(&app.name, &app.id),
        icon: or_id(&app.icon, &app.id),
        default_width: DEFAULT_SIZE.0,
        default_height: DEFAULT_SIZE.1,
        allow_multiple_instances: false,
        file_extensions: Vec::new(),
        is_external: true,
        external_path: Some(app.external_path.clone()).filter(|p| !p.is_empty()),
    }
}

fn or_id(value: &str, id: &str) -> String {
    let value = if value.is_empty() { id } else { value };
    value.to_string()
}

fn catalog(external_apps: &[InstalledApp]) -> Vec<AppDefinition> {
    let mut apps = builtin_apps();
    for external in external_apps {
        if apps.iter().any(|a| a.id == external.id) {
            tracing::warn!(app_id = %external.id, "External app id shadows a built-in app");
            continue;
        }
        apps.push(external_definition(external));
    }
    apps
}

// ============================================================================
// Actor Implementation
// ============================================================================

#[async_trait]
impl Actor for DesktopActor {
    type Msg = DesktopActorMsg;
    type State = DesktopState;
    type Arguments = DesktopArguments;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!(
            actor_id = %myself.get_id(),
            desktop_id = %args.desktop_id,
            "DesktopActor starting"
        );

        Ok(DesktopState {
            apps: catalog(&args.external_apps),
            desktop_id: args.desktop_id,
            windows: Vec::new(),
            active_window: None,
            next_z_index: FIRST_Z_INDEX,
        })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            DesktopActorMsg::OpenWindow {
                app_id,
                title,
                props,
                reply,
            } => {
                let result = match state.apps.iter().find(|a| a.id == app_id).cloned() {
                    Some(app) => self.handle_open(app, title, props, state),
                    None => Err(DesktopError::AppNotFound(app_id)),
                };
                let _ = reply.send(result);
            }
            DesktopActorMsg::OpenDefinition { app, props, reply } => {
                let result = self.handle_open(app, None, props, state);
                let _ = reply.send(result);
            }
            DesktopActorMsg::CloseWindow { window_id, reply } => {
                let result = self.handle_close_window(window_id, state);
                let _ = reply.send(result);
            }
            DesktopActorMsg::MoveWindow {
                window_id,
                x,
                y,
                reply,
            } => {
                let result = with_window(state, &window_id, |w| {
                    w.x = x;
                    w.y = y;
                });
                let _ = reply.send(result);
            }
            DesktopActorMsg::ResizeWindow {
                window_id,
                width,
                height,
                reply,
            } => {
                let result = with_window(state, &window_id, |w| {
                    w.width = width.max(MIN_WINDOW_WIDTH);
                    w.height = height.max(MIN_WINDOW_HEIGHT);
                });
                let _ = reply.send(result);
            }
            DesktopActorMsg::FocusWindow { window_id, reply } => {
                let result = self.handle_focus_window(window_id, state);
                let _ = reply.send(result);
            }
            DesktopActorMsg::ToggleMaximize { window_id, reply } => {
                let result = with_window(state, &window_id, toggle_maximize);
                let _ = reply.send(result);
            }
            DesktopActorMsg::ToggleMinimize { window_id, reply } => {
                let result = self.handle_toggle_minimize(window_id, state);
                let _ = reply.send(result);
            }
            DesktopActorMsg::GetDesktopState { reply } => {
                let _ = reply.send(self.handle_get_desktop_state(state));
            }
            DesktopActorMsg::GetApp { app_id, reply } => {
                let _ = reply.send(state.apps.iter().find(|a| a.id == app_id).cloned());
            }
            DesktopActorMsg::SetExternalApps { apps } => {
                state.apps = catalog(&apps);
                tracing::debug!(
                    desktop_id = %state.desktop_id,
                    app_count = state.apps.len(),
                    "Desktop app catalog refreshed"
                );
            }
        }
        Ok(())
    }

    async fn post_stop(
        &self,
        myself: ActorRef<Self::Msg>,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        tracing::info!(
            actor_id = %myself.get_id(),
            desktop_id = %state.desktop_id,
            "DesktopActor stopped"
        );
        Ok(())
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl DesktopActor {
    /// Get next z-index and increment counter
    fn next_z(&self, state: &mut DesktopState) -> u32 {
        let z = state.next_z_index;
        state.next_z_index += 1;
        z
    }

    fn handle_open(
        &self,
        app: AppDefinition,
        title: Option<String>,
        props: Option<serde_json::Value>,
        state: &mut DesktopState,
    ) -> Result<WindowState, DesktopError> {
        if app.is_external {
            return Err(DesktopError::ExternalApp {
                app_id: app.id,
                external_path: app.external_path,
            });
        }

        if !app.allow_multiple_instances {
            if let Some(existing) = state.windows.iter().find(|w| w.app_id == app.id) {
                let existing = existing.clone();
                state.active_window = Some(existing.id.clone());
                return Ok(existing);
            }
        }

        let (width, height) = if app.default_width > 0 && app.default_height > 0 {
            (app.default_width, app.default_height)
        } else {
            DEFAULT_SIZE
        };

        let window = WindowState {
            id: format!("{}-{}", app.id, uuid::Uuid::new_v4().simple()),
            app_id: app.id.clone(),
            title: title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| app.name.clone()),
            x: DEFAULT_POSITION.0,
            y: DEFAULT_POSITION.1,
            width,
            height,
            z_index: self.next_z(state),
            minimized: false,
            maximized: false,
            restore_bounds: None,
            props: props.unwrap_or_else(|| serde_json::json!({})),
        };

        state.active_window = Some(window.id.clone());
        state.windows.push(window.clone());

        tracing::debug!(
            desktop_id = %state.desktop_id,
            window_id = %window.id,
            app_id = %window.app_id,
            "Window opened"
        );
        Ok(window)
    }

    fn handle_close_window(
        &self,
        window_id: String,
        state: &mut DesktopState,
    ) -> Result<(), DesktopError> {
        let before = state.windows.len();
        state.windows.retain(|w| w.id != window_id);
        if state.windows.len() == before {
            return Err(DesktopError::WindowNotFound(window_id));
        }

        if state.active_window.as_deref() == Some(window_id.as_str()) {
            state.active_window = state
                .windows
                .iter()
                .max_by_key(|w| w.z_index)
                .map(|w| w.id.clone());
        }
        Ok(())
    }

    fn handle_focus_window(
        &self,
        window_id: String,
        state: &mut DesktopState,
    ) -> Result<WindowState, DesktopError> {
        if state.active_window.as_deref() != Some(window_id.as_str()) {
            if !state.windows.iter().any(|w| w.id == window_id) {
                return Err(DesktopError::WindowNotFound(window_id));
            }
            let new_z = self.next_z(state);
            state.active_window = Some(window_id.clone());
            return with_window(state, &window_id, |w| w.z_index = new_z);
        }
        with_window(state, &window_id, |_| {})
    }

    fn handle_toggle_minimize(
        &self,
        window_id: String,
        state: &mut DesktopState,
    ) -> Result<WindowState, DesktopError> {
        let minimized = state
            .windows
            .iter()
            .find(|w| w.id == window_id)
            .map(|w| w.minimized)
            .ok_or_else(|| DesktopError::WindowNotFound(window_id.clone()))?;

        if minimized {
            let new_z = self.next_z(state);
            state.active_window = Some(window_id.clone());
            return with_window(state, &window_id, |w| {
                w.minimized = false;
                w.z_index = new_z;
            });
        }

        let window = with_window(state, &window_id, |w| w.minimized = true)?;
        if state.active_window.as_deref() == Some(window_id.as_str()) {
            state.active_window = state
                .windows
                .iter()
                .filter(|w| w.id != window_id && !w.minimized)
                .max_by_key(|w| w.z_index)
                .map(|w| w.id.clone());
        }
        Ok(window)
    }

    fn handle_get_desktop_state(&self, state: &DesktopState) -> shared_types::DesktopState {
        let mut windows = state.windows.clone();
        windows.sort_by_key(|w| w.z_index);

        shared_types::DesktopState {
            windows,
            active_window: state.active_window.clone(),
            apps: state.apps.clone(),
        }
    }
}

fn with_window(
    state: &mut DesktopState,
    window_id: &str,
    update: impl FnOnce(&mut WindowState),
) -> Result<WindowState, DesktopError> {
    let window = state
        .windows
        .iter_mut()
        .find(|w| w.id == window_id)
        .ok_or_else(|| DesktopError::WindowNotFound(window_id.to_string()))?;
    update(window);
    Ok(window.clone())
}

fn toggle_maximize(window: &mut WindowState) {
    if window.maximized {
        let bounds = window.restore_bounds.take().unwrap_or(WindowBounds {
            x: DEFAULT_POSITION.0,
            y: DEFAULT_POSITION.1,
            width: DEFAULT_SIZE.0,
            height: DEFAULT_SIZE.1,
        });
        window.x = bounds.x;
        window.y = bounds.y;
        window.width = bounds.width;
        window.height = bounds.height;
        window.maximized = false;
    } else {
        window.restore_bounds = Some(WindowBounds {
            x: window.x,
            y: window.y,
            width: window.width,
            height: window.height,
        });
        window.maximized = true;
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Convenience function to open a window
pub async fn open_window(
    desktop: &ActorRef<DesktopActorMsg>,
    app_id: impl Into<String>,
    title: Option<String>,
    props: Option<serde_json::Value>,
) -> Result<Result<WindowState, DesktopError>, ractor::RactorErr<DesktopActorMsg>> {
    ractor::call!(desktop, |reply| DesktopActorMsg::OpenWindow {
        app_id: app_id.into(),
        title,
        props,
        reply,
    })
}

/// Convenience function to open a window from a resolved definition
pub async fn open_definition(
    desktop: &ActorRef<DesktopActorMsg>,
    app: AppDefinition,
    props: Option<serde_json::Value>,
) -> Result<Result<WindowState, DesktopError>, ractor::RactorErr<DesktopActorMsg>> {
    ractor::call!(desktop, |reply| DesktopActorMsg::OpenDefinition {
        app,
        props,
        reply,
    })
}

/// Convenience function to close a window
pub async fn close_window(
    desktop: &ActorRef<DesktopActorMsg>,
    window_id: impl Into<String>,
) -> Result<Result<(), DesktopError>, ractor::RactorErr<DesktopActorMsg>> {
    ractor::call!(desktop, |reply| DesktopActorMsg::CloseWindow {
        window_id: window_id.into(),
        reply,
    })
}

/// Convenience function to move a window
pub async fn move_window(
    desktop: &ActorRef<DesktopActorMsg>,
    window_id: impl Into<String>,
    x: i32,
    y: i32,
) -> Result<Result<WindowState, DesktopError>, ractor::RactorErr<DesktopActorMsg>> {
    ractor::call!(desktop, |reply| DesktopActorMsg::MoveWindow {
        window_id: window_id.into(),
        x,
        y,
        reply,
    })
}

/// Convenience function to resize a window
pub async fn resize_window(
    desktop: &ActorRef<DesktopActorMsg>,
    window_id: impl Into<String>,
    width: i32,
    height: i32,
) -> Result<Result<WindowState, DesktopError>, ractor::RactorErr<DesktopActorMsg>> {
    ractor::call!(desktop, |reply| DesktopActorMsg::ResizeWindow {
        window_id: window_id.into(),
        width,
        height,
        reply,
    })
}

/// Convenience function to focus a window
pub async fn focus_window(
    desktop: &ActorRef<DesktopActorMsg>,
    window_id: impl Into<String>,
) -> Result<Result<WindowState, DesktopError>, ractor::RactorErr<DesktopActorMsg>> {
    ractor::call!(desktop, |reply| DesktopActorMsg::FocusWindow {
        window_id: window_id.into(),
        reply,
    })
}

pub async fn toggle_maximize_window(
    desktop: &ActorRef<DesktopActorMsg>,
    window_id: impl Into<String>,
) -> Result<Result<WindowState, DesktopError>, ractor::RactorErr<DesktopActorMsg>> {
    ractor::call!(desktop, |reply| DesktopActorMsg::ToggleMaximize {
        window_id: window_id.into(),
        reply,
    })
}

pub async fn toggle_minimize_window(
    desktop: &ActorRef<DesktopActorMsg>,
    window_id: impl Into<String>,
) -> Result<Result<WindowState, DesktopError>, ractor::RactorErr<DesktopActorMsg>> {
    ractor::call!(desktop, |reply| DesktopActorMsg::ToggleMinimize {
        window_id: window_id.into(),
        reply,
    })
}

/// Convenience function to get desktop state
pub async fn get_desktop_state(
    desktop: &ActorRef<DesktopActorMsg>,
) -> Result<shared_types::DesktopState, ractor::RactorErr<DesktopActorMsg>> {
    ractor::call!(desktop, |reply| DesktopActorMsg::GetDesktopState { reply })
}

pub async fn get_app(
    desktop: &ActorRef<DesktopActorMsg>,
    app_id: impl Into<String>,
) -> Result<Option<AppDefinition>, ractor::RactorErr<DesktopActorMsg>> {
    ractor::call!(desktop, |reply| DesktopActorMsg::GetApp {
        app_id: app_id.into(),
        reply,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    async fn spawn_desktop(external_apps: Vec<InstalledApp>) -> ActorRef<DesktopActorMsg> {
        let (desktop, _handle) = Actor::spawn(
            None,
            DesktopActor,
            DesktopArguments {
                desktop_id: "desktop-1".to_string(),
                external_apps,
            },
        )
        .await
        .unwrap();
        desktop
    }

    async fn open(desktop: &ActorRef<DesktopActorMsg>, app_id: &str) -> WindowState {
        open_window(desktop, app_id, None, None)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_window_uses_app_defaults() {
        let desktop = spawn_desktop(Vec::new()).await;

        let window = open(&desktop, "notebook").await;
        assert_eq!(window.app_id, "notebook");
        assert_eq!(window.title, "Notebook");
        assert_eq!((window.x, window.y), DEFAULT_POSITION);
        assert_eq!((window.width, window.height), (600, 500));
        assert_eq!(window.z_index, FIRST_Z_INDEX);

        let state = get_desktop_state(&desktop).await.unwrap();
        assert_eq!(state.active_window.as_deref(), Some(window.id.as_str()));

        desktop.stop(None);
    }

    #[tokio::test]
    async fn test_open_unknown_app_fails() {
        let desktop = spawn_desktop(Vec::new()).await;
        let result = open_window(&desktop, "unknown", None, None).await.unwrap();
        assert!(matches!(result, Err(DesktopError::AppNotFound(_))));
        desktop.stop(None);
    }

    #[tokio::test]
    async fn test_single_instance_app_reuses_window() {
        let desktop = spawn_desktop(Vec::new()).await;

        let first = open(&desktop, "settings").await;
        let other = open(&desktop, "notebook").await;
        let again = open(&desktop, "settings").await;

        assert_eq!(first.id, again.id);
        let state = get_desktop_state(&desktop).await.unwrap();
        assert_eq!(state.windows.len(), 2);
        assert_eq!(state.active_window.as_deref(), Some(first.id.as_str()));
        assert_ne!(state.active_window.as_deref(), Some(other.id.as_str()));

        desktop.stop(None);
    }

    #[tokio::test]
    async fn test_multi_instance_app_opens_new_windows() {
        let desktop = spawn_desktop(Vec::new()).await;
        let a = open(&desktop, "terminus").await;
        let b = open(&desktop, "terminus").await;
        assert_ne!(a.id, b.id);
        assert_eq!(b.z_index, a.z_index + 1);
        desktop.stop(None);
    }

    #[tokio::test]
    async fn test_close_active_promotes_highest_z() {
        let desktop = spawn_desktop(Vec::new()).await;
        let a = open(&desktop, "notebook").await;
        let b = open(&desktop, "notebook").await;
        let c = open(&desktop, "notebook").await;

        focus_window(&desktop, &a.id).await.unwrap().unwrap();
        close_window(&desktop, &a.id).await.unwrap().unwrap();

        let state = get_desktop_state(&desktop).await.unwrap();
        assert_eq!(state.active_window.as_deref(), Some(c.id.as_str()));
        assert!(state.windows.iter().all(|w| w.id != a.id));
        assert!(state.windows.iter().any(|w| w.id == b.id));

        close_window(&desktop, &b.id).await.unwrap().unwrap();
        close_window(&desktop, &c.id).await.unwrap().unwrap();
        let state = get_desktop_state(&desktop).await.unwrap();
        assert!(state.active_window.is_none());

        let missing = close_window(&desktop, &a.id).await.unwrap();
        assert!(matches!(missing, Err(DesktopError::WindowNotFound(_))));

        desktop.stop(None);
    }

    #[tokio::test]
    async fn test_focus_active_window_keeps_z() {
        let desktop = spawn_desktop(Vec::new()).await;
        let a = open(&desktop, "notebook").await;
        let focused = focus_window(&desktop, &a.id).await.unwrap().unwrap();
        assert_eq!(focused.z_index, a.z_index);

        let b = open(&desktop, "notebook").await;
        let refocused = focus_window(&desktop, &a.id).await.unwrap().unwrap();
        assert!(refocused.z_index > b.z_index);

        desktop.stop(None);
    }

    #[tokio::test]
    async fn test_resize_clamps_to_minimum() {
        let desktop = spawn_desktop(Vec::new()).await;
        let a = open(&desktop, "notebook").await;
        let resized = resize_window(&desktop, &a.id, 10, 10).await.unwrap().unwrap();
        assert_eq!((resized.width, resized.height), (MIN_WINDOW_WIDTH, MIN_WINDOW_HEIGHT));

        let moved = move_window(&desktop, &a.id, -20, 300).await.unwrap().unwrap();
        assert_eq!((moved.x, moved.y), (-20, 300));
        desktop.stop(None);
    }

    #[tokio::test]
    async fn test_toggle_maximize_restores_bounds() {
        let desktop = spawn_desktop(Vec::new()).await;
        let a = open(&desktop, "notebook").await;
        move_window(&desktop, &a.id, 120, 80).await.unwrap().unwrap();

        let maximized = toggle_maximize_window(&desktop, &a.id).await.unwrap().unwrap();
        assert!(maximized.maximized);
        assert_eq!(
            maximized.restore_bounds,
            Some(WindowBounds {
                x: 120,
                y: 80,
                width: 600,
                height: 500
            })
        );

        let restored = toggle_maximize_window(&desktop, &a.id).await.unwrap().unwrap();
        assert!(!restored.maximized);
        assert_eq!((restored.x, restored.y), (120, 80));
        assert!(restored.restore_bounds.is_none());

        desktop.stop(None);
    }

    #[tokio::test]
    async fn test_minimize_hands_focus_to_top_visible_window() {
        let desktop = spawn_desktop(Vec::new()).await;
        let a = open(&desktop, "notebook").await;
        let b = open(&desktop, "notebook").await;
        let c = open(&desktop, "notebook").await;

        toggle_minimize_window(&desktop, &b.id).await.unwrap().unwrap();
        toggle_minimize_window(&desktop, &c.id).await.unwrap().unwrap();
        let state = get_desktop_state(&desktop).await.unwrap();
        assert_eq!(state.active_window.as_deref(), Some(a.id.as_str()));

        let restored = toggle_minimize_window(&desktop, &b.id).await.unwrap().unwrap();
        assert!(!restored.minimized);
        assert!(restored.z_index > c.z_index);
        let state = get_desktop_state(&desktop).await.unwrap();
        assert_eq!(state.active_window.as_deref(), Some(b.id.as_str()));
        assert_eq!(state.windows.last().map(|w| w.id.as_str()), Some(b.id.as_str()));

        desktop.stop(None);
    }

    #[tokio::test]
    async fn test_external_apps_join_catalog_but_do_not_open() {
        let paint = InstalledApp {
            id: "paint".to_string(),
            name: "Paint".to_string(),
            icon: "paint".to_string(),
            is_external: true,
            external_path: "apps/Paint/main.js".to_string(),
            version: "1.0.0".to_string(),
            description: String::new(),
        };
        let desktop = spawn_desktop(vec![paint.clone()]).await;

        let app = get_app(&desktop, "paint").await.unwrap().unwrap();
        assert!(app.is_external);

        let result = open_window(&desktop, "paint", None, None).await.unwrap();
        match result {
            Err(DesktopError::ExternalApp { external_path, .. }) => {
                assert_eq!(external_path.as_deref(), Some("apps/Paint/main.js"));
            }
            other => panic!("expected ExternalApp error, got {other:?}"),
        }

        desktop
            .cast(DesktopActorMsg::SetExternalApps { apps: Vec::new() })
            .unwrap();
        assert!(get_app(&desktop, "paint").await.unwrap().is_none());

        desktop.stop(None);
    }
}
