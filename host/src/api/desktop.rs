//! Desktop API endpoints
//!
//! Window management goes through the per-desktop `DesktopActor`. External
//! apps never become windows; opening one starts its process instead.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ractor::{ActorRef, RactorErr};
use serde::Deserialize;
use serde_json::json;
use shared_types::{AppDefinition, AppShortcut, FsItem, LinkShortcut, WindowState};

use crate::actors::desktop::{self as desktop_actor, DesktopActorMsg, DesktopError};
use crate::api::{api_error, error_response, success, ApiState, ErrorCode};
use crate::app_state::AppState;
use crate::vfs::VfsError;

const FILE_EXPLORER_APP: &str = "fileExplorer";
const NOTEBOOK_APP: &str = "notebook";

async fn get_desktop_actor(
    app_state: &Arc<AppState>,
    desktop_id: &str,
) -> Result<ActorRef<DesktopActorMsg>, Response> {
    app_state
        .get_or_create_desktop(desktop_id)
        .await
        .map_err(|e| api_error(ErrorCode::InternalError, format!("Failed to get desktop: {e}")))
}

fn actor_failure(e: RactorErr<DesktopActorMsg>) -> Response {
    tracing::error!(error = %e, "Desktop actor call failed");
    api_error(ErrorCode::InternalError, format!("Actor error: {e}"))
}

fn window_response(
    result: Result<Result<WindowState, DesktopError>, RactorErr<DesktopActorMsg>>,
) -> Response {
    match result {
        Ok(Ok(window)) => success(json!({ "window": window })),
        Ok(Err(e)) => error_response(e),
        Err(e) => actor_failure(e),
    }
}

/// Request to open a window
#[derive(Debug, Deserialize)]
pub struct OpenWindowRequest {
    pub app_id: String,
    pub title: Option<String>,
    pub props: Option<serde_json::Value>,
}

/// Request to move a window
#[derive(Debug, Deserialize)]
pub struct MoveWindowRequest {
    pub x: i32,
    pub y: i32,
}

/// Request to resize a window
#[derive(Debug, Deserialize)]
pub struct ResizeWindowRequest {
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Deserialize)]
pub struct OpenItemRequest {
    pub item: FsItem,
}

/// GET /api/desktop/{desktop_id}
pub async fn get_desktop_state(
    Path(desktop_id): Path<String>,
    State(state): State<ApiState>,
) -> Response {
    let desktop = match get_desktop_actor(&state.app_state, &desktop_id).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match desktop_actor::get_desktop_state(&desktop).await {
        Ok(desktop_state) => (
            StatusCode::OK,
            Json(json!({ "success": true, "desktop": desktop_state })),
        )
            .into_response(),
        Err(e) => actor_failure(e),
    }
}

/// POST /api/desktop/{desktop_id}/windows
pub async fn open_window(
    Path(desktop_id): Path<String>,
    State(state): State<ApiState>,
    Json(req): Json<OpenWindowRequest>,
) -> Response {
    let app_state = state.app_state.clone();
    let desktop = match get_desktop_actor(&app_state, &desktop_id).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    let result = desktop_actor::open_window(&desktop, req.app_id, req.title, req.props).await;
    open_or_launch(&app_state, result).await
}

/// POST /api/desktop/{desktop_id}/open-item
pub async fn open_item(
    Path(desktop_id): Path<String>,
    State(state): State<ApiState>,
    Json(req): Json<OpenItemRequest>,
) -> Response {
    let app_state = state.app_state.clone();
    let desktop = match get_desktop_actor(&app_state, &desktop_id).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };

    let item = match resolve_link(&app_state, req.item).await {
        Ok(item) => item,
        Err(e) => return error_response(e),
    };

    if item.kind.is_folder() {
        let result = desktop_actor::open_window(
            &desktop,
            FILE_EXPLORER_APP,
            None,
            Some(json!({ "initialPath": item.path })),
        )
        .await;
        return open_or_launch(&app_state, result).await;
    }

    if item.name.ends_with(".app") {
        let shortcut = match app_state.vfs.read_app_file(&item.path).await {
            Ok(shortcut) => shortcut,
            Err(e) => return error_response(e),
        };
        let base = match desktop_actor::get_app(&desktop, shortcut.app_id.clone()).await {
            Ok(base) => base,
            Err(e) => return actor_failure(e),
        };
        let app = match merge_shortcut(base, shortcut) {
            Ok(app) => app,
            Err(e) => return error_response(e),
        };
        let result = desktop_actor::open_definition(&desktop, app, None).await;
        return open_or_launch(&app_state, result).await;
    }

    let result = desktop_actor::open_window(
        &desktop,
        NOTEBOOK_APP,
        None,
        Some(json!({ "filePath": item.path })),
    )
    .await;
    open_or_launch(&app_state, result).await
}

/// DELETE /api/desktop/{desktop_id}/windows/{window_id}
pub async fn close_window(
    Path((desktop_id, window_id)): Path<(String, String)>,
    State(state): State<ApiState>,
) -> Response {
    let desktop = match get_desktop_actor(&state.app_state, &desktop_id).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match desktop_actor::close_window(&desktop, window_id).await {
        Ok(Ok(())) => success(json!({})),
        Ok(Err(e)) => error_response(e),
        Err(e) => actor_failure(e),
    }
}

/// PATCH /api/desktop/{desktop_id}/windows/{window_id}/position
pub async fn move_window(
    Path((desktop_id, window_id)): Path<(String, String)>,
    State(state): State<ApiState>,
    Json(req): Json<MoveWindowRequest>,
) -> Response {
    let desktop = match get_desktop_actor(&state.app_state, &desktop_id).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    window_response(desktop_actor::move_window(&desktop, window_id, req.x, req.y).await)
}

/// PATCH /api/desktop/{desktop_id}/windows/{window_id}/size
pub async fn resize_window(
    Path((desktop_id, window_id)): Path<(String, String)>,
    State(state): State<ApiState>,
    Json(req): Json<ResizeWindowRequest>,
) -> Response {
    let desktop = match get_desktop_actor(&state.app_state, &desktop_id).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    window_response(
        desktop_actor::resize_window(&desktop, window_id, req.width, req.height).await,
    )
}

/// POST /api/desktop/{desktop_id}/windows/{window_id}/focus
pub async fn focus_window(
    Path((desktop_id, window_id)): Path<(String, String)>,
    State(state): State<ApiState>,
) -> Response {
    let desktop = match get_desktop_actor(&state.app_state, &desktop_id).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    window_response(desktop_actor::focus_window(&desktop, window_id).await)
}

/// POST /api/desktop/{desktop_id}/windows/{window_id}/maximize
pub async fn maximize_window(
    Path((desktop_id, window_id)): Path<(String, String)>,
    State(state): State<ApiState>,
) -> Response {
    let desktop = match get_desktop_actor(&state.app_state, &desktop_id).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    window_response(desktop_actor::toggle_maximize_window(&desktop, window_id).await)
}

/// POST /api/desktop/{desktop_id}/windows/{window_id}/minimize
pub async fn minimize_window(
    Path((desktop_id, window_id)): Path<(String, String)>,
    State(state): State<ApiState>,
) -> Response {
    let desktop = match get_desktop_actor(&state.app_state, &desktop_id).await {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    window_response(desktop_actor::toggle_minimize_window(&desktop, window_id).await)
}

// ============================================================================
// Helpers
// ============================================================================

/// Turn an open result into a response, launching external apps.
async fn open_or_launch(
    app_state: &AppState,
    result: Result<Result<WindowState, DesktopError>, RactorErr<DesktopActorMsg>>,
) -> Response {
    match result {
        Ok(Err(DesktopError::ExternalApp {
            app_id,
            external_path: Some(external_path),
        })) => match app_state.launcher.launch(&external_path, &[]).await {
            Ok(launched) => {
                tracing::info!(app_id = %app_id, pid = ?launched.pid, "External app launched from desktop");
                success(json!({ "window": null, "launched": launched }))
            }
            Err(e) => error_response(e),
        },
        other => window_response(other),
    }
}

/// Replace a `.lnk` file with the item it points at.
async fn resolve_link(app_state: &AppState, item: FsItem) -> Result<FsItem, VfsError> {
    if item.kind.is_folder() || !item.name.ends_with(".lnk") {
        return Ok(item);
    }
    let file = app_state.vfs.read_text(&item.path).await?;
    let link: LinkShortcut =
        serde_json::from_str(&file.content).map_err(|e| VfsError::InvalidShortcut {
            path: item.path.clone(),
            reason: e.to_string(),
        })?;
    let name = link
        .target
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();
    Ok(FsItem {
        name,
        path: link.target,
        kind: link.kind,
        content: None,
    })
}

/// Apply the fields of a `.app` shortcut over the catalog definition.
fn merge_shortcut(
    base: Option<AppDefinition>,
    shortcut: AppShortcut,
) -> Result<AppDefinition, DesktopError> {
    let mut app = match base {
        Some(base) => base,
        None if shortcut.is_external == Some(true) => AppDefinition {
            id: shortcut.app_id.clone(),
            name: shortcut.app_id.clone(),
            icon: shortcut.app_id.clone(),
            default_width: 0,
            default_height: 0,
            allow_multiple_instances: false,
            file_extensions: Vec::new(),
            is_external: true,
            external_path: None,
        },
        None => return Err(DesktopError::AppNotFound(shortcut.app_id)),
    };
    if let Some(name) = shortcut.name {
        app.name = name;
    }
    if let Some(icon) = shortcut.icon {
        app.icon = icon;
    }
    if let Some(is_external) = shortcut.is_external {
        app.is_external = is_external;
    }
    if shortcut.external_path.is_some() {
        app.external_path = shortcut.external_path;
    }
    Ok(app)
}
