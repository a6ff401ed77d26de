//! App registry, launcher and pinned-app endpoints

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::{api_error, error_response, success, ApiState, ErrorCode};
use crate::registry::InstallRequest;

/// GET /api/apps - apps found in the apps directory
pub async fn list_available(State(state): State<ApiState>) -> Response {
    match state.app_state.registry.discover_available().await {
        Ok(apps) => (StatusCode::OK, Json(apps)).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/apps/external - installed external apps
pub async fn list_installed(State(state): State<ApiState>) -> Response {
    match state.app_state.registry.installed().await {
        Ok(apps) => (StatusCode::OK, Json(apps)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/install
pub async fn install(State(state): State<ApiState>, Json(req): Json<InstallRequest>) -> Response {
    let app_state = state.app_state.clone();
    match app_state.registry.install(req).await {
        Ok(app) => {
            tracing::info!(app_id = %app.id, "External app installed");
            app_state.refresh_desktop_apps().await;
            (
                StatusCode::CREATED,
                Json(json!({
                    "success": true,
                    "message": format!("App \"{}\" installed.", app.name),
                    "app": app,
                })),
            )
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

/// DELETE /api/apps/external/{app_id}
pub async fn uninstall(State(state): State<ApiState>, Path(app_id): Path<String>) -> Response {
    let app_state = state.app_state.clone();
    match app_state.registry.uninstall(&app_id).await {
        Ok(app) => {
            tracing::info!(app_id = %app.id, "External app uninstalled");
            app_state.refresh_desktop_apps().await;
            success(json!({ "app": app }))
        }
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LaunchRequest {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// POST /api/launch - start an external app process
pub async fn launch(State(state): State<ApiState>, Json(req): Json<LaunchRequest>) -> Response {
    match state.app_state.launcher.launch(&req.path, &req.args).await {
        Ok(app) => success(json!({
            "message": "App launch initiated.",
            "app": app,
        })),
        Err(e) => error_response(e),
    }
}

/// GET /api/launch - processes still running
pub async fn list_launched(State(state): State<ApiState>) -> Response {
    let running = state.app_state.launcher.running().await;
    (StatusCode::OK, Json(running)).into_response()
}

/// GET /api/pinned-apps - bare array of app ids
pub async fn get_pinned(State(state): State<ApiState>) -> Response {
    match state.app_state.registry.pinned().await {
        Ok(ids) => (StatusCode::OK, Json(ids)).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/pinned-apps - replace the pinned list
pub async fn set_pinned(State(state): State<ApiState>, Json(body): Json<Value>) -> Response {
    let ids = match parse_pinned_ids(&body) {
        Some(ids) => ids,
        None => {
            return api_error(
                ErrorCode::InvalidRequest,
                "Invalid payload: pinnedAppIds must be an array of strings",
            )
        }
    };
    match state.app_state.registry.set_pinned(ids).await {
        Ok(ids) => success(json!({ "pinnedAppIds": ids })),
        Err(e) => error_response(e),
    }
}

fn parse_pinned_ids(body: &Value) -> Option<Vec<String>> {
    body.get("pinnedAppIds")?
        .as_array()?
        .iter()
        .map(|id| id.as_str().map(str::to_string))
        .collect()
}
