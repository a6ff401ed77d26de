//! HTTP API routes for the WebDesk host
//!
//! One router serves the filesystem and app APIs, the desktop window manager
//! and the two WebSocket relays.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

pub mod apps;
pub mod desktop;
pub mod files;
pub mod sftp;
pub mod system;
pub mod terminal;

use crate::actors::desktop::DesktopError;
use crate::app_state::AppState;
use crate::launcher::LaunchError;
use crate::registry::RegistryError;
use crate::vfs::VfsError;

#[derive(Clone)]
pub struct ApiState {
    pub app_state: Arc<AppState>,
}

impl ApiState {
    pub fn new(app_state: Arc<AppState>) -> Self {
        Self { app_state }
    }
}

/// Configure all API routes
pub fn router() -> Router<ApiState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/os-user", get(system::os_user))
        .route("/api/proxy", get(system::proxy))
        .route("/api/sessions", get(system::list_sessions))
        // App registry routes
        .route("/api/apps", get(apps::list_available))
        .route("/api/apps/external", get(apps::list_installed))
        .route("/api/apps/external/{app_id}", delete(apps::uninstall))
        .route("/api/install", post(apps::install))
        .route(
            "/api/launch",
            get(apps::list_launched).post(apps::launch),
        )
        .route(
            "/api/pinned-apps",
            get(apps::get_pinned).post(apps::set_pinned),
        )
        // Filesystem routes
        .route("/api/fs/list", get(files::list_directory))
        .route("/api/fs/read", get(files::read_file))
        .route("/api/fs/read-base64", get(files::read_file_base64))
        .route("/api/fs/download", get(files::download_file))
        .route("/api/fs/read-app", get(files::read_app_file))
        .route("/api/fs/save", post(files::save_file))
        .route("/api/fs/find-unique-name", post(files::find_unique_name))
        .route("/api/fs/create-folder", post(files::create_folder))
        .route("/api/fs/create-file", post(files::create_file))
        .route("/api/fs/create-shortcut", post(files::create_shortcut))
        .route("/api/fs/create-link", post(files::create_link))
        .route("/api/fs/delete", post(files::delete_item))
        .route("/api/fs/rename", post(files::rename_item))
        .route("/api/fs/move", post(files::move_item))
        .route("/api/fs/copy", post(files::copy_item))
        // Desktop routes
        .route("/api/desktop/{desktop_id}", get(desktop::get_desktop_state))
        .route("/api/desktop/{desktop_id}/windows", post(desktop::open_window))
        .route(
            "/api/desktop/{desktop_id}/open-item",
            post(desktop::open_item),
        )
        .route(
            "/api/desktop/{desktop_id}/windows/{window_id}",
            delete(desktop::close_window),
        )
        .route(
            "/api/desktop/{desktop_id}/windows/{window_id}/position",
            patch(desktop::move_window),
        )
        .route(
            "/api/desktop/{desktop_id}/windows/{window_id}/size",
            patch(desktop::resize_window),
        )
        .route(
            "/api/desktop/{desktop_id}/windows/{window_id}/focus",
            post(desktop::focus_window),
        )
        .route(
            "/api/desktop/{desktop_id}/windows/{window_id}/maximize",
            post(desktop::maximize_window),
        )
        .route(
            "/api/desktop/{desktop_id}/windows/{window_id}/minimize",
            post(desktop::minimize_window),
        )
        // WebSocket relays
        .route("/ws/terminus", get(terminal::terminus_websocket))
        .route("/ws/sftp", get(sftp::sftp_websocket))
}

/// Health check endpoint
pub async fn health_check(State(_state): State<ApiState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "webdesk-host",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

// ============================================================================
// Error responses
// ============================================================================

/// Error codes for machine-readable error responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    PathTraversal,
    NotFound,
    NotAFile,
    NotADirectory,
    AlreadyExists,
    PermissionDenied,
    InvalidRequest,
    InvalidShortcut,
    BadGateway,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::PathTraversal => "PATH_TRAVERSAL",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::NotAFile => "NOT_A_FILE",
            ErrorCode::NotADirectory => "NOT_A_DIRECTORY",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::InvalidShortcut => "INVALID_SHORTCUT",
            ErrorCode::BadGateway => "BAD_GATEWAY",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::PathTraversal => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::NotAFile => StatusCode::BAD_REQUEST,
            ErrorCode::NotADirectory => StatusCode::BAD_REQUEST,
            ErrorCode::AlreadyExists => StatusCode::CONFLICT,
            ErrorCode::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorCode::InvalidShortcut => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::BadGateway => StatusCode::BAD_GATEWAY,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    code: String,
    message: String,
}

/// Create an error response
pub fn api_error(code: ErrorCode, message: impl Into<String>) -> Response {
    let body = Json(ErrorResponse {
        error: ErrorDetail {
            code: code.as_str().to_string(),
            message: message.into(),
        },
    });
    (code.status_code(), body).into_response()
}

/// `{"success": true}` plus any extra fields
pub fn success(extra: serde_json::Value) -> Response {
    let mut body = json!({ "success": true });
    if let (Some(body), serde_json::Value::Object(extra)) = (body.as_object_mut(), extra) {
        body.extend(extra);
    }
    (StatusCode::OK, Json(body)).into_response()
}

impl From<&VfsError> for ErrorCode {
    fn from(e: &VfsError) -> Self {
        match e {
            VfsError::PathTraversal(_) => ErrorCode::PathTraversal,
            VfsError::NotFound(_) => ErrorCode::NotFound,
            VfsError::NotAFile(_) => ErrorCode::NotAFile,
            VfsError::NotADirectory(_) => ErrorCode::NotADirectory,
            VfsError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            VfsError::InvalidName(_) => ErrorCode::InvalidRequest,
            VfsError::InvalidShortcut { .. } => ErrorCode::InvalidShortcut,
            VfsError::Io(io) if io.kind() == std::io::ErrorKind::PermissionDenied => {
                ErrorCode::PermissionDenied
            }
            VfsError::Io(_) => ErrorCode::InternalError,
        }
    }
}

impl From<&RegistryError> for ErrorCode {
    fn from(e: &RegistryError) -> Self {
        match e {
            RegistryError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            RegistryError::AlreadyInstalled(_) => ErrorCode::AlreadyExists,
            RegistryError::NotInstalled(_) => ErrorCode::NotFound,
            RegistryError::Corrupt(_) | RegistryError::Io(_) => ErrorCode::InternalError,
        }
    }
}

impl From<&LaunchError> for ErrorCode {
    fn from(e: &LaunchError) -> Self {
        match e {
            LaunchError::MissingPath => ErrorCode::InvalidRequest,
            LaunchError::PathEscapes(_) => ErrorCode::PathTraversal,
            LaunchError::NotFound(_) => ErrorCode::NotFound,
            LaunchError::Spawn { .. } => ErrorCode::InternalError,
        }
    }
}

impl From<&DesktopError> for ErrorCode {
    fn from(e: &DesktopError) -> Self {
        match e {
            DesktopError::WindowNotFound(_) | DesktopError::AppNotFound(_) => ErrorCode::NotFound,
            DesktopError::ExternalApp { .. } => ErrorCode::InvalidRequest,
        }
    }
}

/// Map a domain error onto its JSON error response, logging server faults.
pub fn error_response<E>(e: E) -> Response
where
    E: std::fmt::Display,
    for<'a> &'a E: Into<ErrorCode>,
{
    let code: ErrorCode = (&e).into();
    if code == ErrorCode::InternalError {
        tracing::error!(error = %e, "Request failed");
    }
    api_error(code, e.to_string())
}
