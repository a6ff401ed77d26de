//! Filesystem API endpoints
//!
//! Thin HTTP layer over [`VirtualFs`](crate::vfs::VirtualFs). All paths are
//! relative to the virtual filesystem root and validated there.

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use shared_types::FsItem;

use crate::api::{api_error, error_response, success, ApiState, ErrorCode};

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    #[serde(default)]
    pub path: String,
}

fn required_path(query: &PathQuery) -> Result<&str, Response> {
    if query.path.trim().is_empty() {
        return Err(api_error(ErrorCode::InvalidRequest, "Missing path parameter"));
    }
    Ok(&query.path)
}

/// GET /api/fs/list - directory listing, folders first
pub async fn list_directory(
    State(state): State<ApiState>,
    Query(query): Query<PathQuery>,
) -> Response {
    let path = if query.path.is_empty() { "/" } else { &query.path };
    match state.app_state.vfs.list(path).await {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/fs/read - text content
pub async fn read_file(State(state): State<ApiState>, Query(query): Query<PathQuery>) -> Response {
    let path = match required_path(&query) {
        Ok(path) => path,
        Err(response) => return response,
    };
    match state.app_state.vfs.read_text(path).await {
        Ok(file) => (StatusCode::OK, Json(file)).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/fs/read-base64 - binary content as base64
pub async fn read_file_base64(
    State(state): State<ApiState>,
    Query(query): Query<PathQuery>,
) -> Response {
    let path = match required_path(&query) {
        Ok(path) => path,
        Err(response) => return response,
    };
    match state.app_state.vfs.read_base64(path).await {
        Ok(file) => (StatusCode::OK, Json(file)).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/fs/download - raw bytes as an attachment
pub async fn download_file(
    State(state): State<ApiState>,
    Query(query): Query<PathQuery>,
) -> Response {
    let path = match required_path(&query) {
        Ok(path) => path,
        Err(response) => return response,
    };
    match state.app_state.vfs.read_bytes(path).await {
        Ok((name, bytes)) => {
            let disposition = format!("attachment; filename=\"{}\"", name.replace('"', "'"));
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET /api/fs/read-app - parsed `.app` shortcut
pub async fn read_app_file(
    State(state): State<ApiState>,
    Query(query): Query<PathQuery>,
) -> Response {
    let path = match required_path(&query) {
        Ok(path) => path,
        Err(response) => return response,
    };
    match state.app_state.vfs.read_app_file(path).await {
        Ok(shortcut) => (StatusCode::OK, Json(shortcut)).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct SaveRequest {
    pub path: String,
    #[serde(default)]
    pub content: String,
}

/// POST /api/fs/save
pub async fn save_file(State(state): State<ApiState>, Json(req): Json<SaveRequest>) -> Response {
    match state.app_state.vfs.save(&req.path, &req.content).await {
        Ok(()) => {
            tracing::debug!(path = %req.path, bytes = req.content.len(), "File saved");
            success(json!({}))
        }
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindUniqueNameRequest {
    pub destination_path: String,
    pub base_name: String,
    #[serde(default)]
    pub is_folder: bool,
    #[serde(default)]
    pub extension: String,
}

/// POST /api/fs/find-unique-name
pub async fn find_unique_name(
    State(state): State<ApiState>,
    Json(req): Json<FindUniqueNameRequest>,
) -> Response {
    match state
        .app_state
        .vfs
        .find_unique_name(
            &req.destination_path,
            &req.base_name,
            req.is_folder,
            &req.extension,
        )
        .await
    {
        Ok(name) => (StatusCode::OK, Json(json!({ "name": name }))).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub path: String,
    pub name: String,
}

/// POST /api/fs/create-folder
pub async fn create_folder(
    State(state): State<ApiState>,
    Json(req): Json<CreateFolderRequest>,
) -> Response {
    match state.app_state.vfs.create_folder(&req.path, &req.name).await {
        Ok(path) => success(json!({ "path": path })),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateFileRequest {
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
}

/// POST /api/fs/create-file
pub async fn create_file(
    State(state): State<ApiState>,
    Json(req): Json<CreateFileRequest>,
) -> Response {
    match state
        .app_state
        .vfs
        .create_file(&req.path, &req.name, &req.content)
        .await
    {
        Ok(path) => success(json!({ "path": path })),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateShortcutRequest {
    pub app_id: String,
    pub app_name: String,
}

/// POST /api/fs/create-shortcut - `.app` file on the desktop
pub async fn create_shortcut(
    State(state): State<ApiState>,
    Json(req): Json<CreateShortcutRequest>,
) -> Response {
    if req.app_id.trim().is_empty() || req.app_name.trim().is_empty() {
        return api_error(ErrorCode::InvalidRequest, "appId and appName are required");
    }
    match state
        .app_state
        .vfs
        .create_shortcut(&req.app_id, &req.app_name)
        .await
    {
        Ok(path) => success(json!({ "path": path })),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkRequest {
    pub target_path: String,
}

/// POST /api/fs/create-link - `.lnk` file next to the target
pub async fn create_link(
    State(state): State<ApiState>,
    Json(req): Json<CreateLinkRequest>,
) -> Response {
    match state.app_state.vfs.create_link(&req.target_path).await {
        Ok(path) => success(json!({ "path": path })),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    pub item: FsItem,
}

/// POST /api/fs/delete
pub async fn delete_item(
    State(state): State<ApiState>,
    Json(req): Json<DeleteRequest>,
) -> Response {
    match state.app_state.vfs.delete(&req.item).await {
        Ok(()) => {
            tracing::info!(path = %req.item.path, "Item deleted");
            success(json!({}))
        }
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    pub item: FsItem,
    pub new_name: String,
}

/// POST /api/fs/rename
pub async fn rename_item(
    State(state): State<ApiState>,
    Json(req): Json<RenameRequest>,
) -> Response {
    match state.app_state.vfs.rename(&req.item, &req.new_name).await {
        Ok(path) => success(json!({ "path": path })),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub source_item: FsItem,
    pub destination_path: String,
}

/// POST /api/fs/move
pub async fn move_item(
    State(state): State<ApiState>,
    Json(req): Json<TransferRequest>,
) -> Response {
    match state
        .app_state
        .vfs
        .move_item(&req.source_item, &req.destination_path)
        .await
    {
        Ok(path) => success(json!({ "path": path })),
        Err(e) => error_response(e),
    }
}

/// POST /api/fs/copy
pub async fn copy_item(
    State(state): State<ApiState>,
    Json(req): Json<TransferRequest>,
) -> Response {
    match state
        .app_state
        .vfs
        .copy_item(&req.source_item, &req.destination_path)
        .await
    {
        Ok(path) => success(json!({ "path": path })),
        Err(e) => error_response(e),
    }
}
