//! Desktop API Integration Tests
//!
//! Window management through HTTP, including opening filesystem items.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use webdesk_host::api;
use webdesk_host::app_state::AppState;
use webdesk_host::config::Config;

async fn setup_test_app() -> (axum::Router, Arc<AppState>, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let mut config = Config::for_root(temp_dir.path());
    config.app_runtime = "true".to_string();
    std::fs::create_dir_all(config.apps_dir.join("Paint")).unwrap();
    std::fs::write(config.apps_dir.join("Paint/main.js"), "").unwrap();

    let app_state = Arc::new(AppState::new(config));
    app_state.vfs.ensure_layout(None).await.unwrap();
    let app = api::router().with_state(api::ApiState::new(app_state.clone()));
    (app, app_state, temp_dir)
}

async fn json_response(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.expect("Request failed");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    let value: Value = serde_json::from_slice(&body).expect("Invalid JSON response");
    (status, value)
}

fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn open(app: &axum::Router, app_id: &str) -> Value {
    let (status, body) = json_response(
        app,
        request(
            "POST",
            "/api/desktop/test/windows",
            Some(json!({ "app_id": app_id })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "open {app_id}: {body}");
    body["window"].clone()
}

async fn desktop_state(app: &axum::Router) -> Value {
    let (status, body) = json_response(app, request("GET", "/api/desktop/test", None)).await;
    assert_eq!(status, StatusCode::OK);
    body["desktop"].clone()
}

#[tokio::test]
async fn test_get_desktop_state_empty() {
    let (app, _state, _temp_dir) = setup_test_app().await;

    let desktop = desktop_state(&app).await;
    assert_eq!(desktop["windows"], json!([]));
    assert!(desktop["active_window"].is_null());
    let ids: Vec<&str> = desktop["apps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["id"].as_str().unwrap())
        .collect();
    assert!(ids.contains(&"fileExplorer"));
    assert!(ids.contains(&"terminus"));
}

#[tokio::test]
async fn test_open_window_defaults() {
    let (app, _state, _temp_dir) = setup_test_app().await;

    let window = open(&app, "terminus").await;
    assert_eq!(window["app_id"], "terminus");
    assert_eq!(window["title"], "Terminus SSH");
    assert_eq!(window["x"], 50);
    assert_eq!(window["y"], 50);
    assert_eq!(window["width"], 800);
    assert_eq!(window["height"], 500);
    assert_eq!(window["z_index"], 10);

    let desktop = desktop_state(&app).await;
    assert_eq!(desktop["active_window"], window["id"]);
}

#[tokio::test]
async fn test_single_instance_app_reuses_window() {
    let (app, _state, _temp_dir) = setup_test_app().await;

    let first = open(&app, "settings").await;
    let _other = open(&app, "terminus").await;
    let second = open(&app, "settings").await;
    assert_eq!(first["id"], second["id"]);

    let desktop = desktop_state(&app).await;
    assert_eq!(desktop["windows"].as_array().unwrap().len(), 2);
    assert_eq!(desktop["active_window"], first["id"]);
}

#[tokio::test]
async fn test_multi_instance_app_opens_new_windows() {
    let (app, _state, _temp_dir) = setup_test_app().await;

    let first = open(&app, "notebook").await;
    let second = open(&app, "notebook").await;
    assert_ne!(first["id"], second["id"]);
    assert_eq!(second["z_index"], 11);
}

#[tokio::test]
async fn test_open_unknown_app() {
    let (app, _state, _temp_dir) = setup_test_app().await;

    let (status, body) = json_response(
        &app,
        request(
            "POST",
            "/api/desktop/test/windows",
            Some(json!({ "app_id": "nope" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_close_promotes_highest_window() {
    let (app, _state, _temp_dir) = setup_test_app().await;

    let a = open(&app, "notebook").await;
    let b = open(&app, "terminus").await;
    let c = open(&app, "settings").await;

    let uri = format!("/api/desktop/test/windows/{}", c["id"].as_str().unwrap());
    let (status, _) = json_response(&app, request("DELETE", &uri, None)).await;
    assert_eq!(status, StatusCode::OK);

    let desktop = desktop_state(&app).await;
    assert_eq!(desktop["active_window"], b["id"]);
    assert_eq!(desktop["windows"].as_array().unwrap().len(), 2);
    let _ = a;

    let (status, _) = json_response(&app, request("DELETE", &uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_move_resize_and_focus() {
    let (app, _state, _temp_dir) = setup_test_app().await;

    let a = open(&app, "notebook").await;
    let _b = open(&app, "terminus").await;
    let id = a["id"].as_str().unwrap();

    let (status, body) = json_response(
        &app,
        request(
            "PATCH",
            &format!("/api/desktop/test/windows/{id}/position"),
            Some(json!({ "x": 120, "y": 80 })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["window"]["x"], 120);
    assert_eq!(body["window"]["y"], 80);

    let (_, body) = json_response(
        &app,
        request(
            "PATCH",
            &format!("/api/desktop/test/windows/{id}/size"),
            Some(json!({ "width": 50, "height": 900 })),
        ),
    )
    .await;
    assert_eq!(body["window"]["width"], 200);
    assert_eq!(body["window"]["height"], 900);

    let (status, body) = json_response(
        &app,
        request("POST", &format!("/api/desktop/test/windows/{id}/focus"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["window"]["z_index"], 12);
    assert_eq!(desktop_state(&app).await["active_window"], a["id"]);
}

#[tokio::test]
async fn test_maximize_and_minimize() {
    let (app, _state, _temp_dir) = setup_test_app().await;

    let a = open(&app, "notebook").await;
    let b = open(&app, "terminus").await;
    let b_id = b["id"].as_str().unwrap();

    let (_, body) = json_response(
        &app,
        request(
            "POST",
            &format!("/api/desktop/test/windows/{b_id}/maximize"),
            None,
        ),
    )
    .await;
    assert_eq!(body["window"]["maximized"], true);

    let (_, body) = json_response(
        &app,
        request(
            "POST",
            &format!("/api/desktop/test/windows/{b_id}/maximize"),
            None,
        ),
    )
    .await;
    assert_eq!(body["window"]["maximized"], false);
    assert_eq!(body["window"]["x"], 50);
    assert_eq!(body["window"]["width"], 800);

    let (_, body) = json_response(
        &app,
        request(
            "POST",
            &format!("/api/desktop/test/windows/{b_id}/minimize"),
            None,
        ),
    )
    .await;
    assert_eq!(body["window"]["minimized"], true);
    assert_eq!(desktop_state(&app).await["active_window"], a["id"]);
}

// ============================================================================
// open-item
// ============================================================================

#[tokio::test]
async fn test_open_item_folder_and_file() {
    let (app, _state, temp_dir) = setup_test_app().await;
    std::fs::write(temp_dir.path().join("virtual-fs/Documents/notes.txt"), "n").unwrap();

    let (status, body) = json_response(
        &app,
        request(
            "POST",
            "/api/desktop/test/open-item",
            Some(json!({ "item": { "name": "Documents", "path": "/Documents", "type": "folder" } })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["window"]["app_id"], "fileExplorer");
    assert_eq!(body["window"]["title"], "File Explorer");
    assert_eq!(body["window"]["props"]["initialPath"], "/Documents");

    let (status, body) = json_response(
        &app,
        request(
            "POST",
            "/api/desktop/test/open-item",
            Some(json!({ "item": { "name": "notes.txt", "path": "/Documents/notes.txt", "type": "file" } })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["window"]["app_id"], "notebook");
    assert_eq!(body["window"]["title"], "Notebook");
    assert_eq!(body["window"]["props"]["filePath"], "/Documents/notes.txt");
}

#[tokio::test]
async fn test_open_item_app_shortcut() {
    let (app, _state, temp_dir) = setup_test_app().await;
    std::fs::write(
        temp_dir.path().join("virtual-fs/Desktop/Settings.app"),
        r#"{"appId":"settings","name":"Control Panel"}"#,
    )
    .unwrap();
    std::fs::write(
        temp_dir.path().join("virtual-fs/Desktop/Ghost.app"),
        r#"{"appId":"ghost"}"#,
    )
    .unwrap();

    let (status, body) = json_response(
        &app,
        request(
            "POST",
            "/api/desktop/test/open-item",
            Some(json!({ "item": { "name": "Settings.app", "path": "/Desktop/Settings.app", "type": "file" } })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["window"]["app_id"], "settings");
    assert_eq!(body["window"]["title"], "Control Panel");

    let (status, _) = json_response(
        &app,
        request(
            "POST",
            "/api/desktop/test/open-item",
            Some(json!({ "item": { "name": "Ghost.app", "path": "/Desktop/Ghost.app", "type": "file" } })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_open_item_follows_link() {
    let (app, _state, _temp_dir) = setup_test_app().await;

    let (status, body) = json_response(
        &app,
        request(
            "POST",
            "/api/fs/create-link",
            Some(json!({ "targetPath": "/Downloads" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let link_path = body["path"].as_str().unwrap().to_string();
    assert_eq!(link_path, "/Downloads - Shortcut.lnk");

    let (status, body) = json_response(
        &app,
        request(
            "POST",
            "/api/desktop/test/open-item",
            Some(json!({ "item": { "name": "Downloads - Shortcut.lnk", "path": link_path, "type": "file" } })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["window"]["app_id"], "fileExplorer");
    assert_eq!(body["window"]["props"]["initialPath"], "/Downloads");
}

#[cfg(unix)]
#[tokio::test]
async fn test_open_external_app_launches_instead_of_window() {
    let (app, app_state, _temp_dir) = setup_test_app().await;

    let (status, _) = json_response(
        &app,
        request(
            "POST",
            "/api/install",
            Some(json!({ "id": "paint", "name": "Paint", "path": "apps/Paint" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = json_response(
        &app,
        request(
            "POST",
            "/api/desktop/fresh/windows",
            Some(json!({ "app_id": "paint" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["window"].is_null());
    assert_eq!(body["launched"]["path"], "apps/Paint/main.js");

    let (_, body) = json_response(&app, request("GET", "/api/desktop/fresh", None)).await;
    assert_eq!(body["desktop"]["windows"], json!([]));

    app_state.shutdown().await;
}

#[tokio::test]
async fn test_least_recently_used_desktop_is_evicted() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let mut config = Config::for_root(temp_dir.path());
    config.max_desktops = 2;
    let app_state = AppState::new(config);

    let first = app_state.get_or_create_desktop("first").await.unwrap();
    let second = app_state.get_or_create_desktop("second").await.unwrap();
    // Using "first" again leaves "second" as the oldest.
    app_state.get_or_create_desktop("first").await.unwrap();
    app_state.get_or_create_desktop("third").await.unwrap();

    let mut stopped = false;
    for _ in 0..40 {
        if second.get_status() == ractor::ActorStatus::Stopped {
            stopped = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }
    assert!(stopped, "oldest desktop should be stopped");
    assert!(webdesk_host::actors::desktop::get_desktop_state(&first)
        .await
        .is_ok());

    // An evicted id comes back as a fresh desktop.
    let again = app_state.get_or_create_desktop("second").await.unwrap();
    let state = webdesk_host::actors::desktop::get_desktop_state(&again)
        .await
        .unwrap();
    assert!(state.windows.is_empty());

    app_state.shutdown().await;
}
