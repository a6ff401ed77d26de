//! SFTP WebSocket Tests
//!
//! Drives `/ws/sftp` against a remote filesystem backed by a local temp
//! directory, so every operation touches real files.

use async_trait::async_trait;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use shared_types::{FsItemKind, RemoteItem, TerminalSize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, UNIX_EPOCH};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use webdesk_host::api;
use webdesk_host::app_state::AppState;
use webdesk_host::config::Config;
use webdesk_host::ssh::{
    posix_join, RemoteFileSystem, SftpConnector, ShellConnector, ShellHandle, SshCredentials,
    SshError,
};

/// Remote side mapped onto a local directory; `/` is the directory itself.
struct LocalRemote {
    root: PathBuf,
    closed: watch::Receiver<bool>,
}

impl LocalRemote {
    fn local(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

fn io_err(e: std::io::Error) -> SshError {
    SshError::Sftp(e.to_string())
}

#[async_trait]
impl RemoteFileSystem for LocalRemote {
    async fn list_dir(&self, path: &str) -> Result<Vec<RemoteItem>, SshError> {
        let mut items = Vec::new();
        for entry in std::fs::read_dir(self.local(path)).map_err(io_err)? {
            let entry = entry.map_err(io_err)?;
            let metadata = entry.metadata().map_err(io_err)?;
            let name = entry.file_name().to_string_lossy().to_string();
            items.push(RemoteItem {
                path: posix_join(path, &name),
                name,
                kind: if metadata.is_dir() {
                    FsItemKind::Folder
                } else {
                    FsItemKind::File
                },
                size: metadata.len(),
                modified: metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_secs())
                    .unwrap_or(0),
            });
        }
        Ok(items)
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, SshError> {
        std::fs::read(self.local(path)).map_err(io_err)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<(), SshError> {
        std::fs::write(self.local(path), data).map_err(io_err)
    }

    async fn create_dir(&self, path: &str) -> Result<(), SshError> {
        std::fs::create_dir(self.local(path)).map_err(io_err)
    }

    async fn remove_dir(&self, path: &str) -> Result<(), SshError> {
        std::fs::remove_dir(self.local(path)).map_err(io_err)
    }

    async fn remove_file(&self, path: &str) -> Result<(), SshError> {
        std::fs::remove_file(self.local(path)).map_err(io_err)
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), SshError> {
        std::fs::rename(self.local(from), self.local(to)).map_err(io_err)
    }

    async fn close(&self) -> Result<(), SshError> {
        Ok(())
    }

    fn closed(&self) -> Option<watch::Receiver<bool>> {
        Some(self.closed.clone())
    }
}

/// Hands out local remotes; the latest transport can be cut from the test.
struct LocalSftp {
    root: PathBuf,
    transport: Arc<Mutex<Option<watch::Sender<bool>>>>,
}

#[async_trait]
impl SftpConnector for LocalSftp {
    async fn open_sftp(
        &self,
        creds: &SshCredentials,
    ) -> Result<Box<dyn RemoteFileSystem>, SshError> {
        if creds.password != "secret" {
            return Err(SshError::AuthenticationFailed);
        }
        let (closed_tx, closed_rx) = watch::channel(false);
        *self.transport.lock().unwrap() = Some(closed_tx);
        Ok(Box::new(LocalRemote {
            root: self.root.clone(),
            closed: closed_rx,
        }))
    }
}

struct NoShell;

#[async_trait]
impl ShellConnector for NoShell {
    async fn open_shell(
        &self,
        _creds: &SshCredentials,
        _size: TerminalSize,
    ) -> Result<ShellHandle, SshError> {
        Err(SshError::Channel("no shell".to_string()))
    }
}

struct TestServer {
    addr: SocketAddr,
    app_state: Arc<AppState>,
    remote_root: PathBuf,
    transport: Arc<Mutex<Option<watch::Sender<bool>>>>,
    _temp_dir: tempfile::TempDir,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn start_test_server() -> TestServer {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let remote_root = temp_dir.path().join("remote");
    std::fs::create_dir_all(remote_root.join("docs")).unwrap();
    std::fs::write(remote_root.join("readme.txt"), "hello remote").unwrap();

    let transport = Arc::new(Mutex::new(None));
    let app_state = Arc::new(AppState::with_connectors(
        Config::for_root(temp_dir.path()),
        Arc::new(NoShell),
        Arc::new(LocalSftp {
            root: remote_root.clone(),
            transport: transport.clone(),
        }),
    ));

    let app: Router = api::router().with_state(api::ApiState::new(app_state.clone()));
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Failed to get addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .await
            .expect("Server failed");
    });

    TestServer {
        addr,
        app_state,
        remote_root,
        transport,
        _temp_dir: temp_dir,
        handle,
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect(server: &TestServer) -> WsStream {
    let url = format!("ws://{}/ws/sftp", server.addr);
    let (ws, _) = connect_async(url).await.expect("Failed to connect");
    ws
}

async fn request(ws: &mut WsStream, frame: Value) -> Value {
    ws.send(Message::Text(frame.to_string().into()))
        .await
        .expect("Failed to send");
    loop {
        let msg = timeout(Duration::from_secs(3), ws.next())
            .await
            .expect("Timed out waiting for frame")
            .expect("Socket closed")
            .expect("Socket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("Invalid JSON frame");
        }
    }
}

async fn connected(server: &TestServer) -> WsStream {
    let mut ws = connect(server).await;
    let frame = request(
        &mut ws,
        json!({
            "type": "connect",
            "payload": { "host": "files.local", "port": 22, "username": "pi", "password": "secret" }
        }),
    )
    .await;
    assert_eq!(frame, json!({ "type": "status", "payload": "connected" }));
    ws
}

#[tokio::test]
async fn test_operations_require_connection() {
    let server = start_test_server().await;
    let mut ws = connect(&server).await;

    let frame = request(&mut ws, json!({ "type": "list", "payload": { "path": "/" } })).await;
    assert_eq!(frame, json!({ "type": "error", "payload": "Not connected" }));

    let frame = request(&mut ws, json!({ "type": "bogus" })).await;
    assert_eq!(frame["payload"], "Invalid message format received.");
}

#[tokio::test]
async fn test_bad_credentials() {
    let server = start_test_server().await;
    let mut ws = connect(&server).await;

    let frame = request(
        &mut ws,
        json!({
            "type": "connect",
            "payload": { "host": "files.local", "username": "pi", "password": "nope" }
        }),
    )
    .await;
    assert_eq!(frame["type"], "error");
    assert!(frame["payload"]
        .as_str()
        .unwrap()
        .starts_with("Connection Error: "));
}

#[tokio::test]
async fn test_list_and_get_content() {
    let server = start_test_server().await;
    let mut ws = connected(&server).await;

    let frame = request(&mut ws, json!({ "type": "list", "payload": { "path": "/" } })).await;
    assert_eq!(frame["type"], "list");
    assert_eq!(frame["payload"]["path"], "/");
    let items = frame["payload"]["items"].as_array().unwrap();
    assert_eq!(items[0]["name"], "docs");
    assert_eq!(items[0]["type"], "folder");
    assert_eq!(items[0]["path"], "/docs");
    assert_eq!(items[1]["name"], "readme.txt");
    assert_eq!(items[1]["size"], 12);

    let frame = request(
        &mut ws,
        json!({ "type": "get_content", "payload": { "path": "/readme.txt" } }),
    )
    .await;
    assert_eq!(
        frame,
        json!({ "type": "file_content", "payload": { "path": "/readme.txt", "content": "hello remote" } })
    );
}

#[tokio::test]
async fn test_create_rename_save_delete() {
    let server = start_test_server().await;
    let mut ws = connected(&server).await;

    let frame = request(
        &mut ws,
        json!({ "type": "create_folder", "payload": { "parentDir": "/docs", "name": "2024" } }),
    )
    .await;
    assert_eq!(frame["type"], "operation_success");
    assert_eq!(frame["payload"]["message"], "Created folder 2024");
    assert_eq!(frame["payload"]["dirToRefresh"], "/docs");
    assert_eq!(frame["payload"]["isLocal"], false);
    assert!(server.remote_root.join("docs/2024").is_dir());

    let frame = request(
        &mut ws,
        json!({ "type": "create_file", "payload": { "parentDir": "/docs", "name": "a.txt" } }),
    )
    .await;
    assert_eq!(frame["payload"]["message"], "Created file a.txt");

    let frame = request(
        &mut ws,
        json!({ "type": "save_content", "payload": { "path": "/docs/a.txt", "content": "saved" } }),
    )
    .await;
    assert_eq!(frame["payload"]["message"], "Saved a.txt successfully.");
    assert_eq!(
        std::fs::read_to_string(server.remote_root.join("docs/a.txt")).unwrap(),
        "saved"
    );

    let frame = request(
        &mut ws,
        json!({
            "type": "rename",
            "payload": {
                "item": { "name": "a.txt", "path": "/docs/a.txt", "type": "file", "size": 5, "modified": 0 },
                "newName": "b.txt"
            }
        }),
    )
    .await;
    assert_eq!(frame["payload"]["message"], "Renamed a.txt to b.txt");
    assert!(server.remote_root.join("docs/b.txt").exists());

    let frame = request(
        &mut ws,
        json!({
            "type": "delete",
            "payload": { "item": { "name": "2024", "path": "/docs/2024", "type": "folder" } }
        }),
    )
    .await;
    assert_eq!(frame["payload"]["message"], "Deleted 2024");
    assert!(!server.remote_root.join("docs/2024").exists());
}

#[tokio::test]
async fn test_failed_operation_keeps_session() {
    let server = start_test_server().await;
    let mut ws = connected(&server).await;

    let frame = request(
        &mut ws,
        json!({ "type": "get_content", "payload": { "path": "/missing/notes.txt" } }),
    )
    .await;
    assert_eq!(frame["type"], "operation_error");
    assert!(frame["payload"]
        .as_str()
        .unwrap()
        .starts_with("Failed to get content for notes.txt: "));

    let frame = request(&mut ws, json!({ "type": "list", "payload": { "path": "/docs" } })).await;
    assert_eq!(frame["type"], "list");
}

#[tokio::test]
async fn test_find_unique_name() {
    let server = start_test_server().await;
    std::fs::write(server.remote_root.join("docs/report.txt"), "").unwrap();
    std::fs::write(server.remote_root.join("docs/report (1).txt"), "").unwrap();
    let mut ws = connected(&server).await;

    let frame = request(
        &mut ws,
        json!({
            "type": "find_unique_name",
            "payload": { "parentDir": "/docs", "baseName": "report.txt", "isFolder": false }
        }),
    )
    .await;
    assert_eq!(
        frame,
        json!({
            "type": "unique_name_found",
            "payload": { "name": "report (2).txt", "parentDir": "/docs", "isFolder": false }
        })
    );
}

#[tokio::test]
async fn test_disconnect_and_socket_close() {
    let server = start_test_server().await;
    let mut ws = connected(&server).await;
    assert_eq!(server.app_state.sessions.list().await[0].kind, shared_types::SessionKind::Sftp);

    let frame = request(&mut ws, json!({ "type": "disconnect" })).await;
    assert_eq!(frame, json!({ "type": "status", "payload": "disconnected" }));

    let frame = request(&mut ws, json!({ "type": "list", "payload": { "path": "/" } })).await;
    assert_eq!(frame["payload"], "Not connected");

    ws.close(None).await.unwrap();
    drop(ws);
    let mut removed = false;
    for _ in 0..40 {
        if server.app_state.sessions.is_empty().await {
            removed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(removed, "session should be removed after the socket closes");
}

#[tokio::test]
async fn test_remote_close_reports_disconnected() {
    let server = start_test_server().await;
    let mut ws = connected(&server).await;
    assert!(server.app_state.sessions.list().await[0].connected);

    // Dropping the sender is what the SSH client does when the connection dies.
    drop(server.transport.lock().unwrap().take());

    let msg = timeout(Duration::from_secs(3), ws.next())
        .await
        .expect("Timed out waiting for frame")
        .expect("Socket closed")
        .expect("Socket error");
    let frame: Value = match msg {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("unexpected message {other:?}"),
    };
    assert_eq!(frame, json!({ "type": "status", "payload": "disconnected" }));
    assert!(!server.app_state.sessions.list().await[0].connected);

    let frame = request(&mut ws, json!({ "type": "list", "payload": { "path": "/" } })).await;
    assert_eq!(frame, json!({ "type": "error", "payload": "Not connected" }));

    // The socket stays usable for a fresh connection.
    let frame = request(
        &mut ws,
        json!({
            "type": "connect",
            "payload": { "host": "files.local", "username": "pi", "password": "secret" }
        }),
    )
    .await;
    assert_eq!(frame, json!({ "type": "status", "payload": "connected" }));
}

#[tokio::test]
async fn test_failed_operation_on_root_names_path() {
    let server = start_test_server().await;
    std::fs::remove_dir_all(&server.remote_root).unwrap();
    let mut ws = connected(&server).await;

    let frame = request(&mut ws, json!({ "type": "list", "payload": { "path": "/" } })).await;
    assert_eq!(frame["type"], "operation_error");
    assert!(frame["payload"].as_str().unwrap().starts_with("Failed to list /: "));
}
