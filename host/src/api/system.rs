//! Host information, the fetch proxy and live session listing

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;

use crate::api::ApiState;

/// GET /api/os-user
pub async fn os_user(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(json!({ "username": current_username() }))
}

/// Account name of the host process, from the OS user database first so a
/// scrubbed environment still reports the real user.
fn current_username() -> String {
    match whoami::fallible::username() {
        Ok(name) if !name.is_empty() => name,
        result => {
            if let Err(e) = result {
                tracing::debug!(error = %e, "OS user lookup failed, using environment");
            }
            ["USER", "USERNAME", "LOGNAME"]
                .iter()
                .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
                .unwrap_or_else(|| "user".to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    pub url: Option<String>,
}

/// Check that `raw` is an absolute http(s) URL.
pub fn parse_proxy_url(raw: Option<&str>) -> Result<Url, &'static str> {
    let raw = raw
        .filter(|u| !u.trim().is_empty())
        .ok_or("URL query parameter is required.")?;
    let url = Url::parse(raw).map_err(|_| "Invalid URL.")?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err("Invalid URL protocol."),
    }
}

/// GET /api/proxy?url= - fetch a page for the in-desktop browser
pub async fn proxy(State(state): State<ApiState>, Query(query): Query<ProxyQuery>) -> Response {
    let url = match parse_proxy_url(query.url.as_deref()) {
        Ok(url) => url,
        Err(message) => return (StatusCode::BAD_REQUEST, message).into_response(),
    };

    let fetched = async {
        state
            .app_state
            .http_client
            .get(url.clone())
            .send()
            .await?
            .text()
            .await
    }
    .await;

    match fetched {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            text,
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Proxy fetch failed");
            (
                StatusCode::BAD_GATEWAY,
                format!("Failed to fetch URL: {url}. Error: {e}"),
            )
                .into_response()
        }
    }
}

/// GET /api/sessions - live terminal and SFTP sessions
pub async fn list_sessions(State(state): State<ApiState>) -> Response {
    let sessions = state.app_state.sessions.list().await;
    (StatusCode::OK, Json(sessions)).into_response()
}
