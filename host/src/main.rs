use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use webdesk_host::api;
use webdesk_host::app_state::AppState;
use webdesk_host::config::Config;

fn load_env_file() {
    let cwd = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            tracing::warn!(error = %e, "Could not determine current directory for .env lookup");
            return;
        }
    };

    let mut current = cwd.clone();
    loop {
        let candidate = current.join(".env");
        if candidate.exists() {
            match dotenvy::from_path(&candidate) {
                Ok(_) => {
                    tracing::info!(path = %candidate.display(), "Loaded environment from .env");
                }
                Err(e) => {
                    tracing::warn!(
                        path = %candidate.display(),
                        error = %e,
                        "Failed to load .env file"
                    );
                }
            }
            return;
        }

        if !current.pop() {
            break;
        }
    }

    tracing::info!(
        cwd = %cwd.display(),
        "No .env file found in current directory or ancestors; using process environment only"
    );
}

fn cors_layer(allowed_origins: &[String]) -> anyhow::Result<CorsLayer> {
    let allow_origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let origins = allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin).with_context(|| format!("Invalid CORS origin {origin}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(3600)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("webdesk_host=debug,tower_http=info")),
        )
        .init();

    // Search the current directory and ancestors so running from `host/`
    // still picks up the repo-root `.env`.
    load_env_file();

    let config = Config::from_env().context("Invalid configuration")?;
    tracing::info!(
        fs_root = %config.fs_root.display(),
        data_dir = %config.data_dir.display(),
        apps_dir = %config.apps_dir.display(),
        "Starting WebDesk host"
    );

    let app_state = Arc::new(AppState::new(config.clone()));
    app_state
        .vfs
        .ensure_layout(Some(&config.apps_dir))
        .await
        .context("Failed to prepare virtual filesystem")?;

    let api_state = api::ApiState::new(app_state.clone());
    let app = api::router()
        .with_state(api_state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .layer(cors_layer(&config.allowed_origins)?)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::new(config.bind_addr, config.port);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Starting HTTP server on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    app_state.shutdown().await;
    tracing::info!("WebDesk host stopped");
    Ok(())
}
