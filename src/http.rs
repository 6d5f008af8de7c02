//! HTTP host: streamable MCP at `/mcp` plus liveness and readiness checks.

use crate::server::SheetsServer;
use crate::state::AppState;
use crate::tools::TOOL_NAMES;
use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub const SERVICE_NAME: &str = "google-sheets-mcp";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub credentials_configured: bool,
    pub tools_count: usize,
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime().as_secs(),
        credentials_configured: state.credentials_configured(),
        tools_count: TOOL_NAMES.len(),
    })
}

/// Fails closed when no credential source is configured.
pub async fn ready(State(state): State<Arc<AppState>>) -> Response {
    if state.credentials_configured() {
        (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ready",
                reason: None,
            }),
        )
            .into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadyResponse {
                status: "not_ready",
                reason: Some("Google OAuth credentials not configured"),
            }),
        )
            .into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let server = SheetsServer::from_state(state.clone());
    let mcp = StreamableHttpService::new(
        move || Ok(server.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );

    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .with_state(state)
        .nest_service("/mcp", mcp)
}

pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let local = listener.local_addr().unwrap_or(addr);
    info!("MCP HTTP: http://{local}/mcp");
    info!("Health: http://{local}/health");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("failed to listen for shutdown signal: {e}");
                std::future::pending::<()>().await;
            }
            info!("HTTP server received shutdown signal");
        })
        .await
        .context("HTTP server error")?;

    info!("HTTP server stopped");
    Ok(())
}
