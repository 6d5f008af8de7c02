pub mod auth;
pub mod config;
pub mod errors;
pub mod http;
pub mod server;
pub mod sheets;
pub mod state;
pub mod tools;

pub use config::{CliArgs, ServerConfig, TransportKind};
pub use server::SheetsServer;
pub use state::AppState;

use anyhow::Result;
use std::sync::Arc;

pub async fn run_server(config: ServerConfig) -> Result<()> {
    let config = Arc::new(config);
    if !config.credentials_configured() {
        tracing::warn!(
            creds_dir = ?config.creds_dir,
            "no Google credentials configured; tool calls will fail until they are"
        );
    }
    let state = Arc::new(AppState::new(config.clone())?);

    tracing::info!(transport = %config.transport, "starting Google Sheets MCP server");
    match config.transport {
        TransportKind::Stdio => SheetsServer::from_state(state).run_stdio().await,
        TransportKind::Http => http::serve(state, config.http_bind_address).await,
    }
}
