use anyhow::Result;
use rmcp::{
    RoleClient, ServiceExt,
    model::{CallToolRequestParam, CallToolResult},
    service::RunningService,
};
use serde_json::Value;
use sheets_mcp::SheetsServer;
use sheets_mcp::state::AppState;
use std::sync::Arc;

pub fn call_tool(name: &'static str, args: Value) -> CallToolRequestParam {
    CallToolRequestParam {
        name: name.into(),
        arguments: args.as_object().cloned(),
    }
}

/// Serves `state` over an in-process duplex pipe and returns a connected client.
pub async fn connect(state: Arc<AppState>) -> Result<RunningService<RoleClient, ()>> {
    let (server_transport, client_transport) = tokio::io::duplex(64 * 1024);
    let server = SheetsServer::from_state(state);
    tokio::spawn(async move {
        match server.serve(server_transport).await {
            Ok(service) => {
                let _ = service.waiting().await;
            }
            Err(e) => eprintln!("server failed to start: {e:?}"),
        }
    });

    let client = ().serve(client_transport).await?;
    Ok(client)
}

/// Parses the JSON text of the first content block.
pub fn extract_json(result: &CallToolResult) -> Result<Value> {
    let text = result
        .content
        .first()
        .and_then(|content| content.as_text())
        .map(|text| text.text.clone())
        .ok_or_else(|| anyhow::anyhow!("no text content in response"))?;
    Ok(serde_json::from_str(&text)?)
}
