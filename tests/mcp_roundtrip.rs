use anyhow::Result;
use rmcp::model::ErrorCode;
use serde_json::json;
use sheets_mcp::tools::TOOL_NAMES;
use std::collections::{BTreeSet, HashSet};

mod support;

use support::mcp::{call_tool, connect, extract_json};
use support::{RecordingSheetsApi, TestWorkspace};

#[tokio::test]
async fn lists_every_registered_tool() -> Result<()> {
    let workspace = TestWorkspace::new();
    let state = support::app_state_with_api(workspace.config(), RecordingSheetsApi::new());
    let client = connect(state).await?;

    let tools = client.list_all_tools().await?;
    let listed: BTreeSet<String> = tools.iter().map(|tool| tool.name.to_string()).collect();
    let registered: BTreeSet<String> = TOOL_NAMES.iter().map(|name| name.to_string()).collect();
    assert_eq!(listed, registered);
    assert_eq!(listed.len(), 20);

    let delete_rows = tools
        .iter()
        .find(|tool| tool.name == "sheets_delete_rows")
        .expect("delete rows tool");
    let properties = delete_rows
        .input_schema
        .get("properties")
        .and_then(|value| value.as_object())
        .expect("schema properties");
    for field in ["spreadsheet_id", "sheet_id", "start_row", "end_row"] {
        assert!(properties.contains_key(field), "missing {field}");
    }

    let info = client.peer_info().expect("server info");
    assert!(
        info.instructions
            .as_deref()
            .is_some_and(|text| text.contains("sheets_get_sheet_id"))
    );

    client.cancel().await?;
    Ok(())
}

#[tokio::test]
async fn tool_call_returns_indented_json_text() -> Result<()> {
    let workspace = TestWorkspace::new();
    let api = RecordingSheetsApi::new();
    api.reply(json!({
        "sheets": [{ "properties": { "sheetId": 12, "title": "Summary" } }]
    }));
    let state = support::app_state_with_api(workspace.config(), api.clone());
    let client = connect(state).await?;

    let result = client
        .call_tool(call_tool(
            "sheets_get_sheet_id",
            json!({ "spreadsheet_id": "abc", "sheet_name": "Summary" }),
        ))
        .await?;
    assert_ne!(result.is_error, Some(true));
    assert_eq!(
        extract_json(&result)?,
        json!({ "sheetId": 12, "sheetName": "Summary" })
    );
    assert_eq!(api.calls().len(), 1);

    client.cancel().await?;
    Ok(())
}

#[tokio::test]
async fn invalid_arguments_map_to_invalid_params() -> Result<()> {
    let workspace = TestWorkspace::new();
    let api = RecordingSheetsApi::new();
    let state = support::app_state_with_api(workspace.config(), api.clone());
    let client = connect(state).await?;

    let outcome = client
        .call_tool(call_tool(
            "sheets_delete_rows",
            json!({ "spreadsheet_id": "abc", "sheet_id": 0, "start_row": 4, "end_row": 2 }),
        ))
        .await;

    match outcome {
        Err(rmcp::ServiceError::McpError(error)) => {
            assert_eq!(error.code, ErrorCode::INVALID_PARAMS);
            assert!(error.message.contains("end_row"), "{}", error.message);
        }
        other => panic!("expected invalid params error, got {other:?}"),
    }
    assert!(api.calls().is_empty());

    client.cancel().await?;
    Ok(())
}

#[tokio::test]
async fn disabled_tool_maps_to_invalid_request() -> Result<()> {
    let workspace = TestWorkspace::new();
    let config = workspace.config_with(|cfg| {
        cfg.enabled_tools = Some(HashSet::from(["sheets_read".to_string()]));
    });
    let state = support::app_state_with_api(config, RecordingSheetsApi::new());
    let client = connect(state).await?;

    let outcome = client
        .call_tool(call_tool(
            "sheets_clear_range",
            json!({ "spreadsheet_id": "abc", "range": "A1:B2" }),
        ))
        .await;

    match outcome {
        Err(rmcp::ServiceError::McpError(error)) => {
            assert_eq!(error.code, ErrorCode::INVALID_REQUEST);
            assert!(error.message.contains("disabled"), "{}", error.message);
        }
        other => panic!("expected invalid request error, got {other:?}"),
    }

    client.cancel().await?;
    Ok(())
}
