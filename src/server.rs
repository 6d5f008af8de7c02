use crate::errors::{
    AuthError, InvalidParamsError, RemoteApiError, ToolDisabledError, UnknownToolError,
};
use crate::state::AppState;
use crate::tools::{self, SheetsTool};
use anyhow::Result;
use rmcp::{
    ErrorData as McpError, ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    transport::stdio,
};
use serde_json::json;
use std::sync::Arc;

const INSTRUCTIONS: &str = "\
Google Sheets MCP: create, read, edit, format and chart Google Sheets.

ADDRESSING:
- sheets_read, sheets_write, sheets_append and sheets_clear_range take A1 ranges \
(e.g. 'Sheet1!A1:C10').
- Every other tool takes a numeric sheet_id plus 0-based row/column indices; end \
indices are exclusive. Use sheets_get_sheet_id to turn a sheet name into a sheet_id.

WRITING:
- Values are entered as if typed by a user, so strings starting with '=' become formulas.
- sheets_append adds rows after the last row with data; sheets_write overwrites in place.

ENUMS:
- chart_type, merge_type, paste_type, border style and condition_type are passed to \
Google Sheets as given (e.g. PIE, MERGE_ALL, PASTE_VALUES, DASHED, NUMBER_GREATER).

Every tool returns indented JSON text.";

#[derive(Clone)]
pub struct SheetsServer {
    state: Arc<AppState>,
    tool_router: ToolRouter<SheetsServer>,
}

impl SheetsServer {
    pub fn from_state(state: Arc<AppState>) -> Self {
        Self {
            state,
            tool_router: Self::tool_router(),
        }
    }

    pub async fn run_stdio(self) -> Result<()> {
        let service = self
            .serve(stdio())
            .await
            .inspect_err(|error| tracing::error!("serving error: {:?}", error))?;
        service.waiting().await?;
        Ok(())
    }

    async fn run_tool<T: SheetsTool>(&self, params: T) -> Result<CallToolResult, McpError> {
        self.state
            .dispatcher()
            .run_to_text(params)
            .await
            .map(|text| CallToolResult::success(vec![Content::text(text)]))
            .map_err(|e| to_mcp_error_for_tool(T::NAME, e))
    }
}

#[tool_router]
impl SheetsServer {
    #[tool(
        name = "sheets_create",
        description = "Create a new spreadsheet. Creates a single 'Sheet1' when no sheet titles are given"
    )]
    pub async fn sheets_create(
        &self,
        Parameters(params): Parameters<tools::CreateParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool(params).await
    }

    #[tool(name = "sheets_read", description = "Read values from an A1 range")]
    pub async fn sheets_read(
        &self,
        Parameters(params): Parameters<tools::ReadParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool(params).await
    }

    #[tool(
        name = "sheets_write",
        description = "Write values to an A1 range, overwriting in place (supports formulas like =SUM(A1:A10))"
    )]
    pub async fn sheets_write(
        &self,
        Parameters(params): Parameters<tools::WriteParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool(params).await
    }

    #[tool(
        name = "sheets_append",
        description = "Append rows after the existing data in an A1 range"
    )]
    pub async fn sheets_append(
        &self,
        Parameters(params): Parameters<tools::AppendParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool(params).await
    }

    #[tool(
        name = "sheets_get_sheet_id",
        description = "Get the numeric sheet ID for a sheet name (needed by row, range and formatting tools)"
    )]
    pub async fn sheets_get_sheet_id(
        &self,
        Parameters(params): Parameters<tools::GetSheetIdParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool(params).await
    }

    #[tool(
        name = "sheets_delete_rows",
        description = "Delete rows from a sheet. Row indices are 0-based, end exclusive"
    )]
    pub async fn sheets_delete_rows(
        &self,
        Parameters(params): Parameters<tools::DeleteRowsParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool(params).await
    }

    #[tool(
        name = "sheets_insert_rows",
        description = "Insert empty rows at a 0-based row index"
    )]
    pub async fn sheets_insert_rows(
        &self,
        Parameters(params): Parameters<tools::InsertRowsParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool(params).await
    }

    #[tool(
        name = "sheets_clear_range",
        description = "Clear values from an A1 range (keeps formatting)"
    )]
    pub async fn sheets_clear_range(
        &self,
        Parameters(params): Parameters<tools::ClearRangeParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool(params).await
    }

    #[tool(
        name = "sheets_find_replace",
        description = "Find and replace text in one sheet or across all sheets"
    )]
    pub async fn sheets_find_replace(
        &self,
        Parameters(params): Parameters<tools::FindReplaceParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool(params).await
    }

    #[tool(
        name = "sheets_duplicate_sheet",
        description = "Duplicate an entire sheet within the same spreadsheet"
    )]
    pub async fn sheets_duplicate_sheet(
        &self,
        Parameters(params): Parameters<tools::DuplicateSheetParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool(params).await
    }

    #[tool(
        name = "sheets_delete_duplicates",
        description = "Delete duplicate rows in a range, comparing the given columns or all columns"
    )]
    pub async fn sheets_delete_duplicates(
        &self,
        Parameters(params): Parameters<tools::DeleteDuplicatesParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool(params).await
    }

    #[tool(
        name = "sheets_trim_whitespace",
        description = "Trim leading and trailing whitespace from every cell in a range"
    )]
    pub async fn sheets_trim_whitespace(
        &self,
        Parameters(params): Parameters<tools::TrimWhitespaceParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool(params).await
    }

    #[tool(name = "sheets_merge_cells", description = "Merge cells in a range")]
    pub async fn sheets_merge_cells(
        &self,
        Parameters(params): Parameters<tools::MergeCellsParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool(params).await
    }

    #[tool(
        name = "sheets_copy_paste",
        description = "Copy a range and paste it at a destination anchor cell"
    )]
    pub async fn sheets_copy_paste(
        &self,
        Parameters(params): Parameters<tools::CopyPasteParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool(params).await
    }

    #[tool(
        name = "sheets_format_cells",
        description = "Format cells (bold, italic, font size, colors). Properties left out are not changed"
    )]
    pub async fn sheets_format_cells(
        &self,
        Parameters(params): Parameters<tools::FormatCellsParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool(params).await
    }

    #[tool(
        name = "sheets_add_borders",
        description = "Add the same border to every edge of a range, inner edges included"
    )]
    pub async fn sheets_add_borders(
        &self,
        Parameters(params): Parameters<tools::AddBordersParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool(params).await
    }

    #[tool(
        name = "sheets_add_chart",
        description = "Add a chart over a data range, anchored at a cell"
    )]
    pub async fn sheets_add_chart(
        &self,
        Parameters(params): Parameters<tools::AddChartParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool(params).await
    }

    #[tool(
        name = "sheets_add_dropdown",
        description = "Add dropdown list validation to cells"
    )]
    pub async fn sheets_add_dropdown(
        &self,
        Parameters(params): Parameters<tools::AddDropdownParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool(params).await
    }

    #[tool(
        name = "sheets_conditional_format",
        description = "Add a conditional background color rule with the highest priority"
    )]
    pub async fn sheets_conditional_format(
        &self,
        Parameters(params): Parameters<tools::ConditionalFormatParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool(params).await
    }

    #[tool(name = "sheets_sort_range", description = "Sort a range by one column")]
    pub async fn sheets_sort_range(
        &self,
        Parameters(params): Parameters<tools::SortRangeParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run_tool(params).await
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for SheetsServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(INSTRUCTIONS.to_string()),
            ..ServerInfo::default()
        }
    }
}

pub(crate) fn to_mcp_error_for_tool(tool: &str, error: anyhow::Error) -> McpError {
    if error.is::<ToolDisabledError>() {
        return McpError::invalid_request(error.to_string(), None);
    }

    if let Some(inv) = error.downcast_ref::<InvalidParamsError>() {
        let msg = format_invalid_params_message(
            tool,
            inv.message(),
            inv.path(),
            tool_minimal_example(tool),
        );
        return McpError::invalid_params(msg, None);
    }

    if error.is::<UnknownToolError>() {
        return McpError::invalid_params(error.to_string(), None);
    }

    if let Some(remote) = error.downcast_ref::<RemoteApiError>() {
        let data = json!({
            "status": remote.status,
            "error": remote.details,
        });
        return McpError::internal_error(remote.to_string(), Some(data));
    }

    if let Some(auth) = error.downcast_ref::<AuthError>() {
        return McpError::internal_error(auth.to_string(), None);
    }

    McpError::internal_error(format!("{error:#}"), None)
}

fn format_invalid_params_message(
    tool: &str,
    problem: &str,
    path: Option<&str>,
    example: Option<&'static str>,
) -> String {
    let mut out = format!("Invalid params for tool '{tool}': {problem}");

    if let Some(path) = path {
        out.push_str(&format!("\npath: {path}"));
    }

    if let Some(example) = example {
        out.push_str("\nexample: ");
        out.push_str(example);
    }

    out
}

fn tool_minimal_example(tool: &str) -> Option<&'static str> {
    match tool {
        "sheets_format_cells" => Some(
            r##"{"spreadsheet_id":"<id>","sheet_id":0,"start_row":0,"end_row":1,"start_col":0,"end_col":5,"bold":true,"bg_color":"#FFFF00"}"##,
        ),
        "sheets_add_borders" => Some(
            r##"{"spreadsheet_id":"<id>","sheet_id":0,"start_row":0,"end_row":10,"start_col":0,"end_col":3,"style":"SOLID","color":"#000000"}"##,
        ),
        "sheets_conditional_format" => Some(
            r##"{"spreadsheet_id":"<id>","sheet_id":0,"start_row":1,"end_row":100,"start_col":2,"end_col":3,"condition_type":"NUMBER_GREATER","condition_value":"100","bg_color":"#00FF00"}"##,
        ),
        "sheets_add_chart" => Some(
            r#"{"spreadsheet_id":"<id>","sheet_id":0,"chart_type":"COLUMN","data_range":"Sheet1!A1:B10","title":"Sales","row":0,"col":4}"#,
        ),
        "sheets_delete_rows" => {
            Some(r#"{"spreadsheet_id":"<id>","sheet_id":0,"start_row":1,"end_row":3}"#)
        }
        "sheets_copy_paste" => Some(
            r#"{"spreadsheet_id":"<id>","source_sheet_id":0,"source_start_row":0,"source_end_row":5,"source_start_col":0,"source_end_col":2,"dest_sheet_id":0,"dest_start_row":10,"dest_start_col":0}"#,
        ),
        _ => None,
    }
}
