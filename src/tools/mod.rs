//! Tool registry: parameter schemas, request builders and reply normalizers
//! for every `sheets_*` tool, plus the transport-agnostic [`Dispatcher`].

pub mod chart;
pub mod formatting;
pub mod structure;
pub mod values;

pub use chart::AddChartParams;
pub use formatting::{AddBordersParams, AddDropdownParams, ConditionalFormatParams, FormatCellsParams};
pub use structure::{
    CopyPasteParams, DeleteDuplicatesParams, DeleteRowsParams, DuplicateSheetParams,
    FindReplaceParams, InsertRowsParams, MergeCellsParams, SortRangeParams, TrimWhitespaceParams,
};
pub use values::{
    AppendParams, ClearRangeParams, CreateParams, GetSheetIdParams, ReadParams, WriteParams,
};

use crate::config::ServerConfig;
use crate::errors::{InvalidParamsError, ToolDisabledError, UnknownToolError};
use crate::sheets::{GridRange, SheetsApi, SheetsCall};
use anyhow::Result;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// One tool: a typed parameter set that knows how to become a remote call
/// and how to read the reply.
pub trait SheetsTool: DeserializeOwned + JsonSchema + Send + Sync {
    const NAME: &'static str;

    type Output: Serialize;

    /// Checks that schema types alone cannot express.
    fn validate(&self) -> Result<(), InvalidParamsError> {
        Ok(())
    }

    fn build(&self) -> Result<SheetsCall, InvalidParamsError>;

    fn normalize(&self, reply: Value) -> Self::Output;
}

/// Rectangle on one sheet addressed by 0-based, end-exclusive indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, JsonSchema)]
pub struct SheetRect {
    /// The sheet ID (use sheets_get_sheet_id to find)
    pub sheet_id: i64,
    /// Start row index (0-based, row 2 in the UI is index 1)
    pub start_row: u32,
    /// End row index (exclusive)
    #[schemars(range(min = 1))]
    pub end_row: u32,
    /// Start column index (0-based)
    pub start_col: u32,
    /// End column index (exclusive)
    #[schemars(range(min = 1))]
    pub end_col: u32,
}

impl SheetRect {
    pub fn validate(&self, tool: &'static str) -> Result<(), InvalidParamsError> {
        check_span(tool, "start_row", "end_row", self.start_row, self.end_row)?;
        check_span(tool, "start_col", "end_col", self.start_col, self.end_col)
    }

    pub fn grid_range(&self) -> GridRange {
        GridRange::rect(
            self.sheet_id,
            self.start_row,
            self.end_row,
            self.start_col,
            self.end_col,
        )
    }
}

pub(crate) fn check_span(
    tool: &'static str,
    start_field: &'static str,
    end_field: &'static str,
    start: u32,
    end: u32,
) -> Result<(), InvalidParamsError> {
    if end < 1 {
        return Err(InvalidParamsError::new(tool, format!("{end_field} must be at least 1"))
            .with_path(end_field));
    }
    if end <= start {
        return Err(InvalidParamsError::new(
            tool,
            format!("{end_field} ({end}) must be greater than {start_field} ({start})"),
        )
        .with_path(end_field));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct SuccessResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }
}

/// Reads `replies[0].<request>.<field>` as a counter, defaulting to 0.
pub(crate) fn first_reply_count(reply: &Value, request: &str, field: &str) -> u64 {
    first_reply(reply, request)
        .and_then(|r| r.get(field))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

pub(crate) fn first_reply<'a>(reply: &'a Value, request: &str) -> Option<&'a Value> {
    reply
        .get("replies")
        .and_then(Value::as_array)
        .and_then(|replies| replies.first())
        .and_then(|first| first.get(request))
}

pub(crate) fn batch(spreadsheet_id: &str, request: Value) -> SheetsCall {
    SheetsCall::BatchUpdate {
        spreadsheet_id: spreadsheet_id.to_string(),
        requests: vec![request],
    }
}

pub(crate) fn grid_json(range: GridRange) -> Value {
    serde_json::to_value(range).unwrap_or(Value::Null)
}

pub fn parse_arguments<T: SheetsTool>(arguments: Value) -> Result<T, InvalidParamsError> {
    let arguments = match arguments {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|e| InvalidParamsError::new(T::NAME, e.to_string()))
}

pub struct Dispatcher {
    config: Arc<ServerConfig>,
    api: Arc<dyn SheetsApi>,
}

impl Dispatcher {
    pub fn new(config: Arc<ServerConfig>, api: Arc<dyn SheetsApi>) -> Self {
        Self { config, api }
    }

    fn ensure_tool_enabled(&self, tool: &str) -> Result<()> {
        tracing::info!(tool = tool, "tool invocation requested");
        if self.config.is_tool_enabled(tool) {
            Ok(())
        } else {
            Err(ToolDisabledError::new(tool).into())
        }
    }

    /// Validates, builds, executes and normalizes one tool call.
    pub async fn run<T: SheetsTool>(&self, params: T) -> Result<T::Output> {
        self.ensure_tool_enabled(T::NAME)?;
        params.validate()?;
        let call = params.build()?;
        let reply = self.api.execute(&call).await?;
        Ok(params.normalize(reply))
    }

    /// Same as [`Dispatcher::run`] but rendered as the indented JSON text
    /// every tool returns.
    pub async fn run_to_text<T: SheetsTool>(&self, params: T) -> Result<String> {
        let output = self.run(params).await?;
        render(&output)
    }

    /// Routes a call by tool name with untyped arguments.
    pub async fn dispatch(&self, tool: &str, arguments: Value) -> Result<String> {
        dispatch_tool(self, tool, arguments).await
    }
}

pub fn render<T: Serialize>(output: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(output)?)
}

macro_rules! tool_registry {
    ($( $params:ty ),+ $(,)?) => {
        /// Every registered tool name, in registration order.
        pub const TOOL_NAMES: &[&str] = &[ $( <$params as SheetsTool>::NAME, )+ ];

        async fn dispatch_tool(
            dispatcher: &Dispatcher,
            tool: &str,
            arguments: Value,
        ) -> Result<String> {
            match tool {
                $(
                    name if name == <$params as SheetsTool>::NAME => {
                        let params = parse_arguments::<$params>(arguments)?;
                        dispatcher.run_to_text(params).await
                    }
                )+
                other => Err(UnknownToolError::new(other).into()),
            }
        }
    };
}

tool_registry!(
    CreateParams,
    ReadParams,
    WriteParams,
    AppendParams,
    GetSheetIdParams,
    DeleteRowsParams,
    InsertRowsParams,
    ClearRangeParams,
    FindReplaceParams,
    DuplicateSheetParams,
    DeleteDuplicatesParams,
    TrimWhitespaceParams,
    MergeCellsParams,
    CopyPasteParams,
    FormatCellsParams,
    AddBordersParams,
    AddChartParams,
    AddDropdownParams,
    ConditionalFormatParams,
    SortRangeParams,
);
