use super::{SheetsTool, SuccessResponse};
use crate::errors::InvalidParamsError;
use crate::sheets::SheetsCall;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

const DEFAULT_SHEET_TITLE: &str = "Sheet1";

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CreateParams {
    /// Title of the new spreadsheet
    pub title: String,
    /// Optional list of sheet names to create
    #[serde(default)]
    pub sheet_titles: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateResponse {
    pub spreadsheet_id: Option<String>,
    pub spreadsheet_url: Option<String>,
}

impl SheetsTool for CreateParams {
    const NAME: &'static str = "sheets_create";
    type Output = CreateResponse;

    fn build(&self) -> Result<SheetsCall, InvalidParamsError> {
        tracing::debug!(title = %self.title, "creating spreadsheet");
        let titles: Vec<&str> = match self.sheet_titles.as_deref() {
            Some(titles) if !titles.is_empty() => titles.iter().map(String::as_str).collect(),
            _ => vec![DEFAULT_SHEET_TITLE],
        };
        let sheets: Vec<Value> = titles
            .into_iter()
            .map(|title| json!({ "properties": { "title": title } }))
            .collect();
        Ok(SheetsCall::Create {
            body: json!({
                "properties": { "title": self.title },
                "sheets": sheets,
            }),
        })
    }

    fn normalize(&self, reply: Value) -> CreateResponse {
        let field = |name: &str| reply.get(name).and_then(Value::as_str).map(str::to_string);
        CreateResponse {
            spreadsheet_id: field("spreadsheetId"),
            spreadsheet_url: field("spreadsheetUrl"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReadParams {
    /// The spreadsheet ID
    pub spreadsheet_id: String,
    /// A1 notation range (e.g. 'Sheet1!A1:B10')
    pub range: String,
}

impl SheetsTool for ReadParams {
    const NAME: &'static str = "sheets_read";
    type Output = Vec<Value>;

    fn build(&self) -> Result<SheetsCall, InvalidParamsError> {
        tracing::debug!(range = %self.range, "reading range");
        Ok(SheetsCall::GetValues {
            spreadsheet_id: self.spreadsheet_id.clone(),
            range: self.range.clone(),
        })
    }

    fn normalize(&self, reply: Value) -> Vec<Value> {
        match reply {
            Value::Object(mut map) => match map.remove("values") {
                Some(Value::Array(rows)) => rows,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct WriteParams {
    /// The spreadsheet ID
    pub spreadsheet_id: String,
    /// A1 notation range (e.g. 'Sheet1!A1')
    pub range: String,
    /// 2D array of values to write (supports formulas like =SUM(A1:A10))
    pub values: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedCellsResponse {
    pub updated_cells: Option<u64>,
}

impl SheetsTool for WriteParams {
    const NAME: &'static str = "sheets_write";
    type Output = UpdatedCellsResponse;

    fn build(&self) -> Result<SheetsCall, InvalidParamsError> {
        tracing::debug!(range = %self.range, rows = self.values.len(), "writing range");
        Ok(SheetsCall::UpdateValues {
            spreadsheet_id: self.spreadsheet_id.clone(),
            range: self.range.clone(),
            values: self.values.clone(),
        })
    }

    fn normalize(&self, reply: Value) -> UpdatedCellsResponse {
        UpdatedCellsResponse {
            updated_cells: reply.get("updatedCells").and_then(Value::as_u64),
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AppendParams {
    /// The spreadsheet ID
    pub spreadsheet_id: String,
    /// A1 notation range to append to
    pub range: String,
    /// 2D array of values to append
    pub values: Vec<Vec<String>>,
}

impl SheetsTool for AppendParams {
    const NAME: &'static str = "sheets_append";
    type Output = UpdatedCellsResponse;

    fn build(&self) -> Result<SheetsCall, InvalidParamsError> {
        tracing::debug!(range = %self.range, rows = self.values.len(), "appending rows");
        Ok(SheetsCall::AppendValues {
            spreadsheet_id: self.spreadsheet_id.clone(),
            range: self.range.clone(),
            values: self.values.clone(),
        })
    }

    fn normalize(&self, reply: Value) -> UpdatedCellsResponse {
        UpdatedCellsResponse {
            updated_cells: reply
                .get("updates")
                .and_then(|updates| updates.get("updatedCells"))
                .and_then(Value::as_u64),
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetSheetIdParams {
    /// The spreadsheet ID
    pub spreadsheet_id: String,
    /// Name of the sheet to find (exact, case-sensitive)
    pub sheet_name: String,
}

/// Either the matching sheet or an error-shaped payload for a miss. A miss
/// is a normal result, not a failed call.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum SheetLookup {
    #[serde(rename_all = "camelCase")]
    Found { sheet_id: i64, sheet_name: String },
    NotFound { error: String },
}

impl SheetsTool for GetSheetIdParams {
    const NAME: &'static str = "sheets_get_sheet_id";
    type Output = SheetLookup;

    fn build(&self) -> Result<SheetsCall, InvalidParamsError> {
        tracing::debug!(sheet = %self.sheet_name, "looking up sheet id");
        Ok(SheetsCall::GetSpreadsheet {
            spreadsheet_id: self.spreadsheet_id.clone(),
        })
    }

    fn normalize(&self, reply: Value) -> SheetLookup {
        let found = reply
            .get("sheets")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|sheet| sheet.get("properties"))
            .find(|props| {
                props.get("title").and_then(Value::as_str) == Some(self.sheet_name.as_str())
            })
            .and_then(|props| props.get("sheetId").and_then(Value::as_i64));

        match found {
            Some(sheet_id) => SheetLookup::Found {
                sheet_id,
                sheet_name: self.sheet_name.clone(),
            },
            None => SheetLookup::NotFound {
                error: format!("Sheet \"{}\" not found", self.sheet_name),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ClearRangeParams {
    /// The spreadsheet ID
    pub spreadsheet_id: String,
    /// A1 notation range to clear (e.g. 'Sheet1!A1:B10'); formatting is kept
    pub range: String,
}

impl SheetsTool for ClearRangeParams {
    const NAME: &'static str = "sheets_clear_range";
    type Output = SuccessResponse;

    fn build(&self) -> Result<SheetsCall, InvalidParamsError> {
        tracing::debug!(range = %self.range, "clearing range");
        Ok(SheetsCall::ClearValues {
            spreadsheet_id: self.spreadsheet_id.clone(),
            range: self.range.clone(),
        })
    }

    fn normalize(&self, _reply: Value) -> SuccessResponse {
        SuccessResponse::with_message(format!("Cleared range: {}", self.range))
    }
}
