//! Remote Google Sheets calls.
//!
//! Request builders produce a [`SheetsCall`]; a [`SheetsApi`] implementation
//! executes it and hands back the raw JSON reply.

pub mod a1;
pub mod client;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub use client::GoogleSheetsClient;

pub const USER_ENTERED: &str = "USER_ENTERED";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

/// One call against the Sheets v4 REST surface.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetsCall {
    Create {
        body: Value,
    },
    GetSpreadsheet {
        spreadsheet_id: String,
    },
    GetValues {
        spreadsheet_id: String,
        range: String,
    },
    UpdateValues {
        spreadsheet_id: String,
        range: String,
        values: Vec<Vec<String>>,
    },
    AppendValues {
        spreadsheet_id: String,
        range: String,
        values: Vec<Vec<String>>,
    },
    ClearValues {
        spreadsheet_id: String,
        range: String,
    },
    BatchUpdate {
        spreadsheet_id: String,
        requests: Vec<Value>,
    },
}

impl SheetsCall {
    pub fn method(&self) -> HttpMethod {
        match self {
            SheetsCall::GetSpreadsheet { .. } | SheetsCall::GetValues { .. } => HttpMethod::Get,
            SheetsCall::UpdateValues { .. } => HttpMethod::Put,
            SheetsCall::Create { .. }
            | SheetsCall::AppendValues { .. }
            | SheetsCall::ClearValues { .. }
            | SheetsCall::BatchUpdate { .. } => HttpMethod::Post,
        }
    }

    /// Path relative to the API base URL, with the range percent-encoded.
    pub fn path(&self) -> String {
        match self {
            SheetsCall::Create { .. } => "/spreadsheets".to_string(),
            SheetsCall::GetSpreadsheet { spreadsheet_id } => {
                format!("/spreadsheets/{}", encode(spreadsheet_id))
            }
            SheetsCall::GetValues {
                spreadsheet_id,
                range,
            }
            | SheetsCall::UpdateValues {
                spreadsheet_id,
                range,
                ..
            } => format!(
                "/spreadsheets/{}/values/{}",
                encode(spreadsheet_id),
                encode(range)
            ),
            SheetsCall::AppendValues {
                spreadsheet_id,
                range,
                ..
            } => format!(
                "/spreadsheets/{}/values/{}:append",
                encode(spreadsheet_id),
                encode(range)
            ),
            SheetsCall::ClearValues {
                spreadsheet_id,
                range,
            } => format!(
                "/spreadsheets/{}/values/{}:clear",
                encode(spreadsheet_id),
                encode(range)
            ),
            SheetsCall::BatchUpdate { spreadsheet_id, .. } => {
                format!("/spreadsheets/{}:batchUpdate", encode(spreadsheet_id))
            }
        }
    }

    pub fn query(&self) -> Vec<(&'static str, &'static str)> {
        match self {
            SheetsCall::UpdateValues { .. } | SheetsCall::AppendValues { .. } => {
                vec![("valueInputOption", USER_ENTERED)]
            }
            _ => Vec::new(),
        }
    }

    pub fn body(&self) -> Option<Value> {
        match self {
            SheetsCall::Create { body } => Some(body.clone()),
            SheetsCall::UpdateValues { values, .. } | SheetsCall::AppendValues { values, .. } => {
                Some(json!({ "values": values }))
            }
            SheetsCall::ClearValues { .. } => Some(json!({})),
            SheetsCall::BatchUpdate { requests, .. } => Some(json!({ "requests": requests })),
            SheetsCall::GetSpreadsheet { .. } | SheetsCall::GetValues { .. } => None,
        }
    }

    /// Batch request list, when this is a batchUpdate.
    pub fn requests(&self) -> Option<&[Value]> {
        match self {
            SheetsCall::BatchUpdate { requests, .. } => Some(requests),
            _ => None,
        }
    }
}

fn encode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

#[async_trait]
pub trait SheetsApi: Send + Sync {
    async fn execute(&self, call: &SheetsCall) -> Result<Value>;
}

/// Zero-based, end-exclusive rectangle on one sheet, in the wire shape the
/// Sheets API calls `GridRange`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRange {
    pub sheet_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_row_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_row_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_column_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_column_index: Option<u32>,
}

impl GridRange {
    pub fn rect(sheet_id: i64, start_row: u32, end_row: u32, start_col: u32, end_col: u32) -> Self {
        Self {
            sheet_id,
            start_row_index: Some(start_row),
            end_row_index: Some(end_row),
            start_column_index: Some(start_col),
            end_column_index: Some(end_col),
        }
    }

    /// Top-left anchor without an extent.
    pub fn anchor(sheet_id: i64, row: u32, col: u32) -> Self {
        Self {
            sheet_id,
            start_row_index: Some(row),
            end_row_index: None,
            start_column_index: Some(col),
            end_column_index: None,
        }
    }
}

/// RGB colour with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl Color {
    /// Parses `#RRGGBB` (the `#` is optional) into byte/255 components.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.trim();
        let digits = digits.strip_prefix('#').unwrap_or(digits);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        Some(Self {
            red: f64::from(byte(0)?) / 255.0,
            green: f64::from(byte(2)?) / 255.0,
            blue: f64::from(byte(4)?) / 255.0,
        })
    }
}
