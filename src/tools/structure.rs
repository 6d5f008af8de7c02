use super::{
    SheetRect, SheetsTool, SuccessResponse, batch, check_span, first_reply, first_reply_count,
    grid_json,
};
use crate::errors::InvalidParamsError;
use crate::sheets::{GridRange, SheetsCall};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

fn default_num_rows() -> u32 {
    1
}

fn default_merge_type() -> String {
    "MERGE_ALL".to_string()
}

fn default_paste_type() -> String {
    "PASTE_NORMAL".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DeleteRowsParams {
    /// The spreadsheet ID
    pub spreadsheet_id: String,
    /// The sheet ID (use sheets_get_sheet_id to find)
    pub sheet_id: i64,
    /// Start row index (0-based, row 2 in the UI is index 1)
    pub start_row: u32,
    /// End row index (exclusive)
    #[schemars(range(min = 1))]
    pub end_row: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRowsResponse {
    pub success: bool,
    pub deleted_rows: u32,
    pub message: String,
}

impl SheetsTool for DeleteRowsParams {
    const NAME: &'static str = "sheets_delete_rows";
    type Output = DeleteRowsResponse;

    fn validate(&self) -> Result<(), InvalidParamsError> {
        check_span(Self::NAME, "start_row", "end_row", self.start_row, self.end_row)
    }

    fn build(&self) -> Result<SheetsCall, InvalidParamsError> {
        tracing::debug!("deleting rows {}..{}", self.start_row, self.end_row);
        Ok(batch(
            &self.spreadsheet_id,
            json!({
                "deleteDimension": {
                    "range": {
                        "sheetId": self.sheet_id,
                        "dimension": "ROWS",
                        "startIndex": self.start_row,
                        "endIndex": self.end_row,
                    }
                }
            }),
        ))
    }

    fn normalize(&self, _reply: Value) -> DeleteRowsResponse {
        let deleted = self.end_row.saturating_sub(self.start_row);
        DeleteRowsResponse {
            success: true,
            deleted_rows: deleted,
            message: format!("Deleted {deleted} row(s)"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct InsertRowsParams {
    /// The spreadsheet ID
    pub spreadsheet_id: String,
    /// The sheet ID
    pub sheet_id: i64,
    /// Row index to insert at (0-based)
    pub start_row: u32,
    /// Number of rows to insert
    #[serde(default = "default_num_rows")]
    #[schemars(range(min = 1))]
    pub num_rows: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InsertRowsResponse {
    pub success: bool,
    pub inserted_rows: u32,
    pub message: String,
}

impl SheetsTool for InsertRowsParams {
    const NAME: &'static str = "sheets_insert_rows";
    type Output = InsertRowsResponse;

    fn validate(&self) -> Result<(), InvalidParamsError> {
        if self.num_rows < 1 {
            return Err(
                InvalidParamsError::new(Self::NAME, "num_rows must be at least 1")
                    .with_path("num_rows"),
            );
        }
        Ok(())
    }

    fn build(&self) -> Result<SheetsCall, InvalidParamsError> {
        tracing::debug!("inserting {} row(s) at {}", self.num_rows, self.start_row);
        let end = self.start_row.checked_add(self.num_rows).ok_or_else(|| {
            InvalidParamsError::new(Self::NAME, "start_row + num_rows is out of range")
                .with_path("num_rows")
        })?;
        Ok(batch(
            &self.spreadsheet_id,
            json!({
                "insertDimension": {
                    "range": {
                        "sheetId": self.sheet_id,
                        "dimension": "ROWS",
                        "startIndex": self.start_row,
                        "endIndex": end,
                    },
                    "inheritFromBefore": false,
                }
            }),
        ))
    }

    fn normalize(&self, _reply: Value) -> InsertRowsResponse {
        InsertRowsResponse {
            success: true,
            inserted_rows: self.num_rows,
            message: format!(
                "Inserted {} row(s) at row {}",
                self.num_rows,
                u64::from(self.start_row) + 1
            ),
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FindReplaceParams {
    /// The spreadsheet ID
    pub spreadsheet_id: String,
    /// Text to find
    pub find: String,
    /// Replacement text
    pub replacement: String,
    /// Optional sheet ID to limit the search; all sheets when omitted
    #[serde(default)]
    pub sheet_id: Option<i64>,
    /// Case-sensitive matching
    #[serde(default)]
    pub match_case: bool,
    /// Match entire cell contents only
    #[serde(default)]
    pub match_entire_cell: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct FindReplaceResponse {
    pub success: bool,
    pub replacements: u64,
    pub message: String,
}

impl SheetsTool for FindReplaceParams {
    const NAME: &'static str = "sheets_find_replace";
    type Output = FindReplaceResponse;

    fn build(&self) -> Result<SheetsCall, InvalidParamsError> {
        tracing::debug!(find = %self.find, "find and replace");
        let mut spec = json!({
            "find": self.find,
            "replacement": self.replacement,
            "matchCase": self.match_case,
            "matchEntireCell": self.match_entire_cell,
        });
        match self.sheet_id {
            Some(sheet_id) => spec["sheetId"] = json!(sheet_id),
            None => spec["allSheets"] = json!(true),
        }
        Ok(batch(&self.spreadsheet_id, json!({ "findReplace": spec })))
    }

    fn normalize(&self, reply: Value) -> FindReplaceResponse {
        let replacements = first_reply_count(&reply, "findReplace", "occurrencesChanged");
        FindReplaceResponse {
            success: true,
            replacements,
            message: format!("Replaced {replacements} occurrence(s)"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DuplicateSheetParams {
    /// The spreadsheet ID
    pub spreadsheet_id: String,
    /// Sheet ID to duplicate
    pub source_sheet_id: i64,
    /// Name for the new duplicated sheet
    pub new_sheet_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateSheetResponse {
    pub success: bool,
    pub new_sheet_id: Option<i64>,
    pub new_sheet_name: Option<String>,
    pub message: String,
}

impl SheetsTool for DuplicateSheetParams {
    const NAME: &'static str = "sheets_duplicate_sheet";
    type Output = DuplicateSheetResponse;

    fn build(&self) -> Result<SheetsCall, InvalidParamsError> {
        tracing::debug!(new_name = %self.new_sheet_name, "duplicating sheet");
        Ok(batch(
            &self.spreadsheet_id,
            json!({
                "duplicateSheet": {
                    "sourceSheetId": self.source_sheet_id,
                    "newSheetName": self.new_sheet_name,
                }
            }),
        ))
    }

    fn normalize(&self, reply: Value) -> DuplicateSheetResponse {
        let props = first_reply(&reply, "duplicateSheet").and_then(|r| r.get("properties"));
        DuplicateSheetResponse {
            success: true,
            new_sheet_id: props.and_then(|p| p.get("sheetId")).and_then(Value::as_i64),
            new_sheet_name: props
                .and_then(|p| p.get("title"))
                .and_then(Value::as_str)
                .map(str::to_string),
            message: format!("Duplicated sheet to \"{}\"", self.new_sheet_name),
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DeleteDuplicatesParams {
    /// The spreadsheet ID
    pub spreadsheet_id: String,
    #[serde(flatten)]
    pub rect: SheetRect,
    /// Column indices to compare; every column in the range when omitted
    #[serde(default)]
    pub comparison_columns: Option<Vec<u32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteDuplicatesResponse {
    pub success: bool,
    pub duplicates_removed: u64,
    pub message: String,
}

impl SheetsTool for DeleteDuplicatesParams {
    const NAME: &'static str = "sheets_delete_duplicates";
    type Output = DeleteDuplicatesResponse;

    fn validate(&self) -> Result<(), InvalidParamsError> {
        self.rect.validate(Self::NAME)
    }

    fn build(&self) -> Result<SheetsCall, InvalidParamsError> {
        tracing::debug!(rect = ?self.rect, "deleting duplicate rows");
        let mut spec = json!({ "range": grid_json(self.rect.grid_range()) });
        if let Some(columns) = self.comparison_columns.as_deref().filter(|c| !c.is_empty()) {
            let ranges: Vec<Value> = columns
                .iter()
                .map(|&col| {
                    json!({
                        "sheetId": self.rect.sheet_id,
                        "dimension": "COLUMNS",
                        "startIndex": col,
                        "endIndex": u64::from(col) + 1,
                    })
                })
                .collect();
            spec["comparisonColumns"] = Value::Array(ranges);
        }
        Ok(batch(&self.spreadsheet_id, json!({ "deleteDuplicates": spec })))
    }

    fn normalize(&self, reply: Value) -> DeleteDuplicatesResponse {
        let removed = first_reply_count(&reply, "deleteDuplicates", "duplicatesRemovedCount");
        DeleteDuplicatesResponse {
            success: true,
            duplicates_removed: removed,
            message: format!("Removed {removed} duplicate row(s)"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TrimWhitespaceParams {
    /// The spreadsheet ID
    pub spreadsheet_id: String,
    #[serde(flatten)]
    pub rect: SheetRect,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrimWhitespaceResponse {
    pub success: bool,
    pub cells_trimmed: u64,
    pub message: String,
}

impl SheetsTool for TrimWhitespaceParams {
    const NAME: &'static str = "sheets_trim_whitespace";
    type Output = TrimWhitespaceResponse;

    fn validate(&self) -> Result<(), InvalidParamsError> {
        self.rect.validate(Self::NAME)
    }

    fn build(&self) -> Result<SheetsCall, InvalidParamsError> {
        tracing::debug!(rect = ?self.rect, "trimming whitespace");
        Ok(batch(
            &self.spreadsheet_id,
            json!({ "trimWhitespace": { "range": grid_json(self.rect.grid_range()) } }),
        ))
    }

    fn normalize(&self, reply: Value) -> TrimWhitespaceResponse {
        let trimmed = first_reply_count(&reply, "trimWhitespace", "cellsChangedCount");
        TrimWhitespaceResponse {
            success: true,
            cells_trimmed: trimmed,
            message: format!("Trimmed whitespace from {trimmed} cell(s)"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct MergeCellsParams {
    /// The spreadsheet ID
    pub spreadsheet_id: String,
    #[serde(flatten)]
    pub rect: SheetRect,
    /// Merge type: MERGE_ALL, MERGE_COLUMNS or MERGE_ROWS
    #[serde(default = "default_merge_type")]
    pub merge_type: String,
}

impl SheetsTool for MergeCellsParams {
    const NAME: &'static str = "sheets_merge_cells";
    type Output = SuccessResponse;

    fn validate(&self) -> Result<(), InvalidParamsError> {
        self.rect.validate(Self::NAME)
    }

    fn build(&self) -> Result<SheetsCall, InvalidParamsError> {
        tracing::debug!(merge_type = %self.merge_type, "merging cells");
        Ok(batch(
            &self.spreadsheet_id,
            json!({
                "mergeCells": {
                    "range": grid_json(self.rect.grid_range()),
                    "mergeType": self.merge_type,
                }
            }),
        ))
    }

    fn normalize(&self, _reply: Value) -> SuccessResponse {
        SuccessResponse::with_message(format!("Merged cells with type: {}", self.merge_type))
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CopyPasteParams {
    /// The spreadsheet ID
    pub spreadsheet_id: String,
    /// Source sheet ID
    pub source_sheet_id: i64,
    /// Source start row (0-based)
    pub source_start_row: u32,
    /// Source end row (exclusive)
    #[schemars(range(min = 1))]
    pub source_end_row: u32,
    /// Source start column (0-based)
    pub source_start_col: u32,
    /// Source end column (exclusive)
    #[schemars(range(min = 1))]
    pub source_end_col: u32,
    /// Destination sheet ID
    pub dest_sheet_id: i64,
    /// Destination start row (0-based)
    pub dest_start_row: u32,
    /// Destination start column (0-based)
    pub dest_start_col: u32,
    /// Paste type: PASTE_NORMAL, PASTE_VALUES, PASTE_FORMAT, PASTE_FORMULA, ...
    #[serde(default = "default_paste_type")]
    pub paste_type: String,
}

impl SheetsTool for CopyPasteParams {
    const NAME: &'static str = "sheets_copy_paste";
    type Output = SuccessResponse;

    fn validate(&self) -> Result<(), InvalidParamsError> {
        check_span(
            Self::NAME,
            "source_start_row",
            "source_end_row",
            self.source_start_row,
            self.source_end_row,
        )?;
        check_span(
            Self::NAME,
            "source_start_col",
            "source_end_col",
            self.source_start_col,
            self.source_end_col,
        )
    }

    fn build(&self) -> Result<SheetsCall, InvalidParamsError> {
        tracing::debug!(paste_type = %self.paste_type, "copying range");
        let source = GridRange::rect(
            self.source_sheet_id,
            self.source_start_row,
            self.source_end_row,
            self.source_start_col,
            self.source_end_col,
        );
        let destination =
            GridRange::anchor(self.dest_sheet_id, self.dest_start_row, self.dest_start_col);
        Ok(batch(
            &self.spreadsheet_id,
            json!({
                "copyPaste": {
                    "source": grid_json(source),
                    "destination": grid_json(destination),
                    "pasteType": self.paste_type,
                }
            }),
        ))
    }

    fn normalize(&self, _reply: Value) -> SuccessResponse {
        SuccessResponse::with_message(format!("Copied range with paste type: {}", self.paste_type))
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SortRangeParams {
    /// The spreadsheet ID
    pub spreadsheet_id: String,
    #[serde(flatten)]
    pub rect: SheetRect,
    /// Column index to sort by (0-based)
    pub sort_column: u32,
    /// Sort in ascending order
    #[serde(default = "default_true")]
    pub ascending: bool,
}

impl SheetsTool for SortRangeParams {
    const NAME: &'static str = "sheets_sort_range";
    type Output = SuccessResponse;

    fn validate(&self) -> Result<(), InvalidParamsError> {
        self.rect.validate(Self::NAME)
    }

    fn build(&self) -> Result<SheetsCall, InvalidParamsError> {
        let order = if self.ascending {
            "ASCENDING"
        } else {
            "DESCENDING"
        };
        tracing::debug!("sorting by column {} ({order})", self.sort_column);
        Ok(batch(
            &self.spreadsheet_id,
            json!({
                "sortRange": {
                    "range": grid_json(self.rect.grid_range()),
                    "sortSpecs": [{
                        "dimensionIndex": self.sort_column,
                        "sortOrder": order,
                    }],
                }
            }),
        ))
    }

    fn normalize(&self, _reply: Value) -> SuccessResponse {
        SuccessResponse::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> SheetRect {
        SheetRect {
            sheet_id: 9,
            start_row: 0,
            end_row: 100,
            start_col: 0,
            end_col: 5,
        }
    }

    #[test]
    fn delete_rows_counts_locally() {
        let params = DeleteRowsParams {
            spreadsheet_id: "abc".into(),
            sheet_id: 3,
            start_row: 2,
            end_row: 7,
        };
        let out = params.normalize(json!({"replies": [{}]}));
        assert_eq!(out.deleted_rows, 5);
        assert_eq!(out.message, "Deleted 5 row(s)");
    }

    #[test]
    fn insert_rows_cites_one_based_row() {
        let params = InsertRowsParams {
            spreadsheet_id: "abc".into(),
            sheet_id: 3,
            start_row: 4,
            num_rows: 2,
        };
        let call = params.build().unwrap();
        let request = &call.requests().unwrap()[0]["insertDimension"];
        assert_eq!(request["range"]["startIndex"], 4);
        assert_eq!(request["range"]["endIndex"], 6);
        assert_eq!(request["inheritFromBefore"], false);

        let out = params.normalize(json!({}));
        assert_eq!(out.inserted_rows, 2);
        assert_eq!(out.message, "Inserted 2 row(s) at row 5");
    }

    #[test]
    fn find_replace_scopes_to_sheet_or_all() {
        let mut params = FindReplaceParams {
            spreadsheet_id: "abc".into(),
            find: "foo".into(),
            replacement: "bar".into(),
            sheet_id: Some(4),
            match_case: false,
            match_entire_cell: true,
        };
        let call = params.build().unwrap();
        let spec = &call.requests().unwrap()[0]["findReplace"];
        assert_eq!(spec["sheetId"], 4);
        assert!(spec.get("allSheets").is_none());
        assert_eq!(spec["matchEntireCell"], true);

        params.sheet_id = None;
        let call = params.build().unwrap();
        let spec = &call.requests().unwrap()[0]["findReplace"];
        assert_eq!(spec["allSheets"], true);
        assert!(spec.get("sheetId").is_none());
    }

    #[test]
    fn zero_replacements_is_success() {
        let params = FindReplaceParams {
            spreadsheet_id: "abc".into(),
            find: "nothing".into(),
            replacement: "x".into(),
            sheet_id: None,
            match_case: false,
            match_entire_cell: false,
        };
        let out = serde_json::to_value(params.normalize(json!({"replies": [{"findReplace": {}}]})))
            .unwrap();
        assert_eq!(out["success"], true);
        assert_eq!(out["replacements"], 0);
    }

    #[test]
    fn duplicate_sheet_reads_new_properties() {
        let params = DuplicateSheetParams {
            spreadsheet_id: "abc".into(),
            source_sheet_id: 0,
            new_sheet_name: "Copy".into(),
        };
        let out = params.normalize(json!({
            "replies": [{"duplicateSheet": {"properties": {"sheetId": 77, "title": "Copy"}}}]
        }));
        assert_eq!(out.new_sheet_id, Some(77));
        assert_eq!(out.new_sheet_name.as_deref(), Some("Copy"));
        assert_eq!(out.message, "Duplicated sheet to \"Copy\"");
    }

    #[test]
    fn delete_duplicates_builds_one_wide_columns() {
        let params = DeleteDuplicatesParams {
            spreadsheet_id: "abc".into(),
            rect: rect(),
            comparison_columns: Some(vec![0, 2]),
        };
        let call = params.build().unwrap();
        let spec = &call.requests().unwrap()[0]["deleteDuplicates"];
        assert_eq!(
            spec["comparisonColumns"],
            json!([
                {"sheetId": 9, "dimension": "COLUMNS", "startIndex": 0, "endIndex": 1},
                {"sheetId": 9, "dimension": "COLUMNS", "startIndex": 2, "endIndex": 3}
            ])
        );
        assert_eq!(spec["range"]["endRowIndex"], 100);
    }

    #[test]
    fn delete_duplicates_without_columns_compares_all() {
        let params = DeleteDuplicatesParams {
            spreadsheet_id: "abc".into(),
            rect: rect(),
            comparison_columns: None,
        };
        let call = params.build().unwrap();
        assert!(call.requests().unwrap()[0]["deleteDuplicates"]
            .get("comparisonColumns")
            .is_none());
    }

    #[test]
    fn copy_paste_destination_is_anchor_only() {
        let params = CopyPasteParams {
            spreadsheet_id: "abc".into(),
            source_sheet_id: 1,
            source_start_row: 0,
            source_end_row: 3,
            source_start_col: 0,
            source_end_col: 2,
            dest_sheet_id: 2,
            dest_start_row: 10,
            dest_start_col: 4,
            paste_type: default_paste_type(),
        };
        let call = params.build().unwrap();
        let spec = &call.requests().unwrap()[0]["copyPaste"];
        assert_eq!(
            spec["destination"],
            json!({"sheetId": 2, "startRowIndex": 10, "startColumnIndex": 4})
        );
        assert_eq!(spec["pasteType"], "PASTE_NORMAL");
    }

    #[test]
    fn sort_direction_maps_to_enum() {
        let params = SortRangeParams {
            spreadsheet_id: "abc".into(),
            rect: rect(),
            sort_column: 2,
            ascending: false,
        };
        let call = params.build().unwrap();
        assert_eq!(
            call.requests().unwrap()[0]["sortRange"]["sortSpecs"],
            json!([{"dimensionIndex": 2, "sortOrder": "DESCENDING"}])
        );
    }
}
