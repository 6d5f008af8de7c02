use super::{SheetsTool, SuccessResponse, batch, grid_json};
use crate::errors::InvalidParamsError;
use crate::sheets::a1::A1Range;
use crate::sheets::{GridRange, SheetsCall};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AddChartParams {
    /// The spreadsheet ID
    pub spreadsheet_id: String,
    /// The sheet ID holding the data and the chart
    pub sheet_id: i64,
    /// Chart type: COLUMN, BAR, LINE, PIE, SCATTER, ...
    pub chart_type: String,
    /// Data range in A1 notation (e.g. 'A1:B10'); the first column is the domain.
    /// A sheet prefix is accepted but ignored; the data is read from `sheet_id`
    pub data_range: String,
    /// Chart title
    pub title: String,
    /// Anchor row for chart position
    #[serde(default)]
    pub row: u32,
    /// Anchor column for chart position
    #[serde(default)]
    pub col: u32,
}

impl AddChartParams {
    /// One source range per column of `data_range`. Every source carries
    /// this tool's `sheet_id`; rows stay open when the range has none.
    fn column_sources(&self) -> Result<Vec<GridRange>, InvalidParamsError> {
        let range = A1Range::parse(&self.data_range).ok_or_else(|| {
            InvalidParamsError::new(
                Self::NAME,
                format!("data_range '{}' is not valid A1 notation", self.data_range),
            )
            .with_path("data_range")
        })?;
        let (Some(start_col), Some(end_col)) = (range.start_col, range.end_col) else {
            return Err(InvalidParamsError::new(
                Self::NAME,
                "data_range must include columns (e.g. A1:C10 or A:C)",
            )
            .with_path("data_range"));
        };

        Ok((start_col..end_col)
            .map(|col| GridRange {
                sheet_id: self.sheet_id,
                start_row_index: range.start_row,
                end_row_index: range.end_row,
                start_column_index: Some(col),
                end_column_index: Some(col + 1),
            })
            .collect())
    }
}

fn source(range: GridRange) -> Value {
    json!({ "sourceRange": { "sources": [grid_json(range)] } })
}

impl SheetsTool for AddChartParams {
    const NAME: &'static str = "sheets_add_chart";
    type Output = SuccessResponse;

    fn build(&self) -> Result<SheetsCall, InvalidParamsError> {
        tracing::debug!(chart_type = %self.chart_type, title = %self.title, "adding chart");
        let columns = self.column_sources()?;
        let (domains, series): (Vec<Value>, Vec<Value>) = match columns.split_first() {
            Some((first, rest)) if !rest.is_empty() => (
                vec![json!({ "domain": source(*first) })],
                rest.iter().map(|c| json!({ "series": source(*c) })).collect(),
            ),
            _ => (
                Vec::new(),
                columns.iter().map(|c| json!({ "series": source(*c) })).collect(),
            ),
        };

        Ok(batch(
            &self.spreadsheet_id,
            json!({
                "addChart": {
                    "chart": {
                        "spec": {
                            "title": self.title,
                            "basicChart": {
                                "chartType": self.chart_type,
                                "legendPosition": "RIGHT_LEGEND",
                                "axis": [
                                    { "position": "BOTTOM_AXIS" },
                                    { "position": "LEFT_AXIS" },
                                ],
                                "domains": domains,
                                "series": series,
                            },
                        },
                        "position": {
                            "overlayPosition": {
                                "anchorCell": {
                                    "sheetId": self.sheet_id,
                                    "rowIndex": self.row,
                                    "columnIndex": self.col,
                                }
                            }
                        },
                    }
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

    fn params(data_range: &str) -> AddChartParams {
        AddChartParams {
            spreadsheet_id: "abc".into(),
            sheet_id: 12,
            chart_type: "PIE".into(),
            data_range: data_range.into(),
            title: "Sales".into(),
            row: 5,
            col: 10,
        }
    }

    fn chart(call: &SheetsCall) -> &Value {
        &call.requests().unwrap()[0]["addChart"]["chart"]
    }

    #[test]
    fn anchor_and_type_are_forwarded() {
        let call = params("Sheet1!A1:B10").build().unwrap();
        let chart = chart(&call);
        assert_eq!(
            chart["position"]["overlayPosition"]["anchorCell"],
            json!({"sheetId": 12, "rowIndex": 5, "columnIndex": 10})
        );
        assert_eq!(chart["spec"]["basicChart"]["chartType"], "PIE");
    }

    #[test]
    fn first_column_is_domain_rest_are_series() {
        let call = params("Sheet1!A1:C10").build().unwrap();
        let basic = &chart(&call)["spec"]["basicChart"];
        assert_eq!(
            basic["domains"][0]["domain"]["sourceRange"]["sources"][0],
            json!({
                "sheetId": 12,
                "startRowIndex": 0,
                "endRowIndex": 10,
                "startColumnIndex": 0,
                "endColumnIndex": 1
            })
        );
        let series = basic["series"].as_array().unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(
            series[1]["series"]["sourceRange"]["sources"][0]["startColumnIndex"],
            2
        );
    }

    #[test]
    fn single_column_is_one_series() {
        let call = params("B:B").build().unwrap();
        let basic = &chart(&call)["spec"]["basicChart"];
        assert_eq!(basic["domains"], json!([]));
        let source = &basic["series"][0]["series"]["sourceRange"]["sources"][0];
        assert_eq!(
            *source,
            json!({"sheetId": 12, "startColumnIndex": 1, "endColumnIndex": 2})
        );
    }

    #[test]
    fn sheet_prefix_does_not_change_target_sheet() {
        let prefixed = params("'Other sheet'!A1:B4").build().unwrap();
        let bare = params("A1:B4").build().unwrap();
        assert_eq!(chart(&prefixed), chart(&bare));
        assert_eq!(
            chart(&prefixed)["spec"]["basicChart"]["series"][0]["series"]["sourceRange"]["sources"]
                [0]["sheetId"],
            12
        );
    }

    #[test]
    fn unparseable_range_is_rejected() {
        let err = params("not a range").build().unwrap_err();
        assert_eq!(err.path(), Some("data_range"));
        let err = params("2:5").build().unwrap_err();
        assert_eq!(err.path(), Some("data_range"));
    }
}
