use super::{SheetRect, SheetsTool, SuccessResponse, batch, grid_json};
use crate::errors::InvalidParamsError;
use crate::sheets::{Color, SheetsCall};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};

fn default_border_style() -> String {
    "SOLID".to_string()
}

fn default_border_color() -> String {
    "#000000".to_string()
}

fn parse_color(
    tool: &'static str,
    field: &'static str,
    hex: &str,
) -> Result<Color, InvalidParamsError> {
    Color::from_hex(hex).ok_or_else(|| {
        InvalidParamsError::new(
            tool,
            format!("{field} must be a hex color like #RRGGBB, got '{hex}'"),
        )
        .with_path(field)
    })
}

fn color_json(color: Color) -> Value {
    json!({ "red": color.red, "green": color.green, "blue": color.blue })
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FormatCellsParams {
    /// The spreadsheet ID
    pub spreadsheet_id: String,
    #[serde(flatten)]
    pub rect: SheetRect,
    /// Make text bold
    #[serde(default)]
    pub bold: Option<bool>,
    /// Make text italic
    #[serde(default)]
    pub italic: Option<bool>,
    /// Font size in points
    #[serde(default)]
    #[schemars(range(min = 1))]
    pub font_size: Option<u32>,
    /// Background color as hex (e.g. #FF0000)
    #[serde(default)]
    pub bg_color: Option<String>,
    /// Text color as hex (e.g. #000000)
    #[serde(default)]
    pub text_color: Option<String>,
}

impl FormatCellsParams {
    /// The `userEnteredFormat` object and the matching field mask. Only
    /// properties the caller set appear in either.
    fn cell_format(&self) -> Result<(Value, String), InvalidParamsError> {
        let mut text_format = Map::new();
        let mut fields = Vec::new();

        if let Some(bold) = self.bold {
            text_format.insert("bold".into(), json!(bold));
            fields.push("userEnteredFormat.textFormat.bold");
        }
        if let Some(italic) = self.italic {
            text_format.insert("italic".into(), json!(italic));
            fields.push("userEnteredFormat.textFormat.italic");
        }
        if let Some(size) = self.font_size {
            text_format.insert("fontSize".into(), json!(size));
            fields.push("userEnteredFormat.textFormat.fontSize");
        }
        if let Some(hex) = self.text_color.as_deref() {
            let color = parse_color(Self::NAME, "text_color", hex)?;
            text_format.insert("foregroundColor".into(), color_json(color));
            fields.push("userEnteredFormat.textFormat.foregroundColor");
        }

        let mut cell_format = Map::new();
        if !text_format.is_empty() {
            cell_format.insert("textFormat".into(), Value::Object(text_format));
        }
        if let Some(hex) = self.bg_color.as_deref() {
            let color = parse_color(Self::NAME, "bg_color", hex)?;
            cell_format.insert("backgroundColor".into(), color_json(color));
            fields.push("userEnteredFormat.backgroundColor");
        }

        if fields.is_empty() {
            return Err(InvalidParamsError::new(
                Self::NAME,
                "set at least one of bold, italic, font_size, bg_color or text_color",
            ));
        }
        Ok((Value::Object(cell_format), fields.join(",")))
    }
}

impl SheetsTool for FormatCellsParams {
    const NAME: &'static str = "sheets_format_cells";
    type Output = SuccessResponse;

    fn validate(&self) -> Result<(), InvalidParamsError> {
        self.rect.validate(Self::NAME)?;
        if self.font_size == Some(0) {
            return Err(
                InvalidParamsError::new(Self::NAME, "font_size must be at least 1")
                    .with_path("font_size"),
            );
        }
        Ok(())
    }

    fn build(&self) -> Result<SheetsCall, InvalidParamsError> {
        let (format, fields) = self.cell_format()?;
        tracing::debug!(fields = %fields, "formatting cells");
        Ok(batch(
            &self.spreadsheet_id,
            json!({
                "repeatCell": {
                    "range": grid_json(self.rect.grid_range()),
                    "cell": { "userEnteredFormat": format },
                    "fields": fields,
                }
            }),
        ))
    }

    fn normalize(&self, _reply: Value) -> SuccessResponse {
        SuccessResponse::ok()
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AddBordersParams {
    /// The spreadsheet ID
    pub spreadsheet_id: String,
    #[serde(flatten)]
    pub rect: SheetRect,
    /// Border style: SOLID, DASHED, DOTTED, ...
    #[serde(default = "default_border_style")]
    pub style: String,
    /// Border color as hex (e.g. #000000)
    #[serde(default = "default_border_color")]
    pub color: String,
}

impl SheetsTool for AddBordersParams {
    const NAME: &'static str = "sheets_add_borders";
    type Output = SuccessResponse;

    fn validate(&self) -> Result<(), InvalidParamsError> {
        self.rect.validate(Self::NAME)
    }

    fn build(&self) -> Result<SheetsCall, InvalidParamsError> {
        tracing::debug!(style = %self.style, "adding borders");
        let color = parse_color(Self::NAME, "color", &self.color)?;
        let border = json!({ "style": self.style, "color": color_json(color) });
        Ok(batch(
            &self.spreadsheet_id,
            json!({
                "updateBorders": {
                    "range": grid_json(self.rect.grid_range()),
                    "top": border,
                    "bottom": border,
                    "left": border,
                    "right": border,
                    "innerHorizontal": border,
                    "innerVertical": border,
                }
            }),
        ))
    }

    fn normalize(&self, _reply: Value) -> SuccessResponse {
        SuccessResponse::ok()
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AddDropdownParams {
    /// The spreadsheet ID
    pub spreadsheet_id: String,
    #[serde(flatten)]
    pub rect: SheetRect,
    /// List of dropdown options
    pub values: Vec<String>,
}

impl SheetsTool for AddDropdownParams {
    const NAME: &'static str = "sheets_add_dropdown";
    type Output = SuccessResponse;

    fn validate(&self) -> Result<(), InvalidParamsError> {
        self.rect.validate(Self::NAME)
    }

    fn build(&self) -> Result<SheetsCall, InvalidParamsError> {
        tracing::debug!("adding dropdown with {} options", self.values.len());
        let values: Vec<Value> = self
            .values
            .iter()
            .map(|v| json!({ "userEnteredValue": v }))
            .collect();
        Ok(batch(
            &self.spreadsheet_id,
            json!({
                "setDataValidation": {
                    "range": grid_json(self.rect.grid_range()),
                    "rule": {
                        "condition": { "type": "ONE_OF_LIST", "values": values },
                        "showCustomUi": true,
                    },
                }
            }),
        ))
    }

    fn normalize(&self, _reply: Value) -> SuccessResponse {
        SuccessResponse::ok()
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ConditionalFormatParams {
    /// The spreadsheet ID
    pub spreadsheet_id: String,
    #[serde(flatten)]
    pub rect: SheetRect,
    /// Condition type: NUMBER_GREATER, NUMBER_LESS, TEXT_CONTAINS, ...
    pub condition_type: String,
    /// Value to compare against
    pub condition_value: String,
    /// Background color as hex (e.g. #00FF00)
    pub bg_color: String,
}

impl SheetsTool for ConditionalFormatParams {
    const NAME: &'static str = "sheets_conditional_format";
    type Output = SuccessResponse;

    fn validate(&self) -> Result<(), InvalidParamsError> {
        self.rect.validate(Self::NAME)
    }

    fn build(&self) -> Result<SheetsCall, InvalidParamsError> {
        tracing::debug!(
            condition = %self.condition_type,
            value = %self.condition_value,
            "adding conditional format"
        );
        let color = parse_color(Self::NAME, "bg_color", &self.bg_color)?;
        Ok(batch(
            &self.spreadsheet_id,
            json!({
                "addConditionalFormatRule": {
                    "rule": {
                        "ranges": [grid_json(self.rect.grid_range())],
                        "booleanRule": {
                            "condition": {
                                "type": self.condition_type,
                                "values": [{ "userEnteredValue": self.condition_value }],
                            },
                            "format": { "backgroundColor": color_json(color) },
                        },
                    },
                    "index": 0,
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
            sheet_id: 1,
            start_row: 0,
            end_row: 2,
            start_col: 0,
            end_col: 3,
        }
    }

    fn format_params() -> FormatCellsParams {
        FormatCellsParams {
            spreadsheet_id: "abc".into(),
            rect: rect(),
            bold: None,
            italic: None,
            font_size: None,
            bg_color: None,
            text_color: None,
        }
    }

    #[test]
    fn bold_only_touches_text_format() {
        let params = FormatCellsParams {
            bold: Some(true),
            ..format_params()
        };
        let call = params.build().unwrap();
        let repeat = &call.requests().unwrap()[0]["repeatCell"];
        assert_eq!(repeat["fields"], "userEnteredFormat.textFormat.bold");
        assert_eq!(
            repeat["cell"]["userEnteredFormat"],
            json!({"textFormat": {"bold": true}})
        );
        let rendered = repeat.to_string();
        assert!(!rendered.contains("backgroundColor"));
        assert!(!rendered.contains("foregroundColor"));
    }

    #[test]
    fn colors_land_in_mask_and_payload() {
        let params = FormatCellsParams {
            bg_color: Some("#FF0000".into()),
            text_color: Some("000000".into()),
            ..format_params()
        };
        let call = params.build().unwrap();
        let repeat = &call.requests().unwrap()[0]["repeatCell"];
        assert_eq!(
            repeat["fields"],
            "userEnteredFormat.textFormat.foregroundColor,userEnteredFormat.backgroundColor"
        );
        assert_eq!(
            repeat["cell"]["userEnteredFormat"]["backgroundColor"],
            json!({"red": 1.0, "green": 0.0, "blue": 0.0})
        );
    }

    #[test]
    fn format_without_properties_is_rejected() {
        let err = format_params().build().unwrap_err();
        assert_eq!(err.tool(), "sheets_format_cells");
    }

    #[test]
    fn malformed_color_is_rejected() {
        let params = FormatCellsParams {
            bg_color: Some("#12345".into()),
            ..format_params()
        };
        assert_eq!(params.build().unwrap_err().path(), Some("bg_color"));
    }

    #[test]
    fn borders_apply_to_all_six_edges() {
        let params = AddBordersParams {
            spreadsheet_id: "abc".into(),
            rect: rect(),
            style: default_border_style(),
            color: default_border_color(),
        };
        let call = params.build().unwrap();
        let update = &call.requests().unwrap()[0]["updateBorders"];
        let expected = json!({"style": "SOLID", "color": {"red": 0.0, "green": 0.0, "blue": 0.0}});
        for edge in ["top", "bottom", "left", "right", "innerHorizontal", "innerVertical"] {
            assert_eq!(update[edge], expected, "edge {edge}");
        }
    }

    #[test]
    fn dropdown_lists_each_value() {
        let params = AddDropdownParams {
            spreadsheet_id: "abc".into(),
            rect: rect(),
            values: vec!["Yes".into(), "No".into()],
        };
        let call = params.build().unwrap();
        let rule = &call.requests().unwrap()[0]["setDataValidation"]["rule"];
        assert_eq!(rule["condition"]["type"], "ONE_OF_LIST");
        assert_eq!(
            rule["condition"]["values"],
            json!([{"userEnteredValue": "Yes"}, {"userEnteredValue": "No"}])
        );
        assert_eq!(rule["showCustomUi"], true);
    }

    #[test]
    fn conditional_rule_goes_first() {
        let params = ConditionalFormatParams {
            spreadsheet_id: "abc".into(),
            rect: rect(),
            condition_type: "NUMBER_GREATER".into(),
            condition_value: "10".into(),
            bg_color: "#00FF00".into(),
        };
        let call = params.build().unwrap();
        let add = &call.requests().unwrap()[0]["addConditionalFormatRule"];
        assert_eq!(add["index"], 0);
        assert_eq!(
            add["rule"]["booleanRule"]["condition"],
            json!({"type": "NUMBER_GREATER", "values": [{"userEnteredValue": "10"}]})
        );
        assert_eq!(add["rule"]["ranges"][0]["sheetId"], 1);
    }
}
