use once_cell::sync::Lazy;
use regex::Regex;

static ENDPOINT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$?([A-Za-z]{0,3})\$?([0-9]*)$").expect("regex"));

/// A1 reference resolved to 0-based, end-exclusive bounds. An axis left
/// open in the reference (`A:C` has no rows, `2:5` has no columns) is `None`.
/// A `Sheet!` prefix is checked and dropped; callers address sheets by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct A1Range {
    pub start_row: Option<u32>,
    pub end_row: Option<u32>,
    pub start_col: Option<u32>,
    pub end_col: Option<u32>,
}

impl A1Range {
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let cells = match input.rsplit_once('!') {
            Some((sheet, cells)) if is_sheet_name(sheet) => cells,
            Some(_) => return None,
            None => input,
        };

        let (first, second) = match cells.split_once(':') {
            Some((a, b)) => (parse_endpoint(a)?, parse_endpoint(b)?),
            None => {
                let single = parse_endpoint(cells)?;
                (single, single)
            }
        };

        let (start_col, end_col) = span(first.col, second.col)?;
        let (start_row, end_row) = span(first.row, second.row)?;
        if start_col.is_none() && start_row.is_none() {
            return None;
        }

        Some(Self {
            start_row,
            end_row,
            start_col,
            end_col,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct Endpoint {
    /// 1-based
    col: Option<u32>,
    /// 1-based
    row: Option<u32>,
}

fn parse_endpoint(s: &str) -> Option<Endpoint> {
    let caps = ENDPOINT_RE.captures(s.trim())?;
    let letters = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    let digits = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    if letters.is_empty() && digits.is_empty() {
        return None;
    }
    let col = if letters.is_empty() {
        None
    } else {
        Some(col_from_letters(letters)?)
    };
    let row = if digits.is_empty() {
        None
    } else {
        match digits.parse::<u32>().ok()? {
            0 => return None,
            row => Some(row),
        }
    };
    Some(Endpoint { col, row })
}

/// Turns two 1-based inclusive coordinates into a 0-based half-open span.
/// Both sides must agree on whether the axis is bounded.
fn span(a: Option<u32>, b: Option<u32>) -> Option<(Option<u32>, Option<u32>)> {
    match (a, b) {
        (Some(a), Some(b)) => Some((Some(a.min(b) - 1), Some(a.max(b)))),
        (None, None) => Some((None, None)),
        _ => None,
    }
}

fn is_sheet_name(raw: &str) -> bool {
    let raw = raw.trim();
    match raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
        Some(inner) => !inner.is_empty(),
        None => !raw.is_empty() && !raw.starts_with('\''),
    }
}

/// `A` -> 1, `Z` -> 26, `AA` -> 27.
pub fn col_from_letters(s: &str) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    let mut col = 0;
    for c in s.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    Some(col)
}
