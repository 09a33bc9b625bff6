use serde::{Deserialize, Serialize};
use std::fmt;

/// Excel's grid limits. References outside them are not cell references.
pub const MAX_ROWS: u32 = 1_048_576;
pub const MAX_COLUMNS: u32 = 16_384;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

/// A fully-qualified, 1-based cell address.
///
/// Field order matters: the derived `Ord` sorts by sheet, then row, then column,
/// which is the order reports are presented in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellAddress {
    pub sheet: String,
    pub row: u32,
    pub column: u32,
}

impl CellAddress {
    pub fn new(sheet: impl Into<String>, row: u32, column: u32) -> Self {
        Self { sheet: sheet.into(), row, column }
    }

    /// Lookup key: sheet names compare case-insensitively, like the host does.
    pub fn key(&self) -> CellKey {
        CellKey::new(&self.sheet, self.row, self.column)
    }
}

impl fmt::Display for CellAddress {
    /// `Sheet!B12`, quoting sheet names that are not plain identifiers.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}{}", quote_sheet(&self.sheet), column_letters(self.column), self.row)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub sheet: String,
    pub row: u32,
    pub column: u32,
}

impl CellKey {
    pub fn new(sheet: &str, row: u32, column: u32) -> Self {
        Self { sheet: sheet_key(sheet), row, column }
    }
}

pub fn sheet_key(sheet: &str) -> String {
    sheet.trim().to_uppercase()
}

pub fn quote_sheet(sheet: &str) -> String {
    let plain = !sheet.is_empty()
        && sheet.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        && !sheet.starts_with(|c: char| c.is_ascii_digit());
    if plain {
        sheet.to_string()
    } else {
        format!("'{}'", sheet.replace('\'', "''"))
    }
}

/// 1 -> "A", 27 -> "AA".
pub fn column_letters(mut column: u32) -> String {
    let mut out = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        out.push(b'A' + rem as u8);
        column = (column - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// "A" -> 1, "aa" -> 27. `None` for empty input, non-letters, or columns past XFD.
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let mut column: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        column = column * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }
    (column <= MAX_COLUMNS).then_some(column)
}

/// The host's raw cell content: a formula (text after the `=` marker is kept verbatim)
/// or a literal.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Option<RawInput>", into = "Option<RawInput>")]
pub enum RawContent {
    Formula(String),
    Number(f64),
    Text(String),
    Bool(bool),
    #[default]
    Empty,
}

pub const FORMULA_MARKER: char = '=';

impl RawContent {
    pub fn is_formula(&self) -> bool { matches!(self, RawContent::Formula(_)) }

    pub fn as_number(&self) -> Option<f64> {
        match self { RawContent::Number(n) => Some(*n), _ => None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawInput {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl From<Option<RawInput>> for RawContent {
    fn from(raw: Option<RawInput>) -> Self {
        match raw {
            None => RawContent::Empty,
            Some(RawInput::Number(n)) => RawContent::Number(n),
            Some(RawInput::Bool(b)) => RawContent::Bool(b),
            Some(RawInput::Text(s)) if s.trim_start().starts_with(FORMULA_MARKER) => RawContent::Formula(s),
            Some(RawInput::Text(s)) if s.is_empty() => RawContent::Empty,
            Some(RawInput::Text(s)) => RawContent::Text(s),
        }
    }
}

impl From<RawContent> for Option<RawInput> {
    fn from(raw: RawContent) -> Self {
        match raw {
            RawContent::Formula(s) | RawContent::Text(s) => Some(RawInput::Text(s)),
            RawContent::Number(n) => Some(RawInput::Number(n)),
            RawContent::Bool(b) => Some(RawInput::Bool(b)),
            RawContent::Empty => None,
        }
    }
}

/// The host's last successful evaluation of a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl CellValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }
}

/// One addressable unit of the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub sheet: String,
    pub row: u32,
    pub column: u32,
    #[serde(default)]
    pub raw: RawContent,
    #[serde(default, alias = "computedValue", skip_serializing_if = "Option::is_none")]
    pub computed_value: Option<CellValue>,
}

impl Cell {
    pub fn new(sheet: impl Into<String>, row: u32, column: u32, raw: RawContent) -> Self {
        Self { sheet: sheet.into(), row, column, raw, computed_value: None }
    }

    pub fn formula(sheet: impl Into<String>, row: u32, column: u32, text: &str) -> Self {
        Self::new(sheet, row, column, RawContent::Formula(text.to_string()))
    }

    pub fn number(sheet: impl Into<String>, row: u32, column: u32, value: f64) -> Self {
        Self::new(sheet, row, column, RawContent::Number(value))
    }

    pub fn text(sheet: impl Into<String>, row: u32, column: u32, value: &str) -> Self {
        Self::new(sheet, row, column, RawContent::Text(value.to_string()))
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.computed_value = Some(CellValue::Number(value));
        self
    }

    pub fn address(&self) -> CellAddress {
        CellAddress::new(self.sheet.clone(), self.row, self.column)
    }

    pub fn key(&self) -> CellKey {
        CellKey::new(&self.sheet, self.row, self.column)
    }

    /// Host-computed number, falling back to a numeric literal.
    pub fn numeric_value(&self) -> Option<f64> {
        match &self.computed_value {
            Some(v) => v.as_number(),
            None => self.raw.as_number(),
        }
    }
}
