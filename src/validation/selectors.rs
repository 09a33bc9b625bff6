//! Where the financial inputs of a model live.
//!
//! Rules never hardcode addresses; they ask for a [`Metric`] and the configured
//! [`Selector`] says which cells hold it.
use crate::error::AuditError;
use crate::formula::lexer::parse_cell_token;
use crate::formula::{RangeRef, SheetName};
use crate::graph::DependencyGraph;
use crate::store::{NodeId, RawContent};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    RevenueGrowth,
    EbitdaMargin,
    Wacc,
    TerminalGrowth,
    RiskFreeRate,
    TerminalFcf,
    TotalAssets,
    TotalLiabilities,
    TotalEquity,
    BalanceSheetCash,
    EndingCash,
    RetainedEarnings,
    NetIncome,
    Dividends,
}

impl Metric {
    pub fn label(self) -> &'static str {
        match self {
            Metric::RevenueGrowth => "Revenue growth",
            Metric::EbitdaMargin => "EBITDA margin",
            Metric::Wacc => "WACC",
            Metric::TerminalGrowth => "Terminal growth",
            Metric::RiskFreeRate => "Risk-free rate",
            Metric::TerminalFcf => "Terminal-year free cash flow",
            Metric::TotalAssets => "Total assets",
            Metric::TotalLiabilities => "Total liabilities",
            Metric::TotalEquity => "Total equity",
            Metric::BalanceSheetCash => "Balance sheet cash",
            Metric::EndingCash => "Ending cash",
            Metric::RetainedEarnings => "Retained earnings",
            Metric::NetIncome => "Net income",
            Metric::Dividends => "Dividends",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Either an A1 reference (`"Assumptions!B26"`, `"Projections!B5:G5"`) or a row label.
///
/// A label selector picks the first row on `sheet` whose text cell equals `label`
/// (trimmed, case-insensitive) and yields every number or formula to its right.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Selector {
    Reference(String),
    Label { sheet: String, label: String },
}

impl Selector {
    pub fn reference(text: impl Into<String>) -> Self {
        Selector::Reference(text.into())
    }

    pub fn label(sheet: impl Into<String>, label: impl Into<String>) -> Self {
        Selector::Label { sheet: sheet.into(), label: label.into() }
    }

    /// Layout of the generated DCF workbook.
    pub fn default_for(metric: Metric) -> Self {
        match metric {
            Metric::Wacc => Self::reference("Assumptions!B26"),
            Metric::RiskFreeRate => Self::reference("Assumptions!B17"),
            Metric::TerminalGrowth => Self::reference("Assumptions!B35"),
            Metric::RevenueGrowth => Self::reference("Projections!B5:G5"),
            Metric::EbitdaMargin => Self::reference("Projections!B7:G7"),
            Metric::TerminalFcf => Self::reference("Valuation!B6"),
            Metric::TotalAssets => Self::label("Balance Sheet", "Total Assets"),
            Metric::TotalLiabilities => Self::label("Balance Sheet", "Total Liabilities"),
            Metric::TotalEquity => Self::label("Balance Sheet", "Total Equity"),
            Metric::BalanceSheetCash => Self::label("Balance Sheet", "Cash"),
            Metric::EndingCash => Self::label("Cash Flow", "Ending Cash"),
            Metric::RetainedEarnings => Self::label("Balance Sheet", "Retained Earnings"),
            Metric::NetIncome => Self::label("Income Statement", "Net Income"),
            Metric::Dividends => Self::label("Income Statement", "Dividends"),
        }
    }

    pub fn validate(&self) -> Result<(), AuditError> {
        match self {
            Selector::Reference(text) => parse_reference(text).map(|_| ()),
            Selector::Label { sheet, label } if sheet.trim().is_empty() || label.trim().is_empty() => {
                Err(AuditError::InvalidConfig("label selectors need a sheet and a label".into()))
            }
            Selector::Label { .. } => Ok(()),
        }
    }

    /// Existing cells the selector covers, in period order. Empty when nothing matches.
    pub fn resolve(&self, graph: &DependencyGraph) -> Vec<NodeId> {
        match self {
            Selector::Reference(text) => match parse_reference(text) {
                Ok(range) => {
                    let sheet = range.sheet.as_ref().map_or("", |s| s.as_str());
                    range.cells().filter_map(|(row, column)| graph.lookup(sheet, row, column)).collect()
                }
                Err(_) => Vec::new(),
            },
            Selector::Label { sheet, label } => resolve_label(graph, sheet, label),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Reference(text) => f.write_str(text),
            Selector::Label { sheet, label } => write!(f, "row labelled '{}' on {}", label, sheet),
        }
    }
}

fn resolve_label(graph: &DependencyGraph, sheet: &str, label: &str) -> Vec<NodeId> {
    let wanted = label.trim().to_lowercase();
    let anchor = graph.sheet_nodes(sheet).find(|&id| match &graph.cell(id).raw {
        RawContent::Text(text) => text.trim().to_lowercase() == wanted,
        _ => false,
    });
    let Some(anchor) = anchor else { return Vec::new() };
    let anchor_cell = graph.cell(anchor);

    graph
        .row(sheet, anchor_cell.row)
        .iter()
        .copied()
        .filter(|&id| {
            let cell = graph.cell(id);
            cell.column > anchor_cell.column
                && matches!(cell.raw, RawContent::Formula(_) | RawContent::Number(_))
        })
        .collect()
}

/// Parses `Sheet!A1` or `Sheet!A1:B2` (sheet optionally quoted, `$` allowed).
/// The sheet name is mandatory; a single cell comes back as a one-cell range.
pub fn parse_reference(text: &str) -> Result<RangeRef, AuditError> {
    let invalid = |reason: &str| AuditError::InvalidAddress { text: text.to_string(), reason: reason.to_string() };

    let trimmed = text.trim();
    let (sheet, cells) = trimmed.rsplit_once('!').ok_or_else(|| invalid("missing sheet name"))?;
    let sheet = match sheet.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        Some(quoted) => quoted.replace("''", "'"),
        None => sheet.to_string(),
    };
    if sheet.trim().is_empty() {
        return Err(invalid("missing sheet name"));
    }

    let (first, last) = match cells.split_once(':') {
        Some((a, b)) => (a, b),
        None => (cells, cells),
    };
    let start = parse_cell_token(first.trim().to_uppercase().as_str()).ok_or_else(|| invalid("not a cell reference"))?;
    let end = parse_cell_token(last.trim().to_uppercase().as_str()).ok_or_else(|| invalid("not a cell reference"))?;
    Ok(RangeRef::new(Some(SheetName::new(sheet)), (start.row, start.column), (end.row, end.column)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::ParserOptions;
    use crate::graph::build;
    use crate::store::Cell;
    use rstest::rstest;

    #[rstest]
    #[case("Assumptions!B26", "Assumptions", (26, 2), (26, 2))]
    #[case("Projections!$B$5:G5", "Projections", (5, 2), (5, 7))]
    #[case("'Balance Sheet'!c3", "Balance Sheet", (3, 3), (3, 3))]
    #[case("'Bob''s'!A2:A1", "Bob's", (1, 1), (2, 1))]
    fn test_parse_reference(
        #[case] text: &str,
        #[case] sheet: &str,
        #[case] start: (u32, u32),
        #[case] end: (u32, u32),
    ) {
        let range = parse_reference(text).unwrap();
        assert_eq!(range.sheet.unwrap().as_str(), sheet);
        assert_eq!((range.start_row, range.start_column), start);
        assert_eq!((range.end_row, range.end_column), end);
    }

    #[rstest]
    #[case("B26")]
    #[case("!B26")]
    #[case("Sheet!26B")]
    #[case("Sheet!B0")]
    fn test_rejects_malformed_reference(#[case] text: &str) {
        assert!(matches!(parse_reference(text), Err(AuditError::InvalidAddress { .. })));
    }

    #[test]
    fn test_label_selector_takes_values_right_of_label() {
        let graph = build(
            &[
                Cell::text("Balance Sheet", 10, 1, " total assets "),
                Cell::number("Balance Sheet", 10, 2, 100.0),
                Cell::formula("Balance Sheet", 10, 3, "=B10*1.1"),
                Cell::text("Balance Sheet", 10, 4, "n/a"),
                Cell::number("Balance Sheet", 11, 2, 7.0),
            ],
            &ParserOptions::default(),
        )
        .graph;
        let ids = Selector::label("Balance Sheet", "Total Assets").resolve(&graph);
        let columns: Vec<u32> = ids.iter().map(|&id| graph.cell(id).column).collect();
        assert_eq!(columns, vec![2, 3]);
    }

    #[test]
    fn test_range_selector_skips_missing_cells() {
        let graph = build(
            &[Cell::number("Projections", 5, 2, 0.1), Cell::number("Projections", 5, 4, 0.1)],
            &ParserOptions::default(),
        )
        .graph;
        assert_eq!(Selector::default_for(Metric::RevenueGrowth).resolve(&graph).len(), 2);
        assert!(Selector::default_for(Metric::Wacc).resolve(&graph).is_empty());
    }

    #[test]
    fn test_selector_deserializes_both_forms() {
        let parsed: Vec<Selector> =
            serde_json::from_str(r#"["Assumptions!B26", {"sheet": "Balance Sheet", "label": "Cash"}]"#).unwrap();
        assert_eq!(parsed[0], Selector::reference("Assumptions!B26"));
        assert_eq!(parsed[1], Selector::label("Balance Sheet", "Cash"));
    }
}
