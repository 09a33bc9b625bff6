//! The structured records produced by validation.
use crate::store::CellAddress;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Rule identifiers for findings produced outside the rule catalog.
pub mod ids {
    pub const PARSE_ERROR: &str = "formula.parse-error";
    pub const CIRCULAR_REFERENCE: &str = "formula.circular-reference";
    pub const UNRESOLVED_REFERENCE: &str = "graph.unresolved-reference";
    pub const DUPLICATE_ADDRESS: &str = "graph.duplicate-address";
}

/// Ordered so that `Critical < Warning < Info`; sorting ascending puts the
/// most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Critical => "CRITICAL",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Sanity,
    Structural,
    BalanceSheet,
    Formula,
}

impl Category {
    pub const ALL: [Category; 4] =
        [Category::Sanity, Category::Structural, Category::BalanceSheet, Category::Formula];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Category::Sanity => "sanity",
            Category::Structural => "structural",
            Category::BalanceSheet => "balance_sheet",
            Category::Formula => "formula",
        };
        f.write_str(label)
    }
}

/// What went wrong, independent of which rule noticed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    ParseError,
    UnresolvedReference,
    CycleError,
    SanityViolation,
    StructuralIssue,
    ReconciliationError,
    /// A rule could not run because the cells it needs are missing or non-numeric.
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub rule_id: String,
    pub category: Category,
    pub kind: FindingKind,
    pub severity: Severity,
    /// Sorted and free of duplicates.
    pub addresses: Vec<CellAddress>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
    /// Scenarios under which the finding was observed. Empty for findings that do
    /// not depend on scenario inputs.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub scenarios: BTreeSet<String>,
}

impl Finding {
    pub fn new(
        rule_id: impl Into<String>,
        category: Category,
        kind: FindingKind,
        severity: Severity,
        addresses: impl IntoIterator<Item = CellAddress>,
        message: impl Into<String>,
    ) -> Self {
        let mut addresses: Vec<CellAddress> = addresses.into_iter().collect();
        addresses.sort();
        addresses.dedup_by(|a, b| a.key() == b.key());
        Self {
            rule_id: rule_id.into(),
            category,
            kind,
            severity,
            addresses,
            message: message.into(),
            suggested_fix: None,
            scenarios: BTreeSet::new(),
        }
    }

    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }

    pub fn in_scenario(mut self, scenario: Option<&str>) -> Self {
        if let Some(name) = scenario {
            self.scenarios.insert(name.to_string());
        }
        self
    }

    /// First address in sheet/row/column order, if any.
    pub fn primary_address(&self) -> Option<&CellAddress> {
        self.addresses.first()
    }
}
