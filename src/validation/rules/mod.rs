//! The rule catalog.
//!
//! A rule is plain data: an id, a category, a default severity and a predicate.
//! Adding a check means adding an entry to [`CATALOG`]; the engine never changes.
pub mod balance_sheet;
pub mod sanity;
pub mod structural;

use super::context::RuleContext;
use super::finding::{Category, FindingKind, Severity};
use super::selectors::Metric;
use crate::store::NodeId;
use smallvec::SmallVec;

pub type Check = fn(&RuleContext) -> Vec<Violation>;

#[derive(Clone, Copy)]
pub struct Rule {
    pub id: &'static str,
    pub category: Category,
    pub kind: FindingKind,
    pub default_severity: Severity,
    /// Rules that read values run once per scenario; the rest run once per snapshot.
    pub reads_values: bool,
    pub check: Check,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule").field("id", &self.id).field("category", &self.category).finish()
    }
}

/// One site where a predicate failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub nodes: SmallVec<[NodeId; 4]>,
    pub message: String,
    pub suggested_fix: Option<String>,
    /// Replaces the rule's default severity for this site only.
    pub severity: Option<Severity>,
    /// The predicate could not run; reported as `InsufficientData` at Info.
    pub insufficient: bool,
}

impl Violation {
    pub fn new(nodes: impl IntoIterator<Item = NodeId>, message: impl Into<String>) -> Self {
        Self {
            nodes: nodes.into_iter().collect(),
            message: message.into(),
            suggested_fix: None,
            severity: None,
            insufficient: false,
        }
    }

    pub fn insufficient(nodes: impl IntoIterator<Item = NodeId>, message: impl Into<String>) -> Self {
        Self { insufficient: true, ..Self::new(nodes, message) }
    }

    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.suggested_fix = Some(fix.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }
}

pub static CATALOG: &[Rule] = &[
    Rule {
        id: "sanity.revenue-growth-range",
        category: Category::Sanity,
        kind: FindingKind::SanityViolation,
        default_severity: Severity::Warning,
        reads_values: true,
        check: sanity::revenue_growth_range,
    },
    Rule {
        id: "sanity.ebitda-margin-range",
        category: Category::Sanity,
        kind: FindingKind::SanityViolation,
        default_severity: Severity::Warning,
        reads_values: true,
        check: sanity::ebitda_margin_range,
    },
    Rule {
        id: "sanity.wacc-range",
        category: Category::Sanity,
        kind: FindingKind::SanityViolation,
        default_severity: Severity::Warning,
        reads_values: true,
        check: sanity::wacc_range,
    },
    Rule {
        id: "sanity.terminal-growth-vs-risk-free",
        category: Category::Sanity,
        kind: FindingKind::SanityViolation,
        default_severity: Severity::Critical,
        reads_values: true,
        check: sanity::terminal_growth_vs_risk_free,
    },
    Rule {
        id: "sanity.terminal-growth-vs-wacc",
        category: Category::Sanity,
        kind: FindingKind::SanityViolation,
        default_severity: Severity::Critical,
        reads_values: true,
        check: sanity::terminal_growth_vs_wacc,
    },
    Rule {
        id: "sanity.negative-terminal-fcf",
        category: Category::Sanity,
        kind: FindingKind::SanityViolation,
        default_severity: Severity::Critical,
        reads_values: true,
        check: sanity::negative_terminal_fcf,
    },
    Rule {
        id: "structural.hardcoded-constant",
        category: Category::Structural,
        kind: FindingKind::StructuralIssue,
        default_severity: Severity::Warning,
        reads_values: false,
        check: structural::hardcoded_constants,
    },
    Rule {
        id: "structural.inconsistent-formula",
        category: Category::Structural,
        kind: FindingKind::StructuralIssue,
        default_severity: Severity::Warning,
        reads_values: false,
        check: structural::inconsistent_formulas,
    },
    Rule {
        id: "structural.unlinked-assumption",
        category: Category::Structural,
        kind: FindingKind::StructuralIssue,
        default_severity: Severity::Info,
        reads_values: false,
        check: structural::unlinked_assumptions,
    },
    Rule {
        id: "balance.assets-equal-liabilities-plus-equity",
        category: Category::BalanceSheet,
        kind: FindingKind::ReconciliationError,
        default_severity: Severity::Critical,
        reads_values: true,
        check: balance_sheet::assets_equal_liabilities_plus_equity,
    },
    Rule {
        id: "balance.cash-ties-to-cash-flow",
        category: Category::BalanceSheet,
        kind: FindingKind::ReconciliationError,
        default_severity: Severity::Critical,
        reads_values: true,
        check: balance_sheet::cash_ties_to_cash_flow,
    },
    Rule {
        id: "balance.retained-earnings-roll-forward",
        category: Category::BalanceSheet,
        kind: FindingKind::ReconciliationError,
        default_severity: Severity::Critical,
        reads_values: true,
        check: balance_sheet::retained_earnings_roll_forward,
    },
];

pub fn find(id: &str) -> Option<&'static Rule> {
    CATALOG.iter().find(|rule| rule.id == id)
}

/// The selector for `metric` matched nothing; the finding has no address.
pub(crate) fn missing_metric(ctx: &RuleContext, metric: Metric) -> Violation {
    Violation::insufficient(
        Vec::new(),
        format!("{} not found: nothing in the workbook matches {}", metric, ctx.config.selector(metric)),
    )
}

/// Renders a fraction as a percentage with one decimal: 0.25 -> "25.0%".
pub(crate) fn pct(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

#[cfg(test)]
pub(crate) mod harness {
    use super::*;
    use crate::analysis::analyze_cycles;
    use crate::config::ValidationConfig;
    use crate::graph::build;
    use crate::store::{Cell, CellAddress};
    use crate::validation::scenario::Scenario;

    /// Runs one predicate over a snapshot; returns each violation's addresses next to it.
    pub fn run(
        cells: &[Cell],
        config: &ValidationConfig,
        scenario: Option<&Scenario>,
        check: Check,
    ) -> Vec<(Vec<CellAddress>, Violation)> {
        let graph = build(cells, &config.limits).graph;
        let cycles = analyze_cycles(&graph);
        let ctx = RuleContext::new(&graph, &cycles, config, scenario);
        check(&ctx)
            .into_iter()
            .map(|v| (v.nodes.iter().map(|&id| graph.address(id)).collect(), v))
            .collect()
    }

    pub fn run_default(cells: &[Cell], check: Check) -> Vec<(Vec<CellAddress>, Violation)> {
        run(cells, &ValidationConfig::default(), None, check)
    }
}
