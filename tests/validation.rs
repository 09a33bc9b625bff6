//! End-to-end runs over small workbooks.

use valuation_audit_core::{
    validate, CancellationToken, Category, Cell, CellAddress, FindingKind, ScenarioSet, Severity, Snapshot, Status,
    ValidationConfig, ValidationReport, Validator,
};

fn balance_sheet(assets: f64, liabilities: f64, equity: f64) -> Vec<Cell> {
    vec![
        Cell::text("Balance Sheet", 10, 1, "Total Assets"),
        Cell::number("Balance Sheet", 10, 2, assets),
        Cell::text("Balance Sheet", 20, 1, "Total Liabilities"),
        Cell::number("Balance Sheet", 20, 2, liabilities),
        Cell::text("Balance Sheet", 30, 1, "Total Equity"),
        Cell::number("Balance Sheet", 30, 2, equity),
    ]
}

fn assumptions(wacc: f64, risk_free: f64, terminal_growth: f64) -> Vec<Cell> {
    vec![
        Cell::number("Assumptions", 26, 2, wacc),
        Cell::number("Assumptions", 17, 2, risk_free),
        Cell::number("Assumptions", 35, 2, terminal_growth),
    ]
}

fn run(cells: Vec<Cell>) -> ValidationReport {
    validate(&Snapshot::new(cells), &ScenarioSet::empty()).unwrap()
}

fn by_rule<'r>(report: &'r ValidationReport, rule_id: &str) -> Vec<&'r valuation_audit_core::Finding> {
    report.findings().iter().filter(|f| f.rule_id == rule_id).collect()
}

#[test]
fn balance_sheet_that_does_not_balance_is_critical() {
    let report = run(balance_sheet(100.0, 60.0, 35.0));
    let found = by_rule(&report, "balance.assets-equal-liabilities-plus-equity");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, FindingKind::ReconciliationError);
    assert_eq!(found[0].severity, Severity::Critical);
    assert!(found[0].message.contains("delta 5"));
    assert_eq!(report.status(), Status::Unsound);

    let balanced = run(balance_sheet(100.0, 60.0, 40.0));
    assert!(by_rule(&balanced, "balance.assets-equal-liabilities-plus-equity").is_empty());
}

#[test]
fn wacc_out_of_range_is_a_warning() {
    let report = run(assumptions(0.25, 0.04, 0.02));
    let found = by_rule(&report, "sanity.wacc-range");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, FindingKind::SanityViolation);
    assert_eq!(found[0].severity, Severity::Warning);
    assert!(found[0].message.starts_with("WACC outside 5%–20%"));
    assert_eq!(found[0].addresses, vec![CellAddress::new("Assumptions", 26, 2)]);
}

#[test]
fn terminal_growth_above_risk_free_is_critical() {
    let report = run(assumptions(0.09, 0.04, 0.06));
    let found = by_rule(&report, "sanity.terminal-growth-vs-risk-free");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].kind, FindingKind::SanityViolation);
    assert_eq!(found[0].severity, Severity::Critical);
}

#[test]
fn three_cell_loop_is_one_cycle_finding() {
    let report = run(vec![
        Cell::formula("Model", 1, 1, "=B1"),
        Cell::formula("Model", 1, 2, "=C1"),
        Cell::formula("Model", 1, 3, "=A1"),
    ]);
    let cycles: Vec<_> = report.findings().iter().filter(|f| f.kind == FindingKind::CycleError).collect();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].severity, Severity::Critical);
    assert_eq!(
        cycles[0].addresses,
        vec![CellAddress::new("Model", 1, 1), CellAddress::new("Model", 1, 2), CellAddress::new("Model", 1, 3)]
    );
}

fn messy_workbook() -> Vec<Cell> {
    let mut cells = balance_sheet(100.0, 60.0, 35.0);
    cells.extend(assumptions(0.25, 0.04, 0.06));
    cells.extend([
        Cell::formula("Projections", 9, 2, "=B8*2").with_value(20.0),
        Cell::formula("Projections", 9, 3, "=C8*2").with_value(22.0),
        Cell::number("Projections", 9, 4, 1250.0),
        Cell::formula("Projections", 9, 5, "=E8*2").with_value(26.0),
        Cell::formula("Model", 1, 1, "=SUM(B1:B3"),
        Cell::formula("Model", 2, 1, "=Missing!Z9"),
        Cell::formula("Model", 3, 1, "=A3+1"),
    ]);
    cells
}

#[test]
fn critical_findings_come_first() {
    let report = run(messy_workbook());
    let severities: Vec<Severity> = report.findings().iter().map(|f| f.severity).collect();
    let mut sorted = severities.clone();
    sorted.sort();
    assert_eq!(severities, sorted);
    assert!(severities.contains(&Severity::Critical));
    assert!(severities.contains(&Severity::Warning));

    let kinds: Vec<FindingKind> = report.findings().iter().map(|f| f.kind).collect();
    for kind in [
        FindingKind::ParseError,
        FindingKind::UnresolvedReference,
        FindingKind::CycleError,
        FindingKind::StructuralIssue,
        FindingKind::ReconciliationError,
        FindingKind::InsufficientData,
    ] {
        assert!(kinds.contains(&kind), "missing {kind:?}");
    }
}

#[test]
fn repeated_runs_are_identical() {
    let snapshot = Snapshot::new(messy_workbook());
    let scenarios = ScenarioSet::standard();
    let first = validate(&snapshot, &scenarios).unwrap();
    let second = validate(&snapshot, &scenarios).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

#[test]
fn category_filter_limits_the_report() {
    let report = Validator::new(ValidationConfig::default())
        .with_categories([Category::BalanceSheet])
        .run(&Snapshot::new(messy_workbook()), &ScenarioSet::empty())
        .unwrap();
    assert!(!report.is_empty());
    assert!(report.findings().iter().all(|f| f.category == Category::BalanceSheet));
}

#[test]
fn cancelled_run_reports_nothing() {
    let token = CancellationToken::new();
    token.cancel();
    let result = Validator::default()
        .with_cancellation(token)
        .run(&Snapshot::new(messy_workbook()), &ScenarioSet::standard());
    assert!(result.is_err());
}

#[test]
fn standard_scenarios_tag_where_a_violation_appears() {
    // 0.45 growth only crosses the 50% ceiling once Bull's 1.2 multiplier applies.
    let cells: Vec<Cell> =
        (2..=7).map(|column| Cell::number("Projections", 5, column, if column == 4 { 0.45 } else { 0.1 })).collect();
    let report = validate(&Snapshot::new(cells), &ScenarioSet::standard()).unwrap();
    let found = by_rule(&report, "sanity.revenue-growth-range");
    assert_eq!(found.len(), 1);
    let tags: Vec<&str> = found[0].scenarios.iter().map(String::as_str).collect();
    assert_eq!(tags, vec!["Bull"]);
    assert_eq!(found[0].addresses, vec![CellAddress::new("Projections", 5, 4)]);
}

#[test]
fn snapshot_from_json() {
    let snapshot = Snapshot::from_json(
        r#"{"cells": [
            {"sheet": "Assumptions", "row": 26, "column": 2, "raw": "=B20+B21", "computed_value": 0.3},
            {"sheet": "Assumptions", "row": 20, "column": 2, "raw": 0.2},
            {"sheet": "Assumptions", "row": 21, "column": 2, "raw": 0.1}
        ]}"#,
    )
    .unwrap();
    let report = validate(&snapshot, &ScenarioSet::empty()).unwrap();
    assert_eq!(by_rule(&report, "sanity.wacc-range").len(), 1);
    assert!(by_rule(&report, "structural.unlinked-assumption").is_empty());
}
