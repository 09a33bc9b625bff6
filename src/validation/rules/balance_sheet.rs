//! Accounting identities that must hold in every period.
//!
//! Series are paired by position: the n-th cell of one metric is compared with the
//! n-th cell of the others.
use super::{missing_metric, Violation};
use crate::store::NodeId;
use crate::validation::context::{Point, RuleContext};
use crate::validation::selectors::Metric;

pub fn assets_equal_liabilities_plus_equity(ctx: &RuleContext) -> Vec<Violation> {
    let series = match all_series(ctx, &[Metric::TotalAssets, Metric::TotalLiabilities, Metric::TotalEquity]) {
        Ok(series) => series,
        Err(missing) => return missing,
    };
    let (assets, liabilities, equity) = (&series[0], &series[1], &series[2]);

    let mut out = Vec::new();
    for period in 0..periods(&series) {
        let points = [assets[period], liabilities[period], equity[period]];
        let Some(found) = values(&points) else {
            out.push(no_values(&points, "the balance sheet check"));
            continue;
        };
        let (a, l, e) = (found[0], found[1], found[2]);
        let delta = a - (l + e);
        if delta.abs() > tolerance(ctx, a) {
            out.push(
                Violation::new(
                    points.iter().map(|p| p.node),
                    format!(
                        "Total assets {} ≠ liabilities {} + equity {} (delta {})",
                        amount(a),
                        amount(l),
                        amount(e),
                        amount(delta)
                    ),
                )
                .with_fix("Find the balancing item: every flow must post to both sides of the balance sheet"),
            );
        }
    }
    out.extend(length_mismatch(&series, &[Metric::TotalAssets, Metric::TotalLiabilities, Metric::TotalEquity]));
    out
}

pub fn cash_ties_to_cash_flow(ctx: &RuleContext) -> Vec<Violation> {
    let series = match all_series(ctx, &[Metric::EndingCash, Metric::BalanceSheetCash]) {
        Ok(series) => series,
        Err(missing) => return missing,
    };

    let mut out = Vec::new();
    for period in 0..periods(&series) {
        let points = [series[0][period], series[1][period]];
        let Some(found) = values(&points) else {
            out.push(no_values(&points, "the cash tie-out"));
            continue;
        };
        let (ending, reported) = (found[0], found[1]);
        let delta = ending - reported;
        if delta.abs() > tolerance(ctx, reported) {
            out.push(
                Violation::new(
                    points.iter().map(|p| p.node),
                    format!(
                        "Ending cash {} does not match balance sheet cash {} (delta {})",
                        amount(ending),
                        amount(reported),
                        amount(delta)
                    ),
                )
                .with_fix("Link balance sheet cash to the cash flow statement's ending cash"),
            );
        }
    }
    out.extend(length_mismatch(&series, &[Metric::EndingCash, Metric::BalanceSheetCash]));
    out
}

/// `RE[t] = RE[t-1] + NI[t] - Div[t]`. A model without a dividends line pays none.
pub fn retained_earnings_roll_forward(ctx: &RuleContext) -> Vec<Violation> {
    let series = match all_series(ctx, &[Metric::RetainedEarnings, Metric::NetIncome]) {
        Ok(series) => series,
        Err(missing) => return missing,
    };
    let (retained, income) = (&series[0], &series[1]);
    let dividends = ctx.series(Metric::Dividends);

    if retained.len() < 2 {
        return vec![Violation::insufficient(
            retained.iter().map(|p| p.node),
            "Retained earnings roll-forward needs at least two periods",
        )];
    }

    let mut out = Vec::new();
    for period in 1..retained.len() {
        let Some(&ni) = income.get(period) else {
            out.push(Violation::insufficient(
                [retained[period].node],
                format!("Net income has no period matching {}", ctx.address(retained[period].node)),
            ));
            continue;
        };
        let div = dividends.as_ref().and_then(|d| d.get(period).copied());

        let mut points = vec![retained[period], retained[period - 1], ni];
        points.extend(div);
        let Some(found) = values(&points) else {
            out.push(no_values(&points, "the retained earnings roll-forward"));
            continue;
        };
        let (current, prior, net_income) = (found[0], found[1], found[2]);
        let paid = found.get(3).copied().unwrap_or(0.0);
        let expected = prior + net_income - paid;
        let delta = current - expected;
        if delta.abs() > tolerance(ctx, expected) {
            out.push(
                Violation::new(
                    points.iter().map(|p| p.node),
                    format!(
                        "Retained earnings {} does not roll forward: prior {} + net income {} - dividends {} = {} (delta {})",
                        amount(current),
                        amount(prior),
                        amount(net_income),
                        amount(paid),
                        amount(expected),
                        amount(delta)
                    ),
                )
                .with_fix("Retained earnings should be prior retained earnings plus net income less dividends"),
            );
        }
    }
    out
}

/// Relative tolerance of the reference figure, floored by the absolute tolerance.
fn tolerance(ctx: &RuleContext, reference: f64) -> f64 {
    (ctx.config.balance_tolerance * reference.abs()).max(ctx.config.absolute_tolerance)
}

fn all_series(ctx: &RuleContext, metrics: &[Metric]) -> Result<Vec<Vec<Point>>, Vec<Violation>> {
    let mut found = Vec::with_capacity(metrics.len());
    let mut missing = Vec::new();
    for &metric in metrics {
        match ctx.series(metric) {
            Some(series) => found.push(series),
            None => missing.push(missing_metric(ctx, metric)),
        }
    }
    if missing.is_empty() {
        Ok(found)
    } else {
        Err(missing)
    }
}

fn periods(series: &[Vec<Point>]) -> usize {
    series.iter().map(Vec::len).min().unwrap_or(0)
}

/// Every value, or `None` if any point lacks one.
fn values(points: &[Point]) -> Option<Vec<f64>> {
    points.iter().map(|p| p.value).collect()
}

fn no_values(points: &[Point], check: &str) -> Violation {
    let absent: Vec<NodeId> = points.iter().filter(|p| p.value.is_none()).map(|p| p.node).collect();
    Violation::insufficient(absent, format!("Skipped {}: some cells have no computed value", check))
}

fn length_mismatch(series: &[Vec<Point>], metrics: &[Metric]) -> Option<Violation> {
    let shortest = periods(series);
    let longest = series.iter().map(Vec::len).max().unwrap_or(0);
    if shortest == longest {
        return None;
    }
    let counts: Vec<String> = metrics.iter().zip(series).map(|(m, s)| format!("{} {}", m, s.len())).collect();
    let unmatched = series.iter().flat_map(|s| s.iter().skip(shortest).map(|p| p.node));
    Some(Violation::insufficient(
        unmatched,
        format!("Periods do not line up ({}); extra periods were not checked", counts.join(", ")),
    ))
}

/// Money amounts without trailing zeros: 5.0 -> "5", 1.25 -> "1.25".
fn amount(value: f64) -> String {
    let text = format!("{:.2}", value);
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationConfig;
    use crate::store::Cell;
    use crate::validation::rules::harness::{run, run_default};

    fn labelled(sheet: &str, row: u32, label: &str, values: &[f64]) -> Vec<Cell> {
        let mut cells = vec![Cell::text(sheet, row, 1, label)];
        for (i, &v) in values.iter().enumerate() {
            cells.push(Cell::number(sheet, row, i as u32 + 2, v));
        }
        cells
    }

    fn balance_sheet(assets: &[f64], liabilities: &[f64], equity: &[f64]) -> Vec<Cell> {
        let mut cells = labelled("Balance Sheet", 10, "Total Assets", assets);
        cells.extend(labelled("Balance Sheet", 20, "Total Liabilities", liabilities));
        cells.extend(labelled("Balance Sheet", 30, "Total Equity", equity));
        cells
    }

    #[test]
    fn test_unbalanced_sheet_reports_delta() {
        let out = run_default(&balance_sheet(&[100.0], &[60.0], &[35.0]), assets_equal_liabilities_plus_equity);
        assert_eq!(out.len(), 1);
        let (addresses, violation) = &out[0];
        assert!(!violation.insufficient);
        assert_eq!(addresses.len(), 3);
        assert_eq!(violation.message, "Total assets 100 ≠ liabilities 60 + equity 35 (delta 5)");
    }

    #[test]
    fn test_rounding_within_tolerance_passes() {
        // 0.4 on 1000 is below the 0.5% default.
        let cells = balance_sheet(&[1000.0, 1000.0], &[600.0, 600.0], &[399.6, 400.0]);
        assert!(run_default(&cells, assets_equal_liabilities_plus_equity).is_empty());

        let strict = ValidationConfig { balance_tolerance: 0.0, ..ValidationConfig::default() };
        assert_eq!(run(&cells, &strict, None, assets_equal_liabilities_plus_equity).len(), 1);
    }

    #[test]
    fn test_missing_equity_row_is_insufficient() {
        let mut cells = labelled("Balance Sheet", 10, "Total Assets", &[100.0]);
        cells.extend(labelled("Balance Sheet", 20, "Total Liabilities", &[100.0]));
        let out = run_default(&cells, assets_equal_liabilities_plus_equity);
        assert_eq!(out.len(), 1);
        assert!(out[0].1.insufficient);
        assert!(out[0].1.message.contains("Total equity"));
    }

    #[test]
    fn test_uneven_periods_are_reported() {
        let out = run_default(
            &balance_sheet(&[100.0, 110.0, 120.0], &[60.0, 70.0], &[40.0, 40.0]),
            assets_equal_liabilities_plus_equity,
        );
        assert_eq!(out.len(), 1);
        assert!(out[0].1.insufficient);
        assert_eq!(out[0].0.len(), 1);
    }

    #[test]
    fn test_cash_tie_out() {
        let mut cells = labelled("Cash Flow", 40, "Ending Cash", &[120.0, 130.0]);
        cells.extend(labelled("Balance Sheet", 5, "Cash", &[120.0, 128.0]));
        let out = run_default(&cells, cash_ties_to_cash_flow);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].1.message, "Ending cash 130 does not match balance sheet cash 128 (delta 2)");
    }

    #[test]
    fn test_retained_earnings_roll_forward() {
        let mut cells = labelled("Balance Sheet", 35, "Retained Earnings", &[100.0, 155.0, 200.0]);
        cells.extend(labelled("Income Statement", 30, "Net Income", &[50.0, 60.0, 50.0]));
        cells.extend(labelled("Income Statement", 32, "Dividends", &[0.0, 5.0, 5.0]));
        let out = run_default(&cells, retained_earnings_roll_forward);
        assert_eq!(out.len(), 0);

        let mut broken = labelled("Balance Sheet", 35, "Retained Earnings", &[100.0, 150.0]);
        broken.extend(labelled("Income Statement", 30, "Net Income", &[50.0, 60.0]));
        let out = run_default(&broken, retained_earnings_roll_forward);
        assert_eq!(out.len(), 1);
        assert_eq!(
            out[0].1.message,
            "Retained earnings 150 does not roll forward: prior 100 + net income 60 - dividends 0 = 160 (delta -10)"
        );
        assert_eq!(out[0].0.len(), 3);
    }

    #[test]
    fn test_single_period_retained_earnings_is_insufficient() {
        let mut cells = labelled("Balance Sheet", 35, "Retained Earnings", &[100.0]);
        cells.extend(labelled("Income Statement", 30, "Net Income", &[50.0]));
        let out = run_default(&cells, retained_earnings_roll_forward);
        assert!(out[0].1.insufficient);
    }

    #[test]
    fn test_amount_formatting() {
        assert_eq!(amount(5.0), "5");
        assert_eq!(amount(-1.25), "-1.25");
        assert_eq!(amount(-0.001), "0");
    }
}
