//! Policy bounds on valuation inputs.
use super::{missing_metric, pct, Violation};
use crate::validation::context::{Point, RuleContext};
use crate::validation::finding::Severity;
use crate::validation::selectors::Metric;

pub fn revenue_growth_range(ctx: &RuleContext) -> Vec<Violation> {
    let b = &ctx.config.sanity;
    within(ctx, Metric::RevenueGrowth, b.revenue_growth_min, b.revenue_growth_max)
}

pub fn ebitda_margin_range(ctx: &RuleContext) -> Vec<Violation> {
    let b = &ctx.config.sanity;
    within(ctx, Metric::EbitdaMargin, b.ebitda_margin_min, b.ebitda_margin_max)
}

pub fn wacc_range(ctx: &RuleContext) -> Vec<Violation> {
    let b = &ctx.config.sanity;
    within(ctx, Metric::Wacc, b.wacc_min, b.wacc_max)
}

/// Perpetual growth above the risk-free rate implies an arbitrage.
pub fn terminal_growth_vs_risk_free(ctx: &RuleContext) -> Vec<Violation> {
    let (g, rf) = match (required(ctx, Metric::TerminalGrowth), required(ctx, Metric::RiskFreeRate)) {
        (Ok(g), Ok(rf)) => (g, rf),
        (g, rf) => return [g.err(), rf.err()].into_iter().flatten().collect(),
    };
    if g.1 < rf.1 {
        return Vec::new();
    }
    let violation = Violation::new(
        [g.0.node, rf.0.node],
        format!("Terminal growth {} ≥ risk-free rate {}", pct(g.1), pct(rf.1)),
    )
    .with_fix("Lower terminal growth below the risk-free rate");
    vec![downgrade_in_cycle(ctx, violation)]
}

/// The Gordon-growth terminal value `FCF × (1+g)/(WACC−g)` needs g < WACC.
pub fn terminal_growth_vs_wacc(ctx: &RuleContext) -> Vec<Violation> {
    let (g, wacc) = match (required(ctx, Metric::TerminalGrowth), required(ctx, Metric::Wacc)) {
        (Ok(g), Ok(w)) => (g, w),
        (g, w) => return [g.err(), w.err()].into_iter().flatten().collect(),
    };
    if g.1 < wacc.1 {
        return Vec::new();
    }
    let violation = Violation::new(
        [g.0.node, wacc.0.node],
        format!("Terminal growth {} ≥ WACC {}: terminal value is undefined", pct(g.1), pct(wacc.1)),
    )
    .with_fix("Terminal growth must stay below the discount rate");
    vec![downgrade_in_cycle(ctx, violation)]
}

pub fn negative_terminal_fcf(ctx: &RuleContext) -> Vec<Violation> {
    let fcf = match required(ctx, Metric::TerminalFcf) {
        Ok(fcf) => fcf,
        Err(v) => return vec![v],
    };
    if fcf.1 >= 0.0 {
        return Vec::new();
    }
    let violation = Violation::new([fcf.0.node], format!("Terminal-year free cash flow is negative: {}", fcf.1))
        .with_fix("A perpetuity on negative cash flow yields a negative terminal value; revisit margins and capex");
    vec![downgrade_in_cycle(ctx, violation)]
}

fn within(ctx: &RuleContext, metric: Metric, min: f64, max: f64) -> Vec<Violation> {
    let Some(points) = ctx.series(metric) else {
        return vec![missing_metric(ctx, metric)];
    };
    let mut out = Vec::new();
    let mut absent = Vec::new();
    for point in points {
        match point.value {
            None => absent.push(point.node),
            Some(v) if v < min || v > max => {
                let violation = Violation::new(
                    [point.node],
                    format!("{} outside {}–{}: {}", metric, bound(min), bound(max), pct(v)),
                )
                .with_fix(format!("Bring {} within {} and {} or document the exception", metric, bound(min), bound(max)));
                out.push(downgrade_in_cycle(ctx, violation));
            }
            Some(_) => {}
        }
    }
    if !absent.is_empty() {
        let count = absent.len();
        out.push(Violation::insufficient(absent, format!("{} has no computed value in {} cell(s)", metric, count)));
    }
    out
}

/// The last point of a metric and its value, or the insufficient-data violation.
fn required(ctx: &RuleContext, metric: Metric) -> Result<(Point, f64), Violation> {
    let point = ctx.scalar(metric).ok_or_else(|| missing_metric(ctx, metric))?;
    match point.value {
        Some(v) => Ok((point, v)),
        None => Err(Violation::insufficient([point.node], format!("{} has no computed value", metric))),
    }
}

fn downgrade_in_cycle(ctx: &RuleContext, violation: Violation) -> Violation {
    if !violation.nodes.iter().any(|&id| ctx.in_cycle(id)) {
        return violation;
    }
    let mut violation = violation.with_severity(Severity::Info);
    violation.message.push_str(" (inside a circular reference; value may be stale)");
    violation
}

/// Policy bound as a percentage without trailing zeros: 0.05 -> "5%", 0.125 -> "12.5%".
fn bound(value: f64) -> String {
    let p = value * 100.0;
    if (p - p.round()).abs() < 1e-9 {
        format!("{}%", p.round() as i64)
    } else {
        let text = format!("{:.2}", p);
        format!("{}%", text.trim_end_matches('0').trim_end_matches('.'))
    }
}
