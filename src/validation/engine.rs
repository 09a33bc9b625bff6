//! Turns rule violations into findings.
use super::context::RuleContext;
use super::finding::{Finding, FindingKind, Severity};
use super::rules::{Rule, Violation};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

/// Runs one rule against one context. A rule that panics yields a single Info
/// finding instead of taking the whole run down.
pub fn evaluate(rule: &Rule, ctx: &RuleContext) -> Vec<Finding> {
    match catch_unwind(AssertUnwindSafe(|| (rule.check)(ctx))) {
        Ok(violations) => violations.into_iter().map(|v| to_finding(rule, ctx, v)).collect(),
        Err(_) => {
            warn!(rule = rule.id, "rule panicked; its results were dropped");
            vec![Finding::new(
                rule.id,
                rule.category,
                FindingKind::InsufficientData,
                Severity::Info,
                Vec::new(),
                format!("Rule {} failed internally and was skipped", rule.id),
            )
            .in_scenario(ctx.scenario_name())]
        }
    }
}

fn to_finding(rule: &Rule, ctx: &RuleContext, violation: Violation) -> Finding {
    let (kind, severity) = if violation.insufficient {
        (FindingKind::InsufficientData, Severity::Info)
    } else {
        (rule.kind, violation.severity.unwrap_or(rule.default_severity))
    };
    let addresses = violation.nodes.iter().map(|&id| ctx.address(id));
    let finding = Finding::new(rule.id, rule.category, kind, severity, addresses, violation.message)
        .in_scenario(ctx.scenario_name());
    match violation.suggested_fix {
        Some(fix) => finding.with_fix(fix),
        None => finding,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze_cycles;
    use crate::config::ValidationConfig;
    use crate::graph::build;
    use crate::store::Cell;
    use crate::validation::finding::Category;
    use crate::validation::rules;
    use crate::validation::scenario::Scenario;

    fn explode(_: &RuleContext) -> Vec<Violation> {
        panic!("boom")
    }

    #[test]
    fn test_findings_carry_rule_identity_and_scenario() {
        let config = ValidationConfig::default();
        let graph = build(&[Cell::number("Assumptions", 26, 2, 0.25)], &config.limits).graph;
        let cycles = analyze_cycles(&graph);
        let base = Scenario::new("Base");
        let ctx = RuleContext::new(&graph, &cycles, &config, Some(&base));

        let rule = rules::find("sanity.wacc-range").unwrap();
        let findings = evaluate(rule, &ctx);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::SanityViolation);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert!(findings[0].scenarios.contains("Base"));
        assert!(findings[0].suggested_fix.is_some());
    }

    #[test]
    fn test_insufficient_data_is_info() {
        let config = ValidationConfig::default();
        let graph = build(&[], &config.limits).graph;
        let cycles = analyze_cycles(&graph);
        let ctx = RuleContext::new(&graph, &cycles, &config, None);

        let findings = evaluate(rules::find("sanity.negative-terminal-fcf").unwrap(), &ctx);
        assert_eq!(findings[0].kind, FindingKind::InsufficientData);
        assert_eq!(findings[0].severity, Severity::Info);
        assert!(findings[0].addresses.is_empty());
    }

    #[test]
    fn test_panicking_rule_is_contained() {
        let config = ValidationConfig::default();
        let graph = build(&[], &config.limits).graph;
        let cycles = analyze_cycles(&graph);
        let ctx = RuleContext::new(&graph, &cycles, &config, None);
        let rule = Rule {
            id: "test.explode",
            category: Category::Sanity,
            kind: FindingKind::SanityViolation,
            default_severity: Severity::Critical,
            reads_values: false,
            check: explode,
        };
        let findings = evaluate(&rule, &ctx);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::InsufficientData);
    }
}
