//! Severity policy, deduplication and ordering. The single-threaded merge step.
use super::ValidationReport;
use crate::store::{CellAddress, CellKey};
use crate::validation::finding::{Finding, FindingKind, Severity};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Cycle and reconciliation findings describe a wrong model, not a judgment call;
/// configuration cannot soften them.
fn is_pinned(kind: FindingKind) -> bool {
    matches!(kind, FindingKind::CycleError | FindingKind::ReconciliationError)
}

pub fn classify(findings: Vec<Finding>, overrides: &BTreeMap<String, Severity>) -> ValidationReport {
    let raw = findings.len();
    let mut merged: Vec<Finding> = Vec::with_capacity(raw);
    let mut seen: HashMap<(String, FindingKind, Vec<CellKey>), usize> = HashMap::new();

    for mut finding in findings {
        if is_pinned(finding.kind) {
            finding.severity = Severity::Critical;
        } else if let Some(&severity) = overrides.get(&finding.rule_id) {
            finding.severity = severity;
        }

        let key = (finding.rule_id.clone(), finding.kind, finding.addresses.iter().map(CellAddress::key).collect());
        match seen.get(&key) {
            Some(&i) => merge_into(&mut merged[i], finding),
            None => {
                seen.insert(key, merged.len());
                merged.push(finding);
            }
        }
    }

    merged.sort_by(report_order);
    debug!(raw, deduplicated = merged.len(), "findings classified");
    ValidationReport::from_sorted(merged)
}

/// Keeps the most severe content; scenario tags accumulate.
fn merge_into(kept: &mut Finding, incoming: Finding) {
    let mut scenarios = std::mem::take(&mut kept.scenarios);
    scenarios.extend(incoming.scenarios.iter().cloned());
    if incoming.severity < kept.severity {
        *kept = incoming;
    }
    kept.scenarios = scenarios;
}

/// Severity, then the first address (findings without one last), then rule id.
fn report_order(a: &Finding, b: &Finding) -> Ordering {
    a.severity
        .cmp(&b.severity)
        .then_with(|| match (a.primary_address(), b.primary_address()) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.rule_id.cmp(&b.rule_id))
        .then_with(|| a.message.cmp(&b.message))
}
