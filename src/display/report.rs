use crate::report::ValidationReport;
use crate::validation::finding::{Finding, Severity};
use std::fmt::Write;

/// Plain-text rendering of a report for terminals and log files.
pub fn format_report(report: &ValidationReport) -> String {
    let mut out = String::new();
    let counts = report.counts();
    let _ = writeln!(out, "VALIDATION REPORT: {}", report.status());
    let _ = writeln!(
        out,
        "{} critical, {} warning, {} info",
        counts.critical, counts.warning, counts.info
    );
    let _ = writeln!(out, "--------------------------------------------------");

    if report.is_empty() {
        let _ = writeln!(out, "No findings.");
        return out;
    }

    let mut current: Option<Severity> = None;
    for finding in report.findings() {
        if current != Some(finding.severity) {
            if current.is_some() {
                let _ = writeln!(out);
            }
            let _ = writeln!(out, "{}", finding.severity);
            current = Some(finding.severity);
        }
        write_finding(&mut out, finding);
    }
    out
}

fn write_finding(out: &mut String, finding: &Finding) {
    let location = match finding.primary_address() {
        Some(address) if finding.addresses.len() > 1 => {
            format!("{} (+{} more)", address, finding.addresses.len() - 1)
        }
        Some(address) => address.to_string(),
        None => "-".to_string(),
    };
    let _ = writeln!(out, "  [{}] {}: {}", finding.rule_id, location, finding.message);
    if let Some(fix) = &finding.suggested_fix {
        let _ = writeln!(out, "      fix: {}", fix);
    }
    if !finding.scenarios.is_empty() {
        let names: Vec<&str> = finding.scenarios.iter().map(String::as_str).collect();
        let _ = writeln!(out, "      scenarios: {}", names.join(", "));
    }
}
