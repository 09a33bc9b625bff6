//! The immutable result of one validation call.
pub mod classify;

pub use classify::classify;

use crate::error::AuditError;
use crate::validation::finding::{Finding, Severity};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// No Critical findings.
    Sound,
    Unsound,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Sound => "SOUND",
            Status::Unsound => "UNSOUND",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn total(&self) -> usize {
        self.critical + self.warning + self.info
    }
}

/// Findings sorted by severity, then address. Two runs over the same snapshot,
/// scenarios and configuration produce equal reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    status: Status,
    counts: SeverityCounts,
    findings: Vec<Finding>,
}

impl ValidationReport {
    pub(crate) fn from_sorted(findings: Vec<Finding>) -> Self {
        let mut counts = SeverityCounts::default();
        for finding in &findings {
            match finding.severity {
                Severity::Critical => counts.critical += 1,
                Severity::Warning => counts.warning += 1,
                Severity::Info => counts.info += 1,
            }
        }
        let status = if counts.critical > 0 { Status::Unsound } else { Status::Sound };
        Self { status, counts, findings }
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }

    pub fn counts(&self) -> SeverityCounts {
        self.counts
    }

    pub fn has_critical(&self) -> bool {
        self.counts.critical > 0
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn to_json(&self) -> Result<String, AuditError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CellAddress;
    use crate::validation::finding::{Category, FindingKind};

    fn finding(severity: Severity) -> Finding {
        Finding::new("r", Category::Formula, FindingKind::ParseError, severity, [CellAddress::new("S", 1, 1)], "m")
    }

    #[test]
    fn test_counts_and_status() {
        let report = ValidationReport::from_sorted(vec![finding(Severity::Critical), finding(Severity::Info)]);
        assert_eq!(report.counts(), SeverityCounts { critical: 1, warning: 0, info: 1 });
        assert_eq!(report.status(), Status::Unsound);
        assert!(report.has_critical());

        let clean = ValidationReport::from_sorted(vec![finding(Severity::Warning)]);
        assert_eq!(clean.status(), Status::Sound);
    }

    #[test]
    fn test_json_shape() {
        let report = ValidationReport::from_sorted(vec![finding(Severity::Warning)]);
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["status"], "sound");
        assert_eq!(value["counts"]["warning"], 1);
        assert_eq!(value["findings"][0]["addresses"][0]["sheet"], "S");
    }
}
