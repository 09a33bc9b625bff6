//! Static validation of spreadsheet valuation models.
//!
//! A [`Snapshot`] of workbook cells is parsed into a dependency graph, checked
//! for circular references, run through a catalog of sanity, structural and
//! balance-sheet rules (once per scenario) and returned as a sorted
//! [`ValidationReport`].

pub mod analysis;
pub mod config;
pub mod display;
pub mod error;
pub mod formula;
pub mod graph;
pub mod report;
pub mod store;
pub mod validation;

#[cfg(feature = "python")]
pub mod bindings;

pub use config::ValidationConfig;
pub use error::AuditError;
pub use report::{SeverityCounts, Status, ValidationReport};
pub use store::{Cell, CellAddress, Snapshot};
pub use validation::{
    CancellationToken, Category, Finding, FindingKind, Scenario, ScenarioSet, Severity, Validator,
};

/// Validates a snapshot with the default configuration.
///
/// Model defects are findings in the report; `Err` means the scenarios themselves
/// are malformed.
pub fn validate(snapshot: &Snapshot, scenarios: &ScenarioSet) -> Result<ValidationReport, AuditError> {
    Validator::default().run(snapshot, scenarios)
}
