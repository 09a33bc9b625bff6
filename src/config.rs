//! Thresholds and layout knobs for a validation run.
//!
//! Every field has a default, so an empty TOML document is a valid configuration:
//!
//! ```toml
//! balance_tolerance = 0.005
//!
//! [sanity]
//! wacc_max = 0.18
//!
//! [selectors]
//! wacc = "Inputs!C4"
//! total_assets = { sheet = "BS", label = "Total Assets" }
//!
//! [severity_overrides]
//! "structural.unlinked-assumption" = "warning"
//! ```
use crate::error::AuditError;
use crate::formula::ParserOptions;
use crate::validation::finding::Severity;
use crate::validation::selectors::{Metric, Selector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub sanity: SanityBounds,
    /// Relative reconciliation tolerance, as a fraction of the reference figure.
    pub balance_tolerance: f64,
    /// Absolute floor on the reconciliation tolerance; absorbs rounding near zero.
    pub absolute_tolerance: f64,
    pub limits: ParserOptions,
    pub structural: StructuralConfig,
    /// Per-metric selectors, layered over [`Selector::default_for`].
    pub selectors: BTreeMap<Metric, Selector>,
    /// Rule id -> severity. Cycle and reconciliation findings stay Critical.
    pub severity_overrides: BTreeMap<String, Severity>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            sanity: SanityBounds::default(),
            balance_tolerance: 0.005,
            absolute_tolerance: 0.01,
            limits: ParserOptions::default(),
            structural: StructuralConfig::default(),
            selectors: BTreeMap::new(),
            severity_overrides: BTreeMap::new(),
        }
    }
}

/// Policy ranges for sanity rules, as fractions (0.05 == 5%).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanityBounds {
    pub revenue_growth_min: f64,
    pub revenue_growth_max: f64,
    pub ebitda_margin_min: f64,
    pub ebitda_margin_max: f64,
    pub wacc_min: f64,
    pub wacc_max: f64,
}

impl Default for SanityBounds {
    fn default() -> Self {
        Self {
            revenue_growth_min: -0.30,
            revenue_growth_max: 0.50,
            ebitda_margin_min: 0.05,
            ebitda_margin_max: 0.60,
            wacc_min: 0.05,
            wacc_max: 0.20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuralConfig {
    /// Shortest run of adjacent cells in a row treated as one homogeneous block.
    pub min_run_len: usize,
    /// Sheets whose numeric literals are model inputs.
    pub assumption_sheets: Vec<String>,
}

impl Default for StructuralConfig {
    fn default() -> Self {
        Self { min_run_len: 3, assumption_sheets: vec!["Assumptions".to_string()] }
    }
}

impl ValidationConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, AuditError> {
        let config: ValidationConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    pub fn selector(&self, metric: Metric) -> Selector {
        self.selectors.get(&metric).cloned().unwrap_or_else(|| Selector::default_for(metric))
    }

    pub fn validate(&self) -> Result<(), AuditError> {
        let s = &self.sanity;
        for (name, min, max) in [
            ("revenue_growth", s.revenue_growth_min, s.revenue_growth_max),
            ("ebitda_margin", s.ebitda_margin_min, s.ebitda_margin_max),
            ("wacc", s.wacc_min, s.wacc_max),
        ] {
            if !(min.is_finite() && max.is_finite() && min < max) {
                return Err(AuditError::InvalidConfig(format!(
                    "sanity.{name}_min must be below sanity.{name}_max (got {min} and {max})"
                )));
            }
        }

        for (name, value) in [("balance_tolerance", self.balance_tolerance), ("absolute_tolerance", self.absolute_tolerance)] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(AuditError::InvalidConfig(format!("{name} must be a non-negative number, got {value}")));
            }
        }

        let limits = &self.limits;
        if limits.max_range_cells == 0 || limits.max_depth == 0 || limits.max_formula_len == 0 {
            return Err(AuditError::InvalidConfig("limits must be greater than zero".into()));
        }
        if self.structural.min_run_len < 2 {
            return Err(AuditError::InvalidConfig("structural.min_run_len must be at least 2".into()));
        }

        for selector in self.selectors.values() {
            selector.validate()?;
        }
        Ok(())
    }
}
