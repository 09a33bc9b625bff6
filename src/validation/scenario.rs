//! Scenario-scoped inputs: value overrides and multipliers on growth assumptions.
use super::selectors::{parse_reference, Metric};
use crate::error::AuditError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

fn unit() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default = "unit")]
    pub revenue_growth_adj: f64,
    #[serde(default = "unit")]
    pub margin_adj: f64,
    #[serde(default = "unit")]
    pub terminal_growth_adj: f64,
    /// `Sheet!A1` -> value that replaces the host-computed value of that cell.
    #[serde(default)]
    pub overrides: BTreeMap<String, f64>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            revenue_growth_adj: 1.0,
            margin_adj: 1.0,
            terminal_growth_adj: 1.0,
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_adjustments(mut self, revenue_growth: f64, margin: f64, terminal_growth: f64) -> Self {
        self.revenue_growth_adj = revenue_growth;
        self.margin_adj = margin;
        self.terminal_growth_adj = terminal_growth;
        self
    }

    pub fn with_override(mut self, address: impl Into<String>, value: f64) -> Self {
        self.overrides.insert(address.into(), value);
        self
    }

    /// Multiplier applied to a metric's resolved values under this scenario.
    pub fn adjustment(&self, metric: Metric) -> f64 {
        match metric {
            Metric::RevenueGrowth => self.revenue_growth_adj,
            Metric::EbitdaMargin => self.margin_adj,
            Metric::TerminalGrowth => self.terminal_growth_adj,
            _ => 1.0,
        }
    }

    pub fn validate(&self) -> Result<(), AuditError> {
        if self.name.trim().is_empty() {
            return Err(AuditError::InvalidConfig("scenario names must not be empty".into()));
        }
        for (label, adj) in [
            ("revenue_growth_adj", self.revenue_growth_adj),
            ("margin_adj", self.margin_adj),
            ("terminal_growth_adj", self.terminal_growth_adj),
        ] {
            if !adj.is_finite() {
                return Err(AuditError::InvalidConfig(format!("scenario '{}': {} must be finite", self.name, label)));
            }
        }
        for address in self.overrides.keys() {
            let range = parse_reference(address)?;
            if range.cell_count() != 1 {
                return Err(AuditError::InvalidAddress {
                    text: address.clone(),
                    reason: "overrides target a single cell".into(),
                });
            }
        }
        Ok(())
    }
}

/// The scenarios one validation run evaluates. Empty means a single, untagged
/// evaluation of the snapshot as supplied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScenarioSet {
    scenarios: Vec<Scenario>,
}

impl ScenarioSet {
    pub fn new(scenarios: Vec<Scenario>) -> Self {
        Self { scenarios }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Bull / Base / Bear with the product's standard multipliers.
    pub fn standard() -> Self {
        Self::new(vec![
            Scenario::new("Bull").with_adjustments(1.2, 1.1, 1.1),
            Scenario::new("Base"),
            Scenario::new("Bear").with_adjustments(0.8, 0.9, 0.9),
        ])
    }

    /// A JSON array of scenario objects.
    pub fn from_json(json: &str) -> Result<Self, AuditError> {
        let set: ScenarioSet = serde_json::from_str(json)?;
        set.validate()?;
        Ok(set)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), AuditError> {
        for (i, scenario) in self.scenarios.iter().enumerate() {
            scenario.validate()?;
            if self.scenarios[..i].iter().any(|s| s.name == scenario.name) {
                return Err(AuditError::InvalidConfig(format!("duplicate scenario '{}'", scenario.name)));
            }
        }
        Ok(())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Scenario> {
        self.scenarios.iter()
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

impl FromIterator<Scenario> for ScenarioSet {
    fn from_iter<I: IntoIterator<Item = Scenario>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_set_multipliers() {
        let set = ScenarioSet::standard();
        let names: Vec<&str> = set.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Bull", "Base", "Bear"]);
        let bear = set.iter().last().unwrap();
        assert_eq!(bear.adjustment(Metric::RevenueGrowth), 0.8);
        assert_eq!(bear.adjustment(Metric::TerminalGrowth), 0.9);
        assert_eq!(bear.adjustment(Metric::Wacc), 1.0);
    }

    #[test]
    fn test_from_json_defaults_multipliers() {
        let set = ScenarioSet::from_json(
            r#"[{"name": "Stress", "overrides": {"Assumptions!B26": 0.3}}]"#,
        )
        .unwrap();
        let stress = set.iter().next().unwrap();
        assert_eq!(stress.margin_adj, 1.0);
        assert_eq!(stress.overrides["Assumptions!B26"], 0.3);
    }

    #[test]
    fn test_rejects_range_override_and_duplicates() {
        let range = ScenarioSet::new(vec![Scenario::new("X").with_override("S!A1:A2", 1.0)]);
        assert!(matches!(range.validate(), Err(AuditError::InvalidAddress { .. })));

        let dup = ScenarioSet::new(vec![Scenario::new("X"), Scenario::new("X")]);
        assert!(matches!(dup.validate(), Err(AuditError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenarios.json");
        std::fs::write(&path, r#"[{"name": "Base"}]"#).unwrap();
        assert_eq!(ScenarioSet::load(&path).unwrap().len(), 1);
    }
}
