//! Everything a rule predicate may read: the graph, the cycle analysis, the
//! configuration and the inputs of one scenario.
use super::scenario::Scenario;
use super::selectors::{parse_reference, Metric};
use crate::analysis::CycleAnalysis;
use crate::config::ValidationConfig;
use crate::graph::DependencyGraph;
use crate::store::{CellAddress, NodeId};
use std::collections::HashMap;
use tracing::warn;

/// One resolved cell of a metric. `value` is `None` when the cell has no usable number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub node: NodeId,
    pub value: Option<f64>,
}

pub struct RuleContext<'a> {
    pub graph: &'a DependencyGraph,
    pub cycles: &'a CycleAnalysis,
    pub config: &'a ValidationConfig,
    scenario: Option<&'a Scenario>,
    overrides: HashMap<NodeId, f64>,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        graph: &'a DependencyGraph,
        cycles: &'a CycleAnalysis,
        config: &'a ValidationConfig,
        scenario: Option<&'a Scenario>,
    ) -> Self {
        let mut overrides = HashMap::new();
        if let Some(s) = scenario {
            for (address, &value) in &s.overrides {
                let target = parse_reference(address).ok().and_then(|range| {
                    let sheet = range.sheet.as_ref().map_or("", |n| n.as_str());
                    graph.lookup(sheet, range.start_row, range.start_column)
                });
                match target {
                    Some(id) => {
                        overrides.insert(id, value);
                    }
                    None => warn!(scenario = %s.name, %address, "override targets a cell missing from the snapshot"),
                }
            }
        }
        Self { graph, cycles, config, scenario, overrides }
    }

    pub fn scenario_name(&self) -> Option<&'a str> {
        self.scenario.map(|s| s.name.as_str())
    }

    pub fn address(&self, id: NodeId) -> CellAddress {
        self.graph.address(id)
    }

    pub fn in_cycle(&self, id: NodeId) -> bool {
        self.cycles.in_cycle(id)
    }

    /// Scenario override if any, otherwise the host-computed value.
    pub fn value_at(&self, id: NodeId) -> Option<f64> {
        match self.overrides.get(&id) {
            Some(&v) => Some(v),
            None => self.graph.numeric_value(id),
        }
    }

    /// The metric's cells with scenario multipliers applied. `None` when the
    /// selector matches no cell at all.
    pub fn series(&self, metric: Metric) -> Option<Vec<Point>> {
        let nodes = self.config.selector(metric).resolve(self.graph);
        if nodes.is_empty() {
            return None;
        }
        let factor = self.scenario.map_or(1.0, |s| s.adjustment(metric));
        Some(
            nodes
                .into_iter()
                .map(|node| Point { node, value: self.value_at(node).map(|v| v * factor) })
                .collect(),
        )
    }

    /// Last point of the metric; single-cell metrics have exactly one.
    pub fn scalar(&self, metric: Metric) -> Option<Point> {
        self.series(metric).and_then(|points| points.last().copied())
    }
}
