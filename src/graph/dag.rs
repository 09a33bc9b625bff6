//! dag.rs
//! Read-only view over the cell registry with the lookups rules need.

use crate::formula::ParsedFormula;
use crate::store::types::sheet_key;
use crate::store::{Cell, CellAddress, CellKey, NodeId, RawContent, Registry};
use std::collections::{BTreeMap, HashSet, VecDeque};

/// Nodes are snapshot cells; the edge `A -> B` means A's formula references B.
///
/// Built once per validation run and never mutated afterwards, so it can be shared
/// across rule-evaluation threads by reference.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub(crate) store: Registry,
    /// Parse result per node; `None` for literals.
    pub(crate) formulas: Vec<Option<ParsedFormula>>,
    /// Nodes whose value cannot be trusted: unparsable formulas and everything
    /// that (transitively) reads them.
    pub(crate) tainted: Vec<bool>,
    /// Per (sheet key, row): node ids ordered by column.
    pub(crate) rows: BTreeMap<(String, u32), Vec<NodeId>>,
    /// Per (sheet key, column): node ids ordered by row.
    pub(crate) columns: BTreeMap<(String, u32), Vec<NodeId>>,
}

impl DependencyGraph {
    pub fn node_count(&self) -> usize { self.store.count() }
    pub fn edge_count(&self) -> usize { self.store.edge_count() }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.store.count()).map(NodeId::new)
    }

    // --- Accessors ---
    pub fn cell(&self, id: NodeId) -> &Cell { &self.store.cells[id.index()] }
    pub fn address(&self, id: NodeId) -> CellAddress { self.cell(id).address() }
    pub fn depends_on(&self, id: NodeId) -> &[NodeId] { self.store.get_parents(id) }
    pub fn used_by(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ { self.store.children(id) }
    pub fn used_by_count(&self, id: NodeId) -> usize { self.store.child_counts[id.index()] as usize }
    pub fn formula(&self, id: NodeId) -> Option<&ParsedFormula> { self.formulas[id.index()].as_ref() }

    pub fn has_self_edge(&self, id: NodeId) -> bool {
        self.depends_on(id).contains(&id)
    }

    pub fn lookup(&self, sheet: &str, row: u32, column: u32) -> Option<NodeId> {
        self.store.lookup(&CellKey::new(sheet, row, column))
    }

    pub fn is_tainted(&self, id: NodeId) -> bool { self.tainted[id.index()] }

    /// Host-computed numeric value, or `None` when the cell was never computed,
    /// holds non-numeric data, or sits downstream of an unparsable formula.
    pub fn numeric_value(&self, id: NodeId) -> Option<f64> {
        if self.is_tainted(id) {
            return None;
        }
        self.cell(id).numeric_value()
    }

    pub fn is_numeric_literal(&self, id: NodeId) -> bool {
        matches!(self.cell(id).raw, RawContent::Number(_))
    }

    /// All cells on one row of one sheet, ordered by column.
    pub fn row(&self, sheet: &str, row: u32) -> &[NodeId] {
        self.rows.get(&(sheet_key(sheet), row)).map_or(&[], Vec::as_slice)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[NodeId]> + '_ {
        self.rows.values().map(Vec::as_slice)
    }

    pub fn columns(&self) -> impl Iterator<Item = &[NodeId]> + '_ {
        self.columns.values().map(Vec::as_slice)
    }

    pub fn sheet_nodes<'a>(&'a self, sheet: &str) -> impl Iterator<Item = NodeId> + 'a {
        let key = sheet_key(sheet);
        self.rows
            .range((key.clone(), 0)..=(key, u32::MAX))
            .flat_map(|(_, ids)| ids.iter().copied())
    }

    /// Every node that reads any of `start_nodes`, directly or transitively.
    pub fn downstream_from(&self, start_nodes: &[NodeId]) -> HashSet<NodeId> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::from(start_nodes.to_vec());

        while let Some(node) = queue.pop_front() {
            if visited.insert(node) {
                queue.extend(self.used_by(node));
            }
        }
        visited
    }
}
