use super::types::*;
use std::collections::HashMap;

/// Arena of snapshot cells with index-addressed edges.
///
/// `parents` are the cells a formula references (the edge `A -> B` when A reads B),
/// stored CSR-style. `children` (the "used by" direction) are kept as an intrusive
/// linked list so they can be appended in any order.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    pub cells: Vec<Cell>,

    // Topology (CSR-ish + Adjacency)
    pub parents_flat: Vec<NodeId>,
    pub parents_ranges: Vec<(u32, u32)>, // (start, count)

    pub first_child: Vec<u32>,
    pub child_targets: Vec<NodeId>,
    pub next_child: Vec<u32>,
    pub child_counts: Vec<u32>,

    index: HashMap<CellKey, NodeId>,
}

impl Registry {
    pub fn new() -> Self { Self::default() }
    pub fn count(&self) -> usize { self.cells.len() }
    pub fn edge_count(&self) -> usize { self.parents_flat.len() }

    /// Registers a cell as an isolated node.
    ///
    /// Addresses are unique: a second cell with a known address is rejected and the
    /// id of the node that already owns it is returned as the error.
    pub fn add_cell(&mut self, cell: Cell) -> Result<NodeId, NodeId> {
        let key = cell.key();
        if let Some(&existing) = self.index.get(&key) {
            return Err(existing);
        }
        let id = NodeId::new(self.cells.len());
        self.index.insert(key, id);

        self.cells.push(cell);
        self.parents_ranges.push((0, 0));
        self.first_child.push(u32::MAX);
        self.child_counts.push(0);
        Ok(id)
    }

    /// Attaches the dependency list of `id`. Called at most once per node.
    pub fn set_parents(&mut self, id: NodeId, parents: &[NodeId]) {
        // 1. Parents (CSR append)
        let start = self.parents_flat.len() as u32;
        self.parents_flat.extend_from_slice(parents);
        self.parents_ranges[id.index()] = (start, parents.len() as u32);

        // 2. Children (Adjacency list for "used by" lookups)
        for &parent in parents {
            let p_idx = parent.index();
            let head = self.first_child[p_idx];
            let new_edge = self.child_targets.len() as u32;
            self.child_targets.push(id);
            self.next_child.push(head);
            self.first_child[p_idx] = new_edge;
            self.child_counts[p_idx] += 1;
        }
    }

    pub fn lookup(&self, key: &CellKey) -> Option<NodeId> {
        self.index.get(key).copied()
    }

    #[inline(always)]
    pub fn get_parents(&self, id: NodeId) -> &[NodeId] {
        let (start, count) = self.parents_ranges[id.index()];
        &self.parents_flat[start as usize..(start + count) as usize]
    }

    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children { registry: self, edge: self.first_child[id.index()] }
    }
}

/// Walks the child linked list of one node.
pub struct Children<'a> {
    registry: &'a Registry,
    edge: u32,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if self.edge == u32::MAX {
            return None;
        }
        let idx = self.edge as usize;
        self.edge = self.registry.next_child[idx];
        Some(self.registry.child_targets[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_address_is_rejected() {
        let mut reg = Registry::new();
        let a = reg.add_cell(Cell::number("Sheet1", 1, 1, 1.0)).unwrap();
        let dup = reg.add_cell(Cell::number("sheet1", 1, 1, 2.0));
        assert_eq!(dup, Err(a));
        assert_eq!(reg.count(), 1);
    }

    #[test]
    fn test_parents_and_children_are_mirrored() {
        // C = A + B
        let mut reg = Registry::new();
        let a = reg.add_cell(Cell::number("S", 1, 1, 1.0)).unwrap();
        let b = reg.add_cell(Cell::number("S", 2, 1, 2.0)).unwrap();
        let c = reg.add_cell(Cell::formula("S", 3, 1, "=A1+A2")).unwrap();
        reg.set_parents(c, &[a, b]);

        assert_eq!(reg.get_parents(c), &[a, b]);
        assert!(reg.get_parents(a).is_empty());
        assert_eq!(reg.children(a).collect::<Vec<_>>(), vec![c]);
        assert_eq!(reg.child_counts[b.index()], 1);
        assert_eq!(reg.edge_count(), 2);
    }
}
