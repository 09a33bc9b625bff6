use crate::graph::DependencyGraph;
use crate::store::{CellAddress, NodeId};
use crate::validation::finding::{ids, Category, Finding, FindingKind, Severity};
use std::collections::HashSet;
use tracing::debug;

/// Addresses listed in a cycle message before it is abbreviated.
const MESSAGE_ADDRESS_CAP: usize = 8;
const UNVISITED: u32 = u32::MAX;

/// Result of the cycle pass. Rules consult `membership` to skip or downgrade
/// findings on cells that sit inside a circular reference.
#[derive(Debug, Clone, Default)]
pub struct CycleAnalysis {
    pub findings: Vec<Finding>,
    /// Every circular component, members ordered by address.
    pub components: Vec<Vec<NodeId>>,
    membership: Vec<bool>,
}

impl CycleAnalysis {
    pub fn in_cycle(&self, id: NodeId) -> bool {
        self.membership.get(id.index()).copied().unwrap_or(false)
    }

    pub fn is_acyclic(&self) -> bool {
        self.components.is_empty()
    }
}

/// One `CycleError` finding per circular component.
pub fn find_cycles(graph: &DependencyGraph) -> Vec<Finding> {
    analyze_cycles(graph).findings
}

pub fn analyze_cycles(graph: &DependencyGraph) -> CycleAnalysis {
    let mut membership = vec![false; graph.node_count()];
    let mut components = Vec::new();

    for mut scc in strongly_connected(graph) {
        if scc.len() == 1 && !graph.has_self_edge(scc[0]) {
            continue;
        }
        scc.sort_by_key(|&id| graph.address(id));
        for &id in &scc {
            membership[id.index()] = true;
        }
        components.push(scc);
    }
    components.sort_by_key(|scc| graph.address(scc[0]));

    let findings = components
        .iter()
        .map(|scc| cycle_finding(graph, scc))
        .collect();
    debug!(cycles = components.len(), "cycle detection finished");
    CycleAnalysis { findings, components, membership }
}

/// Iterative Tarjan over the `depends_on` edges. Each node carries an index, a
/// low-link and an on-stack flag; deep reference chains cannot overflow the call stack.
fn strongly_connected(graph: &DependencyGraph) -> Vec<Vec<NodeId>> {
    let n = graph.node_count();
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0u32; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<NodeId> = Vec::new();
    let mut next_index = 0u32;
    let mut result = Vec::new();

    struct Frame {
        node: NodeId,
        next_edge: usize,
    }

    for root in graph.node_ids() {
        if index[root.index()] != UNVISITED {
            continue;
        }
        let mut frames = vec![Frame { node: root, next_edge: 0 }];
        index[root.index()] = next_index;
        lowlink[root.index()] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root.index()] = true;

        while let Some(frame) = frames.last_mut() {
            let v = frame.node;
            let edges = graph.depends_on(v);
            if frame.next_edge < edges.len() {
                let w = edges[frame.next_edge];
                frame.next_edge += 1;
                if index[w.index()] == UNVISITED {
                    index[w.index()] = next_index;
                    lowlink[w.index()] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w.index()] = true;
                    frames.push(Frame { node: w, next_edge: 0 });
                } else if on_stack[w.index()] {
                    lowlink[v.index()] = lowlink[v.index()].min(index[w.index()]);
                }
                continue;
            }

            frames.pop();
            if let Some(parent) = frames.last() {
                let p = parent.node.index();
                lowlink[p] = lowlink[p].min(lowlink[v.index()]);
            }
            if lowlink[v.index()] == index[v.index()] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w.index()] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                result.push(component);
            }
        }
    }
    result
}

fn cycle_finding(graph: &DependencyGraph, scc: &[NodeId]) -> Finding {
    let addresses: Vec<CellAddress> = scc.iter().map(|&id| graph.address(id)).collect();
    let listed: Vec<String> = addresses.iter().take(MESSAGE_ADDRESS_CAP).map(ToString::to_string).collect();
    let mut message = format!("Circular reference through {} cell(s): {}", scc.len(), listed.join(" -> "));
    if scc.len() > MESSAGE_ADDRESS_CAP {
        message.push_str(&format!(" and {} more", scc.len() - MESSAGE_ADDRESS_CAP));
    }

    let mut finding = Finding::new(
        ids::CIRCULAR_REFERENCE,
        Category::Formula,
        FindingKind::CycleError,
        Severity::Critical,
        addresses,
        message,
    );
    if let Some(pivot) = break_point(graph, scc) {
        finding = finding.with_fix(format!(
            "Break the loop at {}: replace its formula with an input or a prior-period reference",
            graph.address(pivot)
        ));
    }
    finding
}

/// The member read by the fewest cells outside this component, i.e. the one least
/// likely to be a shared input. Readers inside other cycles count as outside.
/// Ties go to the lowest (row, column).
fn break_point(graph: &DependencyGraph, scc: &[NodeId]) -> Option<NodeId> {
    let members: HashSet<NodeId> = scc.iter().copied().collect();
    scc.iter().copied().min_by_key(|&id| {
        let outside = graph.used_by(id).filter(|reader| !members.contains(reader)).count();
        let cell = graph.cell(id);
        (outside, cell.row, cell.column, cell.sheet.to_uppercase())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::ParserOptions;
    use crate::graph::build;
    use crate::store::{Cell, CellAddress};
    use proptest::prelude::*;

    fn graph_of(cells: Vec<Cell>) -> DependencyGraph {
        build(&cells, &ParserOptions::default()).graph
    }

    #[test]
    fn test_three_cell_loop_is_one_finding() {
        let g = graph_of(vec![
            Cell::formula("S", 1, 1, "=B1"),
            Cell::formula("S", 1, 2, "=C1"),
            Cell::formula("S", 1, 3, "=A1"),
        ]);
        let findings = find_cycles(&g);
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.kind, FindingKind::CycleError);
        assert_eq!(finding.severity, Severity::Critical);
        assert_eq!(
            finding.addresses,
            vec![CellAddress::new("S", 1, 1), CellAddress::new("S", 1, 2), CellAddress::new("S", 1, 3)]
        );
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let g = graph_of(vec![Cell::formula("S", 2, 2, "=B2+1"), Cell::number("S", 1, 1, 1.0)]);
        let analysis = analyze_cycles(&g);
        assert_eq!(analysis.components.len(), 1);
        assert!(analysis.in_cycle(g.lookup("S", 2, 2).unwrap()));
        assert!(!analysis.in_cycle(g.lookup("S", 1, 1).unwrap()));
    }

    #[test]
    fn test_acyclic_chain_has_no_findings() {
        let g = graph_of(vec![
            Cell::number("S", 1, 1, 1.0),
            Cell::formula("S", 2, 1, "=A1"),
            Cell::formula("S", 3, 1, "=A2+A1"),
        ]);
        assert!(find_cycles(&g).is_empty());
        assert!(analyze_cycles(&g).is_acyclic());
    }

    #[test]
    fn test_break_point_prefers_cell_with_fewest_outside_readers() {
        // A1 <-> B1 loop; A1 is also read by two cells outside the loop.
        let g = graph_of(vec![
            Cell::formula("S", 1, 1, "=B1"),
            Cell::formula("S", 1, 2, "=A1"),
            Cell::formula("S", 2, 1, "=A1"),
            Cell::formula("S", 3, 1, "=A1"),
        ]);
        let findings = find_cycles(&g);
        let fix = findings[0].suggested_fix.as_deref().unwrap();
        assert!(fix.contains("S!B1"), "{}", fix);
    }

    #[test]
    fn test_break_point_counts_readers_in_other_cycles() {
        // Loop X: A1 <-> B1. Loop Y: C1 <-> D1, both also reading A1. F1 reads B1.
        let g = graph_of(vec![
            Cell::formula("S", 1, 1, "=B1"),
            Cell::formula("S", 1, 2, "=A1"),
            Cell::formula("S", 1, 3, "=D1+A1"),
            Cell::formula("S", 1, 4, "=C1+A1"),
            Cell::formula("S", 1, 6, "=B1"),
        ]);
        let analysis = analyze_cycles(&g);
        assert_eq!(analysis.components.len(), 2);
        assert!(!analysis.is_acyclic());
        let fix = analysis.findings[0].suggested_fix.as_deref().unwrap();
        assert!(fix.contains("S!B1"), "{}", fix);
    }

    #[test]
    fn test_break_point_ties_use_lowest_position() {
        let g = graph_of(vec![
            Cell::formula("S", 5, 5, "=D4"),
            Cell::formula("S", 4, 4, "=E5"),
        ]);
        let fix = find_cycles(&g)[0].suggested_fix.clone().unwrap();
        assert!(fix.contains("S!D4"), "{}", fix);
    }

    #[test]
    fn test_long_cycle_message_is_abbreviated() {
        let n = 20u32;
        let cells = (1..=n)
            .map(|row| {
                let next = if row == n { 1 } else { row + 1 };
                Cell::formula("S", row, 1, &format!("=A{}", next))
            })
            .collect();
        let findings = find_cycles(&graph_of(cells));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].addresses.len(), n as usize);
        assert!(findings[0].message.ends_with("and 12 more"), "{}", findings[0].message);
    }

    /// Random edge lists over a single row of cells; `A1` reads every cell in its list.
    fn random_graph() -> impl Strategy<Value = Vec<Vec<u32>>> {
        (1usize..12).prop_flat_map(|n| {
            proptest::collection::vec(proptest::collection::vec(0..n as u32, 0..4), n)
        })
    }

    fn cells_from_edges(edges: &[Vec<u32>]) -> Vec<Cell> {
        edges
            .iter()
            .enumerate()
            .map(|(i, targets)| {
                let column = i as u32 + 1;
                if targets.is_empty() {
                    Cell::number("S", 1, column, 1.0)
                } else {
                    let refs: Vec<String> = targets
                        .iter()
                        .map(|&t| format!("{}1", crate::store::types::column_letters(t + 1)))
                        .collect();
                    Cell::formula("S", 1, column, &format!("={}", refs.join("+")))
                }
            })
            .collect()
    }

    proptest! {
        #[test]
        fn prop_one_finding_per_cyclic_scc(edges in random_graph()) {
            use petgraph::algo::kosaraju_scc;
            use petgraph::graph::DiGraph;

            let g = graph_of(cells_from_edges(&edges));
            let mut oracle = DiGraph::<(), ()>::new();
            let nodes: Vec<_> = (0..edges.len()).map(|_| oracle.add_node(())).collect();
            for (from, targets) in edges.iter().enumerate() {
                for &to in targets {
                    if !oracle.contains_edge(nodes[from], nodes[to as usize]) {
                        oracle.add_edge(nodes[from], nodes[to as usize], ());
                    }
                }
            }
            let mut expected: Vec<Vec<u32>> = kosaraju_scc(&oracle)
                .into_iter()
                .filter(|scc| scc.len() > 1 || oracle.contains_edge(scc[0], scc[0]))
                .map(|scc| {
                    let mut columns: Vec<u32> = scc.iter().map(|n| n.index() as u32 + 1).collect();
                    columns.sort();
                    columns
                })
                .collect();
            expected.sort();

            let findings = find_cycles(&g);
            let mut actual: Vec<Vec<u32>> = findings
                .iter()
                .map(|f| f.addresses.iter().map(|a| a.column).collect())
                .collect();
            actual.sort();

            prop_assert_eq!(actual, expected);
            prop_assert!(findings.iter().all(|f| f.kind == FindingKind::CycleError));
        }
    }
}
