//! Single pass from snapshot cells to a `DependencyGraph`.
use super::dag::DependencyGraph;
use crate::formula::{ParsedFormula, Parser, ParserOptions, RangeRef, Reference};
use crate::store::types::sheet_key;
use crate::store::{Cell, CellKey, NodeId, RawContent, Registry};
use crate::validation::finding::{ids, Category, Finding, FindingKind, Severity};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// The graph plus the findings produced while building it
/// (parse errors, unresolved references, duplicate addresses).
#[derive(Debug, Clone)]
pub struct GraphBuild {
    pub graph: DependencyGraph,
    pub findings: Vec<Finding>,
}

pub fn build(cells: &[Cell], options: &ParserOptions) -> GraphBuild {
    let mut store = Registry::new();
    let mut findings = Vec::new();

    // 1. Nodes. Every address must be known before any formula is resolved.
    for cell in cells {
        if let Err(existing) = store.add_cell(cell.clone()) {
            let kept = store.cells[existing.index()].address();
            warn!(address = %kept, "duplicate address in snapshot, keeping the first cell");
            findings.push(Finding::new(
                ids::DUPLICATE_ADDRESS,
                Category::Structural,
                FindingKind::StructuralIssue,
                Severity::Warning,
                [kept.clone()],
                format!("{} appears more than once in the snapshot; later copies were ignored", kept),
            ));
        }
    }

    let mut rows: BTreeMap<(String, u32), Vec<NodeId>> = BTreeMap::new();
    let mut columns: BTreeMap<(String, u32), Vec<NodeId>> = BTreeMap::new();
    for (i, cell) in store.cells.iter().enumerate() {
        let sheet = sheet_key(&cell.sheet);
        rows.entry((sheet.clone(), cell.row)).or_default().push(NodeId::new(i));
        columns.entry((sheet, cell.column)).or_default().push(NodeId::new(i));
    }
    for ids in rows.values_mut() {
        ids.sort_by_key(|id| store.cells[id.index()].column);
    }
    for ids in columns.values_mut() {
        ids.sort_by_key(|id| store.cells[id.index()].row);
    }

    // 2. Edges, in reference order.
    let parser = Parser::new(options);
    let mut formulas = Vec::with_capacity(store.count());
    let mut failed = Vec::new();
    for i in 0..store.count() {
        let id = NodeId::new(i);
        let parsed = match &store.cells[i].raw {
            RawContent::Formula(text) => Some(parser.parse(text)),
            _ => None,
        };

        let mut parents = Vec::new();
        if let Some(formula) = &parsed {
            let host = &store.cells[i];
            match &formula.error {
                Some(err) => {
                    failed.push(id);
                    findings.push(
                        Finding::new(
                            ids::PARSE_ERROR,
                            Category::Formula,
                            FindingKind::ParseError,
                            Severity::Warning,
                            [host.address()],
                            format!("Formula `{}` could not be parsed: {}", raw_text(host), err),
                        )
                        .with_fix("Rewrite the formula using cell references, operators and supported functions"),
                    );
                }
                None => {
                    let unresolved = resolve(&store, &rows, host, formula, &mut parents);
                    if !unresolved.is_empty() {
                        findings.push(
                            Finding::new(
                                ids::UNRESOLVED_REFERENCE,
                                Category::Structural,
                                FindingKind::UnresolvedReference,
                                Severity::Warning,
                                [host.address()],
                                format!("Formula references cells missing from the workbook: {}", unresolved.join(", ")),
                            )
                            .with_fix("Point the formula at existing cells or restore the deleted ones"),
                        );
                    }
                }
            }
        }
        store.set_parents(id, &parents);
        formulas.push(parsed);
    }

    let mut graph = DependencyGraph {
        tainted: vec![false; store.count()],
        store,
        formulas,
        rows,
        columns,
    };
    for id in graph.downstream_from(&failed) {
        graph.tainted[id.index()] = true;
    }

    debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        parse_failures = failed.len(),
        "dependency graph built"
    );
    GraphBuild { graph, findings }
}

/// Adds one parent per existing target; returns a description of every reference
/// that could not be resolved (each range at most once).
///
/// The caller reports all of them in a single `graph.unresolved-reference` finding on
/// the formula cell, so one finding can name several missing targets.
fn resolve(
    store: &Registry,
    rows: &BTreeMap<(String, u32), Vec<NodeId>>,
    host: &Cell,
    formula: &ParsedFormula,
    parents: &mut Vec<NodeId>,
) -> Vec<String> {
    let mut unresolved = Vec::new();
    for reference in &formula.references {
        let sheet = match reference {
            Reference::Cell(c) => c.sheet.as_ref(),
            Reference::Range(r) | Reference::OpaqueRange(r) => r.sheet.as_ref(),
        }
        .map_or(host.sheet.as_str(), |s| s.as_str());

        match reference {
            Reference::Cell(c) => match store.lookup(&CellKey::new(sheet, c.row, c.column)) {
                Some(target) => push_unique(parents, target),
                None => unresolved.push(reference.to_string()),
            },
            Reference::Range(r) => {
                let mut missing = 0u64;
                for (row, column) in r.cells() {
                    match store.lookup(&CellKey::new(sheet, row, column)) {
                        Some(target) => push_unique(parents, target),
                        None => missing += 1,
                    }
                }
                if missing > 0 {
                    unresolved.push(format!("{} ({} of {} cells missing)", r, missing, r.cell_count()));
                }
            }
            Reference::OpaqueRange(r) => {
                if !attach_opaque(store, rows, sheet, r, parents) {
                    unresolved.push(format!("{} (no cells in range)", r));
                }
            }
        }
    }
    unresolved
}

/// Opaque ranges are never expanded; they link to the snapshot cells that fall inside.
fn attach_opaque(
    store: &Registry,
    rows: &BTreeMap<(String, u32), Vec<NodeId>>,
    sheet: &str,
    range: &RangeRef,
    parents: &mut Vec<NodeId>,
) -> bool {
    let key = sheet_key(sheet);
    let mut hit = false;
    for ((_, row), ids) in rows.range((key.clone(), range.start_row)..=(key, range.end_row)) {
        for &id in ids {
            if range.contains(*row, store.cells[id.index()].column) {
                push_unique(parents, id);
                hit = true;
            }
        }
    }
    hit
}

fn push_unique(parents: &mut Vec<NodeId>, id: NodeId) {
    if !parents.contains(&id) {
        parents.push(id);
    }
}

fn raw_text(cell: &Cell) -> &str {
    match &cell.raw {
        RawContent::Formula(text) => text.as_str(),
        _ => "",
    }
}
