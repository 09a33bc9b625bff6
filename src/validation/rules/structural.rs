//! Shape checks across rows and columns of copied formulas, and orphaned inputs.
//!
//! A "run" is a stretch of adjacent cells along a row or down a column that each hold
//! a formula or a number. Inside a run, every formula is reduced to its relative
//! shape; when one shape holds a strict majority, cells that deviate from it are
//! suspicious. A cell flagged along both axes is reported once.
use super::Violation;
use crate::formula::FormulaShape;
use crate::store::{NodeId, RawContent};
use crate::validation::context::RuleContext;
use std::collections::{BTreeMap, HashSet};

pub fn hardcoded_constants(ctx: &RuleContext) -> Vec<Violation> {
    let mut out = Vec::new();
    let mut flagged = HashSet::new();
    for run in runs(ctx) {
        let Some(dominant) = run.dominant() else { continue };
        for (i, member) in run.members.iter().enumerate() {
            if run.exempt(i, &dominant.shape) || member.shape.is_some() || !flagged.insert(member.node) {
                continue;
            }
            let value = ctx.graph.cell(member.node).raw.as_number().unwrap_or_default();
            out.push(
                Violation::new(
                    [member.node],
                    format!("Hardcoded value {} in a {} computed by {}", value, run.axis.noun(), dominant.example),
                )
                .with_fix(format!(
                    "Replace the constant with the {} formula, or move the input to an assumptions sheet",
                    run.axis.noun()
                )),
            );
        }
    }
    out
}

pub fn inconsistent_formulas(ctx: &RuleContext) -> Vec<Violation> {
    let mut out = Vec::new();
    let mut flagged = HashSet::new();
    for run in runs(ctx) {
        let Some(dominant) = run.dominant() else { continue };
        for (i, member) in run.members.iter().enumerate() {
            let Some(shape) = &member.shape else { continue };
            if run.exempt(i, &dominant.shape) || shape.text == dominant.shape.text || !flagged.insert(member.node) {
                continue;
            }
            let own = ctx.graph.formula(member.node).and_then(|f| f.canonical()).unwrap_or_default();
            out.push(
                Violation::new(
                    [member.node],
                    format!("Formula {} breaks the {} pattern {}", own, run.axis.noun(), dominant.example),
                )
                .with_fix(format!(
                    "Copy the neighbouring formula along, or split the {} if the difference is intended",
                    run.axis.noun()
                )),
            );
        }
    }
    out
}

/// Numeric inputs on assumption sheets that no formula reads.
pub fn unlinked_assumptions(ctx: &RuleContext) -> Vec<Violation> {
    let mut out = Vec::new();
    for sheet in &ctx.config.structural.assumption_sheets {
        for id in ctx.graph.sheet_nodes(sheet) {
            if !ctx.graph.is_numeric_literal(id) || ctx.graph.used_by_count(id) > 0 {
                continue;
            }
            let value = ctx.graph.cell(id).raw.as_number().unwrap_or_default();
            out.push(
                Violation::new([id], format!("Assumption {} is not referenced by any formula", value))
                    .with_fix("Link the input into the model or remove it"),
            );
        }
    }
    out
}

struct Member {
    node: NodeId,
    /// `None` for numeric literals.
    shape: Option<FormulaShape>,
}

struct Dominant {
    shape: FormulaShape,
    /// Canonical text of the first member with the dominant shape.
    example: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Row,
    Column,
}

impl Axis {
    fn noun(self) -> &'static str {
        match self {
            Axis::Row => "row",
            Axis::Column => "column",
        }
    }
}

struct Run<'c> {
    axis: Axis,
    members: Vec<Member>,
    ctx: &'c RuleContext<'c>,
}

impl Run<'_> {
    /// The majority shape, if some shape covers at least two cells and more than
    /// half of the run.
    fn dominant(&self) -> Option<Dominant> {
        let mut counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for (i, member) in self.members.iter().enumerate() {
            if let Some(shape) = &member.shape {
                counts.entry(shape.text.as_str()).or_insert((0, i)).0 += 1;
            }
        }
        let (&text, &(count, first)) = counts.iter().max_by_key(|(_, (count, first))| (*count, std::cmp::Reverse(*first)))?;
        if count < 2 || count * 2 <= self.members.len() {
            return None;
        }
        let node = self.members[first].node;
        let example = self.ctx.graph.formula(node).and_then(|f| f.canonical()).unwrap_or_else(|| text.to_string());
        Some(Dominant { shape: self.members[first].shape.clone()?, example })
    }

    /// The first cell of a recurrence (each period reading the previous one along the
    /// run) holds its seed.
    fn exempt(&self, index: usize, dominant: &FormulaShape) -> bool {
        index == 0
            && match self.axis {
                Axis::Row => dominant.rolls_forward,
                Axis::Column => dominant.rolls_down,
            }
    }
}

/// Runs of at least `min_run_len` adjacent formula/number cells along rows, then
/// down columns. Cycle members are excluded.
fn runs<'c>(ctx: &'c RuleContext<'c>) -> Vec<Run<'c>> {
    let mut out = Vec::new();
    for row in ctx.graph.rows() {
        collect_runs(&mut out, ctx, Axis::Row, row);
    }
    for column in ctx.graph.columns() {
        collect_runs(&mut out, ctx, Axis::Column, column);
    }
    out
}

/// Splits one row or column (ordered along `axis`) into runs.
fn collect_runs<'c>(out: &mut Vec<Run<'c>>, ctx: &'c RuleContext<'c>, axis: Axis, line: &[NodeId]) {
    let min_len = ctx.config.structural.min_run_len;
    let mut current: Vec<Member> = Vec::new();
    let mut last = 0u32;

    for &id in line {
        let cell = ctx.graph.cell(id);
        let position = match axis {
            Axis::Row => cell.column,
            Axis::Column => cell.row,
        };
        let member = match &cell.raw {
            _ if ctx.in_cycle(id) => None,
            RawContent::Number(_) => Some(Member { node: id, shape: None }),
            RawContent::Formula(_) => ctx
                .graph
                .formula(id)
                .and_then(|f| f.shape(cell.row, cell.column))
                .map(|shape| Member { node: id, shape: Some(shape) }),
            _ => None,
        };
        let adjacent = !current.is_empty() && position == last + 1;
        match member {
            Some(member) if adjacent || current.is_empty() => current.push(member),
            Some(member) => {
                flush(out, &mut current, min_len, axis, ctx);
                current.push(member);
            }
            None => flush(out, &mut current, min_len, axis, ctx),
        }
        last = position;
    }
    flush(out, &mut current, min_len, axis, ctx);
}

fn flush<'c>(out: &mut Vec<Run<'c>>, current: &mut Vec<Member>, min_len: usize, axis: Axis, ctx: &'c RuleContext<'c>) {
    let members = std::mem::take(current);
    if members.len() >= min_len {
        out.push(Run { axis, members, ctx });
    }
}
