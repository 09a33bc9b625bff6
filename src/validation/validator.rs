//! The central validator that orchestrates a run:
//! build graph -> detect cycles -> evaluate rules (parallel) -> classify.
use super::context::RuleContext;
use super::engine;
use super::finding::{Category, Finding};
use super::rules::{Rule, CATALOG};
use super::scenario::ScenarioSet;
use crate::analysis::analyze_cycles;
use crate::config::ValidationConfig;
use crate::error::AuditError;
use crate::graph::{self, GraphBuild};
use crate::report::{classify, ValidationReport};
use crate::store::Snapshot;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info_span, warn};

/// Shared flag a caller flips to abandon a run. Checked between stages and before
/// each rule; a cancelled run returns [`AuditError::Cancelled`] and no partial report.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Holds the configuration and options for a run; the snapshot is only borrowed
/// for the duration of [`Validator::run`].
#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidationConfig,
    categories: Option<BTreeSet<Category>>,
    cancellation: Option<CancellationToken>,
}

impl Validator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config, categories: None, cancellation: None }
    }

    /// Restricts the report to the given categories. Rules of other categories are not run.
    pub fn with_categories(mut self, categories: impl IntoIterator<Item = Category>) -> Self {
        self.categories = Some(categories.into_iter().collect());
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    pub fn run(&self, snapshot: &Snapshot, scenarios: &ScenarioSet) -> Result<ValidationReport, AuditError> {
        self.config.validate()?;
        scenarios.validate()?;

        let span = info_span!("validate", cells = snapshot.len(), scenarios = scenarios.len());
        let _enter = span.enter();

        let GraphBuild { graph, findings: mut raw } = graph::build(&snapshot.cells, &self.config.limits);
        self.checkpoint()?;

        // Barrier: rules consult cycle membership.
        let cycles = analyze_cycles(&graph);
        raw.extend(cycles.findings.iter().cloned());
        self.checkpoint()?;

        let rules: Vec<&Rule> = CATALOG.iter().filter(|rule| self.wants(rule.category)).collect();
        let neutral = RuleContext::new(&graph, &cycles, &self.config, None);
        let scenario_contexts: Vec<RuleContext> =
            scenarios.iter().map(|s| RuleContext::new(&graph, &cycles, &self.config, Some(s))).collect();
        let value_contexts: Vec<&RuleContext> = if scenario_contexts.is_empty() {
            vec![&neutral]
        } else {
            scenario_contexts.iter().collect()
        };

        let mut jobs: Vec<(&Rule, &RuleContext)> = Vec::new();
        for &rule in &rules {
            if rule.reads_values {
                jobs.extend(value_contexts.iter().map(|&ctx| (rule, ctx)));
            } else {
                jobs.push((rule, &neutral));
            }
        }

        let evaluated: Vec<Finding> = jobs
            .par_iter()
            .flat_map_iter(|&(rule, ctx)| {
                if self.is_cancelled() {
                    return Vec::new();
                }
                let findings = engine::evaluate(rule, ctx);
                debug!(rule = rule.id, scenario = ctx.scenario_name().unwrap_or("-"), findings = findings.len(), "rule evaluated");
                findings
            })
            .collect();
        // Partial rule results are discarded, never reported.
        self.checkpoint()?;

        raw.extend(evaluated);
        raw.retain(|finding| self.wants(finding.category));
        Ok(classify(raw, &self.config.severity_overrides))
    }

    fn wants(&self, category: Category) -> bool {
        self.categories.as_ref().map_or(true, |set| set.contains(&category))
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation.as_ref().map_or(false, CancellationToken::is_cancelled)
    }

    fn checkpoint(&self) -> Result<(), AuditError> {
        if self.is_cancelled() {
            warn!("validation cancelled");
            return Err(AuditError::Cancelled);
        }
        Ok(())
    }
}
