//! Flat and targeted lineage runs
//!
//! Both modes infer the one-hop graph for every model. Flat mode adds the
//! one-hop inverse; targeted mode expands closures in both directions rooted
//! at the columns of one model. Expanding every model is a separate opt-in.

use crate::closure::{ClosureResolver, Direction, TargetLineage};
use crate::inference::{EdgeInference, InferenceError};
use crate::lineage::{ColumnLineageGraph, DownstreamIndex};
use colineage_core::{Diagnostic, DiagnosticCode, InferenceConfig, Report, Severity};
use colineage_dbt::{ColumnCatalog, ModelGraph};

/// Artifact name used when no target model is given
pub const ALL_MODELS: &str = "all_models";

/// Output of a flat run
#[derive(Debug, Clone)]
pub struct FlatLineage {
    pub lineage: ColumnLineageGraph,
    pub downstream: DownstreamIndex,
    pub diagnostics: Vec<Diagnostic>,
    pub models_considered: usize,
}

impl FlatLineage {
    pub fn report(&self) -> Report {
        let mut report = Report::from_diagnostics(self.diagnostics.clone());
        report.summary.models_considered = self.models_considered;
        report.summary.models_with_lineage = self.lineage.model_count();
        report.summary.edges = self.lineage.edge_count();
        report
    }
}

/// Output of a targeted run
#[derive(Debug, Clone)]
pub struct TargetedLineage {
    /// Name the artifacts are written under
    pub name: String,

    /// Resolved unique_id of the target, if one was requested and found
    pub target: Option<String>,

    pub lineage: ColumnLineageGraph,
    pub upstream: TargetLineage,
    pub downstream: TargetLineage,
    pub diagnostics: Vec<Diagnostic>,
    pub models_considered: usize,
}

impl TargetedLineage {
    pub fn report(&self) -> Report {
        let mut report = Report::from_diagnostics(self.diagnostics.clone());
        report.target = Some(self.target.clone().unwrap_or_else(|| self.name.clone()));
        report.summary.models_considered = self.models_considered;
        report.summary.models_with_lineage = self.lineage.model_count();
        report.summary.edges = self.lineage.edge_count();
        report
    }
}

/// Build the one-hop graph for all models plus its inverse
pub fn run_flat(
    graph: &ModelGraph,
    catalog: &ColumnCatalog,
    config: &InferenceConfig,
) -> Result<FlatLineage, InferenceError> {
    let outcome = EdgeInference::new(config.clone()).infer(graph, catalog)?;
    let downstream = outcome.lineage.invert();

    Ok(FlatLineage {
        lineage: outcome.lineage,
        downstream,
        diagnostics: outcome.diagnostics,
        models_considered: outcome.models_considered,
    })
}

/// Build the one-hop graph, then expand closures rooted at `target`
///
/// `target` is a model name or unique_id. An unknown target yields empty
/// closures and a warning diagnostic rather than an error. Without a target
/// nothing is expanded and the closures stay empty.
pub fn run_targeted(
    graph: &ModelGraph,
    catalog: &ColumnCatalog,
    config: &InferenceConfig,
    target: Option<&str>,
) -> Result<TargetedLineage, InferenceError> {
    let outcome = EdgeInference::new(config.clone()).infer(graph, catalog)?;
    let mut diagnostics = outcome.diagnostics;

    let roots: Vec<(String, Vec<String>)> = match target {
        Some(name) => match graph.find_by_name(name) {
            None => {
                tracing::warn!(model = name, "target model not found in manifest");
                diagnostics.push(Diagnostic::new(
                    DiagnosticCode::TargetModelNotFound,
                    Severity::Warn,
                    format!("Model '{}' not found in the manifest", name),
                ));
                Vec::new()
            }
            Some(node) => match catalog.columns(&node.unique_id) {
                Some(columns) => vec![(node.unique_id.clone(), columns.to_vec())],
                None => {
                    tracing::warn!(model = %node.unique_id, "target model has no catalog columns");
                    diagnostics.push(
                        Diagnostic::new(
                            DiagnosticCode::TargetModelNoColumns,
                            Severity::Warn,
                            format!("Model '{}' has no table/view entry in the catalog", node.unique_id),
                        )
                        .with_model(&node.unique_id),
                    );
                    Vec::new()
                }
            },
        },
        None => Vec::new(),
    };

    let target_id = target.and_then(|_| roots.first().map(|(model, _)| model.clone()));
    let (upstream, downstream) = expand(&outcome.lineage, &roots);

    Ok(TargetedLineage {
        name: target.unwrap_or(ALL_MODELS).to_string(),
        target: target_id,
        lineage: outcome.lineage,
        upstream,
        downstream,
        diagnostics,
        models_considered: outcome.models_considered,
    })
}

/// Build the one-hop graph, then expand closures rooted at every producing
/// model that has catalog columns
///
/// Artifacts are named `all_models`.
pub fn run_all_models(
    graph: &ModelGraph,
    catalog: &ColumnCatalog,
    config: &InferenceConfig,
) -> Result<TargetedLineage, InferenceError> {
    let outcome = EdgeInference::new(config.clone()).infer(graph, catalog)?;

    let roots: Vec<(String, Vec<String>)> = graph
        .nodes()
        .filter(|node| config.is_producing(&node.resource_type))
        .filter_map(|node| {
            catalog
                .columns(&node.unique_id)
                .map(|columns| (node.unique_id.clone(), columns.to_vec()))
        })
        .collect();
    tracing::info!(roots = roots.len(), "expanding closures for all models");

    let (upstream, downstream) = expand(&outcome.lineage, &roots);

    Ok(TargetedLineage {
        name: ALL_MODELS.to_string(),
        target: None,
        lineage: outcome.lineage,
        upstream,
        downstream,
        diagnostics: outcome.diagnostics,
        models_considered: outcome.models_considered,
    })
}

fn expand(lineage: &ColumnLineageGraph, roots: &[(String, Vec<String>)]) -> (TargetLineage, TargetLineage) {
    let resolver = ClosureResolver::new(lineage);
    let mut upstream = TargetLineage::default();
    let mut downstream = TargetLineage::default();
    for (model, columns) in roots {
        resolver.resolve_model(Direction::Upstream, model, columns, &mut upstream);
        resolver.resolve_model(Direction::Downstream, model, columns, &mut downstream);
    }
    (upstream, downstream)
}
