//! Edge inference from compiled SQL
//!
//! This is a text heuristic, not a SQL parser. For every model with compiled
//! SQL and catalog columns, and every declared dependency with catalog
//! columns, a pair `(own_column, upstream_column)` becomes an edge when:
//!
//! 1. the upstream column occurs as a whole word (case-sensitive) anywhere in
//!    the SQL, and
//! 2. either `own_column = ... upstream_column` or
//!    `select|, ... upstream_column ... as own_column` matches
//!    (case-insensitive, `.` spans lines).
//!
//! The patterns match across clauses and statements. False positives such as
//! an unrelated comparison that mentions both names are part of the behavior.

use crate::lineage::ColumnLineageGraph;
use colineage_core::{Diagnostic, DiagnosticCode, InferenceConfig, Severity};
use colineage_dbt::{ColumnCatalog, ModelGraph, ModelNode};
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;

/// The two pair patterns for one `(own_column, upstream_column)` combination
#[derive(Debug, Clone)]
pub struct ColumnPatterns {
    assignment: Regex,
    aliasing: Regex,
}

impl ColumnPatterns {
    pub fn new(own_column: &str, upstream_column: &str) -> Result<Self, InferenceError> {
        let own = regex::escape(own_column);
        let upstream = regex::escape(upstream_column);

        let assignment = format!(r"\b{own}\s*=.*\b{upstream}\b");
        let aliasing = format!(r"(?:select|,)\s*.*\b{upstream}\b.*\s+as\s+\b{own}\b");

        Ok(Self {
            assignment: pair_regex(&assignment)?,
            aliasing: pair_regex(&aliasing)?,
        })
    }

    /// Whether the SQL links the own column to the upstream column
    pub fn is_match(&self, sql: &str) -> bool {
        self.assignment.is_match(sql) || self.aliasing.is_match(sql)
    }
}

fn pair_regex(pattern: &str) -> Result<Regex, InferenceError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| InferenceError::Pattern(pattern.to_string(), e.to_string()))
}

/// Whole-word, case-sensitive presence pattern for an upstream column
pub fn presence_regex(column: &str) -> Result<Regex, InferenceError> {
    let pattern = format!(r"\b{}\b", regex::escape(column));
    Regex::new(&pattern).map_err(|e| InferenceError::Pattern(pattern, e.to_string()))
}

/// Result of inferring edges over a whole project
#[derive(Debug, Clone, Default)]
pub struct InferenceOutcome {
    pub lineage: ColumnLineageGraph,

    /// Skipped models and dependencies, as info diagnostics
    pub diagnostics: Vec<Diagnostic>,

    /// Models that passed the skip rules and were matched against their SQL
    pub models_considered: usize,
}

/// Edge inference engine
///
/// Compiled patterns are cached by column name for the lifetime of the engine,
/// since the same column names recur across most models of a project.
#[derive(Debug, Default)]
pub struct EdgeInference {
    config: InferenceConfig,
    presence: HashMap<String, Regex>,
    pairs: HashMap<(String, String), ColumnPatterns>,
}

impl EdgeInference {
    pub fn new(config: InferenceConfig) -> Self {
        Self {
            config,
            presence: HashMap::new(),
            pairs: HashMap::new(),
        }
    }

    /// Infer the column lineage graph for every producing model
    pub fn infer(&mut self, graph: &ModelGraph, catalog: &ColumnCatalog) -> Result<InferenceOutcome, InferenceError> {
        let mut outcome = InferenceOutcome::default();

        for node in graph.nodes() {
            if !self.config.is_producing(&node.resource_type) {
                continue;
            }

            if node.compiled_sql.is_empty() {
                tracing::debug!(model = %node.unique_id, "skipping model without compiled SQL");
                outcome.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::ModelNoCompiledSql,
                        Severity::Info,
                        format!("Model '{}' has no compiled SQL", node.unique_id),
                    )
                    .with_model(&node.unique_id),
                );
                continue;
            }

            let Some(own_columns) = catalog.columns(&node.unique_id) else {
                tracing::debug!(model = %node.unique_id, "skipping model missing from catalog");
                outcome.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::ModelNotInCatalog,
                        Severity::Info,
                        format!("Model '{}' has no table/view entry in the catalog", node.unique_id),
                    )
                    .with_model(&node.unique_id),
                );
                continue;
            };

            outcome.models_considered += 1;
            self.infer_model(node, own_columns, catalog, &mut outcome)?;
        }

        tracing::info!(
            models = outcome.models_considered,
            models_with_lineage = outcome.lineage.model_count(),
            edges = outcome.lineage.edge_count(),
            "inferred column lineage"
        );

        Ok(outcome)
    }

    fn infer_model(
        &mut self,
        node: &ModelNode,
        own_columns: &[String],
        catalog: &ColumnCatalog,
        outcome: &mut InferenceOutcome,
    ) -> Result<(), InferenceError> {
        let sql = node.compiled_sql.as_str();

        for dependency in &node.depends_on {
            let Some(upstream_columns) = catalog.columns(dependency) else {
                tracing::debug!(
                    model = %node.unique_id,
                    dependency = %dependency,
                    "skipping dependency missing from catalog"
                );
                outcome.diagnostics.push(
                    Diagnostic::new(
                        DiagnosticCode::DependencyNotInCatalog,
                        Severity::Info,
                        format!(
                            "Dependency '{}' of model '{}' has no table/view entry in the catalog",
                            dependency, node.unique_id
                        ),
                    )
                    .with_model(&node.unique_id)
                    .with_dependency(dependency),
                );
                continue;
            };

            for upstream_column in upstream_columns {
                if !self.mentions(sql, upstream_column)? {
                    continue;
                }

                for own_column in own_columns {
                    if self.links(sql, own_column, upstream_column)? {
                        outcome
                            .lineage
                            .record(&node.unique_id, own_column, dependency, upstream_column);
                    }
                }
            }
        }

        Ok(())
    }

    /// Presence gate: the upstream column appears as a whole word
    fn mentions(&mut self, sql: &str, column: &str) -> Result<bool, InferenceError> {
        if !self.presence.contains_key(column) {
            self.presence.insert(column.to_string(), presence_regex(column)?);
        }
        Ok(self.presence[column].is_match(sql))
    }

    fn links(&mut self, sql: &str, own_column: &str, upstream_column: &str) -> Result<bool, InferenceError> {
        let key = (own_column.to_string(), upstream_column.to_string());
        if !self.pairs.contains_key(&key) {
            let patterns = ColumnPatterns::new(own_column, upstream_column)?;
            self.pairs.insert(key.clone(), patterns);
        }
        Ok(self.pairs[&key].is_match(sql))
    }
}

/// Edge inference errors
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Failed to compile column pattern {0}: {1}")]
    Pattern(String, String),
}
