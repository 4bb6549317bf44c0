//! One-hop column lineage graph
//!
//! `model -> column -> upstream_model -> [upstream_column]`, built once by
//! edge inference and read-only afterwards. Ordered maps keep every export
//! deterministic across runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Upstream columns of one column, grouped by upstream model
pub type UpstreamColumns = BTreeMap<String, Vec<String>>;

/// A single edge `(model, column) <- (upstream_model, upstream_column)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge<'a> {
    pub model: &'a str,
    pub column: &'a str,
    pub upstream_model: &'a str,
    pub upstream_column: &'a str,
}

/// Column lineage graph indexed in the forward (downstream -> upstream) direction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnLineageGraph {
    models: BTreeMap<String, BTreeMap<String, UpstreamColumns>>,
}

impl ColumnLineageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an edge, returning false if it was already present
    ///
    /// Deduplication is per `(model, column, upstream_model)`; the same upstream
    /// column under a different upstream model is a separate edge.
    pub fn record(
        &mut self,
        model: &str,
        column: &str,
        upstream_model: &str,
        upstream_column: &str,
    ) -> bool {
        let targets = self
            .models
            .entry(model.to_string())
            .or_default()
            .entry(column.to_string())
            .or_default()
            .entry(upstream_model.to_string())
            .or_default();

        if targets.iter().any(|existing| existing == upstream_column) {
            return false;
        }

        targets.push(upstream_column.to_string());
        true
    }

    /// Direct upstream columns of `(model, column)`
    pub fn upstream_of(&self, model: &str, column: &str) -> Option<&UpstreamColumns> {
        self.models.get(model)?.get(column)
    }

    /// Columns with lineage for a model
    pub fn model(&self, model: &str) -> Option<&BTreeMap<String, UpstreamColumns>> {
        self.models.get(model)
    }

    /// Models that have at least one edge
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    /// All edges in `(model, column, upstream_model)` order, upstream columns in
    /// the order they were recorded
    pub fn edges(&self) -> impl Iterator<Item = Edge<'_>> {
        self.models.iter().flat_map(|(model, columns)| {
            columns.iter().flat_map(move |(column, upstreams)| {
                upstreams.iter().flat_map(move |(upstream_model, upstream_columns)| {
                    upstream_columns.iter().map(move |upstream_column| Edge {
                        model,
                        column,
                        upstream_model,
                        upstream_column,
                    })
                })
            })
        })
    }

    pub fn contains(&self, model: &str, column: &str, upstream_model: &str, upstream_column: &str) -> bool {
        self.upstream_of(model, column)
            .and_then(|upstreams| upstreams.get(upstream_model))
            .is_some_and(|cols| cols.iter().any(|c| c == upstream_column))
    }

    pub fn edge_count(&self) -> usize {
        self.edges().count()
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Single-hop inverse: `upstream_model -> upstream_column -> [(model, column)]`
    pub fn invert(&self) -> DownstreamIndex {
        let mut index = DownstreamIndex::default();
        for edge in self.edges() {
            index
                .models
                .entry(edge.upstream_model.to_string())
                .or_default()
                .entry(edge.upstream_column.to_string())
                .or_default()
                .push((edge.model.to_string(), edge.column.to_string()));
        }
        index
    }
}

/// Inverted one-hop view of a [`ColumnLineageGraph`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DownstreamIndex {
    models: BTreeMap<String, BTreeMap<String, Vec<(String, String)>>>,
}

impl DownstreamIndex {
    /// Direct downstream `(model, column)` pairs of an upstream column
    pub fn downstream_of(&self, model: &str, column: &str) -> &[(String, String)] {
        self.models
            .get(model)
            .and_then(|columns| columns.get(column))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// All inverted edges as `(upstream_model, upstream_column, model, column)`
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &str, &str)> {
        self.models.iter().flat_map(|(model, columns)| {
            columns.iter().flat_map(move |(column, downstreams)| {
                downstreams.iter().map(move |(downstream_model, downstream_column)| {
                    (
                        model.as_str(),
                        column.as_str(),
                        downstream_model.as_str(),
                        downstream_column.as_str(),
                    )
                })
            })
        })
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
