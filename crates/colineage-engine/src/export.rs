//! Flattening and export
//!
//! Graphs and closures are written as JSON documents and flattened into CSV
//! rows `(model, column, related model, related column[, depth])`.

use crate::closure::{LineageClosure, TargetLineage};
use crate::lineage::{ColumnLineageGraph, DownstreamIndex};
use colineage_core::Config;
use colineage_dbt::short_name;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const UPSTREAM_HEADER: [&str; 4] = ["Model", "Column", "Upstream Model", "Upstream Column"];
pub const DOWNSTREAM_HEADER: [&str; 4] = ["Model", "Column", "Downstream Model", "Downstream Column"];

/// One flattened lineage row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineageRow {
    pub model: String,
    pub column: String,
    pub related_model: String,
    pub related_column: String,

    /// Hops from the root column; 1 for direct edges
    pub depth: usize,
}

impl LineageRow {
    fn new(model: &str, column: &str, related_model: &str, related_column: &str, depth: usize) -> Self {
        Self {
            model: model.to_string(),
            column: column.to_string(),
            related_model: related_model.to_string(),
            related_column: related_column.to_string(),
            depth,
        }
    }
}

/// One row per graph edge
pub fn graph_rows(graph: &ColumnLineageGraph) -> Vec<LineageRow> {
    graph
        .edges()
        .map(|e| LineageRow::new(e.model, e.column, e.upstream_model, e.upstream_column, 1))
        .collect()
}

/// One row per inverted edge
pub fn downstream_rows(index: &DownstreamIndex) -> Vec<LineageRow> {
    index
        .edges()
        .map(|(model, column, downstream_model, downstream_column)| {
            LineageRow::new(model, column, downstream_model, downstream_column, 1)
        })
        .collect()
}

/// Pre-order flattening of every root closure
///
/// Each direct edge is followed immediately by the rows of its sub-closure.
pub fn closure_rows(lineage: &TargetLineage) -> Vec<LineageRow> {
    let mut rows = Vec::new();
    for (model, column, closure) in lineage.roots() {
        flatten_closure(model, column, closure, &mut rows);
    }
    rows
}

fn flatten_closure(model: &str, column: &str, closure: &LineageClosure, rows: &mut Vec<LineageRow>) {
    let mut stack: Vec<(&str, &str, &str, &str, &LineageClosure, usize)> = Vec::new();
    push_children(&mut stack, model, column, closure, 1);

    while let Some((model, column, related_model, related_column, sub, depth)) = stack.pop() {
        rows.push(LineageRow::new(model, column, related_model, related_column, depth));
        push_children(&mut stack, related_model, related_column, sub, depth + 1);
    }
}

fn push_children<'a>(
    stack: &mut Vec<(&'a str, &'a str, &'a str, &'a str, &'a LineageClosure, usize)>,
    model: &'a str,
    column: &'a str,
    closure: &'a LineageClosure,
    depth: usize,
) {
    let children: Vec<_> = closure.iter().collect();
    for (related_model, related_column, sub) in children.into_iter().rev() {
        stack.push((model, column, related_model, related_column, sub, depth));
    }
}

/// Writes lineage artifacts into one output directory
#[derive(Debug, Clone)]
pub struct Exporter {
    output_dir: PathBuf,
    short_names: bool,
    pretty_json: bool,
}

impl Exporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            short_names: true,
            pretty_json: true,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            short_names: config.short_names,
            pretty_json: config.pretty_json,
        }
    }

    /// Keep full unique_ids in CSV rows instead of model names
    pub fn with_short_names(mut self, short_names: bool) -> Self {
        self.short_names = short_names;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Flat mode: the full graph as JSON, its edges and its inverse as CSV
    pub fn export_flat(&self, graph: &ColumnLineageGraph, downstream: &DownstreamIndex) -> Result<Vec<PathBuf>, ExportError> {
        Ok(vec![
            self.write_json("column_lineage.json", graph)?,
            self.write_csv("column_lineage.csv", UPSTREAM_HEADER, &graph_rows(graph), false)?,
            self.write_csv("downstream_lineage.csv", DOWNSTREAM_HEADER, &downstream_rows(downstream), false)?,
        ])
    }

    /// Targeted mode: two JSON documents and four CSV files named after `name`
    pub fn export_targeted(
        &self,
        name: &str,
        upstream: &TargetLineage,
        downstream: &TargetLineage,
    ) -> Result<Vec<PathBuf>, ExportError> {
        let upstream_rows = closure_rows(upstream);
        let downstream_rows = closure_rows(downstream);

        Ok(vec![
            self.write_closures(&format!("{name}_upstream_lineage.json"), upstream)?,
            self.write_closures(&format!("{name}_downstream_lineage.json"), downstream)?,
            self.write_csv(&format!("{name}_upstream_lineage.csv"), UPSTREAM_HEADER, &upstream_rows, false)?,
            self.write_csv(&format!("{name}_downstream_lineage.csv"), DOWNSTREAM_HEADER, &downstream_rows, false)?,
            self.write_csv(&format!("{name}_upstream_lineage_depth.csv"), UPSTREAM_HEADER, &upstream_rows, true)?,
            self.write_csv(&format!("{name}_downstream_lineage_depth.csv"), DOWNSTREAM_HEADER, &downstream_rows, true)?,
        ])
    }

    /// Write a JSON document into the output directory
    pub fn write_json<T: Serialize + ?Sized>(&self, file_name: &str, value: &T) -> Result<PathBuf, ExportError> {
        let path = self.prepare(file_name)?;

        let json = if self.pretty_json {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
        .map_err(|e| ExportError::JsonError(path.display().to_string(), e.to_string()))?;

        std::fs::write(&path, json)
            .map_err(|e| ExportError::IoError(path.display().to_string(), e.to_string()))?;

        tracing::debug!(path = %path.display(), "wrote JSON");
        Ok(path)
    }

    /// Write nested closures as JSON; depth is bounded only by memory
    pub fn write_closures(&self, file_name: &str, lineage: &TargetLineage) -> Result<PathBuf, ExportError> {
        let path = self.prepare(file_name)?;

        let json = lineage
            .to_json(self.pretty_json)
            .map_err(|e| ExportError::JsonError(path.display().to_string(), e.to_string()))?;

        std::fs::write(&path, json)
            .map_err(|e| ExportError::IoError(path.display().to_string(), e.to_string()))?;

        tracing::debug!(path = %path.display(), "wrote closure JSON");
        Ok(path)
    }

    /// Write rows as CSV, with a trailing `Depth` column if requested
    pub fn write_csv(
        &self,
        file_name: &str,
        header: [&str; 4],
        rows: &[LineageRow],
        with_depth: bool,
    ) -> Result<PathBuf, ExportError> {
        let path = self.prepare(file_name)?;
        let csv_err = |e: csv::Error| ExportError::CsvError(path.display().to_string(), e.to_string());

        let mut writer = csv::Writer::from_path(&path).map_err(csv_err)?;

        let mut header_record = header.to_vec();
        if with_depth {
            header_record.push("Depth");
        }
        writer.write_record(&header_record).map_err(csv_err)?;

        for row in rows {
            let depth = row.depth.to_string();
            let mut record = vec![
                self.display_name(&row.model),
                row.column.as_str(),
                self.display_name(&row.related_model),
                row.related_column.as_str(),
            ];
            if with_depth {
                record.push(depth.as_str());
            }
            writer.write_record(&record).map_err(csv_err)?;
        }

        writer
            .flush()
            .map_err(|e| ExportError::IoError(path.display().to_string(), e.to_string()))?;

        tracing::debug!(path = %path.display(), rows = rows.len(), "wrote CSV");
        Ok(path)
    }

    fn display_name<'a>(&self, unique_id: &'a str) -> &'a str {
        if self.short_names {
            short_name(unique_id)
        } else {
            unique_id
        }
    }

    fn prepare(&self, file_name: &str) -> Result<PathBuf, ExportError> {
        std::fs::create_dir_all(&self.output_dir)
            .map_err(|e| ExportError::IoError(self.output_dir.display().to_string(), e.to_string()))?;
        Ok(self.output_dir.join(file_name))
    }
}

/// Export errors
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Failed to write {0}: {1}")]
    IoError(String, String),

    #[error("Failed to write CSV {0}: {1}")]
    CsvError(String, String),

    #[error("Failed to serialize JSON for {0}: {1}")]
    JsonError(String, String),
}
