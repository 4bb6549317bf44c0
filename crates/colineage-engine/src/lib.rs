//! Colineage engine - column lineage inference and traversal
//!
//! This crate implements:
//! - Edge inference from compiled SQL and catalog columns
//! - The one-hop column lineage graph and its inverse
//! - Cycle-safe upstream/downstream closures rooted at a model's columns
//! - Flattening and export of graphs and closures to JSON and CSV

pub mod lineage;
pub mod inference;
pub mod closure;
pub mod export;
pub mod pipeline;

pub use lineage::{ColumnLineageGraph, DownstreamIndex, Edge};
pub use inference::{ColumnPatterns, EdgeInference, InferenceError, InferenceOutcome};
pub use closure::{ClosureResolver, ColumnKey, Direction, LineageClosure, TargetLineage};
pub use export::{ExportError, Exporter, LineageRow};
pub use pipeline::{FlatLineage, TargetedLineage, run_all_models, run_flat, run_targeted, ALL_MODELS};
