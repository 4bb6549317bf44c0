//! dbt artifact loading
//!
//! This crate handles:
//! - Parsing manifest.json (models, sources, dependencies, compiled SQL)
//! - Parsing catalog.json (materialized columns per relation)
//! - Building the in-memory model graph and column catalog used for lineage

pub mod manifest;
pub mod catalog;
pub mod graph;

pub use manifest::{Manifest, ManifestNode, ManifestSource, DependsOn, ManifestMetadata, ManifestError};
pub use catalog::{Catalog, CatalogNode, CatalogColumn, CatalogError, ColumnCatalog};
pub use graph::{ModelGraph, ModelNode, ModelKind, NodeId, short_name};
