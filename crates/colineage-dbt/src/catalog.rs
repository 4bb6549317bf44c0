//! dbt catalog.json parsing
//!
//! The catalog lists the columns actually materialized for each relation.
//! Only relations whose type is accepted by [`InferenceConfig`] contribute.

use colineage_core::InferenceConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// dbt catalog.json structure (subset of fields we care about)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Relations built from models, seeds and snapshots
    #[serde(default)]
    pub nodes: HashMap<String, CatalogNode>,

    /// Relations declared as sources
    #[serde(default)]
    pub sources: HashMap<String, CatalogNode>,
}

impl Catalog {
    /// Load catalog from file
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::IoError(path.display().to_string(), e.to_string()))?;

        Self::from_str(&contents)
    }

    /// Parse catalog from JSON string
    pub fn from_str(json: &str) -> Result<Self, CatalogError> {
        serde_json::from_str(json)
            .map_err(|e| CatalogError::ParseError(e.to_string()))
    }
}

/// A relation in the catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogNode {
    #[serde(default)]
    pub metadata: CatalogNodeMetadata,

    /// Columns keyed by name
    #[serde(default)]
    pub columns: HashMap<String, CatalogColumn>,
}

impl CatalogNode {
    /// Column names in materialized order
    ///
    /// Ordered by the catalog's `index`, then by name for ties or missing indexes.
    pub fn ordered_columns(&self) -> Vec<String> {
        let mut columns: Vec<(&String, &CatalogColumn)> = self.columns.iter().collect();
        columns.sort_by(|(a_key, a), (b_key, b)| {
            a.index
                .unwrap_or(usize::MAX)
                .cmp(&b.index.unwrap_or(usize::MAX))
                .then_with(|| a_key.cmp(b_key))
        });
        columns.into_iter().map(|(key, _)| key.clone()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogNodeMetadata {
    /// Relation type as reported by the warehouse (table, view, ...)
    #[serde(rename = "type", default)]
    pub relation_type: String,

    #[serde(default)]
    pub schema: Option<String>,

    #[serde(default)]
    pub name: Option<String>,
}

/// A column in a catalog relation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogColumn {
    #[serde(default)]
    pub name: String,

    /// Warehouse data type
    #[serde(rename = "type", default)]
    pub data_type: Option<String>,

    /// Ordinal position in the relation
    #[serde(default)]
    pub index: Option<usize>,
}

/// Columns known for each relation, restricted to table/view entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnCatalog {
    entries: BTreeMap<String, Vec<String>>,
}

impl ColumnCatalog {
    /// Build the column listing from a parsed catalog
    pub fn from_catalog(catalog: &Catalog, config: &InferenceConfig) -> Self {
        let mut relations: Vec<(&String, &CatalogNode)> = catalog.nodes.iter().collect();
        if config.include_sources {
            relations.extend(catalog.sources.iter());
        }

        let mut entries = BTreeMap::new();
        for (unique_id, node) in relations {
            if !config.is_relation(&node.metadata.relation_type) {
                tracing::debug!(
                    relation = %unique_id,
                    relation_type = %node.metadata.relation_type,
                    "ignoring catalog entry"
                );
                continue;
            }
            entries.insert(unique_id.clone(), node.ordered_columns());
        }

        Self { entries }
    }

    /// Insert a relation's columns directly
    pub fn insert(&mut self, unique_id: impl Into<String>, columns: Vec<String>) {
        self.entries.insert(unique_id.into(), columns);
    }

    /// Columns of a relation, if it is known
    pub fn columns(&self, unique_id: &str) -> Option<&[String]> {
        self.entries.get(unique_id).map(Vec::as_slice)
    }

    pub fn contains(&self, unique_id: &str) -> bool {
        self.entries.contains_key(unique_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Vec<String>)> for ColumnCatalog {
    fn from_iter<I: IntoIterator<Item = (K, Vec<String>)>>(iter: I) -> Self {
        let mut catalog = Self::default();
        for (unique_id, columns) in iter {
            catalog.insert(unique_id, columns);
        }
        catalog
    }
}

/// Catalog parsing errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse catalog JSON: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CATALOG: &str = r#"{
        "metadata": {"dbt_version": "1.7.0"},
        "nodes": {
            "model.shop.orders": {
                "metadata": {"type": "BASE TABLE", "schema": "analytics", "name": "orders"},
                "columns": {
                    "customer_id": {"type": "integer", "index": 2, "name": "customer_id"},
                    "order_id": {"type": "integer", "index": 1, "name": "order_id"}
                }
            },
            "model.shop.order_summary": {
                "metadata": {"type": "view"},
                "columns": {
                    "total": {"type": "numeric", "index": 2, "name": "total"},
                    "order_id": {"type": "integer", "index": 1, "name": "order_id"}
                }
            },
            "model.shop.stage": {
                "metadata": {"type": "table"},
                "columns": {}
            }
        },
        "sources": {
            "source.shop.raw.orders": {
                "metadata": {"type": "table"},
                "columns": {"id": {"index": 1, "name": "id"}}
            }
        },
        "errors": null
    }"#;

    #[test]
    fn columns_follow_catalog_index() {
        let catalog = Catalog::from_str(CATALOG).unwrap();
        let node = &catalog.nodes["model.shop.order_summary"];
        assert_eq!(node.ordered_columns(), vec!["order_id", "total"]);
    }

    #[test]
    fn only_tables_and_views_contribute() {
        let catalog = Catalog::from_str(CATALOG).unwrap();
        let columns = ColumnCatalog::from_catalog(&catalog, &InferenceConfig::default());

        assert!(!columns.contains("model.shop.orders"));
        assert_eq!(
            columns.columns("model.shop.order_summary"),
            Some(&["order_id".to_string(), "total".to_string()][..])
        );
        // An empty column list is still a known relation
        assert_eq!(columns.columns("model.shop.stage"), Some(&[][..]));
    }

    #[test]
    fn sources_are_opt_in() {
        let catalog = Catalog::from_str(CATALOG).unwrap();

        let default = ColumnCatalog::from_catalog(&catalog, &InferenceConfig::default());
        assert!(!default.contains("source.shop.raw.orders"));

        let config = InferenceConfig {
            include_sources: true,
            ..InferenceConfig::default()
        };
        let with_sources = ColumnCatalog::from_catalog(&catalog, &config);
        assert_eq!(with_sources.columns("source.shop.raw.orders"), Some(&["id".to_string()][..]));
    }

    #[test]
    fn missing_index_sorts_last_by_name() {
        let node: CatalogNode = serde_json::from_str(
            r#"{"metadata": {"type": "table"},
                "columns": {"b": {}, "a": {}, "z": {"index": 1}}}"#,
        )
        .unwrap();

        assert_eq!(node.ordered_columns(), vec!["z", "a", "b"]);
    }

    #[test]
    fn malformed_catalog_is_parse_error() {
        let err = Catalog::from_str("not json").unwrap_err();
        assert!(matches!(err, CatalogError::ParseError(_)));
    }
}
