//! Model graph construction
//!
//! Flattens the manifest into the nodes lineage inference needs: resource
//! kind, compiled SQL and declared upstream dependencies.

use std::collections::BTreeMap;
use crate::manifest::Manifest;

/// Node identifier (unique_id from manifest)
pub type NodeId = String;

/// Last dot-separated segment of a unique_id ("model.shop.orders" -> "orders")
pub fn short_name(unique_id: &str) -> &str {
    unique_id.rsplit('.').next().unwrap_or(unique_id)
}

/// Resource kind of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    Model,
    Source,
    Other,
}

impl ModelKind {
    fn from_resource_type(resource_type: &str) -> Self {
        match resource_type {
            "model" => Self::Model,
            "source" => Self::Source,
            _ => Self::Other,
        }
    }
}

/// A node of the model graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelNode {
    /// Unique identifier (e.g., "model.my_project.users")
    pub unique_id: NodeId,

    pub kind: ModelKind,

    /// Raw resource type from the manifest (model, seed, snapshot, ...)
    pub resource_type: String,

    /// Compiled SQL, empty when the node was never compiled
    pub compiled_sql: String,

    /// Upstream unique_ids in declaration order
    pub depends_on: Vec<NodeId>,
}

impl ModelNode {
    pub fn new(unique_id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        let resource_type = resource_type.into();
        Self {
            unique_id: unique_id.into(),
            kind: ModelKind::from_resource_type(&resource_type),
            resource_type,
            compiled_sql: String::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.compiled_sql = sql.into();
        self
    }

    pub fn with_dependencies<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Model name without project/schema prefixes
    pub fn name(&self) -> &str {
        short_name(&self.unique_id)
    }
}

/// Read-only model graph, ordered by unique_id
#[derive(Debug, Clone, Default)]
pub struct ModelGraph {
    nodes: BTreeMap<NodeId, ModelNode>,
}

impl ModelGraph {
    /// Build a model graph from a manifest
    ///
    /// Every manifest node is kept with its kind; manifest sources are added
    /// as `Source` nodes without SQL or dependencies.
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let mut nodes = BTreeMap::new();

        for (node_id, node) in &manifest.nodes {
            let model = ModelNode::new(node_id.clone(), node.resource_type.clone())
                .with_sql(node.compiled_text())
                .with_dependencies(node.depends_on.nodes.iter().cloned());
            nodes.insert(node_id.clone(), model);
        }

        for (source_id, source) in &manifest.sources {
            nodes
                .entry(source_id.clone())
                .or_insert_with(|| ModelNode::new(source_id.clone(), source.resource_type.clone()));
        }

        tracing::debug!(nodes = nodes.len(), "built model graph");

        Self { nodes }
    }

    /// Add or replace a node
    pub fn insert(&mut self, node: ModelNode) {
        self.nodes.insert(node.unique_id.clone(), node);
    }

    pub fn get(&self, unique_id: &str) -> Option<&ModelNode> {
        self.nodes.get(unique_id)
    }

    /// All nodes in unique_id order
    pub fn nodes(&self) -> impl Iterator<Item = &ModelNode> {
        self.nodes.values()
    }

    /// Immediate parents (dependencies) of a node
    pub fn parents(&self, unique_id: &str) -> &[NodeId] {
        self.nodes
            .get(unique_id)
            .map(|node| node.depends_on.as_slice())
            .unwrap_or_default()
    }

    /// Find a node by model name or full unique_id
    ///
    /// A full unique_id matches any node. Otherwise the first non-source node
    /// in unique_id order whose last segment equals `name`; manifest sources
    /// are only reachable by unique_id.
    pub fn find_by_name(&self, name: &str) -> Option<&ModelNode> {
        if let Some(node) = self.nodes.get(name) {
            return Some(node);
        }

        self.nodes
            .values()
            .find(|node| node.kind != ModelKind::Source && node.name() == name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl FromIterator<ModelNode> for ModelGraph {
    fn from_iter<I: IntoIterator<Item = ModelNode>>(iter: I) -> Self {
        let mut graph = Self::default();
        for node in iter {
            graph.insert(node);
        }
        graph
    }
}
