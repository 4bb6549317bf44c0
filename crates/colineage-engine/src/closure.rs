//! Transitive lineage closures
//!
//! A closure is rooted at one `(model, column)` and nests
//! `related_model -> related_column -> closure` in one direction. Each root
//! carries its own visited set: the first time a pair is reached it is
//! expanded, every later occurrence within the same root is kept as an empty
//! leaf. This terminates on cyclic graphs.
//!
//! The walk uses an explicit stack so chain length is not limited by the
//! call stack. Expansion order is the same as a depth-first recursion that
//! visits related pairs in graph order.

use crate::lineage::{ColumnLineageGraph, DownstreamIndex};
use serde::Serialize;
use std::collections::{btree_map, BTreeMap, HashSet};

/// `(model, column)` key
pub type ColumnKey = (String, String);

/// Walk direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Upstream,
    Downstream,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upstream => "upstream",
            Self::Downstream => "downstream",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Nested closure: `related_model -> related_column -> closure`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LineageClosure {
    related: BTreeMap<String, BTreeMap<String, LineageClosure>>,
}

impl LineageClosure {
    pub fn is_empty(&self) -> bool {
        self.related.is_empty()
    }

    /// Sub-closure of a related pair, if it is directly related
    pub fn get(&self, model: &str, column: &str) -> Option<&LineageClosure> {
        self.related.get(model)?.get(column)
    }

    /// Directly related pairs with their sub-closures
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &LineageClosure)> {
        self.related.iter().flat_map(|(model, columns)| {
            columns
                .iter()
                .map(move |(column, closure)| (model.as_str(), column.as_str(), closure))
        })
    }

    /// Whether `(model, column)` appears anywhere in the closure
    pub fn reaches(&self, model: &str, column: &str) -> bool {
        let mut stack = vec![self];
        while let Some(closure) = stack.pop() {
            for (related_model, related_column, sub) in closure.iter() {
                if related_model == model && related_column == column {
                    return true;
                }
                stack.push(sub);
            }
        }
        false
    }

    /// Number of nodes in the closure tree
    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(closure) = stack.pop() {
            for (_, _, sub) in closure.iter() {
                count += 1;
                stack.push(sub);
            }
        }
        count
    }

    fn insert(&mut self, model: String, column: String, closure: LineageClosure) {
        self.related
            .entry(model)
            .or_default()
            .entry(column)
            .or_insert(closure);
    }
}

// Deep chains produce deep trees; dropping them recursively would overflow.
impl Drop for LineageClosure {
    fn drop(&mut self) {
        fn detach(closure: &mut LineageClosure, pending: &mut Vec<LineageClosure>) {
            for (_, columns) in std::mem::take(&mut closure.related) {
                pending.extend(columns.into_values());
            }
        }

        let mut pending = Vec::new();
        detach(self, &mut pending);
        while let Some(mut closure) = pending.pop() {
            detach(&mut closure, &mut pending);
        }
    }
}

/// Closures for the columns of one or more root models:
/// `model -> column -> closure`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TargetLineage {
    models: BTreeMap<String, BTreeMap<String, LineageClosure>>,
}

impl TargetLineage {
    pub fn insert(&mut self, model: &str, column: &str, closure: LineageClosure) {
        self.models
            .entry(model.to_string())
            .or_default()
            .insert(column.to_string(), closure);
    }

    /// Register a root model even when it ends up with no columns
    pub fn insert_model(&mut self, model: &str) {
        self.models.entry(model.to_string()).or_default();
    }

    pub fn get(&self, model: &str, column: &str) -> Option<&LineageClosure> {
        self.models.get(model)?.get(column)
    }

    /// Root columns with their closures, in model then column order
    pub fn roots(&self) -> impl Iterator<Item = (&str, &str, &LineageClosure)> {
        self.models.iter().flat_map(|(model, columns)| {
            columns
                .iter()
                .map(move |(column, closure)| (model.as_str(), column.as_str(), closure))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Render as a JSON object without recursing per nesting level
    ///
    /// Output is identical to `serde_json::to_string` (or `to_string_pretty`
    /// when `pretty` is set).
    pub fn to_json(&self, pretty: bool) -> Result<String, serde_json::Error> {
        nested_json(&self.models, pretty)
    }
}

type Nested = BTreeMap<String, BTreeMap<String, LineageClosure>>;

enum Level<'a> {
    Models(btree_map::Iter<'a, String, BTreeMap<String, LineageClosure>>),
    Columns(btree_map::Iter<'a, String, LineageClosure>),
}

enum Object<'a> {
    Models(&'a Nested),
    Columns(&'a BTreeMap<String, LineageClosure>),
}

fn nested_json(root: &Nested, pretty: bool) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    let mut stack: Vec<(Level<'_>, bool)> = Vec::new();
    open_object(&mut out, &mut stack, Object::Models(root));

    loop {
        let depth = stack.len();
        let Some((level, first)) = stack.last_mut() else {
            break;
        };

        let entry = match level {
            Level::Models(iter) => iter.next().map(|(key, columns)| (key, Object::Columns(columns))),
            Level::Columns(iter) => iter.next().map(|(key, closure)| (key, Object::Models(&closure.related))),
        };

        match entry {
            Some((key, object)) => {
                if !*first {
                    out.push(',');
                }
                *first = false;
                indent(&mut out, depth, pretty);
                out.push_str(&serde_json::to_string(key)?);
                out.push_str(if pretty { ": " } else { ":" });
                open_object(&mut out, &mut stack, object);
            }
            None => {
                stack.pop();
                indent(&mut out, depth - 1, pretty);
                out.push('}');
            }
        }
    }

    Ok(out)
}

fn open_object<'a>(out: &mut String, stack: &mut Vec<(Level<'a>, bool)>, object: Object<'a>) {
    let (empty, level) = match object {
        Object::Models(map) => (map.is_empty(), Level::Models(map.iter())),
        Object::Columns(map) => (map.is_empty(), Level::Columns(map.iter())),
    };
    if empty {
        out.push_str("{}");
    } else {
        out.push('{');
        stack.push((level, true));
    }
}

fn indent(out: &mut String, depth: usize, pretty: bool) {
    if pretty {
        out.push('\n');
        for _ in 0..depth {
            out.push_str("  ");
        }
    }
}

/// Resolves closures over a lineage graph
///
/// Downstream lookups go through the inverted index, built once here, rather
/// than rescanning the graph at every step; the related pairs and their order
/// are the same as a scan in graph order.
#[derive(Debug)]
pub struct ClosureResolver<'g> {
    graph: &'g ColumnLineageGraph,
    downstream: DownstreamIndex,
}

struct Frame {
    node: usize,
    related: Vec<ColumnKey>,
    next: usize,
}

struct TreeNode {
    key: ColumnKey,
    children: Vec<usize>,
}

impl<'g> ClosureResolver<'g> {
    pub fn new(graph: &'g ColumnLineageGraph) -> Self {
        Self {
            graph,
            downstream: graph.invert(),
        }
    }

    /// Directly related pairs of `(model, column)` in graph order
    pub fn related(&self, direction: Direction, model: &str, column: &str) -> Vec<ColumnKey> {
        match direction {
            Direction::Upstream => self
                .graph
                .upstream_of(model, column)
                .map(|upstreams| {
                    upstreams
                        .iter()
                        .flat_map(|(upstream_model, cols)| {
                            cols.iter().map(move |col| (upstream_model.clone(), col.clone()))
                        })
                        .collect()
                })
                .unwrap_or_default(),
            Direction::Downstream => self.downstream.downstream_of(model, column).to_vec(),
        }
    }

    /// Closure rooted at `(model, column)` with a fresh visited set
    pub fn resolve(&self, direction: Direction, model: &str, column: &str) -> LineageClosure {
        let root: ColumnKey = (model.to_string(), column.to_string());

        let mut visited: HashSet<ColumnKey> = HashSet::new();
        visited.insert(root.clone());

        let mut tree = vec![TreeNode { key: root, children: Vec::new() }];
        let mut stack = vec![Frame {
            node: 0,
            related: self.related(direction, model, column),
            next: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let Some(key) = frame.related.get(frame.next).cloned() else {
                stack.pop();
                continue;
            };
            frame.next += 1;
            let parent = frame.node;

            let node = tree.len();
            tree[parent].children.push(node);

            if visited.insert(key.clone()) {
                let related = self.related(direction, &key.0, &key.1);
                stack.push(Frame { node, related, next: 0 });
            }
            tree.push(TreeNode { key, children: Vec::new() });
        }

        assemble(tree)
    }

    /// Closures for every given column of `model`, each with its own visited set
    pub fn resolve_model(&self, direction: Direction, model: &str, columns: &[String], into: &mut TargetLineage) {
        into.insert_model(model);
        for column in columns {
            tracing::debug!(%direction, model, column = %column, "resolving closure");
            into.insert(model, column, self.resolve(direction, model, column));
        }
    }
}

/// Fold the arena bottom-up into nested closures
///
/// Children always have larger indexes than their parent.
fn assemble(tree: Vec<TreeNode>) -> LineageClosure {
    let mut closures: Vec<Option<LineageClosure>> = Vec::with_capacity(tree.len());
    closures.resize_with(tree.len(), || None);

    let mut keys: Vec<Option<ColumnKey>> = Vec::with_capacity(tree.len());
    let mut children = Vec::with_capacity(tree.len());
    for node in tree {
        keys.push(Some(node.key));
        children.push(node.children);
    }

    for index in (0..children.len()).rev() {
        let mut closure = LineageClosure::default();
        for &child in &children[index] {
            if let (Some((model, column)), Some(sub)) = (keys[child].take(), closures[child].take()) {
                closure.insert(model, column, sub);
            }
        }
        closures[index] = Some(closure);
    }

    closures
        .into_iter()
        .next()
        .flatten()
        .unwrap_or_default()
}
