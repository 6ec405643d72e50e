//! The constraint graph.
//!
//! Nodes are [joined indexed attributes][JoinedAttributes]; a directed
//! edge `J → J'` means that `J'` is a legal next node to append after
//! `J` in some candidate rule. The graph is finite, built once per
//! discovery run from the compatibility relation, and read-only
//! afterwards. Internally it wraps a petgraph [DiGraph] and keeps the
//! node list in canonical order, so node ids are stable and traversal
//! is deterministic.

use std::collections::HashMap;
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use crate::analysis::compatibility::CompatibilityMatrix;
use crate::model::attribute::{AttributeCatalog, AttributeId};
use crate::model::indexed::{occurrences_consecutive, IndexedAttribute, JoinedAttributes};
use crate::model::rule::NodeId;

/// Bounds consulted while building the graph.
#[derive(Debug, Clone, Default)]
pub struct GraphSettings {
    /// Maximum number of occurrences of one table in a rule
    pub max_occurrence: usize,
    /// Maximum number of table occurrences in a rule
    pub max_tables: usize,
    /// Per-attribute occurrence caps overriding `max_occurrence`
    pub occurrence_caps: HashMap<AttributeId, usize>,
}

impl GraphSettings {
    fn occurrence_limit(&self, attribute: AttributeId) -> usize {
        self.occurrence_caps
            .get(&attribute)
            .copied()
            .unwrap_or(self.max_occurrence)
            .min(self.max_occurrence)
    }
}

/// Counts describing a built constraint graph.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GraphMetrics {
    /// Number of nodes
    pub nodes: usize,
    /// Number of directed edges
    pub edges: usize,
    /// Number of root nodes
    pub roots: usize,
}

impl fmt::Display for GraphMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConstraintGraph(nodes: {}, edges: {}, roots: {})",
            self.nodes, self.edges, self.roots
        )
    }
}

/// Enumerate the node universe: one join node per canonical pair of
/// compatible positions, one free node per position.
///
/// Join nodes instantiate the compatibility relation at every
/// combination of occurrence indices within the caps; an attribute
/// compatible with itself yields self-join nodes across two distinct
/// occurrences of its table. Free nodes carry the positions a rule may
/// bind without a join constraint; attributes without any value are
/// skipped entirely. The returned list is sorted and duplicate-free.
pub fn enumerate_nodes(
    catalog: &AttributeCatalog,
    compatibility: &CompatibilityMatrix,
    settings: &GraphSettings,
) -> Vec<JoinedAttributes> {
    let mut nodes = Vec::new();

    for first in catalog.attribute_ids() {
        if catalog.attribute(first).distinct_values == 0 {
            continue;
        }
        let first_table = catalog.attribute(first).table;
        let first_limit = settings.occurrence_limit(first);

        for occurrence in 0..first_limit {
            nodes.push(JoinedAttributes::free(IndexedAttribute::new(
                first_table,
                occurrence,
                first,
            )));
        }

        for second in compatibility.neighbors(first).filter(|&second| second >= first) {
            let second_table = catalog.attribute(second).table;
            let second_limit = settings.occurrence_limit(second);

            for first_occurrence in 0..first_limit {
                for second_occurrence in 0..second_limit {
                    let left = IndexedAttribute::new(first_table, first_occurrence, first);
                    let right = IndexedAttribute::new(second_table, second_occurrence, second);
                    if left == right {
                        continue;
                    }
                    nodes.push(JoinedAttributes::pair(left, right));
                }
            }
        }
    }

    nodes.sort();
    nodes.dedup();
    nodes
}

/// The built constraint graph.
#[derive(Debug)]
pub struct ConstraintGraph {
    nodes: Vec<JoinedAttributes>,
    graph: DiGraph<NodeId, ()>,
    indices: Vec<NodeIndex>,
    roots: Vec<NodeId>,
}

impl ConstraintGraph {
    /// Build the graph over the given node universe: mark the roots and
    /// insert every legal extension edge.
    ///
    /// An edge `J → J'` is inserted when the two nodes chain through a
    /// shared table occurrence, assert disjoint position sets, and
    /// their combined table occurrences stay gapless and within
    /// `max_tables`. A node is a root when it joins two distinct
    /// attributes and is itself a valid one-node rule (its occurrence
    /// indices start at zero and have no gaps).
    pub fn from_nodes(nodes: Vec<JoinedAttributes>, max_tables: usize) -> Self {
        let mut graph = DiGraph::with_capacity(nodes.len(), 0);
        let indices: Vec<NodeIndex> = (0..nodes.len()).map(|id| graph.add_node(id)).collect();

        // roots must unify two distinct attributes; a same-column
        // self-join never starts a rule
        let roots: Vec<NodeId> = nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| {
                node.is_join()
                    && node.has_distinct_attributes()
                    && occurrences_consecutive(node.table_occurrences(), true)
            })
            .map(|(id, _)| id)
            .collect();

        for (source_id, source) in nodes.iter().enumerate() {
            for (target_id, target) in nodes.iter().enumerate() {
                if source_id != target_id && Self::extension_allowed(source, target, max_tables) {
                    graph.add_edge(indices[source_id], indices[target_id], ());
                }
            }
        }

        if roots.is_empty() {
            log::info!("constraint graph has no roots; discovery will yield no candidates");
        }

        Self {
            nodes,
            graph,
            indices,
            roots,
        }
    }

    fn extension_allowed(
        source: &JoinedAttributes,
        target: &JoinedAttributes,
        max_tables: usize,
    ) -> bool {
        if !source.shares_occurrence(target) || source.shares_member(target) {
            return false;
        }

        let union: Vec<_> = source
            .table_occurrences()
            .into_iter()
            .chain(target.table_occurrences())
            .collect();
        let mut distinct = union.clone();
        distinct.sort();
        distinct.dedup();

        distinct.len() <= max_tables && occurrences_consecutive(union, false)
    }

    /// The node behind an id.
    pub fn node(&self, id: NodeId) -> &JoinedAttributes {
        &self.nodes[id]
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// All node ids, in canonical order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        0..self.nodes.len()
    }

    /// The root node ids, in canonical order. Traversal starts here.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Whether the node may start a rule.
    pub fn is_root(&self, id: NodeId) -> bool {
        self.roots.binary_search(&id).is_ok()
    }

    /// The ids a rule may extend to after the given node, ascending.
    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        let mut successors: Vec<NodeId> = self
            .graph
            .neighbors(self.indices[id])
            .map(|neighbor| self.graph[neighbor])
            .collect();
        successors.sort_unstable();
        successors
    }

    /// Whether the graph holds an edge from `source` to `target`.
    pub fn has_edge(&self, source: NodeId, target: NodeId) -> bool {
        self.graph
            .contains_edge(self.indices[source], self.indices[target])
    }

    /// The size counts of the graph.
    pub fn metrics(&self) -> GraphMetrics {
        GraphMetrics {
            nodes: self.graph.node_count(),
            edges: self.graph.edge_count(),
            roots: self.roots.len(),
        }
    }
}
