//! Breadth-first traversal.

use std::collections::VecDeque;

use crate::execution::traversal::{frontier_extensions, TraversalStrategy};
use crate::execution::validator::TraversalBounds;
use crate::graph::ConstraintGraph;
use crate::model::rule::CandidateRule;

/// Breadth-first enumeration of the search space.
///
/// Expands one full level of the search space before moving to the
/// next, so shorter rules are always produced first. Memory grows with
/// the width of a level; prefer depth-first when the level width is a
/// concern.
#[derive(Debug)]
pub struct BreadthFirstTraversal<'a> {
    graph: &'a ConstraintGraph,
    bounds: TraversalBounds,
    queue: VecDeque<CandidateRule>,
}

impl<'a> BreadthFirstTraversal<'a> {
    /// Create the traversal over all roots of the graph.
    pub fn new(graph: &'a ConstraintGraph, bounds: TraversalBounds) -> Self {
        Self {
            graph,
            bounds,
            queue: graph.roots().iter().map(|&root| CandidateRule::root(root)).collect(),
        }
    }
}

impl TraversalStrategy for BreadthFirstTraversal<'_> {
    fn next_candidate(&mut self) -> Option<CandidateRule> {
        let rule = self.queue.pop_front()?;
        for node in frontier_extensions(self.graph, &rule, &self.bounds) {
            self.queue.push_back(rule.extended(node));
        }
        Some(rule)
    }
}
