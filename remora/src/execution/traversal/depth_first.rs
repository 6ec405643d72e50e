//! Depth-first traversal.

use crate::execution::traversal::{frontier_extensions, TraversalStrategy};
use crate::execution::validator::TraversalBounds;
use crate::graph::ConstraintGraph;
use crate::model::rule::{CandidateRule, NodeId};

/// One entry of the depth-first stack: a partial rule together with the
/// iterator position over its admissible extensions.
#[derive(Debug)]
struct Frame {
    rule: CandidateRule,
    extensions: Vec<NodeId>,
    next: usize,
}

/// Depth-first enumeration of the search space.
///
/// Explores as far as possible along each branch before backtracking;
/// the stack never grows beyond `max_vars` frames, so memory stays
/// proportional to the rule bounds rather than to the search space.
#[derive(Debug)]
pub struct DepthFirstTraversal<'a> {
    graph: &'a ConstraintGraph,
    bounds: TraversalBounds,
    roots: std::vec::IntoIter<NodeId>,
    stack: Vec<Frame>,
}

impl<'a> DepthFirstTraversal<'a> {
    /// Create the traversal over all roots of the graph.
    pub fn new(graph: &'a ConstraintGraph, bounds: TraversalBounds) -> Self {
        Self {
            graph,
            bounds,
            roots: graph.roots().to_vec().into_iter(),
            stack: Vec::new(),
        }
    }

    fn push(&mut self, rule: CandidateRule) -> CandidateRule {
        let extensions = frontier_extensions(self.graph, &rule, &self.bounds);
        self.stack.push(Frame {
            rule: rule.clone(),
            extensions,
            next: 0,
        });
        rule
    }
}

impl TraversalStrategy for DepthFirstTraversal<'_> {
    fn next_candidate(&mut self) -> Option<CandidateRule> {
        loop {
            if let Some(frame) = self.stack.last_mut() {
                if frame.next < frame.extensions.len() {
                    let node = frame.extensions[frame.next];
                    frame.next += 1;
                    let rule = frame.rule.extended(node);
                    return Some(self.push(rule));
                }
                self.stack.pop();
                continue;
            }

            let root = self.roots.next()?;
            return Some(self.push(CandidateRule::root(root)));
        }
    }
}
