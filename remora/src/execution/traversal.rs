//! Traversal strategies over the constraint graph.
//!
//! All three strategies share one contract: given the graph and the
//! bounds, produce the partial rules of the search space one at a time,
//! applying [next_node_test][crate::execution::validator::next_node_test]
//! before every extension. Within one strategy the order is
//! deterministic for the same graph and bounds. Depth-first and
//! breadth-first visit the same set of rules; best-first may omit rules
//! when its heuristic is not admissible.

pub mod best_first;
pub mod breadth_first;
pub mod depth_first;

use std::collections::BTreeSet;
use std::str::FromStr;

use crate::execution::config::ConfigError;
use crate::execution::heuristics::Heuristic;
use crate::execution::validator::{next_node_test, TraversalBounds};
use crate::graph::ConstraintGraph;
use crate::model::rule::{CandidateRule, NodeId};

pub use best_first::BestFirstTraversal;
pub use breadth_first::BreadthFirstTraversal;
pub use depth_first::DepthFirstTraversal;

/// The available traversal strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    /// Depth-first search; the default
    #[default]
    DepthFirst,
    /// Breadth-first search; yields short rules first
    BreadthFirst,
    /// Best-first search steered by a heuristic
    BestFirst,
}

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "dfs" | "depth-first" => Ok(Self::DepthFirst),
            "bfs" | "breadth-first" => Ok(Self::BreadthFirst),
            "astar" | "a-star" | "a_star" | "best-first" => Ok(Self::BestFirst),
            _ => Err(ConfigError::UnknownStrategy(name.to_owned())),
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::DepthFirst => write!(f, "dfs"),
            StrategyKind::BreadthFirst => write!(f, "bfs"),
            StrategyKind::BestFirst => write!(f, "astar"),
        }
    }
}

/// A stateful enumerator of candidate rules.
///
/// Implementations yield every partial rule of the search space exactly
/// once and return `None` when the space is exhausted. The caller
/// drives the enumeration and applies pruning, metric evaluation, and
/// cancellation between calls.
pub trait TraversalStrategy: std::fmt::Debug {
    /// Produce the next partial rule, or `None` when done.
    fn next_candidate(&mut self) -> Option<CandidateRule>;
}

impl StrategyKind {
    /// Instantiate the strategy over a graph. The heuristic and queue
    /// capacity are consulted by best-first only.
    pub fn instantiate<'a>(
        &self,
        graph: &'a ConstraintGraph,
        bounds: TraversalBounds,
        heuristic: Heuristic<'a>,
        queue_capacity: usize,
    ) -> Box<dyn TraversalStrategy + 'a> {
        match self {
            StrategyKind::DepthFirst => Box::new(DepthFirstTraversal::new(graph, bounds)),
            StrategyKind::BreadthFirst => Box::new(BreadthFirstTraversal::new(graph, bounds)),
            StrategyKind::BestFirst => Box::new(BestFirstTraversal::new(
                graph,
                bounds,
                heuristic,
                queue_capacity,
            )),
        }
    }
}

/// The admissible extensions of a partial rule: the graph successors of
/// every rule member that pass [next_node_test], deduplicated, in
/// ascending node order.
pub(crate) fn frontier_extensions(
    graph: &ConstraintGraph,
    rule: &CandidateRule,
    bounds: &TraversalBounds,
) -> Vec<NodeId> {
    let mut reachable: BTreeSet<NodeId> = BTreeSet::new();
    for &node in rule.nodes() {
        reachable.extend(graph.successors(node));
    }
    reachable
        .into_iter()
        .filter(|&next| next_node_test(graph, rule, next, bounds))
        .collect()
}
