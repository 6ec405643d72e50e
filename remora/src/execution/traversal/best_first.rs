//! Best-first traversal.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::execution::heuristics::Heuristic;
use crate::execution::traversal::{frontier_extensions, TraversalStrategy};
use crate::execution::validator::TraversalBounds;
use crate::graph::ConstraintGraph;
use crate::model::rule::CandidateRule;

/// A queue entry: the rule with its `f = g + h` score and an insertion
/// sequence number breaking ties first-in-first-out.
#[derive(Debug)]
struct Prioritized {
    score: f64,
    sequence: u64,
    rule: CandidateRule,
}

impl PartialEq for Prioritized {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Prioritized {}

impl PartialOrd for Prioritized {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Prioritized {
    // reversed so that the max-heap pops the lowest score, and among
    // equal scores the earliest insertion
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Best-first enumeration of the search space, keyed by
/// `f(rule) = g(rule) + h(rule)` with `g` the accumulated path cost
/// (one per node) and `h` the heuristic score.
///
/// Not guaranteed complete when the heuristic is not admissible. When
/// the priority queue outgrows its capacity the traversal downgrades to
/// depth-first over the remaining frontier and logs a warning.
#[derive(Debug)]
pub struct BestFirstTraversal<'a> {
    graph: &'a ConstraintGraph,
    bounds: TraversalBounds,
    heuristic: Heuristic<'a>,
    capacity: usize,
    queue: BinaryHeap<Prioritized>,
    fallback: Vec<CandidateRule>,
    downgraded: bool,
    sequence: u64,
}

impl<'a> BestFirstTraversal<'a> {
    /// Create the traversal over all roots of the graph.
    pub fn new(
        graph: &'a ConstraintGraph,
        bounds: TraversalBounds,
        heuristic: Heuristic<'a>,
        capacity: usize,
    ) -> Self {
        let mut traversal = Self {
            graph,
            bounds,
            heuristic,
            capacity,
            queue: BinaryHeap::new(),
            fallback: Vec::new(),
            downgraded: false,
            sequence: 0,
        };
        for &root in graph.roots() {
            let rule = CandidateRule::root(root);
            traversal.enqueue(rule);
        }
        traversal
    }

    fn score(&self, rule: &CandidateRule) -> f64 {
        rule.len() as f64 + self.heuristic.cost(self.graph, rule)
    }

    fn enqueue(&mut self, rule: CandidateRule) {
        let entry = Prioritized {
            score: self.score(&rule),
            sequence: self.sequence,
            rule,
        };
        self.sequence += 1;
        self.queue.push(entry);
    }

    fn downgrade(&mut self) {
        log::warn!(
            "best-first queue exceeded its capacity of {}; downgrading to depth-first",
            self.capacity
        );
        let mut drained: Vec<Prioritized> = std::mem::take(&mut self.queue).into_vec();
        // the vector is popped from the back: order worst-first
        drained.sort_by(|a, b| a.cmp(b));
        self.fallback = drained.into_iter().map(|entry| entry.rule).collect();
        self.downgraded = true;
    }
}

impl TraversalStrategy for BestFirstTraversal<'_> {
    fn next_candidate(&mut self) -> Option<CandidateRule> {
        if self.downgraded {
            let rule = self.fallback.pop()?;
            let mut extensions = frontier_extensions(self.graph, &rule, &self.bounds);
            extensions.reverse();
            for node in extensions {
                self.fallback.push(rule.extended(node));
            }
            return Some(rule);
        }

        let rule = self.queue.pop()?.rule;
        for node in frontier_extensions(self.graph, &rule, &self.bounds) {
            self.enqueue(rule.extended(node));
        }
        if self.queue.len() > self.capacity {
            self.downgrade();
        }
        Some(rule)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::analysis::compatibility::{CompatibilityMatrix, CompatibilitySettings, EvidenceMode};
    use crate::execution::config::HybridWeights;
    use crate::execution::heuristics::HeuristicKind;
    use crate::execution::traversal::DepthFirstTraversal;
    use crate::graph::{enumerate_nodes, GraphSettings};
    use crate::inspector::memory::MemoryDatabase;
    use crate::model::attribute::AttributeCatalog;

    fn fixture() -> (AttributeCatalog, ConstraintGraph) {
        let mut database = MemoryDatabase::new("social");
        database.add_table(
            "knows",
            vec!["a", "b"],
            vec![
                vec!["1", "2"],
                vec!["2", "3"],
                vec!["3", "4"],
                vec!["4", "1"],
            ],
        );
        let catalog = AttributeCatalog::from_inspector(&database).unwrap();
        let compatibility = CompatibilityMatrix::analyze(
            &database,
            &catalog,
            &CompatibilitySettings {
                mode: EvidenceMode::Hybrid,
                tau_overlap: 0.5,
                overlap_floor: 3,
            },
        );
        let nodes = enumerate_nodes(
            &catalog,
            &compatibility,
            &GraphSettings {
                max_occurrence: 2,
                max_tables: 2,
                occurrence_caps: Default::default(),
            },
        );
        let graph = ConstraintGraph::from_nodes(nodes, 2);
        (catalog, graph)
    }

    fn bounds() -> TraversalBounds {
        TraversalBounds {
            max_vars: 3,
            max_tables: 2,
        }
    }

    #[test]
    fn naive_heuristic_visits_everything_depth_first_does() {
        let (catalog, graph) = fixture();

        let mut best: Vec<CandidateRule> = Vec::new();
        let heuristic = Heuristic::new(HeuristicKind::Naive, HybridWeights::default(), &catalog);
        let mut traversal = BestFirstTraversal::new(&graph, bounds(), heuristic, 1 << 20);
        while let Some(rule) = traversal.next_candidate() {
            best.push(rule);
        }

        let mut depth: Vec<CandidateRule> = Vec::new();
        let mut traversal = DepthFirstTraversal::new(&graph, bounds());
        while let Some(rule) = traversal.next_candidate() {
            depth.push(rule);
        }

        best.sort_by(|a, b| a.nodes().cmp(b.nodes()));
        depth.sort_by(|a, b| a.nodes().cmp(b.nodes()));
        assert_eq!(best, depth);
    }

    #[test]
    fn ties_break_first_in_first_out() {
        let (catalog, graph) = fixture();
        let heuristic = Heuristic::new(HeuristicKind::Naive, HybridWeights::default(), &catalog);
        let mut traversal = BestFirstTraversal::new(&graph, bounds(), heuristic, 1 << 20);

        // all roots score equally under the naive heuristic, so they
        // must come out in insertion order
        let mut seen_roots = Vec::new();
        while let Some(rule) = traversal.next_candidate() {
            if rule.len() == 1 {
                seen_roots.push(rule.nodes()[0]);
            }
        }
        assert_eq!(seen_roots, graph.roots().to_vec());
    }

    #[test]
    fn capacity_overflow_downgrades_but_stays_complete() {
        let (catalog, graph) = fixture();

        let mut constrained: Vec<CandidateRule> = Vec::new();
        let heuristic = Heuristic::new(HeuristicKind::Naive, HybridWeights::default(), &catalog);
        let mut traversal = BestFirstTraversal::new(&graph, bounds(), heuristic, 2);
        while let Some(rule) = traversal.next_candidate() {
            constrained.push(rule);
        }
        assert!(traversal.downgraded);

        let mut depth: Vec<CandidateRule> = Vec::new();
        let mut traversal = DepthFirstTraversal::new(&graph, bounds());
        while let Some(rule) = traversal.next_candidate() {
            depth.push(rule);
        }

        constrained.sort_by(|a, b| a.nodes().cmp(b.nodes()));
        depth.sort_by(|a, b| a.nodes().cmp(b.nodes()));
        assert_eq!(constrained, depth);
    }
}
