//! Candidate-rule validation.
//!
//! Three pure checks over a partial rule — minimality, table-occurrence
//! consistency, and the size limits — plus the combined
//! [next_node_test] applied before a traversal strategy appends a node.

use std::collections::BTreeSet;

use crate::graph::ConstraintGraph;
use crate::model::indexed::{occurrences_consecutive, TableOccurrence};
use crate::model::rule::{CandidateRule, NodeId};

/// The size limits a rule must respect.
#[derive(Debug, Clone, Copy)]
pub struct TraversalBounds {
    /// Maximum number of variables (= nodes) per rule
    pub max_vars: usize,
    /// Maximum number of distinct table occurrences per rule
    pub max_tables: usize,
}

/// The distinct table occurrences referenced by a rule.
pub fn table_occurrences(graph: &ConstraintGraph, rule: &CandidateRule) -> BTreeSet<TableOccurrence> {
    rule.nodes()
        .iter()
        .flat_map(|&node| graph.node(node).table_occurrences())
        .collect()
}

/// Every node must contribute at least one position that no earlier
/// node already covered; a rule failing this is equivalent to a shorter
/// one and is discarded.
pub fn check_minimal(graph: &ConstraintGraph, rule: &CandidateRule) -> bool {
    let mut covered: BTreeSet<_> = BTreeSet::new();
    for &node in rule.nodes() {
        let members = graph.node(node).members();
        if !members.iter().any(|member| !covered.contains(member)) {
            return false;
        }
        covered.extend(members.iter().copied());
    }
    true
}

/// For each table, the occurrence indices used by the rule must be
/// exactly `{0, 1, …, k}`: no gaps, starting at zero.
pub fn check_table_occurrences(graph: &ConstraintGraph, rule: &CandidateRule) -> bool {
    occurrences_consecutive(table_occurrences(graph, rule), true)
}

/// The rule must stay within the variable and table-occurrence limits.
pub fn check_limits(graph: &ConstraintGraph, rule: &CandidateRule, bounds: &TraversalBounds) -> bool {
    rule.len() <= bounds.max_vars && table_occurrences(graph, rule).len() <= bounds.max_tables
}

/// Whether `next` may be appended to the rule.
///
/// For an empty rule this requires `next` to be a root. Otherwise the
/// node must be reachable from the current frontier (a graph successor
/// of some rule member), must not repeat a node or share a position
/// with one, and the extended rule must pass all three checks.
pub fn next_node_test(
    graph: &ConstraintGraph,
    rule: &CandidateRule,
    next: NodeId,
    bounds: &TraversalBounds,
) -> bool {
    if rule.is_empty() {
        return graph.is_root(next) && bounds.max_vars >= 1;
    }

    if rule.contains(next) {
        return false;
    }
    let next_node = graph.node(next);
    if rule
        .nodes()
        .iter()
        .any(|&node| graph.node(node).shares_member(next_node))
    {
        return false;
    }
    if !rule.nodes().iter().any(|&node| graph.has_edge(node, next)) {
        return false;
    }

    let extended = rule.extended(next);
    check_minimal(graph, &extended)
        && check_table_occurrences(graph, &extended)
        && check_limits(graph, &extended, bounds)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::analysis::compatibility::{CompatibilityMatrix, CompatibilitySettings, EvidenceMode};
    use crate::graph::{enumerate_nodes, GraphSettings};
    use crate::inspector::memory::MemoryDatabase;
    use crate::model::attribute::AttributeCatalog;

    fn clinic_graph(max_occurrence: usize, max_tables: usize) -> ConstraintGraph {
        let mut database = MemoryDatabase::new("clinic");
        database.add_table(
            "patient",
            vec!["id", "name"],
            vec![
                vec!["1", "ada"],
                vec!["2", "grace"],
                vec!["3", "edsger"],
            ],
        );
        database.add_table(
            "lab",
            vec!["patient_id", "value"],
            vec![vec!["1", "7.5"], vec!["2", "6.1"], vec!["3", "8.0"]],
        );
        database.add_foreign_key("lab", "patient_id", "patient", "id");

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
                max_occurrence,
                max_tables,
                occurrence_caps: Default::default(),
            },
        );
        ConstraintGraph::from_nodes(nodes, max_tables)
    }

    #[test]
    fn empty_rules_only_accept_roots() {
        let graph = clinic_graph(3, 2);
        let bounds = TraversalBounds {
            max_vars: 2,
            max_tables: 2,
        };
        let root = graph.roots()[0];
        assert!(next_node_test(&graph, &CandidateRule::new(), root, &bounds));

        let non_root = graph
            .node_ids()
            .find(|&id| !graph.is_root(id))
            .expect("free nodes exist");
        assert!(!next_node_test(
            &graph,
            &CandidateRule::new(),
            non_root,
            &bounds
        ));
    }

    #[test]
    fn extensions_respect_the_variable_limit() {
        let graph = clinic_graph(3, 2);
        let tight = TraversalBounds {
            max_vars: 1,
            max_tables: 2,
        };
        let root = graph.roots()[0];
        let rule = CandidateRule::root(root);

        for successor in graph.successors(root) {
            assert!(!next_node_test(&graph, &rule, successor, &tight));
        }
    }

    #[test]
    fn repeating_or_overlapping_nodes_are_rejected() {
        let graph = clinic_graph(3, 2);
        let bounds = TraversalBounds {
            max_vars: 4,
            max_tables: 2,
        };
        let root = graph.roots()[0];
        let rule = CandidateRule::root(root);
        assert!(!next_node_test(&graph, &rule, root, &bounds));

        // a free node carrying a position of the root shares a member
        let overlapping = graph.node_ids().find(|&id| {
            !graph.node(id).is_join() && graph.node(id).shares_member(graph.node(root))
        });
        if let Some(overlapping) = overlapping {
            assert!(!next_node_test(&graph, &rule, overlapping, &bounds));
        }
    }

    #[test]
    fn valid_extensions_pass_all_checks() {
        let graph = clinic_graph(3, 2);
        let bounds = TraversalBounds {
            max_vars: 2,
            max_tables: 2,
        };
        let root = graph.roots()[0];
        let rule = CandidateRule::root(root);

        let successors = graph.successors(root);
        assert!(!successors.is_empty());
        for successor in successors {
            assert!(next_node_test(&graph, &rule, successor, &bounds));
            let extended = rule.extended(successor);
            assert!(check_minimal(&graph, &extended));
            assert!(check_table_occurrences(&graph, &extended));
            assert!(check_limits(&graph, &extended, &bounds));
        }
    }
}
