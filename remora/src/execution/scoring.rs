//! Split-level metric evaluation.
//!
//! For every split point of a candidate rule the engine computes
//! support, confidence, and the structural accuracy gate against the
//! data, and emits the rule once for each split that clears both
//! thresholds. All ratios are computed in double precision; a zero
//! denominator yields 0, never NaN.

use crate::graph::ConstraintGraph;
use crate::inspector::{retry_once, DatabaseInspector, InspectorError};
use crate::model::attribute::AttributeCatalog;
use crate::model::rule::{CandidateRule, QueryGroup, QueryPosition, RuleQuery};

/// The metric values of one `(rule, split)` pair.
#[derive(Debug, Clone, Copy)]
pub struct SplitMetrics {
    /// Fraction of anchor-table tuples satisfying body and head
    pub support: f64,
    /// Conditional probability of the head given the body
    pub confidence: f64,
    /// Structural validity gate, 1.0 or 0.0
    pub accuracy: f64,
}

impl SplitMetrics {
    /// Whether the metrics clear the emission thresholds.
    pub fn passes(&self, tau_support: f64, tau_confidence: f64) -> bool {
        self.accuracy > 0.0 && self.support >= tau_support && self.confidence >= tau_confidence
    }
}

/// Resolve a candidate rule and split point into the name-based query
/// shape the inspector evaluates.
pub fn build_query(
    graph: &ConstraintGraph,
    catalog: &AttributeCatalog,
    rule: &CandidateRule,
    split: usize,
) -> RuleQuery {
    let groups = rule
        .nodes()
        .iter()
        .map(|&node| QueryGroup {
            positions: graph
                .node(node)
                .members()
                .iter()
                .map(|member| {
                    let attribute = catalog.attribute(member.attribute);
                    QueryPosition {
                        table: catalog.table(member.table).name.clone(),
                        occurrence: member.occurrence,
                        column: attribute.column.clone(),
                    }
                })
                .collect(),
        })
        .collect();

    RuleQuery { groups, split }
}

/// Evaluate one split of a candidate rule against the data.
///
/// The support denominator is drawn from the anchor table: the table of
/// the first head node's canonically first position. Support saturates
/// at 1.0 when the body bindings outnumber the anchor rows.
pub fn evaluate_split(
    inspector: &dyn DatabaseInspector,
    graph: &ConstraintGraph,
    catalog: &AttributeCatalog,
    rule: &CandidateRule,
    split: usize,
) -> Result<(RuleQuery, SplitMetrics), InspectorError> {
    let query = build_query(graph, catalog, rule, split);

    let both_matches = retry_once(|| inspector.count_both_matches(&query))?;
    let body_matches = retry_once(|| inspector.count_body_matches(&query))?;

    let confidence = if body_matches == 0 {
        0.0
    } else {
        both_matches as f64 / body_matches as f64
    };

    let anchor = graph.node(rule.nodes()[split]).members()[0].table;
    let anchor_rows = catalog.table(anchor).row_count;
    let support = if anchor_rows == 0 {
        0.0
    } else {
        let ratio = both_matches as f64 / anchor_rows as f64;
        if ratio > 1.0 {
            log::debug!(
                "support of {both_matches}/{anchor_rows} saturates at 1.0 for anchor \"{}\"",
                catalog.table(anchor).name
            );
        }
        ratio.min(1.0)
    };

    let metrics = SplitMetrics {
        support,
        confidence,
        accuracy: structural_accuracy(catalog, &query),
    };
    Ok((query, metrics))
}

/// 1.0 when every referenced table and column exists in the schema,
/// 0.0 otherwise. A gate, not a quality score.
fn structural_accuracy(catalog: &AttributeCatalog, query: &RuleQuery) -> f64 {
    let valid = query.groups.iter().all(|group| {
        group.positions.iter().all(|position| {
            catalog
                .table_id(&position.table)
                .and_then(|table| catalog.attribute_id(table, &position.column))
                .is_some()
        })
    });
    if valid {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::analysis::compatibility::{CompatibilityMatrix, CompatibilitySettings, EvidenceMode};
    use crate::graph::{enumerate_nodes, GraphSettings};
    use crate::inspector::memory::MemoryDatabase;

    fn clinic() -> MemoryDatabase {
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
        database
    }

    fn setup(database: &MemoryDatabase) -> (AttributeCatalog, ConstraintGraph) {
        let catalog = AttributeCatalog::from_inspector(database).unwrap();
        let compatibility = CompatibilityMatrix::analyze(
            database,
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

    #[test]
    fn foreign_key_join_scores_perfectly() {
        let database = clinic();
        let (catalog, graph) = setup(&database);

        let root = graph.roots()[0];
        let successor = graph.successors(root)[0];
        let rule = CandidateRule::root(root).extended(successor);

        let (_, metrics) = evaluate_split(&database, &graph, &catalog, &rule, 1).unwrap();
        assert_eq!(metrics.confidence, 1.0);
        assert_eq!(metrics.support, 1.0);
        assert_eq!(metrics.accuracy, 1.0);
        assert!(metrics.passes(0.1, 0.5));
    }

    #[test]
    fn metrics_stay_within_unit_range() {
        let database = clinic();
        let (catalog, graph) = setup(&database);

        let root = graph.roots()[0];
        for successor in graph.successors(root) {
            let rule = CandidateRule::root(root).extended(successor);
            for split in rule.split_points() {
                let (_, metrics) =
                    evaluate_split(&database, &graph, &catalog, &rule, split).unwrap();
                assert!((0.0..=1.0).contains(&metrics.support));
                assert!((0.0..=1.0).contains(&metrics.confidence));
            }
        }
    }

    #[test]
    fn empty_body_yields_zero_not_nan() {
        // the foreign key is declared but no lab row references an
        // existing patient, so the join body has no matches
        let mut database = MemoryDatabase::new("stale");
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
            vec![vec!["7", "7.5"], vec!["8", "6.1"], vec!["9", "8.0"]],
        );
        database.add_foreign_key("lab", "patient_id", "patient", "id");
        let (catalog, graph) = setup(&database);

        let root = graph.roots()[0];
        let successor = graph.successors(root)[0];
        let rule = CandidateRule::root(root).extended(successor);
        let (_, metrics) = evaluate_split(&database, &graph, &catalog, &rule, 1).unwrap();
        assert_eq!(metrics.confidence, 0.0);
        assert_eq!(metrics.support, 0.0);
        assert!(!metrics.passes(0.1, 0.5));
    }
}
