//! Candidate rules and their split into body and head.
//!
//! A candidate rule is an ordered sequence of constraint-graph nodes;
//! it stores node ids only and is resolved against the graph when its
//! members are needed. The split point divides the sequence into the
//! body (the premise) and the head (the consequence) of a TGD.

/// Id of a node in the constraint graph.
pub type NodeId = usize;

/// An ordered sequence of constraint-graph nodes built up during
/// traversal.
///
/// Rules are extended one node at a time; every prefix of a rule has
/// itself been validated when the rule was formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CandidateRule {
    nodes: Vec<NodeId>,
}

impl CandidateRule {
    /// The empty rule.
    pub fn new() -> Self {
        Self::default()
    }

    /// A rule consisting of a single starting node.
    pub fn root(node: NodeId) -> Self {
        Self { nodes: vec![node] }
    }

    /// The node sequence.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Number of nodes (= number of variables) in the rule.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the rule holds no node yet.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether the rule already contains the given node.
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// A copy of the rule with one node appended.
    pub fn extended(&self, node: NodeId) -> Self {
        let mut nodes = self.nodes.clone();
        nodes.push(node);
        Self { nodes }
    }

    /// All split points that divide this rule into a non-empty body and
    /// a non-empty head. Empty for rules shorter than two nodes.
    pub fn split_points(&self) -> std::ops::Range<usize> {
        if self.nodes.len() < 2 {
            1..1
        } else {
            1..self.nodes.len()
        }
    }
}

/// One attribute position of a [RuleQuery], resolved to names so that
/// any backend can evaluate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPosition {
    /// Table name
    pub table: String,
    /// Occurrence index of the table within the rule
    pub occurrence: usize,
    /// Column name
    pub column: String,
}

/// One variable of a [RuleQuery]: the positions required to carry equal
/// values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryGroup {
    /// The unified positions, in canonical order
    pub positions: Vec<QueryPosition>,
}

/// A candidate rule resolved into plain names, together with its split
/// point, ready for evaluation by a [DatabaseInspector][crate::inspector::DatabaseInspector].
///
/// Groups `[0, split)` form the body, groups `[split, len)` the head.
#[derive(Debug, Clone)]
pub struct RuleQuery {
    /// One group per rule variable, in rule order
    pub groups: Vec<QueryGroup>,
    /// Index of the first head group
    pub split: usize,
}

impl RuleQuery {
    /// The body groups.
    pub fn body(&self) -> &[QueryGroup] {
        &self.groups[..self.split]
    }

    /// The head groups.
    pub fn head(&self) -> &[QueryGroup] {
        &self.groups[self.split..]
    }

    /// The distinct table occurrences referenced by the body, sorted.
    pub fn body_occurrences(&self) -> Vec<(String, usize)> {
        Self::occurrences_of(self.body())
    }

    /// The distinct table occurrences referenced by the head but not by
    /// the body; these are bound existentially.
    pub fn head_only_occurrences(&self) -> Vec<(String, usize)> {
        let body = self.body_occurrences();
        Self::occurrences_of(self.head())
            .into_iter()
            .filter(|occurrence| !body.contains(occurrence))
            .collect()
    }

    fn occurrences_of(groups: &[QueryGroup]) -> Vec<(String, usize)> {
        let mut occurrences: Vec<(String, usize)> = groups
            .iter()
            .flat_map(|group| {
                group
                    .positions
                    .iter()
                    .map(|position| (position.table.clone(), position.occurrence))
            })
            .collect();
        occurrences.sort();
        occurrences.dedup();
        occurrences
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn split_points_require_two_nodes() {
        assert_eq!(CandidateRule::root(0).split_points().count(), 0);
        assert_eq!(CandidateRule::root(0).extended(1).split_points().count(), 1);
        assert_eq!(
            CandidateRule::root(0).extended(1).extended(2).split_points(),
            1..3
        );
    }

    #[test]
    fn extension_preserves_the_prefix() {
        let rule = CandidateRule::root(3).extended(5);
        assert_eq!(rule.nodes(), &[3, 5]);
        assert!(rule.contains(3));
        assert!(!rule.contains(4));
    }

    fn query_position(table: &str, occurrence: usize, column: &str) -> QueryPosition {
        QueryPosition {
            table: table.to_owned(),
            occurrence,
            column: column.to_owned(),
        }
    }

    #[test]
    fn head_only_occurrences_exclude_body_tables() {
        let query = RuleQuery {
            groups: vec![
                QueryGroup {
                    positions: vec![
                        query_position("lab", 0, "patient_id"),
                        query_position("patient", 0, "id"),
                    ],
                },
                QueryGroup {
                    positions: vec![query_position("patient", 0, "name")],
                },
            ],
            split: 1,
        };

        assert_eq!(
            query.body_occurrences(),
            vec![("lab".to_owned(), 0), ("patient".to_owned(), 0)]
        );
        assert!(query.head_only_occurrences().is_empty());
    }
}
