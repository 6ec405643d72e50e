//! Materialized tuple-generating dependencies.
//!
//! Once a candidate rule passes metric evaluation for some split point,
//! it is converted into a [TgdRule]: the serializable record holding
//! the body and head predicate lists, a human-readable display string,
//! the metric values, and a stable hash used for deduplication.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::model::rule::{QueryGroup, RuleQuery};

/// The token qualifying a column with its table in exported artifacts,
/// e.g. `patient___sep___id`.
pub const COLUMN_SEPARATOR: &str = "___sep___";

/// An accepted tuple-generating dependency with its metric annotations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TgdRule {
    /// Record tag, always `"TGDRule"`
    #[serde(rename = "type")]
    kind: &'static str,
    /// Predicate strings of the body, in rule order
    pub body: Vec<String>,
    /// Predicate strings of the head, in rule order
    pub head: Vec<String>,
    /// Canonical display string, `head :- body`
    pub display: String,
    /// Structural validity gate: 1.0 when every referenced table and
    /// column exists in the schema, 0.0 otherwise
    pub accuracy: f64,
    /// Conditional probability of the head given the body
    pub confidence: f64,
    /// Fraction of anchor-table tuples satisfying body and head
    pub support: f64,
    /// Stable hash over the canonical rule form, for deduplication
    #[serde(skip)]
    pub rule_hash: u64,
}

impl TgdRule {
    /// Materialize a rule record from an evaluated query.
    pub fn materialize(query: &RuleQuery, support: f64, confidence: f64, accuracy: f64) -> Self {
        let row_variables = row_variable_names(query);

        let mut body = Vec::new();
        for (group_index, group) in query.body().iter().enumerate() {
            predicates_of_group(group, group_index, &row_variables, &mut body);
        }
        let mut head = Vec::new();
        for (offset, group) in query.head().iter().enumerate() {
            predicates_of_group(group, query.split + offset, &row_variables, &mut head);
        }

        let display = format!(
            "{} :- {}",
            atoms_of(query.head(), query.split),
            atoms_of(query.body(), 0)
        );

        Self {
            kind: "TGDRule",
            body,
            head,
            display,
            accuracy,
            confidence,
            support,
            rule_hash: canonical_hash(query),
        }
    }
}

impl fmt::Display for TgdRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display)
    }
}

/// Variable name of the rule variable at the given group index.
fn value_variable(group_index: usize) -> String {
    format!("X{group_index}")
}

/// Assign a row variable `t<n>` to every table occurrence of the rule,
/// numbered by first appearance in the group sequence.
fn row_variable_names(query: &RuleQuery) -> Vec<((String, usize), String)> {
    let mut names: Vec<((String, usize), String)> = Vec::new();
    for group in &query.groups {
        for position in &group.positions {
            let occurrence = (position.table.clone(), position.occurrence);
            if !names.iter().any(|(known, _)| *known == occurrence) {
                let name = format!("t{}", names.len());
                names.push((occurrence, name));
            }
        }
    }
    names
}

fn row_variable<'a>(
    names: &'a [((String, usize), String)],
    table: &str,
    occurrence: usize,
) -> &'a str {
    names
        .iter()
        .find(|(known, _)| known.0 == table && known.1 == occurrence)
        .map(|(_, name)| name.as_str())
        .expect("every position was visited when assigning row variables")
}

/// One predicate string per position of the group.
fn predicates_of_group(
    group: &QueryGroup,
    group_index: usize,
    row_variables: &[((String, usize), String)],
    into: &mut Vec<String>,
) {
    for position in &group.positions {
        into.push(format!(
            "Predicate(variable1='{}', relation='{}{}{}', variable2='{}')",
            row_variable(row_variables, &position.table, position.occurrence),
            position.table,
            COLUMN_SEPARATOR,
            position.column,
            value_variable(group_index),
        ));
    }
}

/// Compact atom rendering for the display string: positions grouped by
/// table occurrence, e.g. `patient(id=X0, name=X1)`.
fn atoms_of(groups: &[QueryGroup], first_group_index: usize) -> String {
    let mut atoms: Vec<((String, usize), Vec<String>)> = Vec::new();
    for (offset, group) in groups.iter().enumerate() {
        for position in &group.positions {
            let occurrence = (position.table.clone(), position.occurrence);
            let binding = format!(
                "{}={}",
                position.column,
                value_variable(first_group_index + offset)
            );
            match atoms.iter_mut().find(|(known, _)| *known == occurrence) {
                Some((_, bindings)) => bindings.push(binding),
                None => atoms.push((occurrence, vec![binding])),
            }
        }
    }

    atoms
        .into_iter()
        .map(|((table, _), bindings)| format!("{}({})", table, bindings.join(", ")))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Hash over the canonicalized (sorted) set of variable groups plus the
/// split point. Stable across runs: only names and indices enter the
/// hash, in sorted order.
fn canonical_hash(query: &RuleQuery) -> u64 {
    let mut groups: Vec<Vec<String>> = query
        .groups
        .iter()
        .map(|group| {
            let mut positions: Vec<String> = group
                .positions
                .iter()
                .map(|position| {
                    format!(
                        "{}[{}].{}",
                        position.table, position.occurrence, position.column
                    )
                })
                .collect();
            positions.sort();
            positions
        })
        .collect();
    groups.sort();

    let mut hasher = DefaultHasher::new();
    groups.hash(&mut hasher);
    query.split.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::rule::QueryPosition;

    fn query_position(table: &str, occurrence: usize, column: &str) -> QueryPosition {
        QueryPosition {
            table: table.to_owned(),
            occurrence,
            column: column.to_owned(),
        }
    }

    fn patient_lab_query() -> RuleQuery {
        RuleQuery {
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
        }
    }

    #[test]
    fn predicates_carry_row_and_value_variables() {
        let rule = TgdRule::materialize(&patient_lab_query(), 1.0, 1.0, 1.0);

        assert_eq!(
            rule.body,
            vec![
                "Predicate(variable1='t0', relation='lab___sep___patient_id', variable2='X0')",
                "Predicate(variable1='t1', relation='patient___sep___id', variable2='X0')",
            ]
        );
        assert_eq!(
            rule.head,
            vec!["Predicate(variable1='t1', relation='patient___sep___name', variable2='X1')"]
        );
    }

    #[test]
    fn display_groups_positions_by_occurrence() {
        let rule = TgdRule::materialize(&patient_lab_query(), 1.0, 1.0, 1.0);
        assert_eq!(
            rule.display,
            "patient(name=X1) :- lab(patient_id=X0), patient(id=X0)"
        );
    }

    #[test]
    fn hash_ignores_group_order() {
        let query = patient_lab_query();
        let mut reordered = query.clone();
        reordered.groups.reverse();

        let original = TgdRule::materialize(&query, 1.0, 1.0, 1.0);
        let swapped = TgdRule::materialize(&reordered, 1.0, 1.0, 1.0);
        assert_eq!(original.rule_hash, swapped.rule_hash);

        let mut shifted = query.clone();
        shifted.split = 2;
        // a different split point is a different rule
        assert_ne!(
            original.rule_hash,
            TgdRule::materialize(&shifted, 1.0, 1.0, 1.0).rule_hash
        );
    }

    #[test]
    fn serialization_matches_the_record_shape() {
        let rule = TgdRule::materialize(&patient_lab_query(), 0.5, 0.75, 1.0);
        let json = serde_json::to_value(&rule).unwrap();

        assert_eq!(json["type"], "TGDRule");
        assert_eq!(json["support"], 0.5);
        assert_eq!(json["confidence"], 0.75);
        assert_eq!(json["accuracy"], 1.0);
        assert!(json["display"].as_str().unwrap().contains(":-"));
        assert!(json.get("rule_hash").is_none());
    }
}
