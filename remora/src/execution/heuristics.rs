//! The heuristic library for best-first traversal.
//!
//! Each heuristic maps a partial rule to a non-negative cost — lower is
//! more promising. Heuristics are created once per run and read the
//! table and column statistics the catalog cached at initialization;
//! the backend is never queried from inside a cost function.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use itertools::Itertools;

use crate::execution::config::{ConfigError, HybridWeights};
use crate::graph::ConstraintGraph;
use crate::model::attribute::AttributeCatalog;
use crate::model::rule::CandidateRule;

/// The available heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeuristicKind {
    /// Number of nodes so far; prefers short rules
    Naive,
    /// Sum of `ln(1 + row_count)` over the referenced tables; prefers
    /// small tables
    TableSize,
    /// Log of the estimated match-set cardinality; prefers selective
    /// joins
    JoinSelectivity,
    /// Weighted sum of the other three; the recommended default
    #[default]
    Hybrid,
}

impl FromStr for HeuristicKind {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "naive" => Ok(Self::Naive),
            "table-size" | "table_size" => Ok(Self::TableSize),
            "join-selectivity" | "join_selectivity" => Ok(Self::JoinSelectivity),
            "hybrid" => Ok(Self::Hybrid),
            _ => Err(ConfigError::UnknownHeuristic(name.to_owned())),
        }
    }
}

impl fmt::Display for HeuristicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeuristicKind::Naive => write!(f, "naive"),
            HeuristicKind::TableSize => write!(f, "table-size"),
            HeuristicKind::JoinSelectivity => write!(f, "join-selectivity"),
            HeuristicKind::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// A heuristic bound to the statistics of one catalog.
#[derive(Debug, Clone, Copy)]
pub struct Heuristic<'a> {
    kind: HeuristicKind,
    weights: HybridWeights,
    catalog: &'a AttributeCatalog,
}

impl<'a> Heuristic<'a> {
    /// Create a heuristic of the given kind over the catalog's cached
    /// statistics.
    pub fn new(kind: HeuristicKind, weights: HybridWeights, catalog: &'a AttributeCatalog) -> Self {
        Self {
            kind,
            weights,
            catalog,
        }
    }

    /// The cost of a partial rule; non-negative, lower is better.
    pub fn cost(&self, graph: &ConstraintGraph, rule: &CandidateRule) -> f64 {
        match self.kind {
            HeuristicKind::Naive => self.naive(rule),
            HeuristicKind::TableSize => self.table_size(graph, rule),
            HeuristicKind::JoinSelectivity => self.join_selectivity(graph, rule),
            HeuristicKind::Hybrid => {
                self.weights.naive * self.naive(rule)
                    + self.weights.table_size * self.table_size(graph, rule)
                    + self.weights.join_selectivity * self.join_selectivity(graph, rule)
            }
        }
    }

    fn naive(&self, rule: &CandidateRule) -> f64 {
        rule.len() as f64
    }

    fn table_size(&self, graph: &ConstraintGraph, rule: &CandidateRule) -> f64 {
        let tables: BTreeSet<_> = rule
            .nodes()
            .iter()
            .flat_map(|&node| graph.node(node).members())
            .map(|member| member.table)
            .collect();
        tables
            .into_iter()
            .map(|table| (1.0 + self.catalog.table(table).row_count as f64).ln())
            .sum()
    }

    /// Estimated cardinality of the rule's match set: the product of
    /// the referenced tables' sizes, damped by one selectivity factor
    /// `1 / max(distinct(a), distinct(b))` per unified position pair.
    fn join_selectivity(&self, graph: &ConstraintGraph, rule: &CandidateRule) -> f64 {
        let occurrences: BTreeSet<_> = rule
            .nodes()
            .iter()
            .flat_map(|&node| graph.node(node).table_occurrences())
            .collect();

        let mut estimate: f64 = occurrences
            .iter()
            .map(|&(table, _)| self.catalog.table(table).row_count.max(1) as f64)
            .product();

        for &node in rule.nodes() {
            for (first, second) in graph.node(node).members().iter().tuple_windows() {
                let larger_domain = self
                    .catalog
                    .attribute(first.attribute)
                    .distinct_values
                    .max(self.catalog.attribute(second.attribute).distinct_values)
                    .max(1);
                estimate /= larger_domain as f64;
            }
        }

        estimate.max(1.0).ln()
    }
}
