//! Discovery parameters.
//!
//! Every numeric tunable of the engine lives here with its documented
//! default; the engine itself contains no literal thresholds. A
//! configuration is validated before any work starts.

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::analysis::compatibility::EvidenceMode;
use crate::execution::heuristics::HeuristicKind;
use crate::execution::traversal::StrategyKind;

/// Errors raised by [DiscoveryConfig::validate] before discovery starts.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// The named traversal strategy does not exist
    #[error("unknown traversal strategy \"{0}\"; available: dfs, bfs, astar")]
    UnknownStrategy(String),
    /// The named heuristic does not exist
    #[error(
        "unknown heuristic \"{0}\"; available: naive, table-size, join-selectivity, hybrid"
    )]
    UnknownHeuristic(String),
    /// A bound that must be at least one is zero
    #[error("parameter \"{0}\" must be at least 1")]
    ZeroBound(&'static str),
    /// A threshold lies outside `[0, 1]`
    #[error("threshold \"{name}\" must lie in [0, 1], got {value}")]
    ThresholdOutOfRange {
        /// Name of the offending parameter
        name: &'static str,
        /// The rejected value
        value: f64,
    },
    /// The hybrid heuristic weights are unusable
    #[error("hybrid heuristic weights must be non-negative and not all zero")]
    InvalidWeights,
}

/// Weights of the hybrid heuristic.
#[derive(Debug, Clone, Copy)]
pub struct HybridWeights {
    /// Weight of the naive component
    pub naive: f64,
    /// Weight of the table-size component
    pub table_size: f64,
    /// Weight of the join-selectivity component
    pub join_selectivity: f64,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            naive: 0.3,
            table_size: 0.4,
            join_selectivity: 0.3,
        }
    }
}

/// All parameters of one discovery run.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Maximum number of table occurrences per rule (the user-visible
    /// parameter `N`). Default 3.
    pub max_tables: usize,
    /// Maximum number of variables per rule. Default 6.
    pub max_vars: usize,
    /// Maximum number of occurrences of one table. Default 3.
    pub max_occurrence: usize,
    /// The traversal strategy. Default depth-first.
    pub strategy: StrategyKind,
    /// The heuristic steering best-first traversal. Default hybrid.
    pub heuristic: HeuristicKind,
    /// Which domain evidence establishes compatibility. Default hybrid.
    pub evidence: EvidenceMode,
    /// Minimum overlap ratio for compatibility. Default 0.5.
    pub tau_overlap: f64,
    /// Minimum number of common values for overlap evidence. Default 3.
    pub overlap_floor: u64,
    /// Minimum support for a rule to be emitted. Default 0.1.
    pub tau_support: f64,
    /// Minimum confidence for a rule to be emitted. Default 0.5.
    pub tau_confidence: f64,
    /// Weights of the hybrid heuristic. Default 0.3 / 0.4 / 0.3.
    pub hybrid_weights: HybridWeights,
    /// Capacity of the best-first priority queue; on overflow the run
    /// downgrades to depth-first. Default 65 536.
    pub queue_capacity: usize,
    /// Per-column occurrence caps, keyed by `(table, column)`, that
    /// tighten `max_occurrence` for individual attributes.
    pub occurrence_caps: BTreeMap<(String, String), usize>,
    /// Directory for the optional side files; `None` or an empty path
    /// skips them.
    pub results_path: Option<PathBuf>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_tables: 3,
            max_vars: 6,
            max_occurrence: 3,
            strategy: StrategyKind::default(),
            heuristic: HeuristicKind::default(),
            evidence: EvidenceMode::default(),
            tau_overlap: 0.5,
            overlap_floor: 3,
            tau_support: 0.1,
            tau_confidence: 0.5,
            hybrid_weights: HybridWeights::default(),
            queue_capacity: 65_536,
            occurrence_caps: BTreeMap::new(),
            results_path: None,
        }
    }
}

impl DiscoveryConfig {
    /// Check every parameter range; called by the engine before any
    /// work starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tables == 0 {
            return Err(ConfigError::ZeroBound("max_tables"));
        }
        if self.max_vars == 0 {
            return Err(ConfigError::ZeroBound("max_vars"));
        }
        if self.max_occurrence == 0 {
            return Err(ConfigError::ZeroBound("max_occurrence"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroBound("queue_capacity"));
        }

        for (name, value) in [
            ("tau_overlap", self.tau_overlap),
            ("tau_support", self.tau_support),
            ("tau_confidence", self.tau_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) || value.is_nan() {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }

        let weights = [
            self.hybrid_weights.naive,
            self.hybrid_weights.table_size,
            self.hybrid_weights.join_selectivity,
        ];
        if weights.iter().any(|weight| !weight.is_finite() || *weight < 0.0)
            || weights.iter().sum::<f64>() <= 0.0
        {
            return Err(ConfigError::InvalidWeights);
        }

        Ok(())
    }
}
