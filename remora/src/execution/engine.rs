//! The discovery engine and its lazy rule stream.
//!
//! [DiscoveryEngine::initialize] validates the configuration, interns
//! the schema, runs the compatibility analysis, and builds the
//! constraint graph; everything it owns is read-only afterwards.
//! [DiscoveryEngine::rules] then hands out a [RuleStream], a stateful
//! iterator that drives the configured traversal strategy, evaluates
//! every split point of every candidate, and yields the accepted TGDs
//! one at a time. The caller controls pacing and may cancel between
//! any two items through a shared stop flag.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::analysis::compatibility::{CompatibilityMatrix, CompatibilitySettings};
use crate::error::Error;
use crate::execution::config::DiscoveryConfig;
use crate::execution::heuristics::Heuristic;
use crate::execution::scoring::evaluate_split;
use crate::execution::traversal::TraversalStrategy;
use crate::execution::validator::TraversalBounds;
use crate::graph::{enumerate_nodes, ConstraintGraph, GraphSettings};
use crate::inspector::{DatabaseInspector, InspectorError};
use crate::model::attribute::{AttributeCatalog, AttributeId};
use crate::model::rule::CandidateRule;
use crate::model::tgd::TgdRule;

/// Wall-clock durations of the initialization phases, in seconds.
/// Each value is cumulative from the start of initialization.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct InitTimings {
    /// Through the compatibility analysis
    pub time_compute_compatible: f64,
    /// Through the enumeration of the joined indexed attributes
    pub time_to_compute_indexed: f64,
    /// Through the constraint-graph build
    pub time_building_cg: f64,
}

/// Why an evaluated `(rule, split)` pair was not emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SkipReason {
    /// Support or confidence below the thresholds
    BelowThresholds,
    /// An identical rule was already emitted
    Duplicate,
    /// The backend failed twice while evaluating the pair
    Backend,
    /// Rejected by the path-level filter
    PathPruned,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::BelowThresholds => write!(f, "below-thresholds"),
            SkipReason::Duplicate => write!(f, "duplicate"),
            SkipReason::Backend => write!(f, "backend"),
            SkipReason::PathPruned => write!(f, "path-pruned"),
        }
    }
}

/// How a discovery run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscoveryStatus {
    /// The stream has not been exhausted yet
    #[default]
    Running,
    /// The search space was exhausted
    Completed,
    /// The stop flag was raised
    Cancelled,
    /// The constraint graph had no roots; the empty result is not an
    /// error
    GraphEmpty,
}

/// Counters describing one discovery run.
#[derive(Debug, Clone, Default)]
pub struct DiscoverySummary {
    /// Candidate rules long enough to define a TGD
    pub rules_considered: u64,
    /// Rules yielded to the caller
    pub rules_emitted: u64,
    /// Evaluated pairs that were dropped, by reason
    pub rules_skipped_by_reason: std::collections::BTreeMap<SkipReason, u64>,
    /// Terminal state of the run
    pub status: DiscoveryStatus,
}

impl DiscoverySummary {
    fn skip(&mut self, reason: SkipReason) {
        *self.rules_skipped_by_reason.entry(reason).or_insert(0) += 1;
    }
}

/// A fully initialized discovery run over one database.
#[derive(Debug)]
pub struct DiscoveryEngine<'a> {
    inspector: &'a dyn DatabaseInspector,
    config: DiscoveryConfig,
    catalog: AttributeCatalog,
    compatibility: CompatibilityMatrix,
    graph: ConstraintGraph,
    timings: InitTimings,
}

impl<'a> DiscoveryEngine<'a> {
    /// Validate the configuration and run the initialization pipeline:
    /// schema interning, compatibility analysis, node enumeration, and
    /// the constraint-graph build. Writes the side files when a
    /// non-empty results path is configured.
    pub fn initialize(
        inspector: &'a dyn DatabaseInspector,
        config: DiscoveryConfig,
    ) -> Result<Self, Error> {
        config.validate()?;
        let started = Instant::now();

        let catalog = AttributeCatalog::from_inspector(inspector)?;
        let compatibility = CompatibilityMatrix::analyze(
            inspector,
            &catalog,
            &CompatibilitySettings {
                mode: config.evidence,
                tau_overlap: config.tau_overlap,
                overlap_floor: config.overlap_floor,
            },
        );
        let time_compute_compatible = started.elapsed().as_secs_f64();

        let occurrence_caps = Self::resolve_occurrence_caps(&config, &catalog)?;
        let nodes = enumerate_nodes(
            &catalog,
            &compatibility,
            &GraphSettings {
                max_occurrence: config.max_occurrence,
                max_tables: config.max_tables,
                occurrence_caps,
            },
        );
        let time_to_compute_indexed = started.elapsed().as_secs_f64();

        let graph = ConstraintGraph::from_nodes(nodes, config.max_tables);
        let time_building_cg = started.elapsed().as_secs_f64();

        log::info!(
            "initialized in {time_building_cg:.3}s: {}",
            graph.metrics()
        );

        let engine = Self {
            inspector,
            config,
            catalog,
            compatibility,
            graph,
            timings: InitTimings {
                time_compute_compatible,
                time_to_compute_indexed,
                time_building_cg,
            },
        };
        engine.write_side_files()?;
        Ok(engine)
    }

    fn resolve_occurrence_caps(
        config: &DiscoveryConfig,
        catalog: &AttributeCatalog,
    ) -> Result<HashMap<AttributeId, usize>, Error> {
        let mut caps = HashMap::new();
        for ((table, column), &cap) in &config.occurrence_caps {
            let table_id = catalog
                .table_id(table)
                .ok_or_else(|| InspectorError::MissingTable(table.clone()))?;
            let attribute = catalog.attribute_id(table_id, column).ok_or_else(|| {
                InspectorError::MissingColumn {
                    table: table.clone(),
                    column: column.clone(),
                }
            })?;
            caps.insert(attribute, cap);
        }
        Ok(caps)
    }

    fn write_side_files(&self) -> Result<(), Error> {
        let Some(path) = &self.config.results_path else {
            return Ok(());
        };
        if path.as_os_str().is_empty() {
            log::debug!("empty results path, skipping side files");
            return Ok(());
        }
        crate::io::side_files::write_side_files(
            path,
            self.inspector.name(),
            &self.compatibility.export(&self.catalog),
            self.graph.metrics(),
            self.timings,
        )
    }

    /// The interned schema.
    pub fn catalog(&self) -> &AttributeCatalog {
        &self.catalog
    }

    /// The computed compatibility relation.
    pub fn compatibility(&self) -> &CompatibilityMatrix {
        &self.compatibility
    }

    /// The built constraint graph.
    pub fn graph(&self) -> &ConstraintGraph {
        &self.graph
    }

    /// The configuration the engine was initialized with.
    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// The initialization phase timings.
    pub fn timings(&self) -> InitTimings {
        self.timings
    }

    /// Path-level filter applied before a candidate's splits are
    /// evaluated. Allows every syntactically valid rule; an extension
    /// point for data-dependent path pruning.
    pub fn path_pruning(&self, _rule: &CandidateRule) -> bool {
        true
    }

    /// The lazy stream of accepted rules.
    pub fn rules(&self) -> RuleStream<'_> {
        self.rules_with_stop(Arc::new(AtomicBool::new(false)))
    }

    /// The lazy stream of accepted rules, cancellable through the given
    /// flag. The stream stops within one node expansion of the flag
    /// being raised and never yields a partially evaluated rule. The
    /// frontier is retained on cancellation: clearing the flag and
    /// polling again resumes the run where it stopped.
    pub fn rules_with_stop(&self, stop: Arc<AtomicBool>) -> RuleStream<'_> {
        let bounds = TraversalBounds {
            max_vars: self.config.max_vars,
            max_tables: self.config.max_tables,
        };
        let heuristic = Heuristic::new(
            self.config.heuristic,
            self.config.hybrid_weights,
            &self.catalog,
        );
        let strategy = self.config.strategy.instantiate(
            &self.graph,
            bounds,
            heuristic,
            self.config.queue_capacity,
        );

        RuleStream {
            engine: self,
            strategy,
            pending: VecDeque::new(),
            seen: HashSet::new(),
            summary: DiscoverySummary::default(),
            stop,
            traversal_done: false,
        }
    }
}

/// The lazy sequence of accepted TGDs of one run.
#[derive(Debug)]
pub struct RuleStream<'a> {
    engine: &'a DiscoveryEngine<'a>,
    strategy: Box<dyn TraversalStrategy + 'a>,
    pending: VecDeque<TgdRule>,
    seen: HashSet<u64>,
    summary: DiscoverySummary,
    stop: Arc<AtomicBool>,
    traversal_done: bool,
}

impl RuleStream<'_> {
    /// A snapshot of the run counters. The status is terminal once the
    /// stream has returned `None` or cancellation was observed.
    pub fn summary(&self) -> DiscoverySummary {
        self.summary.clone()
    }

    fn finish(&mut self) {
        self.summary.status = if self.engine.graph.roots().is_empty() {
            DiscoveryStatus::GraphEmpty
        } else {
            DiscoveryStatus::Completed
        };
    }

    fn evaluate_candidate(&mut self, candidate: &CandidateRule) {
        for split in candidate.split_points() {
            match evaluate_split(
                self.engine.inspector,
                &self.engine.graph,
                &self.engine.catalog,
                candidate,
                split,
            ) {
                Ok((query, metrics)) => {
                    if !metrics.passes(
                        self.engine.config.tau_support,
                        self.engine.config.tau_confidence,
                    ) {
                        self.summary.skip(SkipReason::BelowThresholds);
                        continue;
                    }
                    let rule = TgdRule::materialize(
                        &query,
                        metrics.support,
                        metrics.confidence,
                        metrics.accuracy,
                    );
                    if self.seen.insert(rule.rule_hash) {
                        self.pending.push_back(rule);
                    } else {
                        self.summary.skip(SkipReason::Duplicate);
                    }
                }
                Err(error) => {
                    log::debug!("skipping split {split} of a candidate: {error}");
                    self.summary.skip(SkipReason::Backend);
                }
            }
        }
    }
}

impl Iterator for RuleStream<'_> {
    type Item = TgdRule;

    fn next(&mut self) -> Option<TgdRule> {
        loop {
            if self.stop.load(Ordering::Relaxed) {
                if self.summary.status == DiscoveryStatus::Running {
                    log::info!("discovery cancelled after {} rules", self.summary.rules_emitted);
                    self.summary.status = DiscoveryStatus::Cancelled;
                }
                return None;
            }

            if let Some(rule) = self.pending.pop_front() {
                self.summary.rules_emitted += 1;
                return Some(rule);
            }

            if self.traversal_done {
                self.finish();
                return None;
            }

            let Some(candidate) = self.strategy.next_candidate() else {
                self.traversal_done = true;
                continue;
            };
            if candidate.split_points().is_empty() {
                continue;
            }

            self.summary.rules_considered += 1;
            if !self.engine.path_pruning(&candidate) {
                self.summary.skip(SkipReason::PathPruned);
                continue;
            }
            self.evaluate_candidate(&candidate);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
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

    fn tight_config() -> DiscoveryConfig {
        DiscoveryConfig {
            max_tables: 2,
            max_vars: 2,
            ..Default::default()
        }
    }

    #[test]
    fn clinic_emits_perfect_rules() {
        let database = clinic();
        let engine = DiscoveryEngine::initialize(&database, tight_config()).unwrap();
        let mut stream = engine.rules();

        let rules: Vec<TgdRule> = stream.by_ref().collect();
        assert!(!rules.is_empty());
        for rule in &rules {
            assert_eq!(rule.confidence, 1.0);
            assert_eq!(rule.support, 1.0);
            assert_eq!(rule.accuracy, 1.0);
        }

        let summary = stream.summary();
        assert_eq!(summary.status, DiscoveryStatus::Completed);
        assert_eq!(summary.rules_emitted, rules.len() as u64);
        assert!(summary.rules_considered >= rules.len() as u64);
    }

    #[test]
    fn emitted_rules_are_deduplicated() {
        let database = clinic();
        let engine = DiscoveryEngine::initialize(&database, tight_config()).unwrap();

        let rules: Vec<TgdRule> = engine.rules().collect();
        let mut hashes: Vec<u64> = rules.iter().map(|rule| rule.rule_hash).collect();
        hashes.sort_unstable();
        hashes.dedup();
        assert_eq!(hashes.len(), rules.len());
    }

    #[test]
    fn graph_empty_is_a_clean_empty_result() {
        let mut database = MemoryDatabase::new("disjoint");
        database.add_table("left", vec!["v"], vec![vec!["a"], vec!["b"], vec!["c"]]);
        database.add_table("right", vec!["w"], vec![vec!["x"], vec!["y"], vec!["z"]]);

        let engine = DiscoveryEngine::initialize(&database, DiscoveryConfig::default()).unwrap();
        let mut stream = engine.rules();
        assert_eq!(stream.next(), None);
        assert_eq!(stream.summary().status, DiscoveryStatus::GraphEmpty);
        assert_eq!(stream.summary().rules_emitted, 0);
    }

    #[test]
    fn cancellation_stops_the_stream() {
        let database = clinic();
        let engine = DiscoveryEngine::initialize(&database, tight_config()).unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let mut stream = engine.rules_with_stop(Arc::clone(&stop));

        let first = stream.next();
        assert!(first.is_some());
        stop.store(true, Ordering::Relaxed);
        assert_eq!(stream.next(), None);
        assert_eq!(stream.summary().status, DiscoveryStatus::Cancelled);
        assert_eq!(stream.summary().rules_emitted, 1);
    }

    #[test]
    fn clearing_the_stop_flag_resumes_the_run() {
        let database = clinic();
        let engine = DiscoveryEngine::initialize(&database, tight_config()).unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let mut stream = engine.rules_with_stop(Arc::clone(&stop));

        let before: Vec<TgdRule> = (&mut stream).take(1).collect();
        stop.store(true, Ordering::Relaxed);
        assert_eq!(stream.next(), None);
        assert_eq!(stream.summary().status, DiscoveryStatus::Cancelled);

        stop.store(false, Ordering::Relaxed);
        let after: Vec<TgdRule> = stream.by_ref().collect();
        assert_eq!(stream.summary().status, DiscoveryStatus::Completed);

        let uncancelled: Vec<TgdRule> =
            DiscoveryEngine::initialize(&database, tight_config())
                .unwrap()
                .rules()
                .collect();
        let resumed: Vec<TgdRule> = before.into_iter().chain(after).collect();
        assert_eq!(resumed, uncancelled);
    }

    #[test]
    fn invalid_configuration_fails_before_any_work() {
        let database = clinic();
        let config = DiscoveryConfig {
            max_vars: 0,
            ..Default::default()
        };
        assert!(matches!(
            DiscoveryEngine::initialize(&database, config),
            Err(Error::Config(_))
        ));
    }
}
