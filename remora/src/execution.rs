//! The discovery engine: configuration, candidate validation, traversal
//! strategies, metric evaluation, and the lazy rule stream.

pub mod config;
pub mod engine;
pub mod heuristics;
pub mod scoring;
pub mod traversal;
pub mod validator;

pub use config::DiscoveryConfig;
pub use engine::{DiscoveryEngine, DiscoveryStatus, DiscoverySummary, RuleStream, SkipReason};
