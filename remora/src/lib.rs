//! A rule-mining engine that discovers tuple-generating dependencies
//! (TGDs) — implications of the form `∀x. body(x) ⇒ ∃y. head(x, y)` —
//! from the contents of a relational database.
//!
//! Discovery proceeds in two phases. During initialization the engine
//! interns the schema into an [attribute catalog][model::attribute::AttributeCatalog],
//! computes which attribute pairs may share a variable
//! ([compatibility analysis][analysis::compatibility]), and builds the
//! [constraint graph][graph::ConstraintGraph] whose nodes are joined
//! indexed attributes and whose edges encode the legal one-step
//! extensions of a candidate rule. Afterwards a
//! [traversal strategy][execution::traversal::TraversalStrategy]
//! enumerates paths through the graph, and every path that is satisfied
//! by the data above the configured support and confidence thresholds
//! is materialized into a [TGD record][model::tgd::TgdRule].
//!
//! The database itself stays behind the read-only
//! [`DatabaseInspector`][inspector::DatabaseInspector] trait; the crate
//! ships an [in-memory backend][inspector::memory::MemoryDatabase] that
//! can be loaded from a directory of csv files.

#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts
)]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    variant_size_differences
)]

pub mod error;
pub mod inspector;
pub mod model;

pub mod analysis;
pub mod execution;
pub mod graph;
pub mod io;
