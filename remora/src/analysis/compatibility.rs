//! Attribute-compatibility analysis.
//!
//! Two attributes are compatible when a candidate rule may assert them
//! to carry the same variable. This reduces the exponential space of
//! possible joins to the semantically meaningful ones: the coarse type
//! classes must agree, and there has to be domain evidence — a declared
//! foreign key between the two columns, or sufficient overlap between
//! their value sets. The resulting relation is symmetric and is
//! computed once per discovery run.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::inspector::{retry_once, DatabaseInspector};
use crate::model::attribute::{AttributeCatalog, AttributeId};

/// Which kinds of domain evidence establish compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvidenceMode {
    /// Only declared foreign keys
    ForeignKeys,
    /// Only value overlap above the threshold
    Overlap,
    /// Either of the two
    #[default]
    Hybrid,
}

impl std::fmt::Display for EvidenceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvidenceMode::ForeignKeys => write!(f, "foreign-keys"),
            EvidenceMode::Overlap => write!(f, "overlap"),
            EvidenceMode::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Tunables of the compatibility analysis.
#[derive(Debug, Clone, Copy)]
pub struct CompatibilitySettings {
    /// Which domain evidence to accept
    pub mode: EvidenceMode,
    /// Minimum overlap ratio for overlap evidence
    pub tau_overlap: f64,
    /// Minimum number of common values; rejects tiny-cardinality noise
    pub overlap_floor: u64,
}

/// The symmetric compatibility relation over the interned attributes.
#[derive(Debug)]
pub struct CompatibilityMatrix {
    neighbors: Vec<BTreeSet<AttributeId>>,
}

impl CompatibilityMatrix {
    /// Compute the relation for all attribute pairs of the catalog.
    ///
    /// Backend failures while gathering evidence are retried once and
    /// then downgrade the affected pair to incompatible; they never
    /// abort the analysis.
    pub fn analyze(
        inspector: &dyn DatabaseInspector,
        catalog: &AttributeCatalog,
        settings: &CompatibilitySettings,
    ) -> Self {
        let mut matrix = Self {
            neighbors: vec![BTreeSet::new(); catalog.attribute_count()],
        };
        let foreign_key_pairs = declared_foreign_key_pairs(inspector, catalog);

        let attributes: Vec<AttributeId> = catalog.attribute_ids().collect();
        for (index, &first) in attributes.iter().enumerate() {
            for &second in &attributes[index..] {
                if matrix.pair_is_compatible(inspector, catalog, settings, &foreign_key_pairs, first, second)
                {
                    matrix.neighbors[first.index()].insert(second);
                    matrix.neighbors[second.index()].insert(first);
                }
            }
        }

        log::info!(
            "compatibility analysis: {} compatible pairs over {} attributes",
            matrix.pair_count(),
            catalog.attribute_count()
        );
        matrix
    }

    fn pair_is_compatible(
        &self,
        inspector: &dyn DatabaseInspector,
        catalog: &AttributeCatalog,
        settings: &CompatibilitySettings,
        foreign_key_pairs: &BTreeSet<(AttributeId, AttributeId)>,
        first: AttributeId,
        second: AttributeId,
    ) -> bool {
        let first_attribute = catalog.attribute(first);
        let second_attribute = catalog.attribute(second);

        // empty attributes join with nothing, not even themselves
        if first_attribute.distinct_values == 0 || second_attribute.distinct_values == 0 {
            return false;
        }

        // identical references are trivially compatible (self-joins)
        if first == second {
            return true;
        }

        if first_attribute.attribute_type != second_attribute.attribute_type {
            return false;
        }

        let foreign_key_evidence = foreign_key_pairs.contains(&(first, second))
            || foreign_key_pairs.contains(&(second, first));
        if foreign_key_evidence && settings.mode != EvidenceMode::Overlap {
            return true;
        }
        if settings.mode == EvidenceMode::ForeignKeys {
            return false;
        }

        let first_name = (
            catalog.table(first_attribute.table).name.as_str(),
            first_attribute.column.as_str(),
        );
        let second_name = (
            catalog.table(second_attribute.table).name.as_str(),
            second_attribute.column.as_str(),
        );
        let ratio = match retry_once(|| inspector.overlap_ratio(first_name, second_name)) {
            Ok(ratio) => ratio,
            Err(error) => {
                log::debug!(
                    "overlap of {}.{} and {}.{} unavailable, treating as incompatible: {error}",
                    first_name.0,
                    first_name.1,
                    second_name.0,
                    second_name.1
                );
                return false;
            }
        };

        let smaller_domain = first_attribute
            .distinct_values
            .min(second_attribute.distinct_values);
        let common_values = (ratio * smaller_domain as f64).round() as u64;
        ratio >= settings.tau_overlap && common_values >= settings.overlap_floor
    }

    /// Whether the two attributes may share a variable.
    pub fn compatible(&self, first: AttributeId, second: AttributeId) -> bool {
        self.neighbors[first.index()].contains(&second)
    }

    /// The attributes compatible with the given one, in ascending order.
    pub fn neighbors(&self, attribute: AttributeId) -> impl Iterator<Item = AttributeId> + '_ {
        self.neighbors[attribute.index()].iter().copied()
    }

    /// Number of unordered compatible pairs, the diagonal included.
    pub fn pair_count(&self) -> usize {
        let ordered: usize = self.neighbors.iter().map(BTreeSet::len).sum();
        let diagonal = self
            .neighbors
            .iter()
            .enumerate()
            .filter(|(index, neighbors)| neighbors.contains(&AttributeId(*index)))
            .count();
        (ordered - diagonal) / 2 + diagonal
    }

    /// The relation keyed by qualified attribute names, the shape of
    /// the `compatibility_<db>.json` side file. Self-loops are omitted.
    pub fn export(&self, catalog: &AttributeCatalog) -> BTreeMap<String, Vec<String>> {
        let mut exported = BTreeMap::new();
        for attribute in catalog.attribute_ids() {
            let neighbors: Vec<String> = self
                .neighbors(attribute)
                .filter(|&neighbor| neighbor != attribute)
                .map(|neighbor| catalog.qualified_name(neighbor))
                .collect();
            if !neighbors.is_empty() {
                exported.insert(catalog.qualified_name(attribute), neighbors);
            }
        }
        exported
    }
}

/// Collect the declared foreign keys as attribute-id pairs.
fn declared_foreign_key_pairs(
    inspector: &dyn DatabaseInspector,
    catalog: &AttributeCatalog,
) -> BTreeSet<(AttributeId, AttributeId)> {
    let mut pairs = BTreeSet::new();
    for table_id in catalog.table_ids() {
        let table = catalog.table(table_id);
        let foreign_keys = match retry_once(|| inspector.foreign_keys(&table.name)) {
            Ok(foreign_keys) => foreign_keys,
            Err(error) => {
                log::warn!("could not read foreign keys of \"{}\": {error}", table.name);
                continue;
            }
        };

        for foreign_key in foreign_keys {
            let local = catalog.attribute_id(table_id, &foreign_key.column);
            let referenced = catalog
                .table_id(&foreign_key.referenced_table)
                .and_then(|referenced_table| {
                    catalog.attribute_id(referenced_table, &foreign_key.referenced_column)
                });
            match (local, referenced) {
                (Some(local), Some(referenced)) => {
                    pairs.insert((local, referenced));
                }
                _ => log::warn!(
                    "foreign key {}.{} -> {}.{} references unknown attributes, ignoring",
                    table.name,
                    foreign_key.column,
                    foreign_key.referenced_table,
                    foreign_key.referenced_column
                ),
            }
        }
    }
    pairs
}
