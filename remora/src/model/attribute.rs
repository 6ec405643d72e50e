//! Canonical identifiers for the `(table, column)` pairs of a schema.
//!
//! Every attribute is interned into a dense [AttributeId] at startup.
//! The [AttributeCatalog] keeps the bijection between names and ids
//! together with the per-table and per-attribute statistics that the
//! compatibility analysis and the traversal heuristics consume, so that
//! the backend is not queried again for them during discovery.

use std::collections::HashMap;
use std::fmt;

use crate::inspector::{DatabaseInspector, InspectorError};

/// The coarse type class of an attribute.
///
/// Fine-grained backend types map onto these three classes; two
/// attributes can only share a variable if their classes agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    /// Numbers of any width or precision
    Numeric,
    /// Free-form text
    Textual,
    /// Key-like values (primary keys, foreign keys, surrogate ids)
    Identifier,
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeType::Numeric => write!(f, "numeric"),
            AttributeType::Textual => write!(f, "textual"),
            AttributeType::Identifier => write!(f, "identifier"),
        }
    }
}

/// Dense id of an interned table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableId(pub(crate) usize);

impl TableId {
    /// Return the id as a plain index.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Dense id of an interned `(table, column)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttributeId(pub(crate) usize);

impl AttributeId {
    /// Return the id as a plain index.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// An interned attribute together with its cached statistics.
#[derive(Debug, Clone)]
pub struct Attribute {
    /// The table the attribute belongs to
    pub table: TableId,
    /// The column name within the table
    pub column: String,
    /// The coarse type class
    pub attribute_type: AttributeType,
    /// Number of distinct non-null values in the column
    pub distinct_values: u64,
}

/// An interned table together with its cached statistics.
#[derive(Debug, Clone)]
pub struct Table {
    /// The table name
    pub name: String,
    /// Number of rows
    pub row_count: u64,
    /// The attributes of the table, in column order
    pub columns: Vec<AttributeId>,
}

/// The interner for tables and attributes of one database.
///
/// Built once per discovery run from a [DatabaseInspector]; read-only
/// afterwards and shared by reference throughout traversal.
#[derive(Debug)]
pub struct AttributeCatalog {
    tables: Vec<Table>,
    attributes: Vec<Attribute>,
    table_index: HashMap<String, TableId>,
    attribute_index: HashMap<(TableId, String), AttributeId>,
}

impl AttributeCatalog {
    /// Intern the full schema of the given database, caching row counts
    /// and distinct-value counts along the way.
    ///
    /// Missing tables or columns reported by the backend at this stage
    /// are fatal; discovery cannot start against an unknown schema.
    pub fn from_inspector(inspector: &dyn DatabaseInspector) -> Result<Self, InspectorError> {
        let mut catalog = Self {
            tables: Vec::new(),
            attributes: Vec::new(),
            table_index: HashMap::new(),
            attribute_index: HashMap::new(),
        };

        for table_name in inspector.tables() {
            let table_id = TableId(catalog.tables.len());
            let row_count = inspector.row_count(&table_name)?;

            let mut columns = Vec::new();
            for column in inspector.columns(&table_name)? {
                let attribute_id = AttributeId(catalog.attributes.len());
                let distinct_values = inspector.distinct_values(&table_name, &column.name)?;

                catalog
                    .attribute_index
                    .insert((table_id, column.name.clone()), attribute_id);
                catalog.attributes.push(Attribute {
                    table: table_id,
                    column: column.name,
                    attribute_type: column.attribute_type,
                    distinct_values,
                });
                columns.push(attribute_id);
            }

            catalog.table_index.insert(table_name.clone(), table_id);
            catalog.tables.push(Table {
                name: table_name,
                row_count,
                columns,
            });
        }

        log::debug!(
            "interned {} attributes across {} tables",
            catalog.attributes.len(),
            catalog.tables.len()
        );

        Ok(catalog)
    }

    /// Number of interned tables.
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Number of interned attributes.
    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    /// Resolve a table id.
    pub fn table(&self, id: TableId) -> &Table {
        &self.tables[id.0]
    }

    /// Resolve an attribute id.
    pub fn attribute(&self, id: AttributeId) -> &Attribute {
        &self.attributes[id.0]
    }

    /// Look up a table by name.
    pub fn table_id(&self, name: &str) -> Option<TableId> {
        self.table_index.get(name).copied()
    }

    /// Look up an attribute by table id and column name.
    pub fn attribute_id(&self, table: TableId, column: &str) -> Option<AttributeId> {
        self.attribute_index.get(&(table, column.to_owned())).copied()
    }

    /// Iterate over all attribute ids in interning order.
    pub fn attribute_ids(&self) -> impl Iterator<Item = AttributeId> {
        (0..self.attributes.len()).map(AttributeId)
    }

    /// Iterate over all table ids in interning order.
    pub fn table_ids(&self) -> impl Iterator<Item = TableId> {
        (0..self.tables.len()).map(TableId)
    }

    /// The `<table>___sep___<column>` key used in exported artifacts.
    pub fn qualified_name(&self, id: AttributeId) -> String {
        let attribute = self.attribute(id);
        format!(
            "{}{}{}",
            self.table(attribute.table).name,
            crate::model::tgd::COLUMN_SEPARATOR,
            attribute.column
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::inspector::memory::MemoryDatabase;

    fn two_table_database() -> MemoryDatabase {
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
        database
    }

    #[test]
    fn interning_is_dense_and_reversible() {
        let database = two_table_database();
        let catalog = AttributeCatalog::from_inspector(&database).unwrap();

        assert_eq!(catalog.table_count(), 2);
        assert_eq!(catalog.attribute_count(), 4);

        let patient = catalog.table_id("patient").unwrap();
        let id = catalog.attribute_id(patient, "id").unwrap();
        assert_eq!(catalog.attribute(id).column, "id");
        assert_eq!(catalog.table(catalog.attribute(id).table).name, "patient");
    }

    #[test]
    fn statistics_are_cached() {
        let database = two_table_database();
        let catalog = AttributeCatalog::from_inspector(&database).unwrap();

        let patient = catalog.table_id("patient").unwrap();
        assert_eq!(catalog.table(patient).row_count, 3);

        let id = catalog.attribute_id(patient, "id").unwrap();
        assert_eq!(catalog.attribute(id).distinct_values, 3);
    }

    #[test]
    fn qualified_names_use_the_separator() {
        let database = two_table_database();
        let catalog = AttributeCatalog::from_inspector(&database).unwrap();

        let lab = catalog.table_id("lab").unwrap();
        let value = catalog.attribute_id(lab, "value").unwrap();
        assert_eq!(catalog.qualified_name(value), "lab___sep___value");
    }
}
