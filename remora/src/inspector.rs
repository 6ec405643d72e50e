//! Read-only access to the schema and contents of the database under
//! inspection.
//!
//! The discovery engine never talks to a database directly; everything
//! it needs is behind the narrow [DatabaseInspector] trait, so backends
//! can range from the bundled [in-memory store][memory::MemoryDatabase]
//! to a live connection. Inspector failures during metric evaluation
//! are data-level rejections of the offending rule, not fatal errors.

pub mod memory;

use thiserror::Error;

use crate::model::attribute::AttributeType;
use crate::model::rule::RuleQuery;

/// Errors reported by a database backend.
#[derive(Error, Debug, Clone)]
pub enum InspectorError {
    /// A referenced table does not exist
    #[error("table \"{0}\" does not exist")]
    MissingTable(String),
    /// A referenced column does not exist
    #[error("column \"{column}\" does not exist in table \"{table}\"")]
    MissingColumn {
        /// The table that was inspected
        table: String,
        /// The column that could not be found
        column: String,
    },
    /// Any other backend failure; treated as transient and retried once
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Schema information about a single column.
#[derive(Debug, Clone)]
pub struct ColumnSchema {
    /// Column name
    pub name: String,
    /// The coarse type class of the column
    pub attribute_type: AttributeType,
}

/// A declared foreign key of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// The local column holding the reference
    pub column: String,
    /// The table being referenced
    pub referenced_table: String,
    /// The column being referenced
    pub referenced_column: String,
}

/// Read-only view of a relational database.
///
/// Implementations must be safe for concurrent read calls if the host
/// parallelizes discovery runs; the engine itself never mutates the
/// database and issues calls from a single thread.
pub trait DatabaseInspector: std::fmt::Debug {
    /// A name identifying the database, used in side-file names.
    fn name(&self) -> &str;

    /// The table names, in a stable order.
    fn tables(&self) -> Vec<String>;

    /// The columns of a table, in a stable order.
    fn columns(&self, table: &str) -> Result<Vec<ColumnSchema>, InspectorError>;

    /// Number of rows of a table.
    fn row_count(&self, table: &str) -> Result<u64, InspectorError>;

    /// Number of distinct non-null values of a column.
    fn distinct_values(&self, table: &str, column: &str) -> Result<u64, InspectorError>;

    /// The declared foreign keys of a table.
    fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>, InspectorError>;

    /// The fraction `|values(a) ∩ values(b)| / min(|values(a)|, |values(b)|)`
    /// over distinct non-null values, in `[0, 1]`. Backends may compute
    /// this by the cheapest available means (index, bloom filter,
    /// sampling).
    fn overlap_ratio(
        &self,
        first: (&str, &str),
        second: (&str, &str),
    ) -> Result<f64, InspectorError>;

    /// Number of bindings of the body's table occurrences that satisfy
    /// every body constraint of the query.
    fn count_body_matches(&self, query: &RuleQuery) -> Result<u64, InspectorError>;

    /// Number of body bindings that additionally extend to at least one
    /// assignment of the head-only table occurrences satisfying every
    /// head constraint. Never exceeds [count_body_matches][Self::count_body_matches].
    fn count_both_matches(&self, query: &RuleQuery) -> Result<u64, InspectorError>;
}

/// Run a backend call, retrying once when the failure is transient.
/// Missing tables or columns are not retried.
pub(crate) fn retry_once<T>(
    mut call: impl FnMut() -> Result<T, InspectorError>,
) -> Result<T, InspectorError> {
    match call() {
        Err(InspectorError::Backend(message)) => {
            log::debug!("retrying backend call after failure: {message}");
            call()
        }
        result => result,
    }
}
