//! An in-memory database backend.
//!
//! Tables are held as rows of strings, the way they arrive from csv
//! files; the empty string stands for a null and never compares equal,
//! not even to itself. The backend answers every [DatabaseInspector]
//! operation exactly, including the conjunctive match counts, by
//! nested-loop enumeration — adequate for the dataset sizes rule
//! discovery is run against in tests and experiments.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use thiserror::Error;

use crate::inspector::{ColumnSchema, DatabaseInspector, ForeignKey, InspectorError};
use crate::model::attribute::AttributeType;
use crate::model::rule::RuleQuery;

/// Errors while loading a database from a directory of csv files.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The given path is not a directory
    #[error("\"{0}\" is not a directory")]
    NotADirectory(String),
    /// Errors on reading a file
    #[error("failed to read \"{filename}\": {error}")]
    IoReading {
        /// Contains the wrapped error
        error: std::io::Error,
        /// Filename which caused the error
        filename: String,
    },
    /// Csv parsing error
    #[error("cannot parse \"{filename}\": {error}")]
    Csv {
        /// Filename which caused the error
        filename: String,
        /// The underlying csv error
        error: csv::Error,
    },
    /// The csv file has no header row
    #[error("cannot read headers in csv file \"{0}\"")]
    MissingHeaders(String),
    /// A foreign-key declaration could not be parsed
    #[error("malformed foreign key in \"{filename}\" line {line}: expected \"column -> table.column\"")]
    BadForeignKey {
        /// The sidecar file holding the declaration
        filename: String,
        /// The offending line, 1-based
        line: usize,
    },
    /// A foreign-key declaration references an unknown table or column
    #[error("foreign key in \"{filename}\" references unknown target {table}.{column}")]
    UnknownForeignKeyTarget {
        /// The sidecar file holding the declaration
        filename: String,
        /// The referenced table
        table: String,
        /// The referenced column
        column: String,
    },
}

#[derive(Debug)]
struct MemoryTable {
    name: String,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    foreign_keys: Vec<ForeignKey>,
}

impl MemoryTable {
    fn column_index(&self, column: &str) -> Result<usize, InspectorError> {
        self.columns
            .iter()
            .position(|name| name == column)
            .ok_or_else(|| InspectorError::MissingColumn {
                table: self.name.clone(),
                column: column.to_owned(),
            })
    }

    fn distinct_values(&self, column_index: usize) -> HashSet<&str> {
        self.rows
            .iter()
            .map(|row| row[column_index].as_str())
            .filter(|value| !value.is_empty())
            .collect()
    }
}

/// A database held entirely in memory.
#[derive(Debug)]
pub struct MemoryDatabase {
    name: String,
    tables: Vec<MemoryTable>,
    index: HashMap<String, usize>,
}

impl MemoryDatabase {
    /// Create an empty database with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Add a table. Rows wider or narrower than the column list are
    /// truncated or padded with nulls.
    pub fn add_table<C, R, V>(&mut self, name: &str, columns: C, rows: R)
    where
        C: IntoIterator,
        C::Item: Into<String>,
        R: IntoIterator<Item = V>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|row| {
                let mut row: Vec<String> = row.into_iter().map(Into::into).collect();
                row.resize(width, String::new());
                row
            })
            .collect();

        let table = MemoryTable {
            name: name.to_owned(),
            columns,
            rows,
            foreign_keys: Vec::new(),
        };
        match self.index.get(name) {
            Some(&existing) => self.tables[existing] = table,
            None => {
                self.index.insert(name.to_owned(), self.tables.len());
                self.tables.push(table);
            }
        }
    }

    /// Declare a foreign key from `table.column` to
    /// `referenced_table.referenced_column`.
    pub fn add_foreign_key(
        &mut self,
        table: &str,
        column: &str,
        referenced_table: &str,
        referenced_column: &str,
    ) {
        if let Some(&table_index) = self.index.get(table) {
            self.tables[table_index].foreign_keys.push(ForeignKey {
                column: column.to_owned(),
                referenced_table: referenced_table.to_owned(),
                referenced_column: referenced_column.to_owned(),
            });
        }
    }

    /// Load a database from a directory of `<table>.csv` files.
    ///
    /// The first row of each file names the columns. A `<table>.fk`
    /// sidecar file may declare foreign keys, one per line, in the form
    /// `column -> table.column`; blank lines and lines starting with
    /// `#` are ignored. The database is named after the directory.
    pub fn load_csv_directory(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(LoadError::NotADirectory(path.display().to_string()));
        }

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "database".to_owned());
        let mut database = Self::new(name);

        let mut entries: Vec<_> = std::fs::read_dir(path)
            .map_err(|error| LoadError::IoReading {
                error,
                filename: path.display().to_string(),
            })?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .collect();
        entries.sort();

        for entry in entries.iter().filter(|e| has_extension(e, "csv")) {
            database.load_csv_table(entry)?;
        }
        for entry in entries.iter().filter(|e| has_extension(e, "fk")) {
            database.load_foreign_keys(entry)?;
        }

        log::info!(
            "loaded database \"{}\": {} tables",
            database.name,
            database.tables.len()
        );
        Ok(database)
    }

    fn load_csv_table(&mut self, path: &Path) -> Result<(), LoadError> {
        let filename = path.display().to_string();
        let table_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .ok_or_else(|| LoadError::MissingHeaders(filename.clone()))?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|error| LoadError::Csv {
                filename: filename.clone(),
                error,
            })?;

        let columns: Vec<String> = reader
            .headers()
            .map_err(|error| LoadError::Csv {
                filename: filename.clone(),
                error,
            })?
            .iter()
            .map(str::to_owned)
            .collect();
        if columns.is_empty() {
            return Err(LoadError::MissingHeaders(filename));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|error| LoadError::Csv {
                filename: filename.clone(),
                error,
            })?;
            rows.push(record.iter().map(str::to_owned).collect::<Vec<_>>());
        }

        log::debug!("loaded table \"{table_name}\" with {} rows", rows.len());
        self.add_table(&table_name, columns, rows);
        Ok(())
    }

    fn load_foreign_keys(&mut self, path: &Path) -> Result<(), LoadError> {
        let filename = path.display().to_string();
        let table_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();

        let content = std::fs::read_to_string(path).map_err(|error| LoadError::IoReading {
            error,
            filename: filename.clone(),
        })?;

        for (line_number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let declaration = line
                .split_once("->")
                .map(|(column, target)| (column.trim(), target.trim()))
                .and_then(|(column, target)| {
                    target
                        .split_once('.')
                        .map(|(table, referenced)| (column, table.trim(), referenced.trim()))
                });
            let Some((column, referenced_table, referenced_column)) = declaration else {
                return Err(LoadError::BadForeignKey {
                    filename,
                    line: line_number + 1,
                });
            };

            let target_exists = self
                .index
                .get(referenced_table)
                .map(|&index| {
                    self.tables[index]
                        .columns
                        .iter()
                        .any(|name| name == referenced_column)
                })
                .unwrap_or(false);
            if !target_exists {
                return Err(LoadError::UnknownForeignKeyTarget {
                    filename,
                    table: referenced_table.to_owned(),
                    column: referenced_column.to_owned(),
                });
            }

            self.add_foreign_key(&table_name, column, referenced_table, referenced_column);
        }
        Ok(())
    }

    fn table(&self, name: &str) -> Result<&MemoryTable, InspectorError> {
        self.index
            .get(name)
            .map(|&index| &self.tables[index])
            .ok_or_else(|| InspectorError::MissingTable(name.to_owned()))
    }

    /// Whether the column participates in any declared foreign key,
    /// on either end.
    fn is_key_column(&self, table: &MemoryTable, column: &str) -> bool {
        if table.foreign_keys.iter().any(|fk| fk.column == column) {
            return true;
        }
        self.tables.iter().any(|other| {
            other
                .foreign_keys
                .iter()
                .any(|fk| fk.referenced_table == table.name && fk.referenced_column == column)
        })
    }

    fn column_type(&self, table: &MemoryTable, column_index: usize) -> AttributeType {
        let column = &table.columns[column_index];
        if column == "id" || column.ends_with("_id") || self.is_key_column(table, column) {
            return AttributeType::Identifier;
        }

        let mut any_value = false;
        let all_numeric = table.rows.iter().all(|row| {
            let value = &row[column_index];
            if value.is_empty() {
                true
            } else {
                any_value = true;
                value.parse::<f64>().is_ok()
            }
        });
        if any_value && all_numeric {
            AttributeType::Numeric
        } else {
            AttributeType::Textual
        }
    }

    fn resolve(&self, query: &RuleQuery) -> Result<ResolvedQuery<'_>, InspectorError> {
        let mut occurrences: Vec<((String, usize), &MemoryTable)> = Vec::new();
        for key in query.body_occurrences() {
            let table = self.table(&key.0)?;
            occurrences.push((key, table));
        }
        let body_occurrences = occurrences.len();
        for key in query.head_only_occurrences() {
            let table = self.table(&key.0)?;
            occurrences.push((key, table));
        }

        let resolve_groups = |groups: &[crate::model::rule::QueryGroup]| {
            groups
                .iter()
                .map(|group| {
                    group
                        .positions
                        .iter()
                        .map(|position| {
                            let occurrence = occurrences
                                .iter()
                                .position(|(key, _)| {
                                    key.0 == position.table && key.1 == position.occurrence
                                })
                                .expect("every group position lies in a resolved occurrence");
                            let column = occurrences[occurrence].1.column_index(&position.column)?;
                            Ok(ResolvedPosition { occurrence, column })
                        })
                        .collect::<Result<Vec<_>, InspectorError>>()
                })
                .collect::<Result<Vec<_>, InspectorError>>()
        };

        let body_groups = resolve_groups(query.body())?;
        let head_groups = resolve_groups(query.head())?;

        Ok(ResolvedQuery {
            occurrences,
            body_occurrences,
            body_groups,
            head_groups,
        })
    }

    fn count_matches(&self, query: &RuleQuery, require_head: bool) -> Result<u64, InspectorError> {
        let resolved = self.resolve(query)?;
        let body_sizes: Vec<usize> = resolved.occurrences[..resolved.body_occurrences]
            .iter()
            .map(|(_, table)| table.rows.len())
            .collect();
        let head_sizes: Vec<usize> = resolved.occurrences[resolved.body_occurrences..]
            .iter()
            .map(|(_, table)| table.rows.len())
            .collect();

        let mut count: u64 = 0;
        let mut assignment = vec![0usize; resolved.occurrences.len()];

        let Some(mut body) = Odometer::new(&body_sizes) else {
            return Ok(0);
        };
        loop {
            assignment[..resolved.body_occurrences].copy_from_slice(body.current());

            if resolved.satisfied(&resolved.body_groups, &assignment[..resolved.body_occurrences]) {
                if !require_head {
                    count = count.saturating_add(1);
                } else if head_sizes.is_empty() {
                    if resolved.satisfied(&resolved.head_groups, &assignment) {
                        count = count.saturating_add(1);
                    }
                } else if let Some(mut head) = Odometer::new(&head_sizes) {
                    loop {
                        assignment[resolved.body_occurrences..].copy_from_slice(head.current());
                        if resolved.satisfied(&resolved.head_groups, &assignment) {
                            count = count.saturating_add(1);
                            break;
                        }
                        if !head.advance() {
                            break;
                        }
                    }
                }
            }

            if !body.advance() {
                break;
            }
        }
        Ok(count)
    }
}

#[derive(Debug)]
struct ResolvedPosition {
    occurrence: usize,
    column: usize,
}

#[derive(Debug)]
struct ResolvedQuery<'a> {
    occurrences: Vec<((String, usize), &'a MemoryTable)>,
    body_occurrences: usize,
    body_groups: Vec<Vec<ResolvedPosition>>,
    head_groups: Vec<Vec<ResolvedPosition>>,
}

impl ResolvedQuery<'_> {
    /// Whether every group's positions hold one common non-null value
    /// under the given row assignment. Positions outside the assignment
    /// prefix make the group unsatisfied (they are not bound yet).
    fn satisfied(&self, groups: &[Vec<ResolvedPosition>], assignment: &[usize]) -> bool {
        groups.iter().all(|group| {
            let mut shared: Option<&str> = None;
            group.iter().all(|position| {
                if position.occurrence >= assignment.len() {
                    return false;
                }
                let (_, table) = &self.occurrences[position.occurrence];
                let value = table.rows[assignment[position.occurrence]][position.column].as_str();
                if value.is_empty() {
                    return false;
                }
                match shared {
                    None => {
                        shared = Some(value);
                        true
                    }
                    Some(seen) => seen == value,
                }
            })
        })
    }
}

/// Iterates all assignments of one row index per table, first index
/// fastest. Yields nothing if any table is empty.
#[derive(Debug)]
struct Odometer {
    sizes: Vec<usize>,
    current: Vec<usize>,
}

impl Odometer {
    fn new(sizes: &[usize]) -> Option<Self> {
        if sizes.iter().any(|&size| size == 0) {
            return None;
        }
        Some(Self {
            sizes: sizes.to_vec(),
            current: vec![0; sizes.len()],
        })
    }

    fn current(&self) -> &[usize] {
        &self.current
    }

    fn advance(&mut self) -> bool {
        for (position, size) in self.current.iter_mut().zip(&self.sizes) {
            *position += 1;
            if *position < *size {
                return true;
            }
            *position = 0;
        }
        false
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .map(|found| found.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

impl DatabaseInspector for MemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn tables(&self) -> Vec<String> {
        self.tables.iter().map(|table| table.name.clone()).collect()
    }

    fn columns(&self, table: &str) -> Result<Vec<ColumnSchema>, InspectorError> {
        let table = self.table(table)?;
        Ok(table
            .columns
            .iter()
            .enumerate()
            .map(|(index, name)| ColumnSchema {
                name: name.clone(),
                attribute_type: self.column_type(table, index),
            })
            .collect())
    }

    fn row_count(&self, table: &str) -> Result<u64, InspectorError> {
        Ok(self.table(table)?.rows.len() as u64)
    }

    fn distinct_values(&self, table: &str, column: &str) -> Result<u64, InspectorError> {
        let table = self.table(table)?;
        let column = table.column_index(column)?;
        Ok(table.distinct_values(column).len() as u64)
    }

    fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKey>, InspectorError> {
        Ok(self.table(table)?.foreign_keys.clone())
    }

    fn overlap_ratio(
        &self,
        first: (&str, &str),
        second: (&str, &str),
    ) -> Result<f64, InspectorError> {
        let first_table = self.table(first.0)?;
        let first_values = first_table.distinct_values(first_table.column_index(first.1)?);
        let second_table = self.table(second.0)?;
        let second_values = second_table.distinct_values(second_table.column_index(second.1)?);

        let smaller = first_values.len().min(second_values.len());
        if smaller == 0 {
            return Ok(0.0);
        }
        let common = first_values.intersection(&second_values).count();
        Ok(common as f64 / smaller as f64)
    }

    fn count_body_matches(&self, query: &RuleQuery) -> Result<u64, InspectorError> {
        self.count_matches(query, false)
    }

    fn count_both_matches(&self, query: &RuleQuery) -> Result<u64, InspectorError> {
        self.count_matches(query, true)
    }
}

#[cfg(test)]
mod test {
    use test_log::test;

    use super::*;
    use crate::model::rule::{QueryGroup, QueryPosition};

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

    fn position(table: &str, occurrence: usize, column: &str) -> QueryPosition {
        QueryPosition {
            table: table.to_owned(),
            occurrence,
            column: column.to_owned(),
        }
    }

    fn join_query() -> RuleQuery {
        RuleQuery {
            groups: vec![
                QueryGroup {
                    positions: vec![position("lab", 0, "patient_id"), position("patient", 0, "id")],
                },
                QueryGroup {
                    positions: vec![position("patient", 0, "name")],
                },
            ],
            split: 1,
        }
    }

    #[test]
    fn column_types_are_inferred() {
        let database = clinic();
        let columns = database.columns("patient").unwrap();
        assert_eq!(columns[0].attribute_type, AttributeType::Identifier);
        assert_eq!(columns[1].attribute_type, AttributeType::Textual);

        let columns = database.columns("lab").unwrap();
        assert_eq!(columns[0].attribute_type, AttributeType::Identifier);
        assert_eq!(columns[1].attribute_type, AttributeType::Numeric);
    }

    #[test]
    fn overlap_of_key_and_reference_is_total() {
        let database = clinic();
        let ratio = database
            .overlap_ratio(("lab", "patient_id"), ("patient", "id"))
            .unwrap();
        assert_eq!(ratio, 1.0);
    }

    #[test]
    fn missing_objects_are_reported() {
        let database = clinic();
        assert!(matches!(
            database.row_count("nurse"),
            Err(InspectorError::MissingTable(_))
        ));
        assert!(matches!(
            database.distinct_values("patient", "age"),
            Err(InspectorError::MissingColumn { .. })
        ));
    }

    #[test]
    fn body_matches_count_join_bindings() {
        let database = clinic();
        let query = join_query();
        // each lab row matches exactly one patient row
        assert_eq!(database.count_body_matches(&query).unwrap(), 3);
        assert_eq!(database.count_both_matches(&query).unwrap(), 3);
    }

    #[test]
    fn nulls_never_join() {
        let mut database = MemoryDatabase::new("nulls");
        database.add_table("left", vec!["key"], vec![vec![""], vec!["a"]]);
        database.add_table("right", vec!["key"], vec![vec![""], vec!["a"], vec!["b"]]);

        let query = RuleQuery {
            groups: vec![
                QueryGroup {
                    positions: vec![position("left", 0, "key"), position("right", 0, "key")],
                },
                QueryGroup {
                    positions: vec![position("right", 0, "key")],
                },
            ],
            split: 1,
        };
        assert_eq!(database.count_body_matches(&query).unwrap(), 1);
    }

    #[test]
    fn head_extension_requires_a_witness() {
        let mut database = MemoryDatabase::new("orders");
        database.add_table("customer", vec!["id"], vec![vec!["1"], vec!["2"]]);
        database.add_table("order", vec!["customer_id"], vec![vec!["1"]]);

        // body: every customer row; head: an order of that customer
        let query = RuleQuery {
            groups: vec![
                QueryGroup {
                    positions: vec![position("customer", 0, "id")],
                },
                QueryGroup {
                    positions: vec![position("customer", 0, "id"), position("order", 0, "customer_id")],
                },
            ],
            split: 1,
        };
        assert_eq!(database.count_body_matches(&query).unwrap(), 2);
        assert_eq!(database.count_both_matches(&query).unwrap(), 1);
    }

    #[test]
    fn csv_directory_loading() {
        let directory = std::env::temp_dir().join(format!("remora-memory-{}", std::process::id()));
        std::fs::create_dir_all(&directory).unwrap();
        std::fs::write(directory.join("city.csv"), "id,name\n1,lyon\n2,metz\n").unwrap();
        std::fs::write(directory.join("person.csv"), "id,city_id\n10,1\n11,2\n12,1\n").unwrap();
        std::fs::write(directory.join("person.fk"), "# home town\ncity_id -> city.id\n").unwrap();

        let database = MemoryDatabase::load_csv_directory(&directory).unwrap();
        assert_eq!(database.tables(), vec!["city", "person"]);
        assert_eq!(database.row_count("person").unwrap(), 3);
        assert_eq!(
            database.foreign_keys("person").unwrap(),
            vec![ForeignKey {
                column: "city_id".to_owned(),
                referenced_table: "city".to_owned(),
                referenced_column: "id".to_owned(),
            }]
        );

        std::fs::remove_dir_all(&directory).ok();
    }
}
