//! Schema introspection and column type detection

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::store::{BackingStore, ColumnInfo};
use crate::DataError;

/// How filter text for a column is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    Numeric,
}

impl ColumnType {
    /// Map a declared SQL type by SQLite affinity rules. Date and time
    /// columns are compared as text.
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.to_uppercase();
        if upper.contains("CHAR") || upper.contains("TEXT") || upper.contains("CLOB") {
            return ColumnType::Text;
        }
        if upper.contains("DATE") || upper.contains("TIME") {
            return ColumnType::Text;
        }
        const NUMERIC_MARKERS: [&str; 7] = ["INT", "REAL", "FLOA", "DOUB", "NUM", "DEC", "BOOL"];
        if NUMERIC_MARKERS.iter().any(|m| upper.contains(m)) {
            ColumnType::Numeric
        } else {
            ColumnType::Text
        }
    }

    /// Type name used when this workspace creates a table
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Numeric => "NUMERIC",
        }
    }
}

/// A column of a browsable table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self { name: name.into(), column_type, nullable: true }
    }
}

impl From<ColumnInfo> for Column {
    fn from(info: ColumnInfo) -> Self {
        Self {
            column_type: ColumnType::from_declared(&info.declared_type),
            name: info.name,
            nullable: info.nullable,
        }
    }
}

/// A table and its columns in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self { name: name.into(), columns }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Reads table and column definitions from a backing store
pub struct SchemaCatalog<'a, S: BackingStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: BackingStore + ?Sized> SchemaCatalog<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn list_tables(&self) -> Result<Vec<String>, DataError> {
        self.store.list_tables()
    }

    /// Current definition of `name`; `NotFound` if it has been dropped
    pub fn describe(&self, name: &str) -> Result<Table, DataError> {
        let columns: Vec<Column> = self
            .store
            .list_columns(name)?
            .into_iter()
            .map(Column::from)
            .collect();
        debug!(table = name, columns = columns.len(), "Described table");
        Ok(Table::new(name, columns))
    }
}

/// Infers column types from sampled text values
pub struct SchemaDetector {
    sample_size: usize,
}

impl SchemaDetector {
    pub fn new() -> Self {
        Self { sample_size: 1000 }
    }

    /// Set the number of rows looked at per column
    pub fn with_sample_size(mut self, size: usize) -> Self {
        self.sample_size = size.max(1);
        self
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Detect column definitions from headers and sample rows.
    ///
    /// A column is numeric when every non-empty sampled value parses as a
    /// number; a column with an empty cell is nullable.
    pub fn detect_from_samples(&self, headers: &[String], samples: &[Vec<String>]) -> Vec<Column> {
        headers
            .iter()
            .enumerate()
            .map(|(idx, header)| {
                let mut nullable = false;
                let mut numeric = true;
                let mut seen = 0;
                for row in samples.iter().take(self.sample_size) {
                    match row.get(idx).map(|v| v.trim()) {
                        None | Some("") => nullable = true,
                        Some(value) => {
                            seen += 1;
                            if value.parse::<f64>().map_or(true, |f| !f.is_finite()) {
                                numeric = false;
                            }
                        }
                    }
                }
                Column {
                    name: header.clone(),
                    column_type: if numeric && seen > 0 { ColumnType::Numeric } else { ColumnType::Text },
                    nullable,
                }
            })
            .collect()
    }
}

impl Default for SchemaDetector {
    fn default() -> Self {
        Self::new()
    }
}
