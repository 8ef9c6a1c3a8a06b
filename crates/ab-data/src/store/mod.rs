//! Backing store interface

mod sqlite;

pub use sqlite::SqliteStore;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::Table;
use crate::DataError;

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Real(f) => Some(*f),
            _ => None,
        }
    }

    /// SQL literal form, used only for display
    pub fn to_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Real(f) => f.to_string(),
            Value::Text(s) => format!("'{}'", s.replace('\'', "''")),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("None"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// One row, aligned with the column list it was read with
pub type Record = Vec<Value>;

/// Statement text with positional `?` parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub text: String,
    pub params: Vec<Value>,
}

impl SqlStatement {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), params: Vec::new() }
    }

    pub fn with_params(text: impl Into<String>, params: Vec<Value>) -> Self {
        Self { text: text.into(), params }
    }
}

/// Column description as reported by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    pub nullable: bool,
}

/// Quote an identifier for use in statement text
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Relational store the browser reads from and writes to.
///
/// Every call is synchronous and all-or-nothing.
pub trait BackingStore {
    fn list_tables(&self) -> Result<Vec<String>, DataError>;

    /// Columns of `table` in declaration order; `NotFound` if the table is gone
    fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, DataError>;

    /// Run a read-only statement
    fn read(&self, statement: &SqlStatement) -> Result<Vec<Record>, DataError>;

    /// Run a statement that yields a single count
    fn count(&self, statement: &SqlStatement) -> Result<usize, DataError>;

    /// Insert one row, one value per column
    fn insert(&self, table: &str, values: &[Value]) -> Result<(), DataError>;

    /// Run a delete statement; returns the number of rows removed
    fn delete(&self, statement: &SqlStatement) -> Result<usize, DataError>;

    /// Create `table`; an existing table of that name is an error
    fn create_table(&self, table: &Table) -> Result<(), DataError>;

    /// Create `table` unless a table of that name already exists
    fn create_table_if_missing(&self, table: &Table) -> Result<(), DataError>;

    /// Insert many rows; nothing is kept if any row fails
    fn insert_many(&self, table: &str, rows: &[Record]) -> Result<usize, DataError>;

    /// Run `f` so that either all of its writes land or none do.
    /// Sections may nest.
    fn atomically<T, F>(&self, f: F) -> Result<T, DataError>
    where
        Self: Sized,
        F: FnOnce(&Self) -> Result<T, DataError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("events"), "\"events\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_value_literals() {
        assert_eq!(Value::Text("it's".into()).to_literal(), "'it''s'");
        assert_eq!(Value::Integer(3).to_literal(), "3");
        assert_eq!(Value::Null.to_string(), "None");
        assert_eq!(Value::Integer(3).as_f64(), Some(3.0));
    }
}
