//! SQLite backing store

use std::path::{Path, PathBuf};

use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use tracing::{debug, warn};

use super::{quote_identifier, BackingStore, ColumnInfo, Record, SqlStatement, Value};
use crate::schema::Table;
use crate::DataError;

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(s) => Value::Text(String::from_utf8_lossy(s).into_owned()),
            ValueRef::Blob(b) => Value::Text(format!("<{} bytes>", b.len())),
        }
    }
}

/// SQLite database, on disk or in memory
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DataError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)
            .map_err(|e| DataError::Sqlite(format!("Failed to open SQLite database {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Opened SQLite store");
        Ok(Self { conn, path: Some(path) })
    }

    pub fn open_in_memory() -> Result<Self, DataError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn, path: None })
    }

    /// Source name for display
    pub fn source_name(&self) -> &str {
        self.path
            .as_ref()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or(":memory:")
    }

    /// Run one or more statements that return no rows
    pub fn execute_batch(&self, sql: &str) -> Result<(), DataError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn create(&self, table: &Table, if_missing: bool) -> Result<(), DataError> {
        let columns: Vec<String> = table
            .columns
            .iter()
            .map(|c| {
                let mut def = format!("{} {}", quote_identifier(&c.name), c.column_type.sql_type());
                if !c.nullable {
                    def.push_str(" NOT NULL");
                }
                def
            })
            .collect();
        let guard = if if_missing { "IF NOT EXISTS " } else { "" };
        let sql = format!("CREATE TABLE {}{} ({})", guard, quote_identifier(&table.name), columns.join(", "));
        debug!(%sql, "Creating table");
        self.conn.execute(&sql, [])?;
        Ok(())
    }
}

const SAVEPOINT: &str = "abada_write";

fn insert_sql(table: &str, width: usize) -> String {
    let placeholders = vec!["?"; width].join(", ");
    format!("INSERT INTO {} VALUES ({})", quote_identifier(table), placeholders)
}

impl BackingStore for SqliteStore {
    fn list_tables(&self) -> Result<Vec<String>, DataError> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, DataError> {
        let query = format!("PRAGMA table_info({})", quote_identifier(table));
        let mut stmt = self.conn.prepare(&query)?;
        let columns = stmt
            .query_map([], |row| {
                Ok(ColumnInfo {
                    name: row.get::<_, String>(1)?,
                    declared_type: row.get::<_, String>(2)?,
                    nullable: row.get::<_, i32>(3)? == 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if columns.is_empty() {
            return Err(DataError::NotFound(format!("table '{}'", table)));
        }
        Ok(columns)
    }

    fn read(&self, statement: &SqlStatement) -> Result<Vec<Record>, DataError> {
        debug!(sql = %statement.text, params = statement.params.len(), "Reading");
        let mut stmt = self.conn.prepare(&statement.text)?;
        if !stmt.readonly() {
            return Err(DataError::GuardRejected("statement would modify the database".to_string()));
        }
        let width = stmt.column_count();

        let mut rows = stmt.query(params_from_iter(statement.params.iter()))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Vec::with_capacity(width);
            for idx in 0..width {
                record.push(Value::from(row.get_ref(idx)?));
            }
            records.push(record);
        }
        Ok(records)
    }

    fn count(&self, statement: &SqlStatement) -> Result<usize, DataError> {
        debug!(sql = %statement.text, "Counting");
        let count: i64 = self
            .conn
            .query_row(&statement.text, params_from_iter(statement.params.iter()), |row| row.get(0))?;
        Ok(count as usize)
    }

    fn insert(&self, table: &str, values: &[Value]) -> Result<(), DataError> {
        let sql = insert_sql(table, values.len());
        debug!(%sql, "Inserting");
        self.conn.execute(&sql, params_from_iter(values.iter()))?;
        Ok(())
    }

    fn delete(&self, statement: &SqlStatement) -> Result<usize, DataError> {
        debug!(sql = %statement.text, params = statement.params.len(), "Deleting");
        let removed = self
            .conn
            .execute(&statement.text, params_from_iter(statement.params.iter()))?;
        Ok(removed)
    }

    fn create_table(&self, table: &Table) -> Result<(), DataError> {
        self.create(table, false)
    }

    fn create_table_if_missing(&self, table: &Table) -> Result<(), DataError> {
        self.create(table, true)
    }

    fn insert_many(&self, table: &str, rows: &[Record]) -> Result<usize, DataError> {
        let Some(width) = rows.first().map(Vec::len) else {
            return Ok(0);
        };
        self.atomically(|store| {
            let mut stmt = store.conn.prepare(&insert_sql(table, width))?;
            for row in rows {
                stmt.execute(params_from_iter(row.iter()))?;
            }
            Ok(rows.len())
        })
    }

    /// Savepoints rather than transactions, so sections nest
    fn atomically<T, F>(&self, f: F) -> Result<T, DataError>
    where
        F: FnOnce(&Self) -> Result<T, DataError>,
    {
        self.conn.execute_batch(&format!("SAVEPOINT {}", SAVEPOINT))?;
        match f(self) {
            Ok(value) => {
                self.conn.execute_batch(&format!("RELEASE {}", SAVEPOINT))?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self
                    .conn
                    .execute_batch(&format!("ROLLBACK TO {0}; RELEASE {0}", SAVEPOINT))
                {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }
}
