//! Load a flat CSV file into a new table so it can be browsed like any other

use std::path::Path;

use csv::ReaderBuilder;
use tracing::info;

use crate::query::parse_number;
use crate::schema::{ColumnType, SchemaDetector, Table};
use crate::store::{BackingStore, Record, SqliteStore, Value};
use crate::DataError;

/// Create `table_name` from the header of `path` and insert every row.
/// Column types are inferred with `detector`. Creation and load are one
/// atomic section, so a failed import leaves no table behind.
pub fn import_csv(
    store: &SqliteStore,
    path: &Path,
    table_name: &str,
    detector: &SchemaDetector,
) -> Result<Table, DataError> {
    let mut reader = ReaderBuilder::new().has_headers(true).flexible(true).from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    if headers.is_empty() || headers.iter().any(String::is_empty) {
        return Err(DataError::Validation(format!("{} has an empty column header", path.display())));
    }

    let mut raw_rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        raw_rows.push(record?.iter().map(str::to_string).collect());
    }

    let columns = detector.detect_from_samples(&headers, &raw_rows);
    let table = Table::new(table_name, columns);

    let rows: Vec<Record> = raw_rows
        .iter()
        .map(|raw| {
            table
                .columns
                .iter()
                .enumerate()
                .map(|(idx, column)| {
                    let cell = raw.get(idx).map(|v| v.trim()).unwrap_or("");
                    if cell.is_empty() {
                        return Value::Null;
                    }
                    match column.column_type {
                        ColumnType::Numeric => parse_number(cell).unwrap_or_else(|| Value::Text(cell.to_string())),
                        ColumnType::Text => Value::Text(cell.to_string()),
                    }
                })
                .collect()
        })
        .collect();

    let inserted = store.atomically(|store| {
        store.create_table(&table)?;
        store.insert_many(table_name, &rows)
    })?;
    info!(path = %path.display(), table = table_name, rows = inserted, "Imported CSV");
    Ok(table)
}
