//! Columnar view of browser rows for plotting and export collaborators

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Builder, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use crate::schema::{ColumnType, Table};
use crate::store::{Record, Value};
use crate::DataError;

/// Arrow schema for a table: numeric columns are `Float64`, the rest `Utf8`
pub fn arrow_schema(table: &Table) -> Schema {
    let fields: Vec<Field> = table
        .columns
        .iter()
        .map(|c| {
            let data_type = match c.column_type {
                ColumnType::Numeric => DataType::Float64,
                ColumnType::Text => DataType::Utf8,
            };
            Field::new(&c.name, data_type, true)
        })
        .collect();
    Schema::new(fields)
}

/// Convert rows read with `table`'s column list into a record batch
pub fn rows_to_batch(table: &Table, rows: &[Record]) -> Result<RecordBatch, DataError> {
    let schema = Arc::new(arrow_schema(table));
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(table.columns.len());

    for (col_idx, column) in table.columns.iter().enumerate() {
        let cells = rows.iter().map(|row| row.get(col_idx).unwrap_or(&Value::Null));
        let array: ArrayRef = match column.column_type {
            ColumnType::Numeric => {
                let mut builder = Float64Builder::with_capacity(rows.len());
                for cell in cells {
                    builder.append_option(cell.as_f64());
                }
                Arc::new(builder.finish())
            }
            ColumnType::Text => {
                let mut builder = StringBuilder::new();
                for cell in cells {
                    match cell {
                        Value::Null => builder.append_null(),
                        other => builder.append_value(other.to_string()),
                    }
                }
                Arc::new(builder.finish())
            }
        };
        columns.push(array);
    }

    RecordBatch::try_new(schema, columns).map_err(|e| e.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Column;
    use arrow::array::{Array, Float64Array, StringArray};

    #[test]
    fn test_rows_to_batch() {
        let table = Table::new(
            "events",
            vec![Column::new("id", ColumnType::Numeric), Column::new("label", ColumnType::Text)],
        );
        let rows = vec![
            vec![Value::Integer(1), Value::Text("foo".into())],
            vec![Value::Real(2.5), Value::Null],
            vec![Value::Text("oops".into())],
        ];
        let batch = rows_to_batch(&table, &rows).unwrap();
        assert_eq!(batch.num_rows(), 3);

        let ids = batch.column(0).as_any().downcast_ref::<Float64Array>().unwrap();
        assert_eq!(ids.value(0), 1.0);
        assert_eq!(ids.value(1), 2.5);
        assert!(ids.is_null(2));

        let labels = batch.column(1).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(labels.value(0), "foo");
        assert!(labels.is_null(1));
        assert!(labels.is_null(2));
    }
}
