use tracing::debug;

use super::{Clause, FilterInput, Predicate, NULL_TOKEN, WILDCARD};
use crate::schema::{Column, ColumnType, Table};
use crate::store::{quote_identifier, SqlStatement, Value};
use crate::DataError;

/// Translates filter input into predicates and statements
pub struct QueryBuilder;

impl QueryBuilder {
    /// Build the predicate for `input` against `table`.
    ///
    /// Columns are visited in table order and blank entries contribute
    /// nothing. Returns `Ok(None)` when no column is constrained. A non-blank
    /// entry for a column the table does not have is `NotFound`.
    pub fn build(table: &Table, input: &FilterInput) -> Result<Option<Predicate>, DataError> {
        if let Some((column, _)) = input
            .iter()
            .find(|(column, _)| table.column(column).is_none() && input.normalized(column).is_some())
        {
            return Err(DataError::NotFound(format!("column '{}' in table '{}'", column, table.name)));
        }

        let mut clauses = Vec::new();
        for column in &table.columns {
            if let Some(text) = input.normalized(&column.name) {
                clauses.push(Self::clause(column, &text)?);
            }
        }
        let predicate = Predicate::from_clauses(clauses);
        if let Some(p) = &predicate {
            debug!(table = %table.name, predicate = %p, "Built predicate");
        }
        Ok(predicate)
    }

    /// Clause for one column from already normalized text
    pub fn clause(column: &Column, text: &str) -> Result<Clause, DataError> {
        if text == NULL_TOKEN {
            return Ok(Clause::is_null(&column.name));
        }
        match column.column_type {
            ColumnType::Text => match text.strip_suffix(WILDCARD) {
                Some(needle) => Ok(Clause::contains(&column.name, needle)),
                None => Ok(Clause::equals(&column.name, Value::Text(text.to_string()))),
            },
            ColumnType::Numeric => {
                let value = parse_number(text).ok_or_else(|| {
                    DataError::Validation(format!("'{}' is not a number (column {})", text, column.name))
                })?;
                Ok(Clause::equals(&column.name, value))
            }
        }
    }

    /// `SELECT *` on `table`, optionally filtered and capped
    pub fn select(table: &str, predicate: Option<&Predicate>, limit: Option<usize>) -> SqlStatement {
        let mut statement = with_where(format!("SELECT * FROM {}", quote_identifier(table)), predicate);
        if let Some(limit) = limit {
            statement.text.push_str(&format!(" LIMIT {}", limit));
        }
        statement
    }

    pub fn count(table: &str, predicate: Option<&Predicate>) -> SqlStatement {
        with_where(format!("SELECT COUNT(*) FROM {}", quote_identifier(table)), predicate)
    }

    /// Without a predicate this removes every row of `table`
    pub fn delete(table: &str, predicate: Option<&Predicate>) -> SqlStatement {
        with_where(format!("DELETE FROM {}", quote_identifier(table)), predicate)
    }
}

fn with_where(head: String, predicate: Option<&Predicate>) -> SqlStatement {
    match predicate {
        Some(p) => {
            let body = p.to_sql();
            SqlStatement::with_params(format!("{} WHERE {}", head, body.text), body.params)
        }
        None => SqlStatement::new(head),
    }
}

/// Integer if possible, else a finite float
pub fn parse_number(text: &str) -> Option<Value> {
    if let Ok(i) = text.parse::<i64>() {
        return Some(Value::Integer(i));
    }
    text.parse::<f64>().ok().filter(|f| f.is_finite()).map(Value::Real)
}
