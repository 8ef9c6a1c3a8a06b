use std::fmt;

use serde::{Deserialize, Serialize};

use crate::store::{quote_identifier, SqlStatement, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Equals,
    Like,
    IsNull,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Equals => "=",
            Operator::Like => "LIKE",
            Operator::IsNull => "IS NULL",
        }
    }
}

/// One atomic condition on a column. `operand` is `None` only for `IsNull`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub column: String,
    pub operator: Operator,
    pub operand: Option<Value>,
}

impl Clause {
    pub fn equals(column: impl Into<String>, value: Value) -> Self {
        Self { column: column.into(), operator: Operator::Equals, operand: Some(value) }
    }

    /// Substring match: the pattern is wrapped in `%`
    pub fn contains(column: impl Into<String>, needle: &str) -> Self {
        Self {
            column: column.into(),
            operator: Operator::Like,
            operand: Some(Value::Text(format!("%{}%", needle))),
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self { column: column.into(), operator: Operator::IsNull, operand: None }
    }

    fn to_sql(&self) -> String {
        match self.operator {
            Operator::IsNull => format!("{} IS NULL", quote_identifier(&self.column)),
            op => format!("{} {} ?", quote_identifier(&self.column), op.as_sql()),
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Some(value) => write!(f, "{} {} {}", self.column, self.operator.as_sql(), value.to_literal()),
            None => write!(f, "{} {}", self.column, self.operator.as_sql()),
        }
    }
}

/// Conjunction of clauses; never empty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    clauses: Vec<Clause>,
}

impl Predicate {
    /// `None` when there is nothing to constrain
    pub fn from_clauses(clauses: Vec<Clause>) -> Option<Self> {
        if clauses.is_empty() {
            None
        } else {
            Some(Self { clauses })
        }
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// `WHERE` body with `?` placeholders and the values to bind, in order
    pub fn to_sql(&self) -> SqlStatement {
        let text = self.clauses.iter().map(Clause::to_sql).collect::<Vec<_>>().join(" AND ");
        let params = self.clauses.iter().filter_map(|c| c.operand.clone()).collect();
        SqlStatement::with_params(text, params)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            write!(f, "{}", clause)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_clause_list_is_no_predicate() {
        assert!(Predicate::from_clauses(Vec::new()).is_none());
    }

    #[test]
    fn test_display_and_sql() {
        let predicate = Predicate::from_clauses(vec![
            Clause::equals("id", Value::Integer(3)),
            Clause::is_null("label"),
            Clause::contains("note", "it's"),
        ])
        .unwrap();

        assert_eq!(predicate.to_string(), "id = 3 AND label IS NULL AND note LIKE '%it''s%'");

        let sql = predicate.to_sql();
        assert_eq!(sql.text, "\"id\" = ? AND \"label\" IS NULL AND \"note\" LIKE ?");
        assert_eq!(sql.params, vec![Value::Integer(3), Value::Text("%it's%".into())]);
    }
}
