use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::schema::Table;

/// Raw text typed for each column, in column order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterInput {
    entries: IndexMap<String, String>,
}

impl FilterInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// One empty entry per column of `table`
    pub fn empty_for(table: &Table) -> Self {
        Self {
            entries: table.columns.iter().map(|c| (c.name.clone(), String::new())).collect(),
        }
    }

    pub fn set(&mut self, column: impl Into<String>, text: impl Into<String>) -> &mut Self {
        self.entries.insert(column.into(), text.into());
        self
    }

    /// Builder form of [`FilterInput::set`]
    pub fn with(mut self, column: impl Into<String>, text: impl Into<String>) -> Self {
        self.set(column, text);
        self
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.entries.get(column).map(String::as_str)
    }

    /// Entry for `column` with all whitespace removed; `None` when absent or
    /// blank
    pub fn normalized(&self, column: &str) -> Option<String> {
        let text: String = self.get(column)?.chars().filter(|c| !c.is_whitespace()).collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// True when no entry constrains anything
    pub fn is_blank(&self) -> bool {
        self.entries.keys().all(|column| self.normalized(column).is_none())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn clear(&mut self) {
        for text in self.entries.values_mut() {
            text.clear();
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FilterInput {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ColumnType};

    #[test]
    fn test_normalized_strips_whitespace() {
        let input = FilterInput::new().with("label", " fo o* ").with("id", "   ");
        assert_eq!(input.normalized("label").as_deref(), Some("foo*"));
        assert_eq!(input.normalized("id"), None);
        assert_eq!(input.normalized("missing"), None);
    }

    #[test]
    fn test_empty_for_table() {
        let table = Table::new(
            "events",
            vec![Column::new("id", ColumnType::Numeric), Column::new("label", ColumnType::Text)],
        );
        let mut input = FilterInput::empty_for(&table);
        assert_eq!(input.iter().map(|(k, _)| k).collect::<Vec<_>>(), vec!["id", "label"]);
        assert!(input.is_blank());

        input.set("id", "3");
        assert!(!input.is_blank());
        input.clear();
        assert!(input.is_blank());
    }
}
