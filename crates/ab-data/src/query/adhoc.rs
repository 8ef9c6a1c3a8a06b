//! Free-text queries typed into the query line
//!
//! The guard here is a keyword blacklist plus a `SELECT ... FROM` shape check.
//! It stops accidental damage from the query line; it is not a security
//! boundary. [`crate::store::BackingStore::read`] separately refuses statements
//! that would write.

use tracing::warn;

use crate::schema::SchemaCatalog;
use crate::store::BackingStore;
use crate::DataError;

const FORBIDDEN: [&str; 2] = ["DROP", "DELETE"];
const TABLE_LIST_END: [&str; 5] = ["WHERE", "GROUP", "ORDER", "LIMIT", "HAVING"];

/// What the query asked for between `SELECT` and `FROM`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    All,
    Columns(Vec<String>),
}

/// A guarded, shape-checked free-text query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdHocQuery {
    pub text: String,
    pub projection: Projection,
    pub tables: Vec<String>,
}

impl AdHocQuery {
    pub fn parse(text: &str) -> Result<Self, DataError> {
        let text = text.trim().trim_end_matches(';').trim_end();
        // Byte offsets in `upper` line up with `text` because only ASCII changes case
        let upper = text.to_ascii_uppercase();

        if let Some(word) = FORBIDDEN.iter().find(|w| upper.contains(*w)) {
            warn!(query = text, "Rejected free-text query containing {}", word);
            return Err(DataError::GuardRejected(format!("query contains {}", word)));
        }

        let select = find_keyword(&upper, "SELECT", 0)
            .filter(|&pos| pos == 0)
            .ok_or_else(|| DataError::Validation("query must start with SELECT".to_string()))?;
        let from = find_keyword(&upper, "FROM", select)
            .ok_or_else(|| DataError::Validation("query has no FROM".to_string()))?;

        let projection_text = text["SELECT".len()..from].trim();
        let projection = if projection_text == "*" {
            Projection::All
        } else {
            let columns = split_list(projection_text);
            if columns.is_empty() {
                return Err(DataError::Validation("query selects no columns".to_string()));
            }
            Projection::Columns(columns)
        };

        let tables_start = from + "FROM".len();
        let tables_end = TABLE_LIST_END
            .iter()
            .filter_map(|kw| find_keyword(&upper, kw, tables_start))
            .min()
            .unwrap_or(text.len());
        let tables: Vec<String> = split_list(&text[tables_start..tables_end])
            .into_iter()
            .filter_map(|t| t.split_whitespace().next().map(str::to_string))
            .collect();
        if tables.is_empty() {
            return Err(DataError::Validation("query names no table".to_string()));
        }

        Ok(Self { text: text.to_string(), projection, tables })
    }

    /// Header labels for the result. `*` becomes `table.column` for every
    /// column of every listed table.
    pub fn column_labels<S: BackingStore + ?Sized>(&self, catalog: &SchemaCatalog<'_, S>) -> Result<Vec<String>, DataError> {
        match &self.projection {
            Projection::Columns(columns) => Ok(columns.clone()),
            Projection::All => {
                let mut labels = Vec::new();
                for table in &self.tables {
                    let described = catalog.describe(table)?;
                    labels.extend(described.columns.iter().map(|c| format!("{}.{}", table, c.name)));
                }
                Ok(labels)
            }
        }
    }
}

/// Position of `keyword` as a whole word in `upper`, searching from `from`
fn find_keyword(upper: &str, keyword: &str, from: usize) -> Option<usize> {
    let bytes = upper.as_bytes();
    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    let mut start = from;
    while let Some(offset) = upper.get(start..)?.find(keyword) {
        let pos = start + offset;
        let end = pos + keyword.len();
        let before_ok = pos == 0 || !is_word(bytes[pos - 1]);
        let after_ok = end >= bytes.len() || !is_word(bytes[end]);
        if before_ok && after_ok {
            return Some(pos);
        }
        start = end;
    }
    None
}

/// Split on top-level commas; commas inside parentheses or quotes stay put
fn split_list(text: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (pos, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                items.push(&text[start..pos]);
                start = pos + 1;
            }
            _ => {}
        }
    }
    items.push(&text[start..]);
    items
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    #[test]
    fn test_guard_rejects_before_parsing() {
        for text in ["DROP TABLE events", "select * from events; delete from events", "SELECT dropped FROM x"] {
            assert!(matches!(AdHocQuery::parse(text), Err(DataError::GuardRejected(_))), "{}", text);
        }
    }

    #[test]
    fn test_requires_select_from() {
        assert!(matches!(AdHocQuery::parse("UPDATE events SET id = 1"), Err(DataError::Validation(_))));
        assert!(matches!(AdHocQuery::parse("SELECT 1"), Err(DataError::Validation(_))));
        assert!(matches!(AdHocQuery::parse("SELECT FROM events"), Err(DataError::Validation(_))));
    }

    #[test]
    fn test_parse_projection_and_tables() {
        let query = AdHocQuery::parse("select events.id, files.name from events, files e where events.id = 3;").unwrap();
        assert_eq!(
            query.projection,
            Projection::Columns(vec!["events.id".to_string(), "files.name".to_string()])
        );
        assert_eq!(query.tables, vec!["events".to_string(), "files".to_string()]);
        assert!(!query.text.ends_with(';'));
    }

    #[test]
    fn test_commas_inside_calls_and_quotes() {
        let query = AdHocQuery::parse("SELECT substr(a,1,2), b, coalesce(c, 'x,y') FROM t").unwrap();
        assert_eq!(
            query.projection,
            Projection::Columns(vec![
                "substr(a,1,2)".to_string(),
                "b".to_string(),
                "coalesce(c, 'x,y')".to_string()
            ])
        );
        assert_eq!(query.tables, vec!["t".to_string()]);
    }

    #[test]
    fn test_keyword_inside_identifier_is_ignored() {
        let query = AdHocQuery::parse("SELECT fromage FROM cheese_from ORDER BY fromage").unwrap();
        assert_eq!(query.projection, Projection::Columns(vec!["fromage".to_string()]));
        assert_eq!(query.tables, vec!["cheese_from".to_string()]);
    }

    #[test]
    fn test_star_expands_per_table() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .execute_batch("CREATE TABLE a (x INT, y TEXT); CREATE TABLE b (z REAL);")
            .unwrap();
        let catalog = SchemaCatalog::new(&store);
        let query = AdHocQuery::parse("SELECT * FROM a, b").unwrap();
        assert_eq!(query.column_labels(&catalog).unwrap(), vec!["a.x", "a.y", "b.z"]);
    }
}
