//! Table browser: one active table, its filter and its rendered rows

mod batch;

pub use batch::{arrow_schema, rows_to_batch};

use arrow::record_batch::RecordBatch;
use tracing::{debug, info};

use crate::query::{parse_number, AdHocQuery, FilterInput, Predicate, QueryBuilder};
use crate::schema::{ColumnType, SchemaCatalog, Table};
use crate::store::{BackingStore, Record, SqlStatement, Value};
use crate::DataError;

/// Row count and predicate a delete would use, shown before confirming
#[derive(Debug, Clone, PartialEq)]
pub struct DeletePreview {
    pub count: usize,
    pub predicate: Option<Predicate>,
}

impl DeletePreview {
    pub fn message(&self) -> String {
        let suffix = if self.count > 1 { "ies" } else { "y" };
        format!("Do you really want to delete {} entr{}?", self.count, suffix)
    }
}

/// Result of a free-text query
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
    pub truncated: bool,
}

pub struct TableBrowser<S: BackingStore> {
    store: S,
    max_rows: usize,
    source_table: Option<String>,
    active: Option<Table>,
    filter: FilterInput,
    rows: Vec<Record>,
}

impl<S: BackingStore> TableBrowser<S> {
    pub fn new(store: S, max_rows: usize) -> Self {
        Self {
            store,
            max_rows: max_rows.max(1),
            source_table: None,
            active: None,
            filter: FilterInput::new(),
            rows: Vec::new(),
        }
    }

    /// Table whose rows name recordings to analyse
    pub fn with_source_table(mut self, table: impl Into<String>) -> Self {
        self.source_table = Some(table.into());
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    pub fn active_table(&self) -> Option<&Table> {
        self.active.as_ref()
    }

    pub fn filter(&self) -> &FilterInput {
        &self.filter
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn is_source_table(&self) -> bool {
        match (&self.active, &self.source_table) {
            (Some(active), Some(source)) => &active.name == source,
            _ => false,
        }
    }

    pub fn tables(&self) -> Result<Vec<String>, DataError> {
        SchemaCatalog::new(&self.store).list_tables()
    }

    /// Switch tables, reset the filter and load the unfiltered rows
    pub fn select_table(&mut self, name: &str) -> Result<&[Record], DataError> {
        let table = SchemaCatalog::new(&self.store).describe(name)?;
        info!(table = name, columns = table.columns.len(), "Selected table");
        self.filter = FilterInput::empty_for(&table);
        self.active = Some(table);
        self.rows.clear();
        self.search(self.filter.clone())
    }

    /// Read the active table with `filter`, keeping at most `max_rows` rows
    pub fn search(&mut self, filter: FilterInput) -> Result<&[Record], DataError> {
        let table = self.refresh_table()?;
        let predicate = QueryBuilder::build(&table, &filter)?;
        let statement = QueryBuilder::select(&table.name, predicate.as_ref(), Some(self.max_rows));
        let rows = self.store.read(&statement)?;
        debug!(table = %table.name, rows = rows.len(), "Search complete");
        self.filter = filter;
        self.rows = rows;
        Ok(&self.rows)
    }

    /// Insert one row. Values are positional; missing or empty values are NULL.
    pub fn insert(&mut self, values: Vec<Option<String>>) -> Result<(), DataError> {
        let table = self.refresh_table()?;
        if values.len() > table.columns.len() {
            return Err(DataError::Validation(format!(
                "{} values given for {} columns",
                values.len(),
                table.columns.len()
            )));
        }

        let mut row = Vec::with_capacity(table.columns.len());
        let mut given = values.into_iter();
        for column in &table.columns {
            let text = given.next().flatten().filter(|t| !t.trim().is_empty());
            let value = match (text, column.column_type) {
                (None, _) => Value::Null,
                (Some(text), ColumnType::Text) => Value::Text(text),
                (Some(text), ColumnType::Numeric) => parse_number(text.trim()).ok_or_else(|| {
                    DataError::Validation(format!("'{}' is not a number (column {})", text, column.name))
                })?,
            };
            row.push(value);
        }

        self.store.insert(&table.name, &row)?;
        info!(table = %table.name, "Inserted row");
        Ok(())
    }

    /// Count the rows a delete with `filter` would remove
    pub fn delete_preview(&self, filter: &FilterInput) -> Result<DeletePreview, DataError> {
        let table = SchemaCatalog::new(&self.store).describe(&self.require_active()?.name)?;
        let predicate = QueryBuilder::build(&table, filter)?;
        let count = self.store.count(&QueryBuilder::count(&table.name, predicate.as_ref()))?;
        Ok(DeletePreview { count, predicate })
    }

    /// Delete the rows matching `filter`. With no constraint every row goes.
    pub fn delete_confirmed(&mut self, filter: &FilterInput) -> Result<usize, DataError> {
        let table = self.refresh_table()?;
        let predicate = QueryBuilder::build(&table, filter)?;
        let removed = self.store.delete(&QueryBuilder::delete(&table.name, predicate.as_ref()))?;
        match &predicate {
            Some(p) => info!(table = %table.name, removed, predicate = %p, "Deleted rows"),
            None => info!(table = %table.name, removed, "Deleted all rows"),
        }
        Ok(removed)
    }

    /// Run a free-text read query, capped at `max_rows`
    pub fn run_query(&self, text: &str) -> Result<QueryResult, DataError> {
        let query = AdHocQuery::parse(text)?;
        let columns = query.column_labels(&SchemaCatalog::new(&self.store))?;
        let mut rows = self.store.read(&SqlStatement::new(query.text.clone()))?;
        let truncated = rows.len() > self.max_rows;
        rows.truncate(self.max_rows);
        debug!(rows = rows.len(), truncated, "Free-text query complete");
        Ok(QueryResult { columns, rows, truncated })
    }

    /// Input names built from the rendered rows of the source table:
    /// first column is the file name, fourth the station
    pub fn saved_files(&self) -> Result<Vec<String>, DataError> {
        let table = self.require_active()?;
        if !self.is_source_table() {
            return Err(DataError::Validation(format!("'{}' is not the source table", table.name)));
        }
        if table.columns.len() < 4 {
            return Err(DataError::Validation(format!(
                "source table '{}' needs at least 4 columns",
                table.name
            )));
        }
        Ok(self
            .rows
            .iter()
            .filter(|row| row.len() >= 4)
            .map(|row| format!("{}-s0{}", row[0], row[3]))
            .collect())
    }

    /// Rendered rows as an Arrow batch
    pub fn record_batch(&self) -> Result<RecordBatch, DataError> {
        rows_to_batch(self.require_active()?, &self.rows)
    }

    fn require_active(&self) -> Result<&Table, DataError> {
        self.active
            .as_ref()
            .ok_or_else(|| DataError::Validation("no table selected".to_string()))
    }

    /// Re-read the active table's columns so schema changes surface as `NotFound`
    fn refresh_table(&mut self) -> Result<Table, DataError> {
        let name = self.require_active()?.name.clone();
        let table = SchemaCatalog::new(&self.store).describe(&name)?;
        self.active = Some(table.clone());
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    fn browser() -> TableBrowser<SqliteStore> {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .execute_batch(
                "CREATE TABLE events (id NUMERIC, label TEXT);
                 INSERT INTO events VALUES (1, 'foo'), (2, 'food'), (3, NULL), (4, 'bar');",
            )
            .unwrap();
        TableBrowser::new(store, 100)
    }

    #[test]
    fn test_select_table_loads_everything() {
        let mut browser = browser();
        assert_eq!(browser.tables().unwrap(), vec!["events".to_string()]);
        assert_eq!(browser.select_table("events").unwrap().len(), 4);
        assert!(browser.filter().is_blank());
        assert!(matches!(browser.select_table("missing"), Err(DataError::NotFound(_))));
    }

    #[test]
    fn test_search_scenario() {
        let mut browser = browser();
        browser.select_table("events").unwrap();

        let rows = browser.search(FilterInput::new().with("id", "").with("label", "foo*")).unwrap();
        assert_eq!(rows.len(), 2);

        let rows = browser.search(FilterInput::new().with("id", "3").with("label", "None")).unwrap();
        assert_eq!(rows, &[vec![Value::Integer(3), Value::Null]]);

        let err = browser.search(FilterInput::new().with("id", "three")).unwrap_err();
        assert!(matches!(err, DataError::Validation(_)));
    }

    #[test]
    fn test_search_truncates_to_max_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.execute_batch("CREATE TABLE t (x INT)").unwrap();
        let rows: Vec<Record> = (0..25).map(|i| vec![Value::Integer(i)]).collect();
        store.insert_many("t", &rows).unwrap();

        let mut browser = TableBrowser::new(store, 10);
        assert_eq!(browser.select_table("t").unwrap().len(), 10);
        assert!(browser.run_query("SELECT * FROM t").unwrap().truncated);
    }

    #[test]
    fn test_dropped_table_is_not_found() {
        let mut browser = browser();
        browser.select_table("events").unwrap();
        browser.store().execute_batch("DROP TABLE events").unwrap();
        assert!(matches!(browser.search(FilterInput::new()), Err(DataError::NotFound(_))));
    }

    #[test]
    fn test_delete_preview_matches_delete() {
        let mut browser = browser();
        browser.select_table("events").unwrap();
        let filter = FilterInput::new().with("label", "fo*");

        let preview = browser.delete_preview(&filter).unwrap();
        assert_eq!(preview.count, 2);
        assert_eq!(preview.message(), "Do you really want to delete 2 entries?");
        assert_eq!(browser.store().count(&QueryBuilder::count("events", None)).unwrap(), 4);

        assert_eq!(browser.delete_confirmed(&filter).unwrap(), preview.count);
        assert_eq!(browser.search(FilterInput::new()).unwrap().len(), 2);
    }

    #[test]
    fn test_delete_with_unknown_column_keeps_rows() {
        let mut browser = browser();
        browser.select_table("events").unwrap();
        let filter = FilterInput::new().with("lable", "foo");

        assert!(matches!(browser.delete_preview(&filter), Err(DataError::NotFound(_))));
        assert!(matches!(browser.delete_confirmed(&filter), Err(DataError::NotFound(_))));
        assert_eq!(browser.store().count(&QueryBuilder::count("events", None)).unwrap(), 4);
    }

    #[test]
    fn test_filter_on_dropped_column_is_not_found() {
        let mut browser = browser();
        browser.select_table("events").unwrap();
        browser.store().execute_batch("ALTER TABLE events DROP COLUMN label").unwrap();
        let filter = FilterInput::new().with("label", "foo");

        assert!(matches!(browser.search(filter.clone()), Err(DataError::NotFound(_))));
        assert!(matches!(browser.delete_preview(&filter), Err(DataError::NotFound(_))));
        assert!(matches!(browser.delete_confirmed(&filter), Err(DataError::NotFound(_))));
        assert_eq!(browser.store().count(&QueryBuilder::count("events", None)).unwrap(), 4);
        assert_eq!(browser.search(FilterInput::new()).unwrap().len(), 4);
    }

    #[test]
    fn test_delete_without_filter_removes_all() {
        let mut browser = browser();
        browser.select_table("events").unwrap();
        let preview = browser.delete_preview(&FilterInput::new()).unwrap();
        assert!(preview.predicate.is_none());
        assert_eq!(browser.delete_confirmed(&FilterInput::new()).unwrap(), 4);
    }

    #[test]
    fn test_preview_message_singular() {
        let one = DeletePreview { count: 1, predicate: None };
        assert_eq!(one.message(), "Do you really want to delete 1 entry?");
    }

    #[test]
    fn test_insert() {
        let mut browser = browser();
        browser.select_table("events").unwrap();

        browser.insert(vec![Some("5".into()), Some("baz".into())]).unwrap();
        browser.insert(vec![Some("6".into())]).unwrap();
        let rows = browser.search(FilterInput::new().with("id", "6")).unwrap();
        assert_eq!(rows, &[vec![Value::Integer(6), Value::Null]]);

        let err = browser.insert(vec![Some("x".into())]).unwrap_err();
        assert!(matches!(err, DataError::Validation(_)));
        let err = browser.insert(vec![None, None, Some("extra".into())]).unwrap_err();
        assert!(matches!(err, DataError::Validation(_)));
    }

    #[test]
    fn test_insert_constraint_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.execute_batch("CREATE TABLE files (name TEXT PRIMARY KEY NOT NULL)").unwrap();
        let mut browser = TableBrowser::new(store, 10);
        browser.select_table("files").unwrap();
        browser.insert(vec![Some("a".into())]).unwrap();

        assert!(matches!(browser.insert(vec![Some("a".into())]), Err(DataError::Constraint(_))));
        assert!(matches!(browser.insert(vec![None]), Err(DataError::Constraint(_))));
    }

    #[test]
    fn test_run_query_guard() {
        let browser = browser();
        assert!(matches!(browser.run_query("delete from events"), Err(DataError::GuardRejected(_))));

        let result = browser.run_query("SELECT * FROM events WHERE id < 3").unwrap();
        assert_eq!(result.columns, vec!["events.id", "events.label"]);
        assert_eq!(result.rows.len(), 2);
        assert!(!result.truncated);
    }

    #[test]
    fn test_saved_files() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .execute_batch(
                "CREATE TABLE recordings (filename TEXT, date TEXT, operator TEXT, station INT);
                 INSERT INTO recordings VALUES ('14418004', '2014-04-18', 'jm', 2);",
            )
            .unwrap();
        let mut browser = TableBrowser::new(store, 10).with_source_table("recordings");
        browser.select_table("recordings").unwrap();
        assert_eq!(browser.saved_files().unwrap(), vec!["14418004-s02".to_string()]);

        let mut other = TableBrowser::new(SqliteStore::open_in_memory().unwrap(), 10);
        assert!(other.saved_files().is_err());
        other.store().execute_batch("CREATE TABLE x (a TEXT)").unwrap();
        other.select_table("x").unwrap();
        assert!(matches!(other.saved_files(), Err(DataError::Validation(_))));
    }

    #[test]
    fn test_record_batch() {
        let mut browser = browser();
        browser.select_table("events").unwrap();
        let batch = browser.record_batch().unwrap();
        assert_eq!(batch.num_rows(), 4);
        assert_eq!(batch.num_columns(), 2);
    }
}
