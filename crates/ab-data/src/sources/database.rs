//! Analyses kept in the database next to the recording tables
//!
//! Each stored analysis is keyed by file name, the detector and segmenter
//! with their parameters, and the filter settings. Rerunning with the same
//! key reads the stored events back instead of analysing again.

use std::collections::BTreeMap;

use ab_core::analysis::{Analyzer, FilterSettings, InputFile};
use ab_core::{AnalyzedFile, EventRecord, SegmentRecord};
use tracing::{debug, warn};

use crate::query::{Clause, Predicate, QueryBuilder};
use crate::schema::{Column, ColumnType, Table};
use crate::store::{BackingStore, Record, Value};
use crate::DataError;

/// One row per stored analysis
pub const FILE_TABLE: &str = "abada_files";
pub const EVENT_TABLE: &str = "abada_events";
pub const SEGMENT_TABLE: &str = "abada_segments";
/// Per-file summaries written for meta-analysis
pub const META_TABLE: &str = "abada_file_meta";

const KEY_COLUMNS: [(&str, ColumnType); 7] = [
    ("filename", ColumnType::Text),
    ("detector", ColumnType::Text),
    ("detector_params", ColumnType::Text),
    ("segmenter", ColumnType::Text),
    ("segmenter_params", ColumnType::Text),
    ("filter_order", ColumnType::Numeric),
    ("filter_cutoff", ColumnType::Numeric),
];

const STAT_COLUMNS: [&str; 4] = ["start", "mean", "std", "duration"];

fn table(name: &str, extra: &[&str]) -> Table {
    let mut columns: Vec<Column> = KEY_COLUMNS.iter().map(|(column, kind)| Column::new(*column, *kind)).collect();
    columns.extend(extra.iter().map(|column| Column::new(*column, ColumnType::Numeric)));
    Table::new(name, columns)
}

fn file_table() -> Table {
    table(FILE_TABLE, &["events"])
}

fn event_table() -> Table {
    let mut extra = vec!["event_index"];
    extra.extend(STAT_COLUMNS);
    extra.push("segmented");
    table(EVENT_TABLE, &extra)
}

fn segment_table() -> Table {
    let mut extra = vec!["event_index", "segment_index"];
    extra.extend(STAT_COLUMNS);
    table(SEGMENT_TABLE, &extra)
}

fn meta_table() -> Table {
    let mut meta = table(META_TABLE, &["events", "segmented_events", "mean_duration", "mean_current"]);
    meta.columns.insert(KEY_COLUMNS.len(), Column::new("sample", ColumnType::Text));
    meta
}

/// Detector and segmenter an analysis was made with, each with its
/// parameters as text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisKey {
    pub detector: String,
    pub detector_params: String,
    pub segmenter: String,
    pub segmenter_params: String,
}

impl AnalysisKey {
    pub fn new(
        detector: impl Into<String>,
        detector_params: impl Into<String>,
        segmenter: impl Into<String>,
        segmenter_params: impl Into<String>,
    ) -> Self {
        Self {
            detector: detector.into(),
            detector_params: detector_params.into(),
            segmenter: segmenter.into(),
            segmenter_params: segmenter_params.into(),
        }
    }

    /// Key column values for one file, in table order
    fn values(&self, filename: &str, filter: Option<&FilterSettings>) -> Vec<Value> {
        vec![
            Value::Text(filename.to_string()),
            Value::Text(self.detector.clone()),
            Value::Text(self.detector_params.clone()),
            Value::Text(self.segmenter.clone()),
            Value::Text(self.segmenter_params.clone()),
            filter.map_or(Value::Null, |f| Value::Integer(f.order as i64)),
            filter.map_or(Value::Null, |f| Value::Real(f.cutoff_hz)),
        ]
    }

    /// Unfiltered analyses match on NULL filter columns
    fn predicate(&self, filename: &str, filter: Option<&FilterSettings>) -> Option<Predicate> {
        let clauses = KEY_COLUMNS
            .iter()
            .zip(self.values(filename, filter))
            .map(|((column, _), value)| match value {
                Value::Null => Clause::is_null(*column),
                value => Clause::equals(*column, value),
            })
            .collect();
        Predicate::from_clauses(clauses)
    }
}

/// NULL reads back as NaN, which is also how SQLite stores it
fn number(value: &Value) -> f64 {
    value.as_f64().unwrap_or(f64::NAN)
}

fn stored(value: f64) -> Value {
    if value.is_nan() {
        Value::Null
    } else {
        Value::Real(value)
    }
}

fn index(value: &Value) -> Result<i64, DataError> {
    match value {
        Value::Integer(i) => Ok(*i),
        other => Err(DataError::Validation(format!("stored index {} is not an integer", other))),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Wraps an analyzer so finished files are read from and written to tables
/// in a [`BackingStore`]
pub struct DatabaseArchive<'a, S, A> {
    inner: A,
    store: &'a S,
    key: AnalysisKey,
    load: bool,
    save: bool,
    meta: bool,
}

impl<'a, S: BackingStore, A: Analyzer> DatabaseArchive<'a, S, A> {
    pub fn new(inner: A, store: &'a S, key: AnalysisKey) -> Self {
        Self { inner, store, key, load: true, save: false, meta: false }
    }

    /// Reuse stored analyses instead of analysing again
    pub fn with_load(mut self, load: bool) -> Self {
        self.load = load;
        self
    }

    /// Store every finished file, replacing an analysis with the same key
    pub fn with_save(mut self, save: bool) -> Self {
        self.save = save;
        self
    }

    /// Write a per-file summary row for meta-analysis
    pub fn with_meta(mut self, meta: bool) -> Self {
        self.meta = meta;
        self
    }

    pub fn key(&self) -> &AnalysisKey {
        &self.key
    }

    pub fn into_inner(self) -> A {
        self.inner
    }

    /// The stored analysis of `input` under this key; the sample is taken
    /// from `input`
    pub fn load(&self, input: &InputFile, filter: Option<&FilterSettings>) -> Result<Option<AnalyzedFile>, DataError> {
        let filename = input.file_name();
        let predicate = self.key.predicate(filename, filter);
        let width = KEY_COLUMNS.len();

        let files = match self.store.read(&QueryBuilder::select(FILE_TABLE, predicate.as_ref(), Some(1))) {
            Ok(rows) => rows,
            Err(DataError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let Some(expected) = files.first().map(|row| index(&row[width])).transpose()? else {
            return Ok(None);
        };

        let mut segments: BTreeMap<i64, Vec<(i64, SegmentRecord)>> = BTreeMap::new();
        for row in self.store.read(&QueryBuilder::select(SEGMENT_TABLE, predicate.as_ref(), None))? {
            let cells = &row[width..];
            segments.entry(index(&cells[0])?).or_default().push((
                index(&cells[1])?,
                SegmentRecord {
                    start: number(&cells[2]),
                    mean: number(&cells[3]),
                    std: number(&cells[4]),
                    duration: number(&cells[5]),
                },
            ));
        }

        let mut events = Vec::new();
        for row in self.store.read(&QueryBuilder::select(EVENT_TABLE, predicate.as_ref(), None))? {
            let cells = &row[width..];
            let position = index(&cells[0])?;
            let mut event =
                EventRecord::new(filename, number(&cells[1]), number(&cells[2]), number(&cells[3]), number(&cells[4]));
            event.sample = input.sample.clone();
            if number(&cells[5]) != 0.0 {
                let mut owned = segments.remove(&position).unwrap_or_default();
                owned.sort_by_key(|(i, _)| *i);
                event.segments = Some(owned.into_iter().map(|(_, s)| s).collect());
            }
            events.push((position, event));
        }
        events.sort_by_key(|(i, _)| *i);

        if events.len() as i64 != expected {
            return Err(DataError::Validation(format!(
                "stored analysis of {} has {} of {} events",
                filename,
                events.len(),
                expected
            )));
        }
        Ok(Some(AnalyzedFile {
            filename: filename.to_string(),
            sample: input.sample.clone(),
            events: events.into_iter().map(|(_, e)| e).collect(),
        }))
    }

    /// Write `file` under this key, replacing whatever was stored before
    pub fn save(&self, input: &InputFile, filter: Option<&FilterSettings>, file: &AnalyzedFile) -> Result<(), DataError> {
        let filename = input.file_name();
        let key = self.key.values(filename, filter);
        let predicate = self.key.predicate(filename, filter);
        let with_key = |extra: Vec<Value>| -> Record { key.iter().cloned().chain(extra).collect() };

        let mut events = Vec::with_capacity(file.events.len());
        let mut segments = Vec::new();
        for (i, event) in file.events.iter().enumerate() {
            events.push(with_key(vec![
                Value::Integer(i as i64),
                stored(event.start),
                stored(event.mean),
                stored(event.std),
                stored(event.duration),
                Value::Integer(event.segments.is_some() as i64),
            ]));
            for (j, segment) in event.segments.iter().flatten().enumerate() {
                segments.push(with_key(vec![
                    Value::Integer(i as i64),
                    Value::Integer(j as i64),
                    stored(segment.start),
                    stored(segment.mean),
                    stored(segment.std),
                    stored(segment.duration),
                ]));
            }
        }

        self.store.atomically(|store| {
            for table in [file_table(), event_table(), segment_table()] {
                store.create_table_if_missing(&table)?;
                store.delete(&QueryBuilder::delete(&table.name, predicate.as_ref()))?;
            }
            store.insert(FILE_TABLE, &with_key(vec![Value::Integer(file.events.len() as i64)]))?;
            store.insert_many(EVENT_TABLE, &events)?;
            store.insert_many(SEGMENT_TABLE, &segments)?;
            Ok(())
        })?;
        debug!(file = filename, events = events.len(), segments = segments.len(), "Stored analysis");
        Ok(())
    }

    /// Replace the summary row of `file` under this key
    pub fn save_meta(&self, input: &InputFile, filter: Option<&FilterSettings>, file: &AnalyzedFile) -> Result<(), DataError> {
        let filename = input.file_name();
        let predicate = self.key.predicate(filename, filter);
        let mut row = self.key.values(filename, filter);
        row.push(Value::Text(file.sample.clone()));
        row.push(Value::Integer(file.events.len() as i64));
        row.push(Value::Integer(file.events.iter().filter(|e| e.segments.is_some()).count() as i64));
        row.push(stored(mean(file.events.iter().map(|e| e.duration))));
        row.push(stored(mean(file.events.iter().map(|e| e.mean))));

        self.store.atomically(|store| {
            let table = meta_table();
            store.create_table_if_missing(&table)?;
            store.delete(&QueryBuilder::delete(&table.name, predicate.as_ref()))?;
            store.insert(&table.name, &row)
        })?;
        debug!(file = filename, "Stored file summary");
        Ok(())
    }
}

impl<S: BackingStore, A: Analyzer> Analyzer for DatabaseArchive<'_, S, A> {
    fn detect_events(&self, input: &InputFile, filter: Option<&FilterSettings>) -> anyhow::Result<Vec<EventRecord>> {
        self.inner.detect_events(input, filter)
    }

    fn segment(&self, event: &mut EventRecord, filter: Option<&FilterSettings>) -> anyhow::Result<()> {
        self.inner.segment(event, filter)
    }

    /// A missing or unreadable analysis falls back to a fresh one
    fn load_cached(&self, input: &InputFile, filter: Option<&FilterSettings>) -> Option<AnalyzedFile> {
        if !self.load {
            return self.inner.load_cached(input, filter);
        }
        match self.load(input, filter) {
            Ok(Some(file)) => Some(file),
            Ok(None) => self.inner.load_cached(input, filter),
            Err(e) => {
                warn!(file = %input.path, error = %e, "Ignoring unreadable stored analysis");
                self.inner.load_cached(input, filter)
            }
        }
    }

    fn store(&self, input: &InputFile, filter: Option<&FilterSettings>, file: &AnalyzedFile) -> anyhow::Result<()> {
        self.inner.store(input, filter, file)?;
        if self.save {
            self.save(input, filter, file)?;
        }
        if self.meta {
            self.save_meta(input, filter, file)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use ab_core::AnalysisPipeline;
    use std::cell::Cell;

    /// Two events per file; the second is split in two segments
    struct CountingAnalyzer {
        detections: Cell<usize>,
    }

    impl CountingAnalyzer {
        fn new() -> Self {
            Self { detections: Cell::new(0) }
        }
    }

    impl Analyzer for CountingAnalyzer {
        fn detect_events(&self, input: &InputFile, _filter: Option<&FilterSettings>) -> anyhow::Result<Vec<EventRecord>> {
            self.detections.set(self.detections.get() + 1);
            Ok(vec![
                EventRecord::new(input.file_name(), 0.5, 20.25, 1.0, 0.125),
                EventRecord::new(input.file_name(), 2.0, 31.5, f64::NAN, 0.375),
            ])
        }

        fn segment(&self, event: &mut EventRecord, _filter: Option<&FilterSettings>) -> anyhow::Result<()> {
            let segments = if event.start > 1.0 {
                vec![
                    SegmentRecord { start: 0.0, mean: 30.0, std: 0.5, duration: 0.25 },
                    SegmentRecord { start: 0.25, mean: 33.0, std: 0.75, duration: 0.125 },
                ]
            } else {
                Vec::new()
            };
            event.segments = Some(segments);
            Ok(())
        }
    }

    fn key() -> AnalysisKey {
        AnalysisKey::new("StepDetector", "threshold=90", "SpeedyStatSplit", "min_width=100")
    }

    fn inputs() -> Vec<InputFile> {
        vec![
            InputFile::from_table_cell("Z:\\runs\\14418004.abf", "wt"),
            InputFile::from_table_cell("Z:\\runs\\14418005.abf", ""),
        ]
    }

    fn events_equal(a: &AnalyzedFile, b: &AnalyzedFile) -> bool {
        // NaN std never compares equal, so compare the rest field by field
        a.filename == b.filename
            && a.sample == b.sample
            && a.events.len() == b.events.len()
            && a.events.iter().zip(&b.events).all(|(x, y)| {
                x.start == y.start
                    && x.mean == y.mean
                    && x.duration == y.duration
                    && (x.std == y.std || (x.std.is_nan() && y.std.is_nan()))
                    && x.segments == y.segments
                    && x.sample == y.sample
                    && x.filename == y.filename
            })
    }

    #[test]
    fn test_second_run_reads_database() {
        let store = SqliteStore::open_in_memory().unwrap();
        let archive = DatabaseArchive::new(CountingAnalyzer::new(), &store, key()).with_save(true);
        let pipeline = AnalysisPipeline::new();

        let first = pipeline.run(&inputs(), &archive).unwrap().experiment;
        let second = pipeline.run(&inputs(), &archive).unwrap().experiment;
        assert_eq!(archive.into_inner().detections.get(), 2);

        assert_eq!(second.files.len(), 2);
        for (a, b) in first.files.iter().zip(&second.files) {
            assert!(events_equal(a, b), "{:?} != {:?}", a, b);
        }
        assert_eq!(second.files[0].filename, "14418004");
        assert_eq!(second.files[0].events[1].segments.as_ref().unwrap()[1].mean, 33.0);
        assert_eq!(second.files[0].events[0].segments, Some(Vec::new()));
    }

    #[test]
    fn test_key_and_filter_select_the_analysis() {
        let store = SqliteStore::open_in_memory().unwrap();
        let filter = FilterSettings { order: 1, cutoff_hz: 2000.0 };
        let archive = DatabaseArchive::new(CountingAnalyzer::new(), &store, key()).with_save(true);
        AnalysisPipeline::new().with_filter(Some(filter)).run(&inputs(), &archive).unwrap();

        let input = &inputs()[0];
        assert!(archive.load(input, Some(&filter)).unwrap().is_some());
        assert!(archive.load(input, None).unwrap().is_none());
        let other_cutoff = FilterSettings { order: 1, cutoff_hz: 5000.0 };
        assert!(archive.load(input, Some(&other_cutoff)).unwrap().is_none());

        let other_params = AnalysisKey { detector_params: "threshold=80".into(), ..key() };
        let other = DatabaseArchive::new(CountingAnalyzer::new(), &store, other_params);
        assert!(other.load(input, Some(&filter)).unwrap().is_none());
    }

    #[test]
    fn test_resave_replaces_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        let archive = DatabaseArchive::new(CountingAnalyzer::new(), &store, key()).with_save(true).with_load(false);
        let pipeline = AnalysisPipeline::new().with_segmentation(false);
        pipeline.run(&inputs(), &archive).unwrap();
        pipeline.run(&inputs(), &archive).unwrap();

        let count = |table: &str| store.count(&QueryBuilder::count(table, None)).unwrap();
        assert_eq!(count(FILE_TABLE), 2);
        assert_eq!(count(EVENT_TABLE), 4);
        assert_eq!(count(SEGMENT_TABLE), 0);

        let loaded = archive.load(&inputs()[1], None).unwrap().unwrap();
        assert!(loaded.events.iter().all(|e| e.segments.is_none()));
        assert_eq!(loaded.sample, ab_core::records::AGGREGATE_SAMPLE);
    }

    #[test]
    fn test_missing_tables_mean_no_analysis() {
        let store = SqliteStore::open_in_memory().unwrap();
        let archive = DatabaseArchive::new(CountingAnalyzer::new(), &store, key());
        assert!(archive.load(&inputs()[0], None).unwrap().is_none());

        AnalysisPipeline::new().run(&inputs(), &archive).unwrap();
        assert!(store.list_tables().unwrap().is_empty());
    }

    #[test]
    fn test_meta_rows() {
        let store = SqliteStore::open_in_memory().unwrap();
        let archive = DatabaseArchive::new(CountingAnalyzer::new(), &store, key()).with_meta(true);
        AnalysisPipeline::new().run(&inputs(), &archive).unwrap();
        AnalysisPipeline::new().run(&inputs(), &archive).unwrap();

        assert_eq!(store.list_tables().unwrap(), vec![META_TABLE.to_string()]);
        let rows = store.read(&QueryBuilder::select(META_TABLE, None, None)).unwrap();
        assert_eq!(rows.len(), 2);
        let summary = &rows[0][KEY_COLUMNS.len()..];
        assert_eq!(summary[0], Value::Text("wt".into()));
        assert_eq!(summary[1], Value::Integer(2));
        assert_eq!(summary[2], Value::Integer(2));
        assert_eq!(summary[3].as_f64(), Some(0.25));
        assert_eq!(summary[4].as_f64(), Some(25.875));
    }
}
