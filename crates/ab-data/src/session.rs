//! Per-user session state
//!
//! Everything one user works with lives here: the table browser, the event
//! cursor with its exclusion marks, plot planning, the loaded experiment and
//! imported HMMs. Each session is independent; nothing is shared between
//! sessions.

use std::fmt;
use std::fs;
use std::path::Path;

use ab_core::analysis::{AnalysisOutcome, AnalysisPipeline, Analyzer, InputFile};
use ab_core::navigation::Mark;
use ab_core::plot::{Coloring, ColorScheme, PlotData, PlotPlanner};
use ab_core::{EventRecord, ExclusionSet, Experiment, RecordClass, RecordCursor};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::browser::TableBrowser;
use crate::config::AppConfig;
use crate::export::{CsvExporter, ExportSummary};
use crate::hmm::{HmmRegistry, ProfileModel};
use crate::store::BackingStore;
use crate::DataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub struct Session<S: BackingStore> {
    id: SessionId,
    config: AppConfig,
    browser: TableBrowser<S>,
    cursor: RecordCursor<EventRecord>,
    planner: PlotPlanner,
    experiment: Experiment,
    hmms: HmmRegistry,
    saved_files: Vec<String>,
}

impl<S: BackingStore> Session<S> {
    pub fn new(store: S, config: AppConfig) -> Self {
        let mut browser = TableBrowser::new(store, config.database.max_rows);
        if let Some(source) = &config.database.source_table {
            browser = browser.with_source_table(source.clone());
        }
        let id = SessionId::new();
        info!(session = %id, "Session started");
        Self {
            id,
            config,
            browser,
            cursor: RecordCursor::new(),
            planner: PlotPlanner::new(),
            experiment: Experiment::default(),
            hmms: HmmRegistry::new(),
            saved_files: Vec::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn browser(&self) -> &TableBrowser<S> {
        &self.browser
    }

    pub fn browser_mut(&mut self) -> &mut TableBrowser<S> {
        &mut self.browser
    }

    pub fn cursor(&self) -> &RecordCursor<EventRecord> {
        &self.cursor
    }

    pub fn experiment(&self) -> &Experiment {
        &self.experiment
    }

    pub fn hmms(&self) -> &HmmRegistry {
        &self.hmms
    }

    /// Remember the input names built from the source table's rendered rows
    pub fn save_files(&mut self) -> Result<&[String], DataError> {
        self.saved_files = self.browser.saved_files()?;
        info!(session = %self.id, files = self.saved_files.len(), "Saved input files");
        Ok(&self.saved_files)
    }

    pub fn saved_files(&self) -> &[String] {
        &self.saved_files
    }

    /// Saved files as analysis inputs, all in the aggregate sample
    pub fn saved_inputs(&self) -> Vec<InputFile> {
        self.saved_files.iter().map(|f| InputFile::from_table_cell(f, "")).collect()
    }

    /// Run `pipeline` and load whatever it produced, even when stopped early
    pub fn analyze<A: Analyzer + ?Sized>(
        &mut self,
        pipeline: &AnalysisPipeline,
        inputs: &[InputFile],
        analyzer: &A,
    ) -> Result<bool, DataError> {
        let AnalysisOutcome { experiment, stopped } = pipeline.run(inputs, analyzer)?;
        self.load_experiment(experiment);
        Ok(stopped)
    }

    /// Replace the loaded experiment. Exclusion marks are kept and follow
    /// the records they were made on.
    pub fn load_experiment(&mut self, experiment: Experiment) {
        let events: Vec<EventRecord> = experiment.events().cloned().collect();
        info!(session = %self.id, events = events.len(), files = experiment.files.len(), "Loaded experiment");
        self.cursor.replace(events);
        self.experiment = experiment;
        self.planner.invalidate();
    }

    pub fn move_next(&mut self) -> bool {
        self.cursor.move_next()
    }

    pub fn move_previous(&mut self) -> bool {
        self.cursor.move_previous()
    }

    pub fn seek(&mut self, index: usize) -> Result<(), DataError> {
        Ok(self.cursor.seek(index)?)
    }

    pub fn toggle_exclude(&mut self) -> Option<Mark> {
        let mark = self.cursor.toggle_exclude();
        if mark.is_some() {
            self.planner.invalidate();
        }
        mark
    }

    pub fn set_mark(&mut self, mark: Mark) -> bool {
        let changed = self.cursor.set_mark(mark);
        if changed {
            self.planner.invalidate();
        }
        changed
    }

    /// Plot the included events with axes given by their menu labels
    pub fn plot(&mut self, class: RecordClass, x_label: &str, y_label: &str) -> Result<PlotData, DataError> {
        let events = self.cursor.included();
        Ok(self.planner.plan_labels(class, x_label, y_label, &events)?)
    }

    /// Colours for the last plot under `scheme`, together with its data.
    /// The statistic sequences come from the planner's caches.
    pub fn recolor(&mut self, scheme: ColorScheme) -> Result<Option<(PlotData, Coloring)>, DataError> {
        let Some(request) = self.planner.last_request() else {
            return Ok(None);
        };
        let events = self.cursor.included();
        let data = self.planner.replot(&events)?;
        Ok(data.map(|data| (data, Coloring::assign(scheme, request.class, &events))))
    }

    /// Import a definition file and register it under `name`
    pub fn import_hmm(&mut self, name: &str, path: &Path) -> Result<&ProfileModel, DataError> {
        let model = ProfileModel::import(name, path)?;
        self.hmms.insert(model);
        self.hmms
            .get(name)
            .ok_or_else(|| DataError::NotFound(format!("HMM '{}'", name)))
    }

    /// Write every loaded event and segment to the configured CSV files
    pub fn export_csv(&self) -> Result<ExportSummary, DataError> {
        CsvExporter::export(self.experiment.events(), &self.config.export)
    }

    pub fn save_exclusions(&self, path: &Path) -> Result<(), DataError> {
        fs::write(path, self.cursor.exclusions().to_json()?)?;
        Ok(())
    }

    pub fn load_exclusions(&mut self, path: &Path) -> Result<usize, DataError> {
        let excluded = ExclusionSet::from_json(&fs::read_to_string(path)?)?;
        let count = excluded.len();
        self.cursor.set_exclusions(excluded);
        self.planner.invalidate();
        Ok(count)
    }
}
