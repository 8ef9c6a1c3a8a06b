//! JSON persistence of analysed files

use std::fs;
use std::path::{Path, PathBuf};

use ab_core::analysis::{Analyzer, FilterSettings, InputFile};
use ab_core::{AnalyzedFile, EventRecord, Experiment};
use tracing::{debug, warn};

use crate::DataError;

pub fn save_experiment(experiment: &Experiment, path: &Path) -> Result<(), DataError> {
    fs::write(path, serde_json::to_string_pretty(experiment)?)?;
    debug!(path = %path.display(), files = experiment.files.len(), "Saved experiment");
    Ok(())
}

pub fn load_experiment(path: &Path) -> Result<Experiment, DataError> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Archive path for an input: the input itself if it already names a JSON
/// file, otherwise the input with `.json` appended
pub fn archive_path(input: &InputFile) -> PathBuf {
    if input.path.ends_with("json") {
        PathBuf::from(&input.path)
    } else {
        PathBuf::from(format!("{}.json", input.path))
    }
}

/// Wraps an analyzer so finished files are read from and written to JSON
/// archives next to the recordings
pub struct JsonArchive<A> {
    inner: A,
    load: bool,
    save: bool,
}

impl<A: Analyzer> JsonArchive<A> {
    pub fn new(inner: A) -> Self {
        Self { inner, load: true, save: false }
    }

    /// Reuse existing archives instead of analysing again
    pub fn with_load(mut self, load: bool) -> Self {
        self.load = load;
        self
    }

    /// Write an archive for every finished file
    pub fn with_save(mut self, save: bool) -> Self {
        self.save = save;
        self
    }

    pub fn into_inner(self) -> A {
        self.inner
    }
}

impl<A: Analyzer> Analyzer for JsonArchive<A> {
    fn detect_events(&self, input: &InputFile, filter: Option<&FilterSettings>) -> anyhow::Result<Vec<EventRecord>> {
        self.inner.detect_events(input, filter)
    }

    fn segment(&self, event: &mut EventRecord, filter: Option<&FilterSettings>) -> anyhow::Result<()> {
        self.inner.segment(event, filter)
    }

    /// An unreadable archive falls back to a fresh analysis
    fn load_cached(&self, input: &InputFile, filter: Option<&FilterSettings>) -> Option<AnalyzedFile> {
        if !self.load {
            return self.inner.load_cached(input, filter);
        }
        let path = archive_path(input);
        if !path.exists() {
            return self.inner.load_cached(input, filter);
        }
        match fs::read_to_string(&path)
            .map_err(DataError::from)
            .and_then(|text| serde_json::from_str::<AnalyzedFile>(&text).map_err(DataError::from))
        {
            Ok(file) => Some(file),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable archive");
                self.inner.load_cached(input, filter)
            }
        }
    }

    fn store(&self, input: &InputFile, filter: Option<&FilterSettings>, file: &AnalyzedFile) -> anyhow::Result<()> {
        self.inner.store(input, filter, file)?;
        if self.save {
            let path = archive_path(input);
            fs::write(&path, serde_json::to_string(file)?)?;
            debug!(path = %path.display(), events = file.events.len(), "Archived analysis");
        }
        Ok(())
    }
}
