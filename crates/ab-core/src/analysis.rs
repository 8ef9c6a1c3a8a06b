//! Sequential analysis loop over input files
//!
//! Event detection and segmentation belong to the external analysis library,
//! reached through [`Analyzer`]. This module only drives it file by file,
//! publishes progress and honours a cooperative stop flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::records::{AnalyzedFile, EventRecord, Experiment, AGGREGATE_SAMPLE};
use crate::CoreError;

/// Bessel filter parameters handed to the analysis library
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterSettings {
    pub order: u32,
    pub cutoff_hz: f64,
}

impl FilterSettings {
    /// Parse the order and cutoff text fields
    pub fn parse(order: &str, cutoff: &str) -> Result<Self, CoreError> {
        let order: u32 = order
            .trim()
            .parse()
            .ok()
            .filter(|o| *o > 0)
            .ok_or_else(|| CoreError::InvalidInput(format!("filter order '{}' is not a positive integer", order.trim())))?;
        let cutoff_hz: f64 = cutoff
            .trim()
            .parse()
            .ok()
            .filter(|c: &f64| c.is_finite() && *c > 0.0)
            .ok_or_else(|| CoreError::InvalidInput(format!("cutoff '{}' is not a positive frequency", cutoff.trim())))?;
        Ok(Self { order, cutoff_hz })
    }
}

/// One file queued for analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFile {
    /// Path without the recording extension
    pub path: String,
    pub sample: String,
}

impl InputFile {
    /// Build an input from the file list cells; a trailing `.abf` is dropped
    /// and an empty sample becomes the aggregate sample.
    pub fn from_table_cell(path: &str, sample: &str) -> Self {
        let path = path.trim();
        let path = path.strip_suffix(".abf").unwrap_or(path);
        let sample = sample.trim();
        Self {
            path: path.to_string(),
            sample: if sample.is_empty() { AGGREGATE_SAMPLE.to_string() } else { sample.to_string() },
        }
    }

    /// Last path component, accepting either separator
    pub fn file_name(&self) -> &str {
        self.path.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(&self.path)
    }
}

/// External event detector and segmenter
pub trait Analyzer {
    /// Detect events in one recording
    fn detect_events(&self, input: &InputFile, filter: Option<&FilterSettings>) -> anyhow::Result<Vec<EventRecord>>;

    /// Split one event into segments, filling `event.segments`
    fn segment(&self, event: &mut EventRecord, filter: Option<&FilterSettings>) -> anyhow::Result<()>;

    /// A previously stored analysis of this input made with `filter`, if one
    /// exists
    fn load_cached(&self, _input: &InputFile, _filter: Option<&FilterSettings>) -> Option<AnalyzedFile> {
        None
    }

    /// Persist a finished file
    fn store(&self, _input: &InputFile, _filter: Option<&FilterSettings>, _file: &AnalyzedFile) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Cooperative cancellation flag, polled between events and between files
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

/// Progress snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Files finished so far
    pub files_done: usize,
    pub files_total: usize,
    /// Events segmented in the current file
    pub events_done: usize,
    pub events_total: usize,
}

impl Progress {
    /// Overall completion in [0, 1]
    pub fn fraction(&self) -> f64 {
        if self.files_total == 0 {
            return 0.0;
        }
        let within = if self.events_total == 0 {
            0.0
        } else {
            self.events_done as f64 / self.events_total as f64
        };
        ((self.files_done as f64 + within) / self.files_total as f64).min(1.0)
    }
}

/// Result of a pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub experiment: Experiment,
    /// True when the stop flag ended the run early
    pub stopped: bool,
}

/// Drives an [`Analyzer`] over a list of inputs
pub struct AnalysisPipeline {
    filter: Option<FilterSettings>,
    segment: bool,
    stop: StopFlag,
    progress: Arc<RwLock<Progress>>,
}

impl Default for AnalysisPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisPipeline {
    pub fn new() -> Self {
        Self {
            filter: None,
            segment: true,
            stop: StopFlag::new(),
            progress: Arc::new(RwLock::new(Progress::default())),
        }
    }

    pub fn with_filter(mut self, filter: Option<FilterSettings>) -> Self {
        self.filter = filter;
        self
    }

    /// Whether events are passed to the segmenter after detection
    pub fn with_segmentation(mut self, segment: bool) -> Self {
        self.segment = segment;
        self
    }

    /// Handle another thread can use to stop the run
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    /// Shared progress another thread can poll
    pub fn progress_handle(&self) -> Arc<RwLock<Progress>> {
        self.progress.clone()
    }

    pub fn progress(&self) -> Progress {
        *self.progress.read()
    }

    /// Analyse every input in order.
    ///
    /// A detection or segmentation failure aborts the run. When the stop flag
    /// is raised the files finished so far are returned, including the
    /// partially segmented file in progress.
    pub fn run<A: Analyzer + ?Sized>(&self, inputs: &[InputFile], analyzer: &A) -> Result<AnalysisOutcome, CoreError> {
        self.stop.reset();
        *self.progress.write() = Progress { files_total: inputs.len(), ..Progress::default() };
        info!(files = inputs.len(), segment = self.segment, filter = ?self.filter, "Starting analysis");

        let mut files = Vec::with_capacity(inputs.len());
        let mut stopped = false;

        for input in inputs {
            let file = match analyzer.load_cached(input, self.filter.as_ref()) {
                Some(cached) => {
                    debug!(file = %input.path, events = cached.events.len(), "Loaded stored analysis");
                    cached
                }
                None => {
                    let file = self.analyze_one(input, analyzer)?;
                    stopped = self.stop.is_stopped();
                    file
                }
            };

            analyzer.store(input, self.filter.as_ref(), &file).map_err(|source| CoreError::Analysis {
                file: input.path.clone(),
                source,
            })?;
            files.push(file);

            {
                let mut progress = self.progress.write();
                progress.files_done += 1;
                progress.events_done = 0;
                progress.events_total = 0;
            }

            if stopped || self.stop.is_stopped() {
                stopped = true;
                warn!(finished = files.len(), total = inputs.len(), "Analysis stopped early");
                break;
            }
        }

        let experiment = Experiment::new(files);
        info!(events = experiment.event_count(), stopped, "Analysis finished");
        Ok(AnalysisOutcome { experiment, stopped })
    }

    fn analyze_one<A: Analyzer + ?Sized>(&self, input: &InputFile, analyzer: &A) -> Result<AnalyzedFile, CoreError> {
        let wrap = |source: anyhow::Error| CoreError::Analysis { file: input.path.clone(), source };

        let mut events = analyzer.detect_events(input, self.filter.as_ref()).map_err(wrap)?;
        debug!(file = %input.path, events = events.len(), "Detected events");
        for event in &mut events {
            event.sample = input.sample.clone();
        }

        if self.segment {
            self.progress.write().events_total = events.len();
            for event in &mut events {
                if self.stop.is_stopped() {
                    break;
                }
                analyzer.segment(event, self.filter.as_ref()).map_err(wrap)?;
                self.progress.write().events_done += 1;
            }
        }

        Ok(AnalyzedFile {
            filename: input.file_name().to_string(),
            sample: input.sample.clone(),
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::SegmentRecord;
    use std::cell::Cell;

    /// Three events per file, two segments per event
    struct FakeAnalyzer {
        segmented: Cell<usize>,
        stop_after: Option<(usize, StopFlag)>,
        fail_on: Option<&'static str>,
    }

    impl FakeAnalyzer {
        fn new() -> Self {
            Self { segmented: Cell::new(0), stop_after: None, fail_on: None }
        }
    }

    impl Analyzer for FakeAnalyzer {
        fn detect_events(&self, input: &InputFile, _filter: Option<&FilterSettings>) -> anyhow::Result<Vec<EventRecord>> {
            if self.fail_on == Some(input.path.as_str()) {
                anyhow::bail!("unreadable recording");
            }
            Ok((0..3)
                .map(|i| EventRecord::new(input.file_name(), i as f64, 30.0, 1.0, 0.2))
                .collect())
        }

        fn segment(&self, event: &mut EventRecord, _filter: Option<&FilterSettings>) -> anyhow::Result<()> {
            let seg = SegmentRecord { start: 0.0, mean: event.mean, std: 0.5, duration: 0.1 };
            event.segments = Some(vec![seg.clone(), seg]);
            self.segmented.set(self.segmented.get() + 1);
            if let Some((limit, flag)) = &self.stop_after {
                if self.segmented.get() >= *limit {
                    flag.stop();
                }
            }
            Ok(())
        }
    }

    fn inputs() -> Vec<InputFile> {
        vec![
            InputFile::from_table_cell("data/one.abf", "lambda"),
            InputFile::from_table_cell("data/two.abf", ""),
        ]
    }

    #[test]
    fn test_input_file_from_cells() {
        let input = InputFile::from_table_cell(" Z:\\runs\\14x001.abf ", "");
        assert_eq!(input.path, "Z:\\runs\\14x001");
        assert_eq!(input.sample, AGGREGATE_SAMPLE);
        assert_eq!(input.file_name(), "14x001");
    }

    #[test]
    fn test_filter_settings_validation() {
        assert_eq!(
            FilterSettings::parse("1", "2000").unwrap(),
            FilterSettings { order: 1, cutoff_hz: 2000.0 }
        );
        assert!(FilterSettings::parse("0", "2000").is_err());
        assert!(FilterSettings::parse("1", "abc").is_err());
        assert!(FilterSettings::parse("1", "inf").is_err());
    }

    #[test]
    fn test_full_run() {
        let analyzer = FakeAnalyzer::new();
        let pipeline = AnalysisPipeline::new();
        let outcome = pipeline.run(&inputs(), &analyzer).unwrap();

        assert!(!outcome.stopped);
        assert_eq!(outcome.experiment.files.len(), 2);
        assert_eq!(outcome.experiment.event_count(), 6);
        assert_eq!(outcome.experiment.segments().count(), 12);
        assert_eq!(outcome.experiment.files[0].sample, "lambda");
        assert_eq!(outcome.experiment.files[1].events[0].sample, AGGREGATE_SAMPLE);
        assert_eq!(pipeline.progress().files_done, 2);
        assert_eq!(pipeline.progress().fraction(), 1.0);
    }

    #[test]
    fn test_without_segmentation() {
        let analyzer = FakeAnalyzer::new();
        let outcome = AnalysisPipeline::new()
            .with_segmentation(false)
            .run(&inputs(), &analyzer)
            .unwrap();
        assert_eq!(analyzer.segmented.get(), 0);
        assert!(outcome.experiment.events().all(|e| e.segments.is_none()));
    }

    #[test]
    fn test_stop_flag_ends_run_early() {
        let pipeline = AnalysisPipeline::new();
        let mut analyzer = FakeAnalyzer::new();
        analyzer.stop_after = Some((2, pipeline.stop_flag()));

        let outcome = pipeline.run(&inputs(), &analyzer).unwrap();
        assert!(outcome.stopped);
        assert_eq!(outcome.experiment.files.len(), 1);
        assert_eq!(analyzer.segmented.get(), 2);
        assert!(outcome.experiment.files[0].events[2].segments.is_none());
    }

    #[test]
    fn test_detection_failure_aborts() {
        let mut analyzer = FakeAnalyzer::new();
        analyzer.fail_on = Some("data/two");
        let err = AnalysisPipeline::new().run(&inputs(), &analyzer).unwrap_err();
        assert!(matches!(err, CoreError::Analysis { ref file, .. } if file == "data/two"));
    }

    #[test]
    fn test_filter_reaches_cache_hooks() {
        struct Remembering {
            inner: FakeAnalyzer,
            seen: RwLock<Vec<Option<FilterSettings>>>,
        }

        impl Analyzer for Remembering {
            fn detect_events(&self, input: &InputFile, filter: Option<&FilterSettings>) -> anyhow::Result<Vec<EventRecord>> {
                self.inner.detect_events(input, filter)
            }

            fn segment(&self, event: &mut EventRecord, filter: Option<&FilterSettings>) -> anyhow::Result<()> {
                self.inner.segment(event, filter)
            }

            fn load_cached(&self, _input: &InputFile, filter: Option<&FilterSettings>) -> Option<AnalyzedFile> {
                self.seen.write().push(filter.copied());
                None
            }

            fn store(&self, _input: &InputFile, filter: Option<&FilterSettings>, _file: &AnalyzedFile) -> anyhow::Result<()> {
                self.seen.write().push(filter.copied());
                Ok(())
            }
        }

        let filter = FilterSettings { order: 1, cutoff_hz: 2000.0 };
        let analyzer = Remembering { inner: FakeAnalyzer::new(), seen: RwLock::new(Vec::new()) };
        AnalysisPipeline::new().with_filter(Some(filter)).run(&inputs(), &analyzer).unwrap();
        assert_eq!(*analyzer.seen.read(), vec![Some(filter); 4]);
    }
}
