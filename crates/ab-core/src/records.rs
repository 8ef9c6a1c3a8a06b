//! Analysis records produced by the external analysis library
//!
//! Nothing here computes a statistic. Events and segments are read-only
//! carriers for the fields the analysis library fills in.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Label used for inputs that were not assigned a sample
pub const AGGREGATE_SAMPLE: &str = "Aggregate Data";

/// Which kind of record a statistic is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordClass {
    Event,
    Segment,
}

impl RecordClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordClass::Event => "event",
            RecordClass::Segment => "segment",
        }
    }
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identity of an event: the file it came from and its start time.
///
/// The start time is kept in whole microseconds so identities compare exactly
/// after a JSON round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId {
    pub filename: String,
    pub start_us: i64,
}

impl RecordId {
    pub fn new(filename: impl Into<String>, start_seconds: f64) -> Self {
        Self {
            filename: filename.into(),
            start_us: (start_seconds * 1_000_000.0).round() as i64,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}us", self.filename, self.start_us)
    }
}

/// Anything the cursor can hold must expose a stable identity
pub trait Identified {
    fn record_id(&self) -> RecordId;
}

/// One segment (state) inside an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRecord {
    /// Start in seconds, relative to the owning event
    pub start: f64,
    pub mean: f64,
    pub std: f64,
    pub duration: f64,
}

impl SegmentRecord {
    /// Start time in seconds from the beginning of the file
    pub fn absolute_start(&self, event: &EventRecord) -> f64 {
        event.start + self.start
    }
}

/// One detected event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub filename: String,
    pub sample: String,
    /// Start in seconds from the beginning of the file
    pub start: f64,
    pub mean: f64,
    pub std: f64,
    pub duration: f64,
    /// `None` until a segmenter has run over the event
    pub segments: Option<Vec<SegmentRecord>>,
}

impl EventRecord {
    pub fn new(filename: impl Into<String>, start: f64, mean: f64, std: f64, duration: f64) -> Self {
        Self {
            filename: filename.into(),
            sample: AGGREGATE_SAMPLE.to_string(),
            start,
            mean,
            std,
            duration,
            segments: None,
        }
    }

    pub fn with_segments(mut self, segments: Vec<SegmentRecord>) -> Self {
        self.segments = Some(segments);
        self
    }

    pub fn segment_count(&self) -> Option<usize> {
        self.segments.as_ref().map(Vec::len)
    }

    /// Segment count as displayed and exported; unsegmented events read "N/A"
    pub fn segment_count_label(&self) -> String {
        match self.segment_count() {
            Some(n) => n.to_string(),
            None => "N/A".to_string(),
        }
    }

    pub fn segments(&self) -> &[SegmentRecord] {
        self.segments.as_deref().unwrap_or(&[])
    }
}

impl Identified for EventRecord {
    fn record_id(&self) -> RecordId {
        RecordId::new(self.filename.clone(), self.start)
    }
}

/// Events detected in a single input file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedFile {
    pub filename: String,
    pub sample: String,
    pub events: Vec<EventRecord>,
}

impl AnalyzedFile {
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

/// All files analysed in one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub files: Vec<AnalyzedFile>,
}

impl Experiment {
    pub fn new(files: Vec<AnalyzedFile>) -> Self {
        Self { files }
    }

    pub fn is_empty(&self) -> bool {
        self.files.iter().all(|f| f.events.is_empty())
    }

    /// Every event, file by file
    pub fn events(&self) -> impl Iterator<Item = &EventRecord> {
        self.files.iter().flat_map(|f| f.events.iter())
    }

    /// Every segment paired with the event that owns it
    pub fn segments(&self) -> impl Iterator<Item = (&EventRecord, &SegmentRecord)> {
        self.events()
            .flat_map(|event| event.segments().iter().map(move |seg| (event, seg)))
    }

    pub fn event_count(&self) -> usize {
        self.files.iter().map(AnalyzedFile::event_count).sum()
    }

    /// Sample labels in first-seen order
    pub fn samples(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        for file in &self.files {
            if !labels.contains(&file.sample) {
                labels.push(file.sample.clone());
            }
        }
        labels
    }

    pub fn filenames(&self) -> Vec<String> {
        self.files.iter().map(|f| f.filename.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64) -> SegmentRecord {
        SegmentRecord { start, mean: 20.0, std: 1.0, duration: 0.01 }
    }

    #[test]
    fn test_record_id_is_stable_across_float_noise() {
        let a = RecordId::new("a.abf", 1.2345671);
        let b = RecordId::new("a.abf", 1.2345674);
        assert_eq!(a, b);
        assert_ne!(a, RecordId::new("b.abf", 1.2345671));
    }

    #[test]
    fn test_segment_count_label() {
        let event = EventRecord::new("f", 0.0, 30.0, 2.0, 0.5);
        assert_eq!(event.segment_count_label(), "N/A");
        let event = event.with_segments(vec![seg(0.0), seg(0.1)]);
        assert_eq!(event.segment_count_label(), "2");
        assert_eq!(event.segments()[1].absolute_start(&event), 0.1);
    }

    #[test]
    fn test_experiment_iterators() {
        let mut second = EventRecord::new("f2", 3.0, 25.0, 2.0, 0.2);
        second.sample = "lambda".into();
        let exp = Experiment::new(vec![
            AnalyzedFile {
                filename: "f1".into(),
                sample: AGGREGATE_SAMPLE.into(),
                events: vec![EventRecord::new("f1", 1.0, 30.0, 2.0, 0.5).with_segments(vec![seg(0.0)])],
            },
            AnalyzedFile {
                filename: "f2".into(),
                sample: "lambda".into(),
                events: vec![second.with_segments(vec![seg(0.0), seg(0.05)])],
            },
        ]);

        assert_eq!(exp.event_count(), 2);
        assert_eq!(exp.segments().count(), 3);
        assert_eq!(exp.samples(), vec![AGGREGATE_SAMPLE.to_string(), "lambda".to_string()]);
        assert_eq!(exp.filenames(), vec!["f1".to_string(), "f2".to_string()]);
    }
}
