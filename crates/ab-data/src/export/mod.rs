//! CSV export of analysed events and segments

use std::fs::File;
use std::io::Write;
use std::path::Path;

use ab_core::EventRecord;
use csv::Writer;
use tracing::info;

use crate::config::ExportConfig;
use crate::DataError;

pub const EVENT_HEADERS: [&str; 7] =
    ["Filename", "Sample", "Start", "Mean (pA)", "STD", "Duration (s)", "Segment Count"];

pub const SEGMENT_HEADERS: [&str; 6] = ["Filename", "Sample", "Mean (pA)", "Start", "STD", "Duration (s)"];

/// Row counts written by an export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    pub events: usize,
    pub segments: usize,
}

/// Writes one row per event and one row per segment
pub struct CsvExporter;

impl CsvExporter {
    /// Write both files to the configured paths
    pub fn export<'a, I>(events: I, config: &ExportConfig) -> Result<ExportSummary, DataError>
    where
        I: IntoIterator<Item = &'a EventRecord>,
    {
        let events: Vec<&EventRecord> = events.into_iter().collect();
        let summary = ExportSummary {
            events: Self::write_events_to_path(events.iter().copied(), &config.event_csv)?,
            segments: Self::write_segments_to_path(events.iter().copied(), &config.segment_csv)?,
        };
        info!(
            events = summary.events,
            segments = summary.segments,
            event_csv = %config.event_csv.display(),
            segment_csv = %config.segment_csv.display(),
            "Exported analysis"
        );
        Ok(summary)
    }

    pub fn write_events_to_path<'a, I>(events: I, path: &Path) -> Result<usize, DataError>
    where
        I: IntoIterator<Item = &'a EventRecord>,
    {
        Self::write_events(events, File::create(path)?)
    }

    pub fn write_segments_to_path<'a, I>(events: I, path: &Path) -> Result<usize, DataError>
    where
        I: IntoIterator<Item = &'a EventRecord>,
    {
        Self::write_segments(events, File::create(path)?)
    }

    /// Unsegmented events write `N/A` as their segment count
    pub fn write_events<'a, I, W>(events: I, out: W) -> Result<usize, DataError>
    where
        I: IntoIterator<Item = &'a EventRecord>,
        W: Write,
    {
        let mut writer = Writer::from_writer(out);
        writer.write_record(EVENT_HEADERS)?;
        let mut rows = 0;
        for event in events {
            writer.write_record([
                event.filename.clone(),
                event.sample.clone(),
                event.start.to_string(),
                event.mean.to_string(),
                event.std.to_string(),
                event.duration.to_string(),
                event.segment_count_label(),
            ])?;
            rows += 1;
        }
        writer.flush()?;
        Ok(rows)
    }

    /// Segment starts are written relative to the start of the file
    pub fn write_segments<'a, I, W>(events: I, out: W) -> Result<usize, DataError>
    where
        I: IntoIterator<Item = &'a EventRecord>,
        W: Write,
    {
        let mut writer = Writer::from_writer(out);
        writer.write_record(SEGMENT_HEADERS)?;
        let mut rows = 0;
        for event in events {
            for segment in event.segments() {
                writer.write_record([
                    event.filename.clone(),
                    event.sample.clone(),
                    segment.mean.to_string(),
                    segment.absolute_start(event).to_string(),
                    segment.std.to_string(),
                    segment.duration.to_string(),
                ])?;
                rows += 1;
            }
        }
        writer.flush()?;
        Ok(rows)
    }
}
