//! Core functionality for the Abada record browser
//!
//! This crate provides the state that sits between the external analysis
//! library and whatever draws the plots: analysis records, the event cursor
//! with its exclusion marks, and the memoized plot statistics.

pub mod analysis;
pub mod navigation;
pub mod plot;
pub mod records;
pub mod stats;

use thiserror::Error;

// Re-export commonly used types
pub use analysis::{AnalysisPipeline, Analyzer, FilterSettings, InputFile, Progress, StopFlag};
pub use navigation::{CursorState, CursorSubscriber, ExclusionSet, Mark, RecordCursor};
pub use plot::{Coloring, ColorScheme, PlotData, PlotPlanner, Rgb};
pub use records::{AnalyzedFile, EventRecord, Experiment, RecordClass, RecordId, SegmentRecord};
pub use stats::{StatAxis, StatCache};

/// Errors raised by core state operations
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Position {index} out of bounds ({len} records)")]
    OutOfBounds { index: usize, len: usize },

    #[error("Unknown {class} axis '{axis}'")]
    UnknownAxis { class: RecordClass, axis: String },

    #[error("Invalid plot request: {0}")]
    InvalidPlot(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Analysis of '{file}' failed: {source}")]
    Analysis {
        file: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
