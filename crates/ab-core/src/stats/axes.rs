//! Plot axes and the scalar each one reads off a record

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::records::{EventRecord, RecordClass};
use crate::CoreError;

/// A selectable plot axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatAxis {
    Duration,
    Mean,
    Std,
    SegmentCount,
    /// Not a value sequence: selects histogram mode on the other axis
    Count,
}

const EVENT_AXES: &[StatAxis] = &[
    StatAxis::Duration,
    StatAxis::Mean,
    StatAxis::SegmentCount,
    StatAxis::Count,
];

const SEGMENT_AXES: &[StatAxis] = &[
    StatAxis::Duration,
    StatAxis::Mean,
    StatAxis::Std,
    StatAxis::Count,
];

impl StatAxis {
    pub fn label(&self) -> &'static str {
        match self {
            StatAxis::Duration => "Duration (s)",
            StatAxis::Mean => "Mean (pA)",
            StatAxis::Std => "STD (pA)",
            StatAxis::SegmentCount => "Segment Count",
            StatAxis::Count => "Count",
        }
    }

    /// Axes offered for a record class, in menu order
    pub fn available(class: RecordClass) -> &'static [StatAxis] {
        match class {
            RecordClass::Event => EVENT_AXES,
            RecordClass::Segment => SEGMENT_AXES,
        }
    }

    /// Look up an axis by its label, rejecting axes the class does not offer
    pub fn parse(class: RecordClass, label: &str) -> Result<StatAxis, CoreError> {
        Self::available(class)
            .iter()
            .copied()
            .find(|axis| axis.label() == label)
            .ok_or_else(|| CoreError::UnknownAxis { class, axis: label.to_string() })
    }

    /// Values of this axis over the given events.
    ///
    /// Segment statistics flatten the segments of every event passed in.
    /// Unsegmented events report NaN for "Segment Count" so the sequence stays
    /// aligned with the events. `Count` has no sequence and yields `None`.
    pub fn values(&self, class: RecordClass, events: &[&EventRecord]) -> Option<Vec<f64>> {
        match (class, self) {
            (_, StatAxis::Count) => None,
            (RecordClass::Event, axis) => Some(
                events
                    .iter()
                    .map(|e| match axis {
                        StatAxis::Duration => e.duration,
                        StatAxis::Mean => e.mean,
                        StatAxis::Std => e.std,
                        StatAxis::SegmentCount => e.segment_count().map_or(f64::NAN, |n| n as f64),
                        StatAxis::Count => f64::NAN,
                    })
                    .collect(),
            ),
            (RecordClass::Segment, axis) => Some(
                events
                    .iter()
                    .flat_map(|e| e.segments().iter())
                    .map(|s| match axis {
                        StatAxis::Duration => s.duration,
                        StatAxis::Mean => s.mean,
                        StatAxis::Std => s.std,
                        _ => f64::NAN,
                    })
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for StatAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
