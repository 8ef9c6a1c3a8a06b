//! Plot planning for the statistics view
//!
//! Decides what kind of plot an axis pair asks for and gathers the value
//! sequences for it. Drawing is left to whichever front-end consumes
//! [`PlotData`].

mod colors;

pub use colors::{categorical_color, Coloring, ColorScheme, Rgb};

use tracing::debug;

use crate::records::{EventRecord, RecordClass};
use crate::stats::{StatAxis, StatCache};
use crate::CoreError;

/// Histogram bar direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Vertical,
    Horizontal,
}

/// Number of histogram bins
pub const HISTOGRAM_BINS: usize = 25;

/// What the front-end should draw
#[derive(Debug, Clone, PartialEq)]
pub enum PlotData {
    Histogram {
        orientation: Orientation,
        axis: StatAxis,
        values: Vec<f64>,
    },
    Scatter {
        x_axis: StatAxis,
        y_axis: StatAxis,
        x: Vec<f64>,
        y: Vec<f64>,
    },
}

impl PlotData {
    /// Number of plotted points
    pub fn len(&self) -> usize {
        match self {
            PlotData::Histogram { values, .. } => values.len(),
            PlotData::Scatter { x, .. } => x.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One histogram bar covering `[start, end)`; the last bar also holds `end`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Equal-width bins over the finite values. A single distinct value gets a
/// unit-wide range centred on it.
pub fn histogram(values: &[f64], bins: usize) -> Vec<Bin> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return Vec::new();
    }
    let mut lo = finite.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;

    let mut counts = vec![0usize; bins];
    for v in finite {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| Bin {
            start: lo + i as f64 * width,
            end: lo + (i + 1) as f64 * width,
            count,
        })
        .collect()
}

/// The last axis selection, kept so a recolour can replot without input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlotRequest {
    pub class: RecordClass,
    pub x: StatAxis,
    pub y: StatAxis,
}

/// Turns axis selections into plot data, reusing the previous sequences
/// when only the colouring changes.
#[derive(Debug, Default)]
pub struct PlotPlanner {
    x_cache: StatCache,
    y_cache: StatCache,
    last: Option<PlotRequest>,
}

impl PlotPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Planner whose caches recompute every time
    pub fn uncached() -> Self {
        Self {
            x_cache: StatCache::bypassed(),
            y_cache: StatCache::bypassed(),
            last: None,
        }
    }

    pub fn last_request(&self) -> Option<PlotRequest> {
        self.last
    }

    /// Plan a plot from axis labels as they appear in the axis menus
    pub fn plan_labels(
        &mut self,
        class: RecordClass,
        x_label: &str,
        y_label: &str,
        events: &[&EventRecord],
    ) -> Result<PlotData, CoreError> {
        let x = StatAxis::parse(class, x_label)?;
        let y = StatAxis::parse(class, y_label)?;
        self.plan(PlotRequest { class, x, y }, events)
    }

    /// `Count` on x gives a horizontal histogram of y, `Count` on y a
    /// vertical histogram of x, anything else a scatter plot.
    pub fn plan(&mut self, request: PlotRequest, events: &[&EventRecord]) -> Result<PlotData, CoreError> {
        let PlotRequest { class, x, y } = request;
        debug!(%class, x = x.label(), y = y.label(), records = events.len(), "Planning plot");

        let data = match (x, y) {
            (StatAxis::Count, StatAxis::Count) => {
                return Err(CoreError::InvalidPlot("both axes are Count".to_string()));
            }
            (StatAxis::Count, axis) => PlotData::Histogram {
                orientation: Orientation::Horizontal,
                axis,
                values: Self::sequence(&mut self.y_cache, class, axis, events)?,
            },
            (axis, StatAxis::Count) => PlotData::Histogram {
                orientation: Orientation::Vertical,
                axis,
                values: Self::sequence(&mut self.x_cache, class, axis, events)?,
            },
            (x_axis, y_axis) => PlotData::Scatter {
                x_axis,
                y_axis,
                x: Self::sequence(&mut self.x_cache, class, x_axis, events)?,
                y: Self::sequence(&mut self.y_cache, class, y_axis, events)?,
            },
        };

        self.last = Some(request);
        Ok(data)
    }

    /// Replot the last request, e.g. after a colour scheme change
    pub fn replot(&mut self, events: &[&EventRecord]) -> Result<Option<PlotData>, CoreError> {
        match self.last {
            Some(request) => self.plan(request, events).map(Some),
            None => Ok(None),
        }
    }

    /// Forget cached sequences; call when the included records change
    pub fn invalidate(&mut self) {
        self.x_cache.invalidate();
        self.y_cache.invalidate();
    }

    pub fn cache_misses(&self) -> u64 {
        self.x_cache.misses() + self.y_cache.misses()
    }

    fn sequence(
        cache: &mut StatCache,
        class: RecordClass,
        axis: StatAxis,
        events: &[&EventRecord],
    ) -> Result<Vec<f64>, CoreError> {
        let values = cache.try_get(class, axis.label(), || {
            axis.values(class, events)
                .ok_or_else(|| CoreError::InvalidPlot(format!("{} has no value sequence", axis)))
        })?;
        Ok(values.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::SegmentRecord;

    fn sample_events() -> Vec<EventRecord> {
        let seg = |mean| SegmentRecord { start: 0.0, mean, std: 1.0, duration: 0.02 };
        vec![
            EventRecord::new("a", 0.0, 30.0, 2.0, 0.1).with_segments(vec![seg(10.0), seg(11.0)]),
            EventRecord::new("a", 1.0, 35.0, 2.0, 0.3).with_segments(vec![seg(12.0)]),
        ]
    }

    #[test]
    fn test_count_axes_select_histograms() {
        let events = sample_events();
        let refs: Vec<&EventRecord> = events.iter().collect();
        let mut planner = PlotPlanner::new();

        let plot = planner.plan_labels(RecordClass::Event, "Count", "Mean (pA)", &refs).unwrap();
        assert_eq!(
            plot,
            PlotData::Histogram { orientation: Orientation::Horizontal, axis: StatAxis::Mean, values: vec![30.0, 35.0] }
        );

        let plot = planner.plan_labels(RecordClass::Segment, "Mean (pA)", "Count", &refs).unwrap();
        assert_eq!(
            plot,
            PlotData::Histogram { orientation: Orientation::Vertical, axis: StatAxis::Mean, values: vec![10.0, 11.0, 12.0] }
        );

        assert!(planner.plan_labels(RecordClass::Event, "Count", "Count", &refs).is_err());
    }

    #[test]
    fn test_scatter_and_replot_reuse_cache() {
        let events = sample_events();
        let refs: Vec<&EventRecord> = events.iter().collect();
        let mut planner = PlotPlanner::new();

        let first = planner
            .plan_labels(RecordClass::Event, "Duration (s)", "Mean (pA)", &refs)
            .unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(planner.cache_misses(), 2);

        let again = planner.replot(&refs).unwrap().unwrap();
        assert_eq!(again, first);
        assert_eq!(planner.cache_misses(), 2);

        planner.invalidate();
        planner.replot(&refs).unwrap();
        assert_eq!(planner.cache_misses(), 4);
    }

    #[test]
    fn test_uncached_planner_matches_cached() {
        let events = sample_events();
        let refs: Vec<&EventRecord> = events.iter().collect();
        let mut cached = PlotPlanner::new();
        let mut uncached = PlotPlanner::uncached();

        for (x, y) in [("Duration (s)", "Mean (pA)"), ("Duration (s)", "Mean (pA)"), ("Count", "Segment Count")] {
            assert_eq!(
                cached.plan_labels(RecordClass::Event, x, y, &refs).unwrap().len(),
                uncached.plan_labels(RecordClass::Event, x, y, &refs).unwrap().len()
            );
        }
    }

    #[test]
    fn test_histogram_bins() {
        let bins = histogram(&[0.0, 1.0, 2.0, 3.0, 4.0, f64::NAN], 4);
        assert_eq!(bins.len(), 4);
        assert_eq!(bins.iter().map(|b| b.count).collect::<Vec<_>>(), vec![1, 1, 1, 2]);
        assert_eq!(bins[0].start, 0.0);
        assert_eq!(bins[3].end, 4.0);

        let single = histogram(&[7.0, 7.0], HISTOGRAM_BINS);
        assert_eq!(single.len(), HISTOGRAM_BINS);
        assert_eq!(single.iter().map(|b| b.count).sum::<usize>(), 2);
        assert!(histogram(&[], HISTOGRAM_BINS).is_empty());
    }

    #[test]
    fn test_replot_without_request() {
        let mut planner = PlotPlanner::new();
        assert_eq!(planner.replot(&[]).unwrap(), None);
    }
}
