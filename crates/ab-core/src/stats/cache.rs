//! Single-slot memoization of a statistic sequence

use tracing::trace;

use crate::records::RecordClass;

#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheKey {
    class: RecordClass,
    axis: String,
}

/// Remembers the last `(record class, axis)` sequence that was computed.
///
/// Capacity is exactly one entry: a request with a different key replaces it.
/// The cache only saves work when a plot is recoloured without changing axes;
/// a bypassed cache must produce the same sequences.
#[derive(Debug, Default)]
pub struct StatCache {
    slot: Option<(CacheKey, Vec<f64>)>,
    bypass: bool,
    hits: u64,
    misses: u64,
}

impl StatCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache that recomputes on every call
    pub fn bypassed() -> Self {
        Self { bypass: true, ..Self::default() }
    }

    pub fn get<F>(&mut self, class: RecordClass, axis: &str, compute: F) -> &[f64]
    where
        F: FnOnce() -> Vec<f64>,
    {
        match self.try_get(class, axis, || Ok::<_, std::convert::Infallible>(compute())) {
            Ok(values) => values,
            Err(never) => match never {},
        }
    }

    /// Like [`get`](Self::get) for computations that can fail. A failed
    /// computation leaves the previous entry in place.
    pub fn try_get<F, E>(&mut self, class: RecordClass, axis: &str, compute: F) -> Result<&[f64], E>
    where
        F: FnOnce() -> Result<Vec<f64>, E>,
    {
        let hit = !self.bypass
            && matches!(&self.slot, Some((key, _)) if key.class == class && key.axis == axis);

        if hit {
            self.hits += 1;
            trace!(%class, axis, hits = self.hits, "Stat cache hit");
        } else {
            let values = compute()?;
            self.misses += 1;
            trace!(%class, axis, misses = self.misses, "Stat cache miss");
            self.slot = Some((CacheKey { class, axis: axis.to_string() }, values));
        }

        Ok(self.slot.as_ref().map(|(_, values)| values.as_slice()).unwrap_or(&[]))
    }

    /// Drop the cached entry, e.g. after the underlying records changed
    pub fn invalidate(&mut self) {
        self.slot = None;
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
