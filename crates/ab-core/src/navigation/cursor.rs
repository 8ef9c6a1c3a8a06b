//! Record cursor implementation

use std::sync::{Arc, Weak};

use tracing::debug;

use super::{CursorContext, CursorState, CursorSubscriber, ExclusionSet, Mark};
use crate::records::{Identified, RecordId};
use crate::CoreError;

/// Bounded, bidirectional cursor over an ordered record list.
///
/// The index never leaves `[0, len - 1]` once positioned; stepping past either
/// end is a no-op rather than a wrap.
pub struct RecordCursor<T: Identified> {
    records: Vec<T>,
    index: Option<usize>,
    excluded: ExclusionSet,
    subscribers: Vec<Weak<dyn CursorSubscriber>>,
}

impl<T: Identified> Default for RecordCursor<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Identified> RecordCursor<T> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            index: None,
            excluded: ExclusionSet::new(),
            subscribers: Vec::new(),
        }
    }

    pub fn with_records(records: Vec<T>) -> Self {
        let mut cursor = Self::new();
        cursor.records = records;
        cursor
    }

    /// Swap in a new record list. The cursor goes back to "nothing shown";
    /// exclusion marks are kept because they are keyed by identity.
    pub fn replace(&mut self, records: Vec<T>) {
        debug!(count = records.len(), excluded = self.excluded.len(), "Replacing cursor records");
        self.records = records;
        self.index = None;
        self.notify_subscribers();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn state(&self) -> CursorState {
        match self.index {
            _ if self.records.is_empty() => CursorState::Empty,
            None => CursorState::Ready,
            Some(i) => CursorState::Positioned(i),
        }
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn current(&self) -> Option<&T> {
        self.index.and_then(|i| self.records.get(i))
    }

    /// Step forward; returns true if the index changed
    pub fn move_next(&mut self) -> bool {
        let n = self.records.len();
        if n == 0 {
            return false;
        }
        let next = match self.index {
            None => 0,
            Some(i) if i + 1 < n => i + 1,
            Some(_) => return false,
        };
        self.index = Some(next);
        self.notify_subscribers();
        true
    }

    /// Step backward; returns true if the index changed
    pub fn move_previous(&mut self) -> bool {
        match self.index {
            Some(i) if i > 0 => {
                self.index = Some(i - 1);
                self.notify_subscribers();
                true
            }
            _ => false,
        }
    }

    /// Jump straight to an index
    pub fn seek(&mut self, index: usize) -> Result<(), CoreError> {
        if index >= self.records.len() {
            return Err(CoreError::OutOfBounds { index, len: self.records.len() });
        }
        self.index = Some(index);
        self.notify_subscribers();
        Ok(())
    }

    /// Flip the exclusion mark of the current record.
    ///
    /// Returns the new state, or `None` when nothing is shown.
    pub fn toggle_exclude(&mut self) -> Option<Mark> {
        let id = self.current_id()?;
        let excluded = self.excluded.toggle(id);
        self.notify_subscribers();
        Some(Mark::from(excluded))
    }

    /// Set the mark of the current record explicitly. Returns false when
    /// nothing is shown.
    pub fn set_mark(&mut self, mark: Mark) -> bool {
        let Some(id) = self.current_id() else {
            return false;
        };
        match mark {
            Mark::On => self.excluded.insert(id),
            Mark::Off => self.excluded.remove(&id),
        };
        self.notify_subscribers();
        true
    }

    /// Mark of the current record; `Off` when nothing is shown
    pub fn mark(&self) -> Mark {
        self.current_id()
            .map(|id| Mark::from(self.excluded.contains(&id)))
            .unwrap_or(Mark::Off)
    }

    pub fn is_excluded(&self, record: &T) -> bool {
        self.excluded.contains(&record.record_id())
    }

    pub fn exclusions(&self) -> &ExclusionSet {
        &self.excluded
    }

    pub fn set_exclusions(&mut self, excluded: ExclusionSet) {
        self.excluded = excluded;
        self.notify_subscribers();
    }

    /// Records not marked as excluded, in order
    pub fn included(&self) -> Vec<&T> {
        self.records.iter().filter(|r| !self.is_excluded(r)).collect()
    }

    pub fn context(&self) -> CursorContext {
        CursorContext {
            state: self.state(),
            total: self.records.len(),
            mark: self.mark(),
            excluded_count: self.excluded.len(),
        }
    }

    pub fn add_subscriber(&mut self, subscriber: Arc<dyn CursorSubscriber>) {
        self.subscribers.push(Arc::downgrade(&subscriber));
    }

    fn current_id(&self) -> Option<RecordId> {
        self.current().map(Identified::record_id)
    }

    fn notify_subscribers(&mut self) {
        // Remove any dead weak references
        self.subscribers.retain(|weak| weak.strong_count() > 0);
        if self.subscribers.is_empty() {
            return;
        }

        let context = self.context();
        for weak in &self.subscribers {
            if let Some(subscriber) = weak.upgrade() {
                subscriber.on_cursor_change(&context);
            }
        }
    }
}
