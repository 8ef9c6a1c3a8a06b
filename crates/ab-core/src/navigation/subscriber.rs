//! Cursor subscriber trait

use super::CursorContext;

/// Trait for components that redraw when the cursor moves or a mark changes
pub trait CursorSubscriber: Send + Sync {
    fn on_cursor_change(&self, context: &CursorContext);
}
