//! Sequential navigation over analysed records

use serde::{Deserialize, Serialize};

mod cursor;
mod exclusion;
mod subscriber;

pub use cursor::RecordCursor;
pub use exclusion::ExclusionSet;
pub use subscriber::CursorSubscriber;

/// Logical cursor states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CursorState {
    /// No records loaded
    Empty,
    /// Records loaded, nothing shown yet
    Ready,
    /// Showing the record at this index
    Positioned(usize),
}

/// Two-valued exclusion mark for the current record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mark {
    Off,
    On,
}

impl From<bool> for Mark {
    fn from(on: bool) -> Self {
        if on {
            Mark::On
        } else {
            Mark::Off
        }
    }
}

impl Mark {
    pub fn is_on(&self) -> bool {
        matches!(self, Mark::On)
    }
}

/// Context passed to subscribers when the cursor changes
#[derive(Debug, Clone, PartialEq)]
pub struct CursorContext {
    pub state: CursorState,
    pub total: usize,
    pub mark: Mark,
    pub excluded_count: usize,
}
