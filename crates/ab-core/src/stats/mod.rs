//! Per-record statistics for plotting

mod axes;
mod cache;

pub use axes::StatAxis;
pub use cache::StatCache;
