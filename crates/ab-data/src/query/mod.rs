//! Filter construction from sparse per-column input
//!
//! A [`FilterInput`] holds whatever the user typed into the column boxes of
//! the active table. [`QueryBuilder`] turns it into an optional
//! [`Predicate`]: `None` means every row matches. Free-text queries typed into
//! the separate query line go through [`AdHocQuery`] instead.

mod adhoc;
mod builder;
mod filter;
mod predicate;

pub use adhoc::{AdHocQuery, Projection};
pub use builder::{parse_number, QueryBuilder};
pub use filter::FilterInput;
pub use predicate::{Clause, Operator, Predicate};

/// Filter text that selects NULL cells. Applies to text columns as well, so a
/// stored string "None" cannot be searched for by exact match.
pub const NULL_TOKEN: &str = "None";

/// Suffix that turns a text filter into a substring match
pub const WILDCARD: char = '*';
