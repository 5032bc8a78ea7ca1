//! # Row - shared data model for the RegionKV read path
//!
//! Every backing store of a region (the live memtable, a snapshot being
//! flushed, an immutable column file) speaks the same vocabulary:
//!
//! - a [`Row`] is the merged set of [`Cell`]s for one row key,
//! - a [`Mutation`] is a pending write that folds field-by-field into a row,
//! - a [`RowSource`] is a sorted cursor over rows that can peek, advance,
//!   seek forward and close.
//!
//! Row keys are opaque byte strings ordered by unsigned lexicographic
//! comparison, which is exactly `Ord` for `[u8]`.
//!
//! ```text
//!            ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!            │ MemTable     │   │ Snapshot     │   │ Column file  │
//!            │ scanner      │   │ scanner      │   │ scanner      │
//!            └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!                   └──────── dyn RowSource ──────────────┘
//!                                  │
//!                           ScannerHeap (k-way merge)
//!                                  │
//!                            RangeScanner
//! ```

mod cell;
mod mutation;
mod source;

pub use cell::{Cell, Column, Row};
pub use mutation::{Field, Mutation, MUTATION_OVERHEAD};
pub use source::{BoxedRowSource, RowSource, VecSource};

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch, used for default cell timestamps.
///
/// A clock set before 1970 yields `0` rather than an error.
#[must_use]
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
