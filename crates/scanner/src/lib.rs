//! # Scanner - k-way merge and bounded range scans
//!
//! A scan over a region reads from several [`RowSource`]s at once: the live
//! memtable, an outstanding flush snapshot and any number of PFiles. Each is
//! sorted by row key on its own; this crate merges them.
//!
//! ```text
//!   live memtable ─┐
//!   snapshot ──────┼──> ScannerHeap ──> RangeScanner ──> rows in [start, stop)
//!   newest file ───┤    (min-heap on      (bounds, same-key
//!   older files ───┘     peeked key)       fold, state machine)
//! ```
//!
//! Sources are listed **newest first**. When two sources hold the same row
//! key, the one listed earlier is returned first, and [`RangeScanner`]
//! folds the older versions underneath it (last writer wins per field).
//!
//! [`RowSource`]: row::RowSource

mod heap;
mod range;

pub use heap::ScannerHeap;
pub use range::{RangeScanner, ScanState};

#[cfg(test)]
mod tests;
