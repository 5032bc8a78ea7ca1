use std::ops::Bound;
use std::sync::Arc;

use anyhow::Result;
use row::{Row, RowSource};

use crate::RowMap;

/// Cursor over one memtable map (live or snapshot).
///
/// The cursor holds its own `Arc` to the map, so it stays valid after a
/// snapshot swap or `clear_snapshot`. It re-positions by key on every step,
/// which makes it safe against concurrent inserts: rows inserted behind the
/// cursor are not seen, rows ahead of it may be.
pub struct MemTableScanner {
    rows: Arc<RowMap>,
    current: Option<Row>,
    closed: bool,
}

impl MemTableScanner {
    pub(crate) fn new(rows: Arc<RowMap>) -> Self {
        let current = rows.front().map(|e| e.value().to_row());
        Self {
            rows,
            current,
            closed: false,
        }
    }

    /// Rows in the underlying map.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.rows.len()
    }

    /// Rows at or after the cursor, so rows skipped by `seek` are not
    /// counted (approximate under concurrent writes).
    #[must_use]
    pub fn remaining_count(&self) -> usize {
        match &self.current {
            Some(row) => self
                .rows
                .range::<[u8], _>((Bound::Included(row.key()), Bound::Unbounded))
                .count(),
            None => 0,
        }
    }

    fn position(&mut self, bound: Bound<&[u8]>) {
        self.current = self.rows.lower_bound(bound).map(|e| e.value().to_row());
    }
}

impl RowSource for MemTableScanner {
    fn peek(&self) -> Option<&Row> {
        self.current.as_ref()
    }

    fn next(&mut self) -> Option<Row> {
        let row = self.current.take()?;
        self.position(Bound::Excluded(row.key()));
        Some(row)
    }

    /// Lands on the first key `>= row_key`, backwards included.
    fn seek(&mut self, row_key: &[u8]) {
        if self.closed {
            return;
        }
        self.position(Bound::Included(row_key));
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.current = None;
        Ok(())
    }
}
