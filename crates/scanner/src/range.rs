//! Bounded, thread-safe scan over a [`ScannerHeap`].

use parking_lot::Mutex;
use row::{BoxedRowSource, Row, RowSource};
use tracing::{debug, warn};

use crate::ScannerHeap;

/// Lifecycle of a [`RangeScanner`].
///
/// ```text
///   Open ──(stop row reached / sources drained)──> Exhausted
///     │                                               │
///     └──────────────(close)──────────> Closed <──────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Open,
    Exhausted,
    Closed,
}

struct Inner {
    heap: ScannerHeap<BoxedRowSource>,
    state: ScanState,
    rows_returned: u64,
}

/// Scan over the row range `[start_row, stop_row)` of several sources.
///
/// An empty `start_row` starts at the first row; an empty `stop_row` means
/// no upper bound. Rows that share a key across sources are folded into one
/// row: the version from the earliest-listed source wins per column.
///
/// All methods take `&self`; the merge state sits behind one mutex, so a
/// scanner can be handed between request threads.
///
/// The sources are closed exactly once: when the scan runs past its range,
/// on [`close`](Self::close), or on drop.
pub struct RangeScanner {
    start_row: Vec<u8>,
    stop_row: Vec<u8>,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for RangeScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("RangeScanner")
            .field("start_row", &String::from_utf8_lossy(&self.start_row))
            .field("stop_row", &String::from_utf8_lossy(&self.stop_row))
            .field("state", &inner.state)
            .field("rows_returned", &inner.rows_returned)
            .finish()
    }
}

impl RangeScanner {
    /// Seeks every source to `start_row`, then builds the merge.
    ///
    /// `sources` must be ordered newest first.
    pub fn new(
        start_row: impl Into<Vec<u8>>,
        stop_row: impl Into<Vec<u8>>,
        mut sources: Vec<BoxedRowSource>,
    ) -> Self {
        let start_row = start_row.into();
        let stop_row = stop_row.into();

        if !start_row.is_empty() {
            for source in sources.iter_mut() {
                source.seek(&start_row);
            }
        }

        let mut inner = Inner {
            heap: ScannerHeap::new(sources),
            state: ScanState::Open,
            rows_returned: 0,
        };
        check_stop(&mut inner, &stop_row);

        Self {
            start_row,
            stop_row,
            inner: Mutex::new(inner),
        }
    }

    #[must_use]
    pub fn start_row(&self) -> &[u8] {
        &self.start_row
    }

    #[must_use]
    pub fn stop_row(&self) -> &[u8] {
        &self.stop_row
    }

    #[must_use]
    pub fn state(&self) -> ScanState {
        self.inner.lock().state
    }

    /// Rows returned by `next`/`next_batch` so far.
    #[must_use]
    pub fn rows_returned(&self) -> u64 {
        self.inner.lock().rows_returned
    }

    /// A copy of the next row (unmerged with older versions), without
    /// consuming it.
    pub fn peek(&self) -> Option<Row> {
        let inner = self.inner.lock();
        if inner.state != ScanState::Open {
            return None;
        }
        inner.heap.peek().cloned()
    }

    pub fn has_next(&self) -> bool {
        let mut inner = self.inner.lock();
        check_stop(&mut inner, &self.stop_row);
        inner.state == ScanState::Open
    }

    /// Returns the next row in range, merged across sources.
    pub fn next(&self) -> Option<Row> {
        let mut inner = self.inner.lock();
        next_row(&mut inner, &self.stop_row)
    }

    /// Returns up to `limit` rows; fewer means the scan is no longer open.
    pub fn next_batch(&self, limit: usize) -> Vec<Row> {
        let mut inner = self.inner.lock();
        let mut rows = Vec::with_capacity(limit.min(1024));
        while rows.len() < limit {
            match next_row(&mut inner, &self.stop_row) {
                Some(row) => rows.push(row),
                None => break,
            }
        }
        rows
    }

    /// Releases all sources. Safe to call repeatedly.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            ScanState::Closed => return,
            ScanState::Open => close_heap(&mut inner),
            ScanState::Exhausted => {}
        }
        inner.state = ScanState::Closed;
        debug!(rows = inner.rows_returned, "range scanner closed");
    }
}

impl Drop for RangeScanner {
    fn drop(&mut self) {
        self.close();
    }
}

fn next_row(inner: &mut Inner, stop_row: &[u8]) -> Option<Row> {
    if inner.state != ScanState::Open {
        return None;
    }
    let Some(mut row) = inner.heap.next() else {
        check_stop(inner, stop_row);
        return None;
    };
    // Same key from later (older) sources: fold underneath.
    while inner.heap.peek_key() == Some(row.key()) {
        if let Some(older) = inner.heap.next() {
            row.merge_older(older);
        }
    }
    inner.rows_returned += 1;
    check_stop(inner, stop_row);
    Some(row)
}

/// Moves an open scan to `Exhausted` once the next key is out of range.
fn check_stop(inner: &mut Inner, stop_row: &[u8]) {
    if inner.state != ScanState::Open {
        return;
    }
    let done = match inner.heap.peek_key() {
        None => true,
        Some(key) => !stop_row.is_empty() && key >= stop_row,
    };
    if done {
        close_heap(inner);
        inner.state = ScanState::Exhausted;
    }
}

fn close_heap(inner: &mut Inner) {
    if let Err(e) = inner.heap.close() {
        warn!(error = %e, "failed to close scanner heap");
    }
}
