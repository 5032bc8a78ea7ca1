//! Heap-based k-way merge over [`RowSource`]s.

use anyhow::Result;
use row::{BoxedRowSource, Row, RowSource};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::warn;

/// One source in the merge, tagged with its position in the constructor
/// list.
struct HeapEntry<S> {
    /// Lower index = newer source; wins ties.
    index: usize,
    source: S,
}

impl<S: RowSource> HeapEntry<S> {
    fn close(mut self) {
        if let Err(e) = self.source.close() {
            warn!(source = self.index, error = %e, "failed to close row source");
        }
    }
}

/// Merge order: smaller peeked key first, exhausted sources last, then
/// lower index first.
fn merge_order<S: RowSource>(a: &HeapEntry<S>, b: &HeapEntry<S>) -> Ordering {
    let by_key = match (a.source.peek_key(), b.source.peek_key()) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_key.then_with(|| a.index.cmp(&b.index))
}

impl<S: RowSource> PartialEq for HeapEntry<S> {
    fn eq(&self, other: &Self) -> bool {
        merge_order(self, other) == Ordering::Equal
    }
}

impl<S: RowSource> Eq for HeapEntry<S> {}

impl<S: RowSource> PartialOrd for HeapEntry<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<S: RowSource> Ord for HeapEntry<S> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; we want the merge-first entry on top.
        merge_order(other, self)
    }
}

/// Merges sorted row sources into one sorted stream.
///
/// The source with the smallest current key is kept outside the heap as
/// the *winner*; the heap holds the rest. After each `next`, the winner is
/// only pushed back when the heap head now sorts before it, so runs of rows
/// from one source cost no heap operations.
///
/// Rows with equal keys are **not** merged here: each is returned in turn,
/// newest source first. `ScannerHeap` is itself a [`RowSource`], so heaps
/// nest.
///
/// Sources are closed exactly once: when they run dry, when a seek leaves
/// them exhausted, or in [`close`](RowSource::close).
pub struct ScannerHeap<S: RowSource = BoxedRowSource> {
    heap: BinaryHeap<HeapEntry<S>>,
    current: Option<HeapEntry<S>>,
    closed: bool,
}

impl<S: RowSource> ScannerHeap<S> {
    /// Builds the merge. Sources that are already exhausted are closed and
    /// dropped.
    pub fn new<I: IntoIterator<Item = S>>(sources: I) -> Self {
        let mut heap = BinaryHeap::new();
        for (index, source) in sources.into_iter().enumerate() {
            let entry = HeapEntry { index, source };
            if entry.source.has_next() {
                heap.push(entry);
            } else {
                entry.close();
            }
        }
        let current = heap.pop();
        Self {
            heap,
            current,
            closed: false,
        }
    }

    /// Sources that still have rows.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.heap.len() + usize::from(self.current.is_some())
    }

    /// Constructor-list index of the source the next row comes from.
    #[must_use]
    pub fn current_source(&self) -> Option<usize> {
        self.current.as_ref().map(|e| e.index)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<S: RowSource> RowSource for ScannerHeap<S> {
    fn peek(&self) -> Option<&Row> {
        self.current.as_ref().and_then(|e| e.source.peek())
    }

    fn next(&mut self) -> Option<Row> {
        let mut winner = self.current.take()?;
        let row = winner.source.next();

        if !winner.source.has_next() {
            winner.close();
            self.current = self.heap.pop();
        } else if self
            .heap
            .peek()
            .is_some_and(|head| merge_order(head, &winner) == Ordering::Less)
        {
            self.heap.push(winner);
            self.current = self.heap.pop();
        } else {
            self.current = Some(winner);
        }
        row
    }

    fn seek(&mut self, row_key: &[u8]) {
        let entries: Vec<HeapEntry<S>> = self
            .current
            .take()
            .into_iter()
            .chain(self.heap.drain())
            .collect();
        for mut entry in entries {
            entry.source.seek(row_key);
            if entry.source.has_next() {
                self.heap.push(entry);
            } else {
                entry.close();
            }
        }
        self.current = self.heap.pop();
    }

    /// Closes every remaining source; failures are logged and do not stop
    /// the rest.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        for entry in self.current.take().into_iter().chain(self.heap.drain()) {
            entry.close();
        }
        Ok(())
    }
}
