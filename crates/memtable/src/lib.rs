//! # Memtable - the mutable, sorted, in-memory table of a region
//!
//! Writes land here first. Each row key maps to the merged [`Mutation`] for
//! that row; a newer write folds into the existing entry field by field.
//!
//! The row map is a lock-free [`SkipMap`] behind an `Arc`. A single
//! `RwLock` guards the map *pointer* together with the size, key-bound and
//! snapshot bookkeeping. Writers hold it for one map operation; readers only
//! hold it long enough to clone the `Arc`.
//!
//! ## Flush protocol
//!
//! ```text
//!   snapshot()  ── swap live map for an empty one, keep the old map
//!       │
//!       ├── Snapshot::scanner()   drained by the file writer
//!       ├── snapshot_scanner()    read by scans during the flush window
//!       │
//!   clear_snapshot(id)  ── drop the old map
//! ```
//!
//! At most one snapshot is outstanding. A second [`MemTable::snapshot`]
//! before [`MemTable::clear_snapshot`] logs a warning and returns `None`.

mod scanner;
mod snapshot;

pub use scanner::MemTableScanner;
pub use snapshot::Snapshot;

use crossbeam_skiplist::SkipMap;
use parking_lot::RwLock;
use row::{current_time_millis, Mutation};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

pub(crate) type RowMap = SkipMap<Vec<u8>, Mutation>;

/// Fixed accounting overhead of an empty memtable, in bytes.
///
/// `heap_size()` never drops below this value; the snapshot swap resets the
/// live size to it.
pub const DEEP_OVERHEAD: usize =
    std::mem::size_of::<MemTable>() + 2 * std::mem::size_of::<RowMap>() + 64;

/// Errors surfaced by snapshot bookkeeping.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemTableError {
    /// `clear_snapshot` was called with an id that is not outstanding.
    #[error("snapshot id mismatch: current snapshot is {current:?}, passed {requested}")]
    SnapshotIdMismatch { current: Option<u64>, requested: u64 },
    /// `put_within` would grow a row past its size limit.
    #[error("row too large: {row_size} bytes after merge (max {max})")]
    RowTooLarge { row_size: usize, max: usize },
}

/// The detached map of the outstanding snapshot.
struct SnapshotState {
    id: u64,
    rows: Arc<RowMap>,
    byte_size: usize,
    start_key: Option<Vec<u8>>,
    end_key: Option<Vec<u8>>,
}

impl SnapshotState {
    fn handle(&self) -> Snapshot {
        Snapshot::new(
            self.id,
            self.byte_size,
            self.start_key.clone(),
            self.end_key.clone(),
            Arc::clone(&self.rows),
        )
    }
}

struct Inner {
    active: Arc<RowMap>,
    /// Approximate size in bytes, including [`DEEP_OVERHEAD`].
    size: usize,
    start_key: Option<Vec<u8>>,
    end_key: Option<Vec<u8>>,
    /// Wall-clock millis of the first edit since the last swap.
    oldest_edit: Option<u64>,
    snapshot: Option<SnapshotState>,
    last_snapshot_id: u64,
}

impl Inner {
    fn touch(&mut self) {
        if self.oldest_edit.is_none() {
            self.oldest_edit = Some(current_time_millis());
        }
    }

    fn track_bounds(&mut self, key: &[u8]) {
        if self.start_key.as_deref().map_or(true, |start| key < start) {
            self.start_key = Some(key.to_vec());
        }
        if self.end_key.as_deref().map_or(true, |end| key > end) {
            self.end_key = Some(key.to_vec());
        }
    }

    /// Merges `m` into the live map and accounts its footprint.
    fn apply(&mut self, m: Mutation) -> usize {
        let added = m.heap_size();
        let merged = self.active.get(m.row()).map(|existing| {
            let mut merged = existing.value().clone();
            merged.merge(&m);
            merged
        });
        self.track_bounds(m.row());
        match merged {
            Some(merged) => {
                self.active.insert(m.row().to_vec(), merged);
            }
            None => {
                self.active.insert(m.row().to_vec(), m);
            }
        }

        self.size += added;
        self.touch();
        added
    }

    /// Snapshot ids come from the wall clock but never repeat or go back.
    fn next_snapshot_id(&mut self) -> u64 {
        let id = current_time_millis().max(self.last_snapshot_id + 1);
        self.last_snapshot_id = id;
        id
    }
}

/// The mutable table of one region.
///
/// All methods take `&self`; share it across request threads behind an
/// `Arc`.
pub struct MemTable {
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for MemTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("MemTable")
            .field("records", &inner.active.len())
            .field("heap_size", &inner.size)
            .field("snapshot_id", &inner.snapshot.as_ref().map(|s| s.id))
            .finish()
    }
}

impl MemTable {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                active: Arc::new(SkipMap::new()),
                size: DEEP_OVERHEAD,
                start_key: None,
                end_key: None,
                oldest_edit: None,
                snapshot: None,
                last_snapshot_id: 0,
            }),
        }
    }

    /// Inserts `m`, or merges it over the existing mutation for its row.
    ///
    /// Returns the footprint added to the table size. On a merge the old
    /// footprint is not subtracted, so the size only grows until the next
    /// snapshot.
    pub fn put(&self, m: Mutation) -> usize {
        self.inner.write().apply(m)
    }

    /// Like [`put`](Self::put), but refuses a write that would leave the
    /// merged row with a `heap_size` above `max_row_size`. The check and the
    /// merge happen under one lock, so concurrent writers cannot grow a row
    /// past the limit together.
    ///
    /// # Errors
    ///
    /// Returns [`MemTableError::RowTooLarge`]; the table is left unchanged.
    pub fn put_within(&self, m: Mutation, max_row_size: usize) -> Result<usize, MemTableError> {
        let mut inner = self.inner.write();
        let row_size = match inner.active.get(m.row()) {
            Some(existing) => existing.value().merged_heap_size(&m),
            None => m.heap_size(),
        };
        if row_size > max_row_size {
            return Err(MemTableError::RowTooLarge {
                row_size,
                max: max_row_size,
            });
        }
        Ok(inner.apply(m))
    }

    /// Removes the row named by `m`. A missing row is a no-op.
    ///
    /// Returns the footprint of the removed entry (0 when nothing was
    /// removed). The tracked start/end keys are left untouched.
    pub fn delete(&self, m: &Mutation) -> usize {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let freed = match inner.active.remove(m.row()) {
            Some(entry) => entry.value().heap_size(),
            None => return 0,
        };
        inner.size = inner.size.saturating_sub(freed).max(DEEP_OVERHEAD);
        inner.touch();
        freed
    }

    /// Point lookup in the live table.
    pub fn get(&self, row: &[u8]) -> Option<Mutation> {
        self.inner.read().active.get(row).map(|e| e.value().clone())
    }

    /// Detaches the live rows into a [`Snapshot`] for flushing.
    ///
    /// Returns `None` while another snapshot is outstanding. An empty table
    /// still produces an (empty) outstanding snapshot that must be cleared.
    pub fn snapshot(&self) -> Option<Snapshot> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        if let Some(existing) = &inner.snapshot {
            warn!(
                snapshot_id = existing.id,
                "snapshot called again without clearing previous; doing nothing"
            );
            return None;
        }

        let id = inner.next_snapshot_id();
        let byte_size = inner.size.saturating_sub(DEEP_OVERHEAD);
        let rows = if inner.active.is_empty() {
            Arc::new(SkipMap::new())
        } else {
            let detached = std::mem::replace(&mut inner.active, Arc::new(SkipMap::new()));
            inner.size = DEEP_OVERHEAD;
            inner.oldest_edit = None;
            detached
        };

        let state = SnapshotState {
            id,
            rows,
            byte_size,
            start_key: inner.start_key.take(),
            end_key: inner.end_key.take(),
        };
        let handle = state.handle();
        inner.snapshot = Some(state);

        debug!(
            snapshot_id = id,
            rows = handle.row_count(),
            bytes = byte_size,
            "memtable snapshot taken"
        );
        Some(handle)
    }

    /// Discards the outstanding snapshot named by `id`.
    pub fn clear_snapshot(&self, id: u64) -> Result<(), MemTableError> {
        let mut inner = self.inner.write();
        let current = inner.snapshot.as_ref().map(|s| s.id);
        if current != Some(id) {
            return Err(MemTableError::SnapshotIdMismatch {
                current,
                requested: id,
            });
        }
        inner.snapshot = None;
        debug!(snapshot_id = id, "memtable snapshot cleared");
        Ok(())
    }

    /// A new handle on the outstanding snapshot, if any.
    ///
    /// Used to retry a flush whose previous attempt failed after the swap.
    pub fn outstanding_snapshot(&self) -> Option<Snapshot> {
        self.inner.read().snapshot.as_ref().map(SnapshotState::handle)
    }

    /// Cursor over the live rows.
    pub fn scanner(&self) -> MemTableScanner {
        MemTableScanner::new(Arc::clone(&self.inner.read().active))
    }

    /// Cursor over the outstanding snapshot, so scans running during a
    /// flush still see the rows being written out.
    pub fn snapshot_scanner(&self) -> Option<MemTableScanner> {
        self.inner
            .read()
            .snapshot
            .as_ref()
            .map(|s| MemTableScanner::new(Arc::clone(&s.rows)))
    }

    pub fn current_snapshot_id(&self) -> Option<u64> {
        self.inner.read().snapshot.as_ref().map(|s| s.id)
    }

    /// Approximate live size in bytes, including [`DEEP_OVERHEAD`].
    pub fn heap_size(&self) -> usize {
        self.inner.read().size
    }

    /// Live size without the fixed overhead.
    pub fn data_size(&self) -> usize {
        self.heap_size().saturating_sub(DEEP_OVERHEAD)
    }

    /// Bytes the next flush would write: the outstanding snapshot if it
    /// holds data, otherwise the live table.
    pub fn flushable_size(&self) -> usize {
        let inner = self.inner.read();
        match &inner.snapshot {
            Some(s) if s.byte_size > 0 => s.byte_size,
            _ => inner.size,
        }
    }

    pub fn record_count(&self) -> usize {
        self.inner.read().active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().active.is_empty()
    }

    /// Smallest row key inserted since the last snapshot (a hint; deletes
    /// do not shrink it).
    pub fn start_key(&self) -> Option<Vec<u8>> {
        self.inner.read().start_key.clone()
    }

    /// Largest row key inserted since the last snapshot (a hint).
    pub fn end_key(&self) -> Option<Vec<u8>> {
        self.inner.read().end_key.clone()
    }

    /// Wall-clock millis of the oldest unflushed edit.
    pub fn time_of_oldest_edit(&self) -> Option<u64> {
        self.inner.read().oldest_edit
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
