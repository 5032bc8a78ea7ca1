use std::sync::Arc;

use crate::{MemTableScanner, RowMap};

/// A frozen view of the rows detached by [`MemTable::snapshot`].
///
/// Cloning is cheap; every clone shares the same map.
///
/// [`MemTable::snapshot`]: crate::MemTable::snapshot
#[derive(Clone)]
pub struct Snapshot {
    id: u64,
    byte_size: usize,
    start_key: Option<Vec<u8>>,
    end_key: Option<Vec<u8>>,
    rows: Arc<RowMap>,
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("id", &self.id)
            .field("rows", &self.rows.len())
            .field("byte_size", &self.byte_size)
            .finish()
    }
}

impl Snapshot {
    pub(crate) fn new(
        id: u64,
        byte_size: usize,
        start_key: Option<Vec<u8>>,
        end_key: Option<Vec<u8>>,
        rows: Arc<RowMap>,
    ) -> Self {
        Self {
            id,
            byte_size,
            start_key,
            end_key,
            rows,
        }
    }

    /// Pass this to [`MemTable::clear_snapshot`](crate::MemTable::clear_snapshot).
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Data size of the table at swap time, without fixed overhead.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    #[must_use]
    pub fn start_key(&self) -> Option<&[u8]> {
        self.start_key.as_deref()
    }

    #[must_use]
    pub fn end_key(&self) -> Option<&[u8]> {
        self.end_key.as_deref()
    }

    /// A fresh cursor from the first row of the snapshot.
    pub fn scanner(&self) -> MemTableScanner {
        MemTableScanner::new(Arc::clone(&self.rows))
    }
}
