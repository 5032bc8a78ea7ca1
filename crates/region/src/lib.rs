//! # Region - one key range of the store
//!
//! Ties the [`memtable`], [`pfile`] and [`scanner`] crates together into a
//! readable, writable, flushable region.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                   REGION                      │
//! │                                               │
//! │ write.rs → MemTable put / delete              │
//! │              |                                │
//! │              |  (heap_size >= threshold?)     │
//! │              |            yes                 │
//! │              v                                │
//! │           flush() → snapshot → new PFile      │
//! │                                               │
//! │ read.rs  → RangeScanner over                  │
//! │            live table, snapshot, PFiles       │
//! │            (newest first, fields merged)      │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module       | Purpose                                                 |
//! |--------------|---------------------------------------------------------|
//! | `lib.rs`     | `Region`, `StoreFile`, constructor, accessors, `Debug`, `Drop` |
//! | `recovery`   | PFile loading and tmp file cleanup on open              |
//! | `write`      | `put()`, `delete()`, `flush()`                          |
//! | `read`       | `scan()`, `get()`                                       |
//!
//! ## Deletes
//!
//! [`Region::delete`] drops the row's unflushed edits from the memtable. No
//! tombstone is written, so a version already flushed to a PFile stays
//! visible.
//!
//! ## Crash Safety
//!
//! PFiles are written to a temp file, fsynced and renamed into place; temp
//! files left by an interrupted flush are removed on open. There is no
//! write-ahead log: unflushed rows are lost on a crash. Dropping a `Region`
//! flushes what is left in memory.

mod read;
mod recovery;
mod write;

use anyhow::Result;
use config::RegionConfig;
use memtable::MemTable;
use parking_lot::{Mutex, RwLock};
use pfile::{FileScanner, PFileInfo, PFILE_EXTENSION};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub use write::META_SNAPSHOT_ID;

/// Maximum allowed row key, family or qualifier size in bytes (64 KiB).
pub const MAX_KEY_SIZE: usize = pfile::MAX_KEY_BYTES;
/// Maximum allowed cell value size in bytes (10 MiB).
pub const MAX_VALUE_SIZE: usize = pfile::MAX_VALUE_BYTES;
/// Maximum `heap_size` of one row in the memtable, after merging (128 MiB).
///
/// A row's encoded size never exceeds its `heap_size`, so a row within this
/// limit always fits in a PFile row group.
pub const MAX_ROW_SIZE: usize = pfile::MAX_GROUP_BYTES / 2;

/// An immutable PFile that belongs to the region.
///
/// Only the metadata is kept in memory; every scan opens its own
/// [`FileScanner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFile {
    id: u64,
    path: PathBuf,
    start_key: Vec<u8>,
    end_key: Vec<u8>,
    row_count: u64,
}

impl StoreFile {
    pub(crate) fn from_info(id: u64, info: &PFileInfo) -> Self {
        Self {
            id,
            path: info.path.clone(),
            start_key: info.start_key.clone(),
            end_key: info.end_key.clone(),
            row_count: info.row_count,
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn start_key(&self) -> &[u8] {
        &self.start_key
    }

    #[must_use]
    pub fn end_key(&self) -> &[u8] {
        &self.end_key
    }

    #[must_use]
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Whether `[start_key, end_key]` intersects `[start, stop)`. Empty
    /// bounds are open.
    #[must_use]
    pub fn overlaps(&self, start: &[u8], stop: &[u8]) -> bool {
        (stop.is_empty() || self.start_key.as_slice() < stop)
            && self.end_key.as_slice() >= start
    }

    /// Opens a fresh cursor over the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its first row group
    /// is unreadable.
    pub fn scanner(&self) -> Result<FileScanner> {
        FileScanner::open(&self.path)
    }
}

/// A region store: one memtable plus the PFiles flushed from it.
///
/// # Write Path
///
/// 1. Validate the row key and cell sizes.
/// 2. Merge the mutation into the memtable.
/// 3. If auto flush is on and `heap_size >= flush_threshold`, flush.
///
/// # Read Path
///
/// A [`RangeScanner`](scanner::RangeScanner) over the live memtable, the
/// snapshot being flushed (if any) and every PFile whose key range overlaps
/// the scan, newest first. Same-key rows are merged field by field, newest
/// version winning.
///
/// All methods take `&self`; share a region across threads behind an `Arc`.
pub struct Region {
    pub(crate) config: RegionConfig,
    pub(crate) mem: MemTable,
    /// Ordered newest-first.
    pub(crate) files: RwLock<Vec<Arc<StoreFile>>>,
    /// Serializes flushes.
    pub(crate) flush_lock: Mutex<()>,
    pub(crate) next_file_id: AtomicU64,
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region")
            .field("data_dir", &self.config.data_dir)
            .field("flush_threshold", &self.config.flush_threshold)
            .field("auto_flush", &self.config.auto_flush)
            .field("memtable_size", &self.mem.heap_size())
            .field("memtable_rows", &self.mem.record_count())
            .field("snapshot_id", &self.mem.current_snapshot_id())
            .field("file_count", &self.file_count())
            .field("next_file_id", &self.next_file_id.load(Ordering::SeqCst))
            .finish()
    }
}

impl Region {
    /// Opens the region stored in `config.data_dir`.
    ///
    /// # Recovery Steps
    ///
    /// 1. Create the data directory if it does not exist.
    /// 2. Remove leftover `.pfile.tmp` files from interrupted flushes.
    /// 3. Open every `.pfile`, newest first. Unreadable files are logged
    ///    and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or listed.
    pub fn open(config: RegionConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        recovery::cleanup_tmp_files(&config.data_dir);

        let (files, max_id) = recovery::load_store_files(&config.data_dir)?;

        info!(
            data_dir = %config.data_dir.display(),
            files = files.len(),
            flush_threshold = config.flush_threshold,
            "region opened"
        );

        Ok(Self {
            config,
            mem: MemTable::new(),
            files: RwLock::new(files),
            flush_lock: Mutex::new(()),
            next_file_id: AtomicU64::new(max_id + 1),
        })
    }

    #[must_use]
    pub fn config(&self) -> &RegionConfig {
        &self.config
    }

    /// The region's memtable, for inspection.
    #[must_use]
    pub fn memtable(&self) -> &MemTable {
        &self.mem
    }

    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.read().len()
    }

    /// The current file set, newest first.
    #[must_use]
    pub fn files(&self) -> Vec<Arc<StoreFile>> {
        self.files.read().clone()
    }
}

/// `7` -> `00000000000000000007.pfile`
pub(crate) fn file_name(id: u64) -> String {
    format!("{:020}.{}", id, PFILE_EXTENSION)
}

/// Best-effort flush on drop.
///
/// Errors are logged because Drop cannot propagate them.
impl Drop for Region {
    fn drop(&mut self) {
        if self.mem.is_empty() && self.mem.outstanding_snapshot().is_none() {
            return;
        }
        if let Err(e) = self.flush() {
            warn!(error = %e, "flush on drop failed; unflushed rows are lost");
        }
    }
}

#[cfg(test)]
mod tests;
