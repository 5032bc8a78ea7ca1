//! Write path: `put()`, `delete()` and `flush()`.

use anyhow::{bail, ensure, Result};
use pfile::{Metadata, PFileWriter};
use row::Mutation;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{file_name, Region, StoreFile, MAX_KEY_SIZE, MAX_ROW_SIZE, MAX_VALUE_SIZE};

/// Metadata entry recording the memtable snapshot a file was flushed from.
pub const META_SNAPSHOT_ID: &str = "snapshot_id";

pub(crate) fn validate_key(row: &[u8]) -> Result<()> {
    ensure!(!row.is_empty(), "row key must not be empty");
    ensure!(
        row.len() <= MAX_KEY_SIZE,
        "row key too large: {} bytes (max {})",
        row.len(),
        MAX_KEY_SIZE
    );
    Ok(())
}

impl Region {
    /// Merges `m` into the row it names (the `PUT` command).
    ///
    /// If the memtable reaches the flush threshold and auto flush is on, it
    /// is flushed before returning.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty or oversized key, a mutation without
    /// columns, an oversized column name or value, a row that would grow past
    /// [`MAX_ROW_SIZE`], or a failed automatic flush.
    pub fn put(&self, m: Mutation) -> Result<()> {
        validate_key(m.row())?;
        ensure!(!m.is_empty(), "mutation has no columns");
        for (column, field) in m.fields() {
            ensure!(
                column.family.len() <= MAX_KEY_SIZE && column.qualifier.len() <= MAX_KEY_SIZE,
                "column name of {} too large (max {} bytes each)",
                column,
                MAX_KEY_SIZE
            );
            ensure!(
                field.value.len() <= MAX_VALUE_SIZE,
                "value of {} too large: {} bytes (max {})",
                column,
                field.value.len(),
                MAX_VALUE_SIZE
            );
        }

        self.mem.put_within(m, MAX_ROW_SIZE)?;
        self.maybe_flush()
    }

    /// Drops the unflushed edits of `row` (the `DEL` command).
    ///
    /// Returns `true` if the memtable held the row. Versions already flushed
    /// to PFiles are not affected.
    pub fn delete(&self, row: &[u8]) -> Result<bool> {
        validate_key(row)?;
        let freed = self.mem.delete(&Mutation::new(row));
        self.maybe_flush()?;
        Ok(freed > 0)
    }

    fn maybe_flush(&self) -> Result<()> {
        if self.config.auto_flush && self.mem.heap_size() >= self.config.flush_threshold {
            self.flush()?;
        }
        Ok(())
    }

    /// Writes the memtable out as a new PFile.
    ///
    /// Returns the new file's path, or `None` if there was nothing to flush.
    ///
    /// # Steps
    ///
    /// 1. Take a memtable snapshot, or re-use the one left outstanding by a
    ///    failed flush.
    /// 2. Drain it through [`PFileWriter`] into `<id>.pfile` (atomic temp +
    ///    rename).
    /// 3. Publish the file at the front of the file set.
    /// 4. Clear the snapshot.
    ///
    /// Scans see the snapshot until step 4 and the file from step 3, so the
    /// rows are never invisible.
    ///
    /// # Errors
    ///
    /// On I/O failure the snapshot stays outstanding (and visible to scans)
    /// and the next flush retries it.
    pub fn flush(&self) -> Result<Option<PathBuf>> {
        let _guard = self.flush_lock.lock();

        let snapshot = match self.mem.outstanding_snapshot() {
            Some(s) => {
                debug!(snapshot_id = s.id(), "retrying flush of outstanding snapshot");
                s
            }
            None => match self.mem.snapshot() {
                Some(s) => s,
                None => bail!("memtable snapshot already outstanding"),
            },
        };

        if snapshot.is_empty() {
            self.mem.clear_snapshot(snapshot.id())?;
            return Ok(None);
        }

        let id = self.next_file_id.fetch_add(1, Ordering::SeqCst);
        let path = self.config.data_dir.join(file_name(id));

        let mut metadata = Metadata::new();
        metadata.insert(
            META_SNAPSHOT_ID.to_string(),
            snapshot.id().to_le_bytes().to_vec(),
        );

        let mut writer =
            PFileWriter::create(&path, metadata)?.with_row_group_size(self.config.row_group_size);
        writer.append_all(&mut snapshot.scanner())?;
        let info = writer.close()?;

        self.files
            .write()
            .insert(0, Arc::new(StoreFile::from_info(id, &info)));
        self.mem.clear_snapshot(snapshot.id())?;

        info!(
            path = %path.display(),
            rows = info.row_count,
            bytes = info.file_size,
            snapshot_bytes = snapshot.byte_size(),
            "memtable flushed"
        );
        Ok(Some(path))
    }
}
