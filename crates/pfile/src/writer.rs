use anyhow::{bail, ensure, Context, Result};
use row::{Row, RowSource};
use std::fs::{rename, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::format::{
    encode_row_group, write_footer, write_metadata, Footer, GroupSizer, Metadata,
    MAX_GROUP_BYTES, MAX_KEY_BYTES, MAX_VALUE_BYTES, META_END_KEY, META_ROW_COUNT,
    META_START_KEY,
};

/// Default number of rows buffered per row group.
pub const DEFAULT_ROW_GROUP_SIZE: usize = 1024;

/// Summary of a file produced by [`PFileWriter::close`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PFileInfo {
    pub path: PathBuf,
    pub row_count: u64,
    pub row_group_count: u64,
    pub start_key: Vec<u8>,
    pub end_key: Vec<u8>,
    pub file_size: u64,
}

/// Removes the temp file unless the writer got as far as renaming it.
struct TmpFile {
    path: PathBuf,
    keep: bool,
}

impl Drop for TmpFile {
    fn drop(&mut self) {
        if !self.keep {
            if let Err(e) = std::fs::remove_file(&self.path) {
                debug!(path = %self.path.display(), error = %e, "could not remove tmp file");
            }
        }
    }
}

/// Streams sorted rows into a new, immutable PFile.
///
/// Rows are buffered until a row group is full (by row count, or by encoded
/// size against [`MAX_GROUP_BYTES`]), then encoded column by column and
/// written. The write is crash-safe: everything goes to `<path>.tmp` first
/// and is renamed into place by [`close`](Self::close) after an fsync. A
/// writer dropped before a successful `close` removes its temp file.
///
/// ```no_run
/// use pfile::{Metadata, PFileWriter};
/// use row::Row;
///
/// # fn main() -> anyhow::Result<()> {
/// let mut w = PFileWriter::create("000001.pfile", Metadata::new())?;
/// w.append(Row::new("a"))?;
/// let info = w.close()?;
/// assert_eq!(info.row_count, 1);
/// # Ok(())
/// # }
/// ```
pub struct PFileWriter {
    path: PathBuf,
    tmp: TmpFile,
    file: BufWriter<File>,
    metadata: Metadata,
    row_group_size: usize,
    max_group_bytes: usize,
    buffered: Vec<Row>,
    sizer: GroupSizer,
    /// Reusable buffer for encoded row groups.
    group_buf: Vec<u8>,
    offset: u64,
    row_groups: u64,
    rows: u64,
    start_key: Option<Vec<u8>>,
    last_key: Option<Vec<u8>>,
}

impl PFileWriter {
    /// Opens `<path>.tmp` for writing. `metadata` holds user entries; the
    /// key bounds and row count are added on close.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, metadata: Metadata) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tmp_path = tmp_path_for(&path);
        let raw_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)
            .with_context(|| format!("creating {}", tmp_path.display()))?;

        Ok(Self {
            path,
            tmp: TmpFile {
                path: tmp_path,
                keep: false,
            },
            file: BufWriter::new(raw_file),
            metadata,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
            max_group_bytes: MAX_GROUP_BYTES,
            buffered: Vec::new(),
            sizer: GroupSizer::new(),
            group_buf: Vec::with_capacity(4096),
            offset: 0,
            row_groups: 0,
            rows: 0,
            start_key: None,
            last_key: None,
        })
    }

    /// Rows per row group (at least 1).
    #[must_use]
    pub fn with_row_group_size(mut self, rows: usize) -> Self {
        self.row_group_size = rows.max(1);
        self
    }

    /// Caps the encoded body of a row group below [`MAX_GROUP_BYTES`].
    #[must_use]
    pub fn with_max_group_bytes(mut self, bytes: usize) -> Self {
        self.max_group_bytes = bytes.min(MAX_GROUP_BYTES);
        self
    }

    /// Appends one row.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not strictly greater than the previous
    /// one, if the row could not be read back (oversized key, column or
    /// value, or too large for a row group of its own), or if writing a full
    /// row group fails. A rejected row leaves the writer unchanged.
    pub fn append(&mut self, row: Row) -> Result<()> {
        if let Some(last) = &self.last_key {
            ensure!(
                row.key() > last.as_slice(),
                "rows must be appended in strictly increasing key order ({:?} after {:?})",
                String::from_utf8_lossy(row.key()),
                String::from_utf8_lossy(last)
            );
        }
        self.check_row(&row)?;

        if !self.buffered.is_empty() && self.sizer.body_len_with(&row) > self.max_group_bytes {
            self.write_group()?;
        }
        if self.start_key.is_none() {
            self.start_key = Some(row.key().to_vec());
        }
        self.last_key = Some(row.key().to_vec());
        self.sizer.add(&row);
        self.buffered.push(row);

        if self.buffered.len() >= self.row_group_size {
            self.write_group()?;
        }
        Ok(())
    }

    /// Drains `source` into the file. Returns the number of rows appended.
    pub fn append_all<S: RowSource + ?Sized>(&mut self, source: &mut S) -> Result<u64> {
        let mut n = 0;
        while let Some(row) = source.next() {
            self.append(row)?;
            n += 1;
        }
        Ok(n)
    }

    /// Rows appended so far.
    #[must_use]
    pub fn row_count(&self) -> u64 {
        self.rows + self.buffered.len() as u64
    }

    fn check_row(&self, row: &Row) -> Result<()> {
        ensure!(
            row.key().len() <= MAX_KEY_BYTES,
            "row key too large: {} bytes (max {})",
            row.key().len(),
            MAX_KEY_BYTES
        );
        for cell in row.cells() {
            ensure!(
                cell.column.family.len() <= MAX_KEY_BYTES
                    && cell.column.qualifier.len() <= MAX_KEY_BYTES,
                "column name of {} too large (max {} bytes each)",
                cell.column,
                MAX_KEY_BYTES
            );
            ensure!(
                cell.value.len() <= MAX_VALUE_BYTES,
                "value of {} too large: {} bytes (max {})",
                cell.column,
                cell.value.len(),
                MAX_VALUE_BYTES
            );
        }
        let alone = GroupSizer::new().body_len_with(row);
        ensure!(
            alone <= self.max_group_bytes,
            "row {:?} does not fit in a row group: {} bytes (max {})",
            String::from_utf8_lossy(row.key()),
            alone,
            self.max_group_bytes
        );
        Ok(())
    }

    fn write_group(&mut self) -> Result<()> {
        if self.buffered.is_empty() {
            return Ok(());
        }
        encode_row_group(&self.buffered, &mut self.group_buf)?;
        self.file.write_all(&self.group_buf)?;
        self.offset += self.group_buf.len() as u64;
        self.row_groups += 1;
        self.rows += self.buffered.len() as u64;
        self.buffered.clear();
        self.sizer = GroupSizer::new();
        Ok(())
    }

    /// Writes the last row group, metadata and footer, then fsyncs and
    /// atomically renames the file into place.
    ///
    /// # Errors
    ///
    /// Returns an error if no rows were appended (the temporary file is
    /// removed) or on any I/O failure.
    pub fn close(mut self) -> Result<PFileInfo> {
        self.write_group()?;

        let (start_key, end_key) = match (self.start_key.take(), self.last_key.take()) {
            (Some(start), Some(end)) => (start, end),
            _ => bail!("refusing to write an empty pfile (no rows)"),
        };

        self.metadata
            .insert(META_START_KEY.to_string(), start_key.clone());
        self.metadata
            .insert(META_END_KEY.to_string(), end_key.clone());
        self.metadata
            .insert(META_ROW_COUNT.to_string(), self.rows.to_le_bytes().to_vec());

        let metadata_offset = self.offset;
        write_metadata(&mut self.file, &self.metadata)?;
        write_footer(
            &mut self.file,
            &Footer {
                metadata_offset,
                row_group_count: self.row_groups,
                row_count: self.rows,
            },
        )?;

        // Flush BufWriter, then sync the underlying file
        self.file.flush()?;
        let file = self.file.into_inner()?;
        file.sync_all()?;
        let file_size = file.metadata()?.len();
        drop(file);

        rename(&self.tmp.path, &self.path)
            .with_context(|| format!("renaming {}", self.tmp.path.display()))?;
        self.tmp.keep = true;

        // A crash after rename but before the directory sync can lose the entry.
        if let Some(parent) = self.path.parent() {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        debug!(
            path = %self.path.display(),
            rows = self.rows,
            row_groups = self.row_groups,
            bytes = file_size,
            "pfile written"
        );

        Ok(PFileInfo {
            path: self.path,
            row_count: self.rows,
            row_group_count: self.row_groups,
            start_key,
            end_key,
            file_size,
        })
    }
}

/// `000001.pfile` -> `000001.pfile.tmp`
pub(crate) fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
