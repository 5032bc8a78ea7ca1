use anyhow::{bail, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use row::Row;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::format::{
    decode_row_group, read_footer, read_metadata, Footer, Metadata, GROUP_HEADER_BYTES,
    MAX_GROUP_BYTES, META_END_KEY, META_START_KEY,
};

/// Sequential reader over one PFile.
///
/// On [`open`](PFileReader::open) the footer and the metadata section are
/// loaded; row data is decoded lazily, one row group at a time, by
/// [`read`](PFileReader::read). The reader owns its file handle and is not
/// shared: open one reader per scan.
pub struct PFileReader {
    path: PathBuf,
    file: BufReader<File>,
    footer: Footer,
    metadata: Metadata,
    start_key: Vec<u8>,
    end_key: Vec<u8>,
    /// Offset of the next undecoded row group.
    position: u64,
    pending: VecDeque<Row>,
    rows_read: u64,
}

impl std::fmt::Debug for PFileReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PFileReader")
            .field("path", &self.path)
            .field("row_count", &self.footer.row_count)
            .field("row_group_count", &self.footer.row_group_count)
            .field("rows_read", &self.rows_read)
            .finish()
    }
}

impl PFileReader {
    /// Opens a PFile and loads its footer and metadata.
    ///
    /// # Validation
    ///
    /// - The file must be at least as large as the footer.
    /// - The footer magic must be `PFL1`.
    /// - The `metadata_offset` must point inside the file.
    /// - The metadata must contain `start_key` and `end_key`.
    ///
    /// # Errors
    ///
    /// Returns an error if any check fails or on I/O failure.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut f = File::open(&path).with_context(|| format!("opening {}", path.display()))?;

        let footer = read_footer(&mut f).with_context(|| format!("reading footer of {}", path.display()))?;

        f.seek(SeekFrom::Start(footer.metadata_offset))?;
        let metadata = read_metadata(&mut f)
            .with_context(|| format!("reading metadata of {}", path.display()))?;

        let start_key = match metadata.get(META_START_KEY) {
            Some(k) => k.clone(),
            None => bail!("{}: metadata has no {}", path.display(), META_START_KEY),
        };
        let end_key = match metadata.get(META_END_KEY) {
            Some(k) => k.clone(),
            None => bail!("{}: metadata has no {}", path.display(), META_END_KEY),
        };

        // Rewind to the first row group
        f.seek(SeekFrom::Start(0))?;

        Ok(Self {
            path,
            file: BufReader::new(f),
            footer,
            metadata,
            start_key,
            end_key,
            position: 0,
            pending: VecDeque::new(),
            rows_read: 0,
        })
    }

    /// Returns the next row, or `Ok(None)` at the end of the data section.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, CRC mismatch or a malformed group.
    pub fn read(&mut self) -> Result<Option<Row>> {
        if self.pending.is_empty() && !self.load_group()? {
            return Ok(None);
        }
        let row = self.pending.pop_front();
        if row.is_some() {
            self.rows_read += 1;
        }
        Ok(row)
    }

    /// Decodes the next row group into `pending`. Returns `false` at the end
    /// of the data section.
    fn load_group(&mut self) -> Result<bool> {
        let data_end = self.footer.metadata_offset;
        while self.pending.is_empty() {
            if self.position >= data_end {
                return Ok(false);
            }
            if self.position + GROUP_HEADER_BYTES > data_end {
                bail!("truncated row group header at offset {}", self.position);
            }

            let crc = self.file.read_u32::<LittleEndian>()?;
            let body_len = self.file.read_u32::<LittleEndian>()? as usize;
            if body_len > MAX_GROUP_BYTES
                || self.position + GROUP_HEADER_BYTES + body_len as u64 > data_end
            {
                bail!(
                    "corrupt row group at offset {}: body_len {} out of range",
                    self.position,
                    body_len
                );
            }
            let mut body = vec![0u8; body_len];
            self.file.read_exact(&mut body)?;

            let rows = decode_row_group(crc, &body)
                .with_context(|| format!("row group at offset {}", self.position))?;
            self.position += GROUP_HEADER_BYTES + body_len as u64;
            self.pending.extend(rows);
        }
        Ok(true)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Looks up a metadata entry by name.
    #[must_use]
    pub fn metadata(&self, name: &str) -> Option<&[u8]> {
        self.metadata.get(name).map(Vec::as_slice)
    }

    /// All metadata entries, ordered by name.
    pub fn metadata_entries(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.metadata.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    #[must_use]
    pub fn start_key(&self) -> &[u8] {
        &self.start_key
    }

    #[must_use]
    pub fn end_key(&self) -> &[u8] {
        &self.end_key
    }

    /// Total rows in the file, from the footer.
    #[must_use]
    pub fn row_count(&self) -> u64 {
        self.footer.row_count
    }

    #[must_use]
    pub fn row_group_count(&self) -> u64 {
        self.footer.row_group_count
    }

    /// Rows returned by [`read`](Self::read) so far.
    #[must_use]
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }
}
