//! PFile binary format: constants, footer, metadata and row-group codecs.
//!
//! ## Footer (28 bytes) - magic `PFL1` (`0x5046_4C31`)
//!
//! ```text
//! [metadata_offset: u64 LE][row_group_count: u64 LE][row_count: u64 LE][magic: u32 LE]
//! ```
//!
//! ## Row group
//!
//! ```text
//! crc32 (u32) | body_len (u32) | body
//! ```
//!
//! The CRC32 covers everything after itself in the group (`body_len`
//! through the end of the body). Inside the body the row keys come first,
//! then one chunk per column that appears anywhere in the group:
//!
//! ```text
//! row_count (u32)
//! row_count x [key_len (u32) | key]
//! column_count (u32)
//! column_count x [family_len (u32) | family | qualifier_len (u32) | qualifier
//!                 row_count x [present (u8) | timestamp (u64) | value_len (u32) | value]]
//! ```
//!
//! Absent cells are a single `0` byte.

use anyhow::{bail, ensure, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use row::{Cell, Column, Row};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

/// Magic number identifying PFile v1 files (ASCII "PFL1").
pub const PFILE_MAGIC: u32 = 0x5046_4C31;

/// Size of the footer in bytes: 8 + 8 + 8 (offsets and counts) + 4 (`magic`).
pub const FOOTER_BYTES: u64 = 8 + 8 + 8 + 4;

/// Size of the row-group header: crc32 + body_len.
pub const GROUP_HEADER_BYTES: u64 = 4 + 4;

/// Metadata entry holding the first row key of the file.
pub const META_START_KEY: &str = "start_key";
/// Metadata entry holding the last row key of the file.
pub const META_END_KEY: &str = "end_key";
/// Metadata entry holding the row count as a little-endian `u64`.
pub const META_ROW_COUNT: &str = "row_count";

/// Maximum key, family or qualifier size (64 KiB). Larger lengths are
/// treated as corruption on read.
pub const MAX_KEY_BYTES: usize = 64 * 1024;
/// Maximum cell value size (10 MiB). Larger lengths are treated as
/// corruption on read.
pub const MAX_VALUE_BYTES: usize = 10 * 1024 * 1024;
/// Maximum encoded row-group body (256 MiB). The writer cuts groups below
/// it and the reader rejects anything above it.
pub const MAX_GROUP_BYTES: usize = 256 * 1024 * 1024;

/// User and derived metadata entries, ordered by name.
pub type Metadata = BTreeMap<String, Vec<u8>>;

/// Parsed PFile footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub metadata_offset: u64,
    pub row_group_count: u64,
    pub row_count: u64,
}

/// Writes the footer to `w`.
pub fn write_footer<W: Write>(w: &mut W, footer: &Footer) -> io::Result<()> {
    w.write_u64::<LittleEndian>(footer.metadata_offset)?;
    w.write_u64::<LittleEndian>(footer.row_group_count)?;
    w.write_u64::<LittleEndian>(footer.row_count)?;
    w.write_u32::<LittleEndian>(PFILE_MAGIC)?;
    Ok(())
}

/// Reads and validates the footer at the end of `r`.
pub fn read_footer<R: Read + Seek>(r: &mut R) -> Result<Footer> {
    let filesize = r.seek(SeekFrom::End(0))?;
    ensure!(filesize >= FOOTER_BYTES, "file too small for pfile footer");

    r.seek(SeekFrom::End(-(FOOTER_BYTES as i64)))?;
    let metadata_offset = r.read_u64::<LittleEndian>()?;
    let row_group_count = r.read_u64::<LittleEndian>()?;
    let row_count = r.read_u64::<LittleEndian>()?;
    let magic = r.read_u32::<LittleEndian>()?;

    if magic != PFILE_MAGIC {
        bail!("unknown pfile magic: {:#x}", magic);
    }
    ensure!(
        metadata_offset <= filesize - FOOTER_BYTES,
        "invalid metadata_offset {} (file size {})",
        metadata_offset,
        filesize
    );

    Ok(Footer {
        metadata_offset,
        row_group_count,
        row_count,
    })
}

pub fn write_metadata<W: Write>(w: &mut W, metadata: &Metadata) -> io::Result<()> {
    w.write_u32::<LittleEndian>(metadata.len() as u32)?;
    for (name, value) in metadata {
        write_bytes(w, name.as_bytes())?;
        write_bytes(w, value)?;
    }
    Ok(())
}

/// Decodes the metadata section. `r` must be positioned at its start.
pub fn read_metadata<R: Read>(r: &mut R) -> Result<Metadata> {
    let count = r.read_u32::<LittleEndian>()?;
    let mut metadata = Metadata::new();
    for _ in 0..count {
        let name = read_bytes(r, MAX_KEY_BYTES).context("reading metadata name")?;
        let name = String::from_utf8(name).context("metadata name is not utf-8")?;
        let value = read_bytes(r, MAX_VALUE_BYTES).context("reading metadata value")?;
        metadata.insert(name, value);
    }
    Ok(metadata)
}

/// Encodes `rows` as one row group (header included) into `out`.
///
/// `out` is cleared first so callers can reuse one buffer.
pub fn encode_row_group(rows: &[Row], out: &mut Vec<u8>) -> io::Result<()> {
    let mut body = Vec::with_capacity(256);
    body.write_u32::<LittleEndian>(rows.len() as u32)?;
    for row in rows {
        write_bytes(&mut body, row.key())?;
    }

    let columns: BTreeSet<&Column> = rows
        .iter()
        .flat_map(|r| r.cells().iter().map(|c| &c.column))
        .collect();
    body.write_u32::<LittleEndian>(columns.len() as u32)?;
    for column in columns {
        write_bytes(&mut body, &column.family)?;
        write_bytes(&mut body, &column.qualifier)?;
        for row in rows {
            match row.cell(&column.family, &column.qualifier) {
                Some(cell) => {
                    body.write_u8(1)?;
                    body.write_u64::<LittleEndian>(cell.timestamp)?;
                    write_bytes(&mut body, &cell.value)?;
                }
                None => body.write_u8(0)?,
            }
        }
    }

    if body.len() > MAX_GROUP_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "row group body of {} bytes exceeds maximum {}",
                body.len(),
                MAX_GROUP_BYTES
            ),
        ));
    }
    let body_len = body.len() as u32;
    let mut hasher = Crc32::new();
    hasher.update(&body_len.to_le_bytes());
    hasher.update(&body);

    out.clear();
    out.write_u32::<LittleEndian>(hasher.finalize())?;
    out.write_u32::<LittleEndian>(body_len)?;
    out.extend_from_slice(&body);
    Ok(())
}

/// Running body length of a row group, in step with [`encode_row_group`].
#[derive(Debug)]
pub(crate) struct GroupSizer {
    columns: BTreeSet<Column>,
    rows: usize,
    body_len: usize,
}

impl GroupSizer {
    pub(crate) fn new() -> Self {
        Self {
            columns: BTreeSet::new(),
            rows: 0,
            // row_count + column_count
            body_len: 4 + 4,
        }
    }

    /// Body length of the group once `row` is added.
    pub(crate) fn body_len_with(&self, row: &Row) -> usize {
        let mut len = self.body_len + 4 + row.key().len();
        let mut columns = self.columns.len();
        for cell in row.cells() {
            if !self.columns.contains(&cell.column) {
                // header plus an absent marker for every earlier row
                columns += 1;
                len += 4 + cell.column.family.len() + 4 + cell.column.qualifier.len() + self.rows;
            }
            len += 8 + 4 + cell.value.len();
        }
        // one presence byte per column for the new row
        len + columns
    }

    pub(crate) fn add(&mut self, row: &Row) {
        self.body_len = self.body_len_with(row);
        self.rows += 1;
        for cell in row.cells() {
            if !self.columns.contains(&cell.column) {
                self.columns.insert(cell.column.clone());
            }
        }
    }
}

/// Verifies `crc` against `body` and decodes the rows of one group.
pub fn decode_row_group(crc: u32, body: &[u8]) -> Result<Vec<Row>> {
    let mut hasher = Crc32::new();
    hasher.update(&(body.len() as u32).to_le_bytes());
    hasher.update(body);
    let actual = hasher.finalize();
    if actual != crc {
        bail!(
            "CRC32 mismatch: expected {:#010x}, got {:#010x} (data corruption)",
            crc,
            actual
        );
    }

    let mut r = Cursor::new(body);
    let row_count = r.read_u32::<LittleEndian>()? as usize;
    ensure!(
        row_count <= body.len(),
        "corrupt row group: row_count {} exceeds body size",
        row_count
    );

    let mut keys = Vec::with_capacity(row_count);
    for _ in 0..row_count {
        keys.push(read_bytes(&mut r, MAX_KEY_BYTES)?);
    }

    let mut cells: Vec<Vec<Cell>> = vec![Vec::new(); row_count];
    let column_count = r.read_u32::<LittleEndian>()?;
    for _ in 0..column_count {
        let family = read_bytes(&mut r, MAX_KEY_BYTES)?;
        let qualifier = read_bytes(&mut r, MAX_KEY_BYTES)?;
        let column = Column::new(family, qualifier);
        for row_cells in cells.iter_mut() {
            match r.read_u8()? {
                0 => {}
                1 => {
                    let timestamp = r.read_u64::<LittleEndian>()?;
                    let value = read_bytes(&mut r, MAX_VALUE_BYTES)?;
                    row_cells.push(Cell::new(column.clone(), timestamp, value));
                }
                other => bail!("corrupt row group: invalid presence flag {}", other),
            }
        }
    }

    Ok(keys
        .into_iter()
        .zip(cells)
        .map(|(key, cells)| Row::from_cells(key, cells))
        .collect())
}

fn write_bytes<W: Write>(w: &mut W, bytes: &[u8]) -> io::Result<()> {
    w.write_u32::<LittleEndian>(bytes.len() as u32)?;
    w.write_all(bytes)
}

fn read_bytes<R: Read>(r: &mut R, max: usize) -> Result<Vec<u8>> {
    let len = r.read_u32::<LittleEndian>()? as usize;
    if len > max {
        bail!("corrupt data: length {} exceeds maximum {}", len, max);
    }
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}
