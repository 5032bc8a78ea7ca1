use anyhow::Result;
use row::{Row, RowSource};
use std::path::Path;
use tracing::warn;

use crate::PFileReader;

/// [`RowSource`] adapter over a [`PFileReader`].
///
/// Keeps one row of lookahead behind the current row so that `peek` and
/// `has_next` never touch the file. A read error in the middle of a scan is
/// logged and ends the stream; rows already returned stay valid.
pub struct FileScanner {
    /// `None` once closed or after a read error.
    reader: Option<PFileReader>,
    current: Option<Row>,
    lookahead: Option<Row>,
    start_key: Vec<u8>,
    end_key: Vec<u8>,
    record_count: u64,
    consumed: u64,
}

impl std::fmt::Debug for FileScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileScanner")
            .field("reader", &self.reader)
            .field("record_count", &self.record_count)
            .field("consumed", &self.consumed)
            .finish()
    }
}

impl FileScanner {
    /// Opens `path` and primes the first two rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or its first row group
    /// cannot be read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(PFileReader::open(path)?)
    }

    pub fn new(mut reader: PFileReader) -> Result<Self> {
        let current = reader.read()?;
        let lookahead = match current {
            Some(_) => reader.read()?,
            None => None,
        };
        Ok(Self {
            start_key: reader.start_key().to_vec(),
            end_key: reader.end_key().to_vec(),
            record_count: reader.row_count(),
            reader: Some(reader),
            current,
            lookahead,
            consumed: 0,
        })
    }

    /// First row key of the file, from metadata.
    #[must_use]
    pub fn start_key(&self) -> &[u8] {
        &self.start_key
    }

    /// Last row key of the file, from metadata.
    #[must_use]
    pub fn end_key(&self) -> &[u8] {
        &self.end_key
    }

    /// Rows in the file.
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Rows not yet consumed by `next` or skipped by `seek`.
    #[must_use]
    pub fn remaining_count(&self) -> u64 {
        if self.current.is_none() {
            return 0;
        }
        self.record_count.saturating_sub(self.consumed)
    }

    fn read_next(&mut self) -> Option<Row> {
        let reader = self.reader.as_mut()?;
        match reader.read() {
            Ok(row) => row,
            Err(e) => {
                warn!(
                    path = %reader.path().display(),
                    error = %e,
                    "pfile read failed; ending scan of this file"
                );
                self.reader = None;
                None
            }
        }
    }

    fn advance(&mut self) -> Option<Row> {
        let row = self.current.take()?;
        self.current = self.lookahead.take();
        if self.current.is_some() {
            self.lookahead = self.read_next();
        }
        self.consumed += 1;
        Some(row)
    }
}

impl RowSource for FileScanner {
    fn peek(&self) -> Option<&Row> {
        self.current.as_ref()
    }

    fn next(&mut self) -> Option<Row> {
        self.advance()
    }

    /// Forward only: a target behind the cursor leaves it in place.
    fn seek(&mut self, row_key: &[u8]) {
        while self.current.as_ref().is_some_and(|r| r.key() < row_key) {
            self.advance();
        }
    }

    fn close(&mut self) -> Result<()> {
        self.reader = None;
        self.current = None;
        self.lookahead = None;
        Ok(())
    }
}
