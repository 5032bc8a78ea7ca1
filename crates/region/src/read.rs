//! Read path: `scan()` and `get()`.

use anyhow::Result;
use row::{BoxedRowSource, Row};
use scanner::RangeScanner;
use tracing::warn;

use crate::write::validate_key;
use crate::Region;

impl Region {
    /// Scans rows in `[start, stop)`. Empty bounds are open.
    ///
    /// Sources, newest first: the live memtable, the snapshot being flushed
    /// and every PFile whose key range overlaps the scan. A file that fails
    /// to open is logged and left out; the scan still runs over the rest.
    pub fn scan(&self, start: &[u8], stop: &[u8]) -> RangeScanner {
        let mut sources: Vec<BoxedRowSource> = Vec::new();

        // Memtable sources before the file list: a flush publishes its file
        // before clearing the snapshot, so every row is in one or the other.
        sources.push(Box::new(self.mem.scanner()));
        if let Some(snapshot) = self.mem.snapshot_scanner() {
            sources.push(Box::new(snapshot));
        }

        for file in self.files().iter().filter(|f| f.overlaps(start, stop)) {
            match file.scanner() {
                Ok(s) => sources.push(Box::new(s)),
                Err(e) => warn!(
                    path = %file.path().display(),
                    error = %format!("{e:#}"),
                    "excluding unreadable pfile from scan"
                ),
            }
        }

        RangeScanner::new(start, stop, sources)
    }

    /// Looks up one row, merged across all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if the row key is empty or oversized.
    pub fn get(&self, row: &[u8]) -> Result<Option<Row>> {
        validate_key(row)?;
        let mut stop = row.to_vec();
        stop.push(0);
        let scanner = self.scan(row, &stop);
        Ok(scanner.next())
    }
}
