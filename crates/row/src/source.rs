use anyhow::Result;

use crate::Row;

/// A stateful cursor over rows in strictly increasing row-key order.
///
/// Implemented by the memtable cursor, the column-file adapter and the
/// k-way merge itself, so merges nest. A source owns whatever it reads
/// from (a map reference, a file handle) and releases it on [`close`].
///
/// Exhaustion is not an error: [`peek`] and [`next`] return `None` and
/// [`has_next`] returns `false`.
///
/// [`close`]: RowSource::close
/// [`peek`]: RowSource::peek
/// [`next`]: RowSource::next
/// [`has_next`]: RowSource::has_next
pub trait RowSource: Send {
    /// The current row, without consuming it.
    fn peek(&self) -> Option<&Row>;

    /// Consumes the current row and advances to the next one.
    fn next(&mut self) -> Option<Row>;

    /// Skips forward to the first row whose key is `>= row_key`.
    ///
    /// After a seek, [`peek`](RowSource::peek) is either `None` or a row
    /// with key `>= row_key`. Sources that cannot move backwards treat a
    /// smaller target as a no-op, which still satisfies that contract.
    fn seek(&mut self, row_key: &[u8]);

    /// Releases the underlying resources. Calling it twice is harmless.
    fn close(&mut self) -> Result<()>;

    fn has_next(&self) -> bool {
        self.peek().is_some()
    }

    fn peek_key(&self) -> Option<&[u8]> {
        self.peek().map(Row::key)
    }
}

pub type BoxedRowSource = Box<dyn RowSource>;

impl<S: RowSource + ?Sized> RowSource for Box<S> {
    fn peek(&self) -> Option<&Row> {
        (**self).peek()
    }

    fn next(&mut self) -> Option<Row> {
        (**self).next()
    }

    fn seek(&mut self, row_key: &[u8]) {
        (**self).seek(row_key)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn has_next(&self) -> bool {
        (**self).has_next()
    }

    fn peek_key(&self) -> Option<&[u8]> {
        (**self).peek_key()
    }
}

/// An in-memory source over rows that are already sorted by key.
///
/// Handy for bulk loads and for feeding fixed data into a merge.
#[derive(Debug, Default)]
pub struct VecSource {
    rows: std::vec::IntoIter<Row>,
    current: Option<Row>,
    closed: bool,
}

impl VecSource {
    /// `rows` must be sorted by key with no duplicates.
    pub fn new(rows: Vec<Row>) -> Self {
        debug_assert!(rows.windows(2).all(|w| w[0].key() < w[1].key()));
        let mut rows = rows.into_iter();
        let current = rows.next();
        Self {
            rows,
            current,
            closed: false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl RowSource for VecSource {
    fn peek(&self) -> Option<&Row> {
        self.current.as_ref()
    }

    fn next(&mut self) -> Option<Row> {
        let row = self.current.take()?;
        self.current = self.rows.next();
        Some(row)
    }

    fn seek(&mut self, row_key: &[u8]) {
        while self.current.as_ref().is_some_and(|r| r.key() < row_key) {
            self.current = self.rows.next();
        }
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.current = None;
        Ok(())
    }
}
