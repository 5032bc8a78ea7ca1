use anyhow::{bail, Result};
use row::{BoxedRowSource, Row, RowSource, VecSource};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

mod heap_tests;

/// A [`VecSource`] that counts how often it is closed and can be told to
/// fail on close.
pub(crate) struct TrackedSource {
    inner: VecSource,
    closes: Arc<AtomicUsize>,
    fail_close: bool,
}

impl TrackedSource {
    pub(crate) fn new(rows: Vec<Row>) -> (Self, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let source = Self {
            inner: VecSource::new(rows),
            closes: Arc::clone(&closes),
            fail_close: false,
        };
        (source, closes)
    }

    pub(crate) fn failing(rows: Vec<Row>) -> (Self, Arc<AtomicUsize>) {
        let (mut source, closes) = Self::new(rows);
        source.fail_close = true;
        (source, closes)
    }
}

impl RowSource for TrackedSource {
    fn peek(&self) -> Option<&Row> {
        self.inner.peek()
    }

    fn next(&mut self) -> Option<Row> {
        self.inner.next()
    }

    fn seek(&mut self, row_key: &[u8]) {
        self.inner.seek(row_key)
    }

    fn close(&mut self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close()?;
        if self.fail_close {
            bail!("simulated close failure");
        }
        Ok(())
    }
}

/// One row per key with a single `cf:v` cell.
pub(crate) fn rows_with(keys: &[&str], value: &str) -> Vec<Row> {
    keys.iter()
        .map(|k| {
            row::Mutation::new(*k)
                .with_column_at("cf", "v", 1, value)
                .to_row()
        })
        .collect()
}

pub(crate) fn boxed(rows: Vec<Row>) -> BoxedRowSource {
    Box::new(VecSource::new(rows))
}

pub(crate) fn key_strings(rows: &[Row]) -> Vec<String> {
    rows.iter()
        .map(|r| String::from_utf8_lossy(r.key()).into_owned())
        .collect()
}

pub(crate) fn closes(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}
