use crate::*;
use proptest::prelude::*;
use row::{BoxedRowSource, Row, RowSource, VecSource};

use super::{boxed, closes, key_strings, rows_with, TrackedSource};

fn drain<S: RowSource>(heap: &mut ScannerHeap<S>) -> Vec<Row> {
    let mut out = Vec::new();
    while let Some(row) = heap.next() {
        out.push(row);
    }
    out
}

// -------------------- Ordering --------------------

#[test]
fn merges_disjoint_sources_in_key_order() {
    let mut heap: ScannerHeap = ScannerHeap::new(vec![
        boxed(rows_with(&["b", "e", "h"], "x")),
        boxed(rows_with(&["a", "d", "g"], "x")),
        boxed(rows_with(&["c", "f", "i"], "x")),
    ]);
    assert_eq!(heap.source_count(), 3);
    assert_eq!(
        key_strings(&drain(&mut heap)),
        vec!["a", "b", "c", "d", "e", "f", "g", "h", "i"]
    );
    assert!(!heap.has_next());
    assert_eq!(heap.source_count(), 0);
}

#[test]
fn equal_keys_come_out_earlier_source_first() {
    let mut heap: ScannerHeap = ScannerHeap::new(vec![
        boxed(rows_with(&["k"], "newest")),
        boxed(rows_with(&["a", "k"], "middle")),
        boxed(rows_with(&["k", "z"], "oldest")),
    ]);

    let rows = drain(&mut heap);
    assert_eq!(key_strings(&rows), vec!["a", "k", "k", "k", "z"]);
    let values: Vec<&[u8]> = rows[1..4]
        .iter()
        .map(|r| r.value(b"cf", b"v").unwrap())
        .collect();
    assert_eq!(
        values,
        vec![b"newest".as_slice(), b"middle".as_slice(), b"oldest".as_slice()]
    );
}

#[test]
fn winner_keeps_running_while_smallest() {
    let mut heap: ScannerHeap = ScannerHeap::new(vec![
        boxed(rows_with(&["a", "b", "c", "x"], "1")),
        boxed(rows_with(&["m"], "2")),
    ]);
    assert_eq!(heap.current_source(), Some(0));
    heap.next();
    heap.next();
    heap.next();
    assert_eq!(heap.peek_key(), Some(b"m".as_slice()));
    assert_eq!(heap.current_source(), Some(1));
}

#[test]
fn no_sources_is_exhausted() {
    let mut heap: ScannerHeap = ScannerHeap::new(Vec::<BoxedRowSource>::new());
    assert!(heap.peek().is_none());
    assert!(heap.next().is_none());
}

#[test]
fn heaps_nest() {
    let inner: ScannerHeap = ScannerHeap::new(vec![
        boxed(rows_with(&["a", "d"], "x")),
        boxed(rows_with(&["c"], "x")),
    ]);
    let mut outer: ScannerHeap = ScannerHeap::new(vec![
        Box::new(inner) as BoxedRowSource,
        boxed(rows_with(&["b", "e"], "x")),
    ]);
    assert_eq!(key_strings(&drain(&mut outer)), vec!["a", "b", "c", "d", "e"]);
}

// -------------------- Seek --------------------

#[test]
fn seek_repositions_every_source() {
    let mut heap: ScannerHeap = ScannerHeap::new(vec![
        boxed(rows_with(&["a", "c", "e"], "x")),
        boxed(rows_with(&["b", "d", "f"], "x")),
    ]);
    heap.seek(b"c");
    assert_eq!(heap.peek_key(), Some(b"c".as_slice()));
    assert_eq!(key_strings(&drain(&mut heap)), vec!["c", "d", "e", "f"]);
}

#[test]
fn seek_closes_sources_that_run_dry() {
    let (a, a_closes) = TrackedSource::new(rows_with(&["a", "b"], "x"));
    let (b, b_closes) = TrackedSource::new(rows_with(&["c", "y"], "x"));
    let mut heap = ScannerHeap::new(vec![a, b]);

    heap.seek(b"x");
    assert_eq!(closes(&a_closes), 1);
    assert_eq!(closes(&b_closes), 0);
    assert_eq!(heap.source_count(), 1);
    assert_eq!(heap.peek_key(), Some(b"y".as_slice()));
}

// -------------------- Close --------------------

#[test]
fn exhausted_sources_are_closed_at_construction() {
    let (empty, empty_closes) = TrackedSource::new(Vec::new());
    let (full, full_closes) = TrackedSource::new(rows_with(&["a"], "x"));
    let heap = ScannerHeap::new(vec![empty, full]);

    assert_eq!(closes(&empty_closes), 1);
    assert_eq!(closes(&full_closes), 0);
    assert_eq!(heap.source_count(), 1);
}

#[test]
fn every_source_closed_exactly_once() -> anyhow::Result<()> {
    let (a, a_closes) = TrackedSource::new(rows_with(&["a"], "x"));
    let (b, b_closes) = TrackedSource::new(rows_with(&["b", "c"], "x"));
    let (c, c_closes) = TrackedSource::new(rows_with(&["d"], "x"));
    let mut heap = ScannerHeap::new(vec![a, b, c]);

    heap.next(); // drains a
    assert_eq!(closes(&a_closes), 1);

    heap.close()?;
    heap.close()?;
    assert!(heap.is_closed());
    assert_eq!(closes(&a_closes), 1);
    assert_eq!(closes(&b_closes), 1);
    assert_eq!(closes(&c_closes), 1);
    assert!(heap.next().is_none());
    Ok(())
}

#[test]
fn close_failure_does_not_stop_the_rest() -> anyhow::Result<()> {
    let (bad, bad_closes) = TrackedSource::failing(rows_with(&["a"], "x"));
    let (good, good_closes) = TrackedSource::new(rows_with(&["b"], "x"));
    let mut heap = ScannerHeap::new(vec![bad, good]);

    heap.close()?;
    assert_eq!(closes(&bad_closes), 1);
    assert_eq!(closes(&good_closes), 1);
    Ok(())
}

// -------------------- Properties --------------------

fn sources_strategy() -> impl Strategy<Value = Vec<Vec<u16>>> {
    prop::collection::vec(prop::collection::btree_set(0u16..500, 0..40), 0..6)
        .prop_map(|sets| sets.into_iter().map(|s| s.into_iter().collect()).collect())
}

fn key_of(k: u16) -> Vec<u8> {
    format!("{k:05}").into_bytes()
}

proptest! {
    #[test]
    fn merge_output_is_sorted_union(sources in sources_strategy()) {
        let mut expected: Vec<Vec<u8>> = sources.iter().flatten().map(|k| key_of(*k)).collect();
        expected.sort();

        let mut heap = ScannerHeap::new(sources.iter().map(|keys| {
            VecSource::new(keys.iter().map(|k| Row::new(key_of(*k))).collect())
        }));
        let mut got = Vec::new();
        while let Some(row) = heap.next() {
            got.push(row.key().to_vec());
        }
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn seek_never_goes_below_target(
        sources in sources_strategy(),
        mut targets in prop::collection::vec(0u16..520, 1..5),
    ) {
        targets.sort();
        let mut heap = ScannerHeap::new(sources.iter().map(|keys| {
            VecSource::new(keys.iter().map(|k| Row::new(key_of(*k))).collect())
        }));
        for t in targets {
            let target = key_of(t);
            heap.seek(&target);
            if let Some(k) = heap.peek_key() {
                prop_assert!(k >= target.as_slice());
            }
        }
    }
}
