use super::helpers::{keys, manual_config, put, value_of};
use crate::*;
use anyhow::Result;
use scanner::ScanState;
use std::fs;
use tempfile::tempdir;

// --------------------- Scan (range query) ---------------------

#[test]
fn scan_full_range() -> Result<()> {
    let dir = tempdir()?;
    let region = Region::open(manual_config(dir.path()))?;

    region.put(put("c", "q", "3"))?;
    region.put(put("a", "q", "1"))?;
    region.put(put("b", "q", "2"))?;

    let scanner = region.scan(b"", b"");
    let rows = scanner.next_batch(10);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].key(), b"a");
    assert_eq!(value_of(&rows[2], "q").as_deref(), Some("3"));
    assert_eq!(scanner.state(), ScanState::Exhausted);
    Ok(())
}

#[test]
fn scan_bounded_range_excludes_stop_row() -> Result<()> {
    let dir = tempdir()?;
    let region = Region::open(manual_config(dir.path()))?;
    for k in ["a", "b", "c", "d", "e"] {
        region.put(put(k, "q", "v"))?;
    }

    assert_eq!(keys(&region.scan(b"b", b"d")), vec!["b", "c"]);
    assert_eq!(keys(&region.scan(b"bb", b"")), vec!["c", "d", "e"]);
    assert_eq!(keys(&region.scan(b"", b"b")), vec!["a"]);
    Ok(())
}

#[test]
fn scan_empty_and_inverted_ranges() -> Result<()> {
    let dir = tempdir()?;
    let region = Region::open(manual_config(dir.path()))?;
    region.put(put("a", "q", "v"))?;
    region.put(put("b", "q", "v"))?;

    let same = region.scan(b"a", b"a");
    assert!(!same.has_next());
    assert_eq!(same.state(), ScanState::Exhausted);

    assert!(keys(&region.scan(b"b", b"a")).is_empty());
    assert!(keys(&region.scan(b"x", b"")).is_empty());
    Ok(())
}

#[test]
fn scan_of_empty_region() -> Result<()> {
    let dir = tempdir()?;
    let region = Region::open(manual_config(dir.path()))?;
    let scanner = region.scan(b"", b"");
    assert!(scanner.next().is_none());
    assert_eq!(scanner.rows_returned(), 0);
    Ok(())
}

// --------------------- Sources: memtable, snapshot, files ---------------------

#[test]
fn scan_merges_live_snapshot_and_files() -> Result<()> {
    let dir = tempdir()?;
    let region = Region::open(manual_config(dir.path()))?;

    region.put(put("a", "q", "file"))?;
    region.put(put("d", "q", "file"))?;
    region.flush()?;

    region.put(put("b", "q", "snapshot"))?;
    let snapshot = region.memtable().snapshot().expect("no snapshot outstanding");
    assert_eq!(snapshot.row_count(), 1);

    region.put(put("c", "q", "live"))?;

    let rows = region.scan(b"", b"").next_batch(10);
    let got: Vec<(String, String)> = rows
        .iter()
        .map(|r| {
            (
                String::from_utf8_lossy(r.key()).into_owned(),
                value_of(r, "q").unwrap_or_default(),
            )
        })
        .collect();
    assert_eq!(
        got,
        vec![
            ("a".to_string(), "file".to_string()),
            ("b".to_string(), "snapshot".to_string()),
            ("c".to_string(), "live".to_string()),
            ("d".to_string(), "file".to_string()),
        ]
    );
    Ok(())
}

#[test]
fn newest_version_wins_per_column() -> Result<()> {
    let dir = tempdir()?;
    let region = Region::open(manual_config(dir.path()))?;

    region.put(put("k", "a", "old").with_column("cf", "b", "old"))?;
    region.flush()?;
    region.put(put("k", "b", "snap"))?;
    assert!(region.memtable().snapshot().is_some());
    region.put(put("k", "c", "live"))?;

    let rows = region.scan(b"", b"").next_batch(10);
    assert_eq!(rows.len(), 1, "one merged row per key");
    assert_eq!(value_of(&rows[0], "a").as_deref(), Some("old"));
    assert_eq!(value_of(&rows[0], "b").as_deref(), Some("snap"));
    assert_eq!(value_of(&rows[0], "c").as_deref(), Some("live"));
    Ok(())
}

#[test]
fn scan_survives_concurrent_flush() -> Result<()> {
    let dir = tempdir()?;
    let region = Region::open(manual_config(dir.path()))?;
    for i in 0..20 {
        region.put(put(&format!("k{i:02}"), "q", "v"))?;
    }

    let scanner = region.scan(b"", b"");
    let first = scanner.next_batch(5);
    region.flush()?;
    assert!(region.memtable().is_empty());

    let rest = scanner.next_batch(100);
    assert_eq!(first.len() + rest.len(), 20);
    assert_eq!(rest[0].key(), b"k05");
    Ok(())
}

#[test]
fn files_outside_range_are_pruned() -> Result<()> {
    let dir = tempdir()?;
    let region = Region::open(manual_config(dir.path()))?;

    region.put(put("a", "q", "v"))?;
    region.put(put("c", "q", "v"))?;
    region.flush()?;
    region.put(put("m", "q", "v"))?;
    region.put(put("p", "q", "v"))?;
    region.flush()?;

    let files = region.files();
    let (newer, older) = (&files[0], &files[1]);
    assert!(older.overlaps(b"", b""));
    assert!(older.overlaps(b"b", b"d"));
    assert!(older.overlaps(b"c", b""));
    assert!(!older.overlaps(b"d", b"m"));
    assert!(!older.overlaps(b"", b"a"));
    assert!(newer.overlaps(b"n", b"z"));
    assert!(!newer.overlaps(b"q", b""));

    // A pruned file could be deleted and the scan would not notice.
    fs::remove_file(older.path())?;
    assert_eq!(keys(&region.scan(b"d", b"")), vec!["m", "p"]);
    Ok(())
}

#[test]
fn unreadable_file_is_left_out_of_scan() -> Result<()> {
    let dir = tempdir()?;
    let region = Region::open(manual_config(dir.path()))?;

    region.put(put("a", "q", "v"))?;
    region.flush()?;
    region.put(put("b", "q", "v"))?;
    let broken = region.flush()?.unwrap();

    fs::write(&broken, b"not a pfile")?;
    assert_eq!(keys(&region.scan(b"", b"")), vec!["a"]);
    Ok(())
}

// --------------------- get ---------------------

#[test]
fn get_merges_across_sources() -> Result<()> {
    let dir = tempdir()?;
    let region = Region::open(manual_config(dir.path()))?;

    region.put(put("user", "name", "alice"))?;
    region.flush()?;
    region.put(put("user", "email", "a@example.com"))?;

    let row = region.get(b"user")?.unwrap();
    assert_eq!(row.len(), 2);
    assert_eq!(value_of(&row, "name").as_deref(), Some("alice"));
    assert_eq!(value_of(&row, "email").as_deref(), Some("a@example.com"));
    Ok(())
}

#[test]
fn get_rejects_invalid_keys() -> Result<()> {
    let dir = tempdir()?;
    let region = Region::open(manual_config(dir.path()))?;
    assert!(region.get(b"").is_err());
    assert!(region.get(&vec![b'k'; MAX_KEY_SIZE + 1]).is_err());
    Ok(())
}

// --------------------- Scanner lifecycle ---------------------

#[test]
fn close_stops_scan_and_is_idempotent() -> Result<()> {
    let dir = tempdir()?;
    let region = Region::open(manual_config(dir.path()))?;
    region.put(put("a", "q", "v"))?;
    region.put(put("b", "q", "v"))?;

    let scanner = region.scan(b"", b"");
    assert!(scanner.next().is_some());
    scanner.close();
    scanner.close();
    assert_eq!(scanner.state(), ScanState::Closed);
    assert!(scanner.next().is_none());
    assert!(scanner.peek().is_none());
    assert_eq!(scanner.rows_returned(), 1);
    Ok(())
}
