use config::RegionConfig;
use row::{Mutation, Row};
use scanner::RangeScanner;
use std::fs;
use std::path::Path;

pub fn count_pfiles(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|ext| ext == "pfile")
                .unwrap_or(false)
        })
        .count()
}

/// Config with auto flush off, so tests decide when to flush.
pub fn manual_config(dir: &Path) -> RegionConfig {
    RegionConfig::new(dir).with_auto_flush(false)
}

pub fn put(row: &str, qualifier: &str, value: &str) -> Mutation {
    Mutation::new(row).with_column("cf", qualifier, value)
}

pub fn value_of(row: &Row, qualifier: &str) -> Option<String> {
    row.value(b"cf", qualifier.as_bytes())
        .map(|v| String::from_utf8_lossy(v).into_owned())
}

pub fn keys(scanner: &RangeScanner) -> Vec<String> {
    let mut out = Vec::new();
    while let Some(row) = scanner.next() {
        out.push(String::from_utf8_lossy(row.key()).into_owned());
    }
    out
}
