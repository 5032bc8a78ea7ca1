//! Cold-start path: tmp file cleanup and PFile loading.

use anyhow::Result;
use pfile::{PFileReader, PFILE_EXTENSION};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::StoreFile;

/// Removes leftover `.pfile.tmp` files from interrupted flushes.
pub(crate) fn cleanup_tmp_files(data_dir: &Path) {
    let suffix = format!(".{}.tmp", PFILE_EXTENSION);
    if let Ok(entries) = std::fs::read_dir(data_dir) {
        for entry in entries.flatten() {
            let p = entry.path();
            if let Some(name) = p.file_name().and_then(|n| n.to_str()) {
                if name.ends_with(&suffix) {
                    debug!(path = %p.display(), "removing leftover tmp file");
                    let _ = std::fs::remove_file(&p);
                }
            }
        }
    }
}

/// Parses the numeric id out of `<id>.pfile`.
pub(crate) fn parse_file_id(path: &Path) -> Option<u64> {
    if path.extension()? != PFILE_EXTENSION {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

/// Opens every PFile in `data_dir`, newest (highest id) first.
///
/// Returns the files that opened plus the highest id seen, counting files
/// that failed to open so their names are never reused.
pub(crate) fn load_store_files(data_dir: &Path) -> Result<(Vec<Arc<StoreFile>>, u64)> {
    let mut found: Vec<(u64, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(data_dir)? {
        let path = entry?.path();
        if let Some(id) = parse_file_id(&path) {
            found.push((id, path));
        } else if path.extension().is_some_and(|e| e == PFILE_EXTENSION) {
            warn!(path = %path.display(), "ignoring pfile with unexpected name");
        }
    }

    // newest first
    found.sort_by(|a, b| b.0.cmp(&a.0));
    let max_id = found.first().map_or(0, |(id, _)| *id);

    let mut files = Vec::with_capacity(found.len());
    for (id, path) in found {
        match PFileReader::open(&path) {
            Ok(reader) => {
                files.push(Arc::new(StoreFile {
                    id,
                    path,
                    start_key: reader.start_key().to_vec(),
                    end_key: reader.end_key().to_vec(),
                    row_count: reader.row_count(),
                }));
            }
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{e:#}"), "skipping unreadable pfile");
            }
        }
    }
    Ok((files, max_id))
}
