//! # PFile - immutable, column-oriented row files
//!
//! When a region flushes its memtable snapshot, the rows are written to disk
//! as a PFile. PFiles are *write-once, read-many*: once renamed into place
//! they are never modified.
//!
//! ## File layout (v1)
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ ROW GROUPS (rows sorted by key, strictly increasing)          │
//! │                                                               │
//! │ crc32 (u32) | body_len (u32) | body                           │
//! │   body: row keys, then one chunk per column                   │
//! │                                                               │
//! │ ... one group per `row_group_size` rows or MAX_GROUP_BYTES ...│
//! ├───────────────────────────────────────────────────────────────┤
//! │ METADATA (name -> value)                                      │
//! │                                                               │
//! │ entry_count (u32)                                             │
//! │ name_len (u32) | name | value_len (u32) | value               │
//! │                                                               │
//! │ always contains start_key, end_key, row_count                 │
//! ├───────────────────────────────────────────────────────────────┤
//! │ FOOTER (always last 28 bytes)                                 │
//! │                                                               │
//! │ metadata_offset (u64) | row_group_count (u64)                 │
//! │ row_count (u64) | magic (u32) "PFL1"                          │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. See [`format`] for the row-group body.
//!
//! | Type            | Role                                           |
//! |-----------------|------------------------------------------------|
//! | [`PFileWriter`] | streams sorted rows into a new file            |
//! | [`PFileReader`] | metadata access and sequential row decoding    |
//! | [`FileScanner`] | [`row::RowSource`] adapter with one-row lookahead |

pub mod format;
mod reader;
mod scanner;
mod writer;

pub use format::{
    Metadata, FOOTER_BYTES, MAX_GROUP_BYTES, MAX_KEY_BYTES, MAX_VALUE_BYTES, META_END_KEY,
    META_ROW_COUNT, META_START_KEY, PFILE_MAGIC,
};
pub use reader::PFileReader;
pub use scanner::FileScanner;
pub use writer::{PFileInfo, PFileWriter, DEFAULT_ROW_GROUP_SIZE};

/// File extension of finished PFiles.
pub const PFILE_EXTENSION: &str = "pfile";

#[cfg(test)]
mod tests;
