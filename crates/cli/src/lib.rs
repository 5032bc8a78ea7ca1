//! # CLI - RegionKV interactive shell
//!
//! The command loop lives in [`shell`] so it can run over any reader and
//! writer; `main.rs` wires it to stdin/stdout.
//!
//! ## Commands
//!
//! ```text
//! PUT row family:qualifier value   Set one field of a row
//! GET row                          Print a row (or "(nil)")
//! DEL row                          Drop the row's unflushed edits
//! SCAN [start] [stop] [limit]      Range scan over [start, stop)
//! FLUSH                            Write the memtable to a new PFile
//! STATS                            Print region debug info
//! EXIT / QUIT                      Shut down (flushes on drop)
//! ```
//!
//! Use `-` for an open `start` or `stop` bound when a later argument is
//! given, e.g. `SCAN - user5 10`.

pub mod shell;
