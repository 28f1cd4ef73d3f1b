//! # Ferry Files
//!
//! File-set collection and chunk compression for ferry.
//!
//! This crate provides:
//! - `FileSet`: the ordered set of files built from user-specified paths
//!   before any network activity (wildcards, recursive walks, `--zip`
//!   folder archiving, empty-folder accounting)
//! - Per-chunk gzip compression used on the file-data path
//!
//! The wire-visible per-file record is [`FileMeta`] from `ferry-proto`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compress;
pub mod error;
pub mod fileset;
pub mod zipdir;

pub use compress::{CHUNK_SIZE, compress_chunk, decompress_chunk};
pub use error::FileError;
pub use ferry_proto::FileMeta;
pub use fileset::FileSet;

/// Format a byte count for human-facing output.
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit = 0;

    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}
