//! File-handling error types.

use thiserror::Error;

/// Errors while building file sets or processing chunks.
#[derive(Debug, Error)]
pub enum FileError {
    /// Filesystem I/O failure
    #[error("file I/O: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid wildcard pattern
    #[error("bad glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// Directory walk failure
    #[error("walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    /// Zip archive creation failure
    #[error("zip failed: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A path component is not valid UTF-8
    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(std::path::PathBuf),
}
