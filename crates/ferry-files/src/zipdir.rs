//! Folder archiving for `--zip` transfers.

use crate::error::FileError;
use std::fs::File;
use std::path::Path;
use walkdir::WalkDir;
use zip::ZipWriter;
use zip::write::FileOptions;

/// Zip `src_dir` recursively into the archive at `dest`.
///
/// Entry names are relative to `src_dir` so the archive unpacks to a single
/// folder. Directory entries are kept so empty folders survive.
///
/// # Errors
///
/// Returns `FileError` on I/O or archive failures.
pub fn zip_directory(dest: &Path, src_dir: &Path) -> Result<(), FileError> {
    let file = File::create(dest)?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default();

    for entry in WalkDir::new(src_dir) {
        let entry = entry?;
        let path = entry.path();
        let rel = path
            .strip_prefix(src_dir)
            .unwrap_or(path)
            .to_str()
            .ok_or_else(|| FileError::NonUtf8Path(path.to_path_buf()))?;
        if rel.is_empty() {
            continue;
        }

        if entry.file_type().is_dir() {
            zip.add_directory(rel, options)?;
        } else {
            // Streamed, not slurped: members can be arbitrarily large.
            zip.start_file(rel, options)?;
            let mut f = File::open(path)?;
            std::io::copy(&mut f, &mut zip)?;
        }
    }

    zip.finish()?;
    Ok(())
}
