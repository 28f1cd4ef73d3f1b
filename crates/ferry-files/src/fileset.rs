//! File-set collection.
//!
//! A `FileSet` is built once from the user-specified paths before any
//! network activity and is immutable afterwards, except that symlink
//! targets are resolved lazily just before metadata is announced.

use crate::error::FileError;
use crate::zipdir::zip_directory;
use ferry_proto::{FileMeta, FileSetStatsPayload};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::debug;
use walkdir::WalkDir;

/// The ordered set of files and folders to transfer.
#[derive(Debug, Default)]
pub struct FileSet {
    /// Files in announcement order
    pub files: Vec<FileMeta>,
    /// Folders containing no entries; carried for accounting only
    pub empty_folders: Vec<FileMeta>,
    /// Total number of folders seen during collection
    pub folder_count: usize,
}

impl FileSet {
    /// Build a file set from user-specified paths.
    ///
    /// Paths containing `*` are expanded as glob patterns. Directories are
    /// either zipped into a temporary `<dir>.zip` artifact in the system
    /// temp directory (`zip_folders`) or walked recursively, recording
    /// per-file destination folders and the folder totals.
    ///
    /// # Errors
    ///
    /// Returns `FileError` when a path does not exist, a pattern is
    /// invalid, or archiving fails.
    pub fn collect(paths: &[PathBuf], zip_folders: bool) -> Result<Self, FileError> {
        let mut set = FileSet::default();

        for path in expand_wildcards(paths)? {
            let meta = fs::symlink_metadata(&path)?;
            let abs = absolute(&path)?;

            if meta.is_dir() && zip_folders {
                set.collect_zipped_dir(&abs)?;
            } else if meta.is_dir() {
                set.collect_dir(&abs)?;
            } else {
                set.files.push(file_meta(&abs, &meta, "./", false)?);
            }
        }

        Ok(set)
    }

    fn collect_zipped_dir(&mut self, dir: &Path) -> Result<(), FileError> {
        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| FileError::NonUtf8Path(dir.to_path_buf()))?;
        let dest = std::env::temp_dir().join(format!("{name}.zip"));
        zip_directory(&dest, dir)?;
        debug!(archive = %dest.display(), "folder zipped for transfer");

        let meta = fs::symlink_metadata(&dest)?;
        let abs = absolute(&dest)?;
        self.files.push(file_meta(&abs, &meta, "./", true)?);
        Ok(())
    }

    fn collect_dir(&mut self, dir: &Path) -> Result<(), FileError> {
        // Remote folders are relative to the directory's parent so the
        // directory itself is recreated at the destination.
        let base = dir.parent().unwrap_or(Path::new("/"));

        for entry in WalkDir::new(dir) {
            let entry = entry?;
            let path = entry.path();

            if entry.file_type().is_dir() {
                self.folder_count += 1;
                if fs::read_dir(path)?.next().is_none() {
                    self.empty_folders.push(FileMeta {
                        folder_remote: format!("{}/", relative_slash_path(path, base)?),
                        ..FileMeta::default()
                    });
                }
            } else {
                let meta = entry.metadata()?;
                let parent = path.parent().unwrap_or(base);
                let remote = format!("{}/", relative_slash_path(parent, base)?);
                let mut fm = file_meta(path, &meta, &remote, false)?;
                fm.folder_source = parent
                    .to_str()
                    .ok_or_else(|| FileError::NonUtf8Path(parent.to_path_buf()))?
                    .to_string();
                self.files.push(fm);
            }
        }
        Ok(())
    }

    /// Fill in symlink targets for any symlinked entries.
    ///
    /// Unreadable links are left unresolved, matching a best-effort
    /// announcement.
    pub fn resolve_symlinks(&mut self) {
        for file in &mut self.files {
            let path = Path::new(&file.folder_source).join(&file.name);
            let is_link = fs::symlink_metadata(&path)
                .map(|m| m.file_type().is_symlink())
                .unwrap_or(false);
            if is_link {
                if let Ok(target) = fs::read_link(&path) {
                    file.symlink = target.to_string_lossy().into_owned();
                }
            }
        }
    }

    /// Total bytes across all files.
    pub fn total_size(&self) -> i64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// Wire statistics for this set.
    pub fn stats(&self) -> FileSetStatsPayload {
        FileSetStatsPayload {
            files_size: self.total_size(),
            files_number: self.files.len() as i64,
            folder_number: self.folder_count as i64,
        }
    }

    /// Source path of one announced file on the sending side.
    pub fn source_path(meta: &FileMeta) -> PathBuf {
        Path::new(&meta.folder_source).join(&meta.name)
    }

    /// Delete temporary zip artifacts created during collection.
    ///
    /// Called on every termination path, success or failure.
    pub fn cleanup_temp_files(&self) {
        for file in self.files.iter().filter(|f| f.temp_file) {
            let path = Self::source_path(file);
            debug!(path = %path.display(), "removing temporary archive");
            let _ = fs::remove_file(path);
        }
    }
}

fn expand_wildcards(paths: &[PathBuf]) -> Result<Vec<PathBuf>, FileError> {
    let mut out = Vec::new();
    for path in paths {
        let text = path
            .to_str()
            .ok_or_else(|| FileError::NonUtf8Path(path.clone()))?;
        if text.contains('*') {
            for hit in glob::glob(text)? {
                out.push(hit.map_err(|e| FileError::Io(e.into_error()))?);
            }
        } else {
            out.push(path.clone());
        }
    }
    Ok(out)
}

fn absolute(path: &Path) -> Result<PathBuf, FileError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn relative_slash_path(path: &Path, base: &Path) -> Result<String, FileError> {
    let rel = path.strip_prefix(base).unwrap_or(path);
    let text = rel
        .to_str()
        .ok_or_else(|| FileError::NonUtf8Path(rel.to_path_buf()))?;
    Ok(text.replace(std::path::MAIN_SEPARATOR, "/"))
}

fn file_meta(
    path: &Path,
    meta: &fs::Metadata,
    folder_remote: &str,
    temp_file: bool,
) -> Result<FileMeta, FileError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| FileError::NonUtf8Path(path.to_path_buf()))?
        .to_string();
    let folder_source = path
        .parent()
        .unwrap_or(Path::new("/"))
        .to_str()
        .ok_or_else(|| FileError::NonUtf8Path(path.to_path_buf()))?
        .to_string();

    Ok(FileMeta {
        name,
        folder_remote: folder_remote.to_string(),
        folder_source,
        size: meta.len() as i64,
        mod_time: mod_time_ms(meta),
        is_compressed: false,
        is_encrypted: false,
        symlink: String::new(),
        mode: mode_bits(meta),
        temp_file,
    })
}

fn mod_time_ms(meta: &fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(unix)]
fn mode_bits(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    meta.mode()
}

#[cfg(not(unix))]
fn mode_bits(_meta: &fs::Metadata) -> u32 {
    0
}
