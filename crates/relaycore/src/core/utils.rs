//! Temporary file helpers.
//!
//! Every file the relay creates under the download directory goes through
//! these helpers, so an error or a panic on any path still leaves the
//! directory clean.

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Removes a file, treating "already gone" as success.
///
/// Returns `true` if a file was actually deleted.
pub fn remove_quietly(path: &Path) -> bool {
    match fs_err::remove_file(path) {
        Ok(()) => {
            log::debug!("Removed temporary file {}", path.display());
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            log::warn!("Failed to remove {}: {}", path.display(), e);
            false
        }
    }
}

/// Removes every file in the stem's directory whose name starts with the
/// stem's file name (yt-dlp leaves `.part`, `.ytdl` and per-format pieces
/// next to the final output).
pub fn remove_with_prefix(stem: &Path) -> usize {
    let (Some(dir), Some(prefix)) = (stem.parent(), stem.file_name().and_then(OsStr::to_str)) else {
        return 0;
    };
    let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };

    let entries = match fs_err::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::debug!("Cannot scan {} for leftovers: {}", dir.display(), e);
            return 0;
        }
    };

    entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_str().is_some_and(|name| name.starts_with(prefix)))
        .filter(|entry| remove_quietly(&entry.path()))
        .count()
}

/// Files in `dir` whose names start with `prefix`.
pub fn files_with_prefix(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs_err::read_dir(dir) else {
        return Vec::new();
    };
    let mut found: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_str().is_some_and(|name| name.starts_with(prefix)))
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    found.sort();
    found
}

/// Deletes its file when dropped unless [`keep`](Self::keep) was called.
#[derive(Debug)]
pub struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the file now. Later calls and the drop are no-ops.
    pub fn remove(&mut self) -> bool {
        if !self.armed {
            return false;
        }
        self.armed = false;
        remove_quietly(&self.path)
    }

    /// Disarms the guard and hands the path to the caller.
    pub fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            remove_quietly(&self.path);
        }
    }
}
