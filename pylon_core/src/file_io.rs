//! # File I/O Helpers
//!
//! Shared by the settings loader and the file-backed resilience store:
//! - **Atomic writes**: write to `.tmp`, fsync, rename over the target
//! - **File locking**: OS-level exclusive lock on a sibling `.lock` file
//! - **Version validation**: schema compatibility on load
//!
//! ## Example
//!
//! ```rust,no_run
//! use pylon_core::file_io::{write_atomic, FileLock};
//! use std::path::Path;
//!
//! let path = Path::new("store.json");
//! let _lock = FileLock::acquire(path)?;
//! write_atomic(path, b"{}")?;
//! # Ok::<(), pylon_core::errors::CalcError>(())
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::errors::{CalcError, CalcResult};

/// Exclusive lock guard. The OS lock is released when the guard drops.
///
/// The `.lock` file itself is left in place; deleting it while another
/// process waits on it would let two holders lock different inodes.
#[derive(Debug)]
pub struct FileLock {
    lock_path: PathBuf,
    file: File,
}

impl FileLock {
    /// Block until an exclusive lock on `path` is held
    pub fn acquire(path: &Path) -> CalcResult<Self> {
        let (lock_path, file) = open_lock_file(path)?;
        file.lock_exclusive().map_err(|e| {
            CalcError::file_error("lock", lock_path.display().to_string(), e.to_string())
        })?;
        Ok(FileLock { lock_path, file })
    }

    /// Take the lock without waiting, or fail with `FileLocked`
    pub fn try_acquire(path: &Path) -> CalcResult<Self> {
        let (lock_path, file) = open_lock_file(path)?;
        file.try_lock_exclusive().map_err(|_| CalcError::FileLocked {
            path: path.display().to_string(),
        })?;
        Ok(FileLock { lock_path, file })
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn open_lock_file(path: &Path) -> CalcResult<(PathBuf, File)> {
    let lock_path = lock_path_for(path);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(|e| {
            CalcError::file_error("create lock", lock_path.display().to_string(), e.to_string())
        })?;
    Ok((lock_path, file))
}

/// Lock file path for a data file (`store.json` -> `store.json.lock`)
pub fn lock_path_for(path: &Path) -> PathBuf {
    let mut lock_path = path.to_path_buf();
    let extension = lock_path
        .extension()
        .map(|e| format!("{}.lock", e.to_string_lossy()))
        .unwrap_or_else(|| "lock".to_string());
    lock_path.set_extension(extension);
    lock_path
}

/// Write `contents` to `path` atomically.
///
/// 1. Write to a sibling `.tmp` file
/// 2. Sync to disk (fsync)
/// 3. Rename over the target (atomic on most filesystems)
pub fn write_atomic(path: &Path, contents: &[u8]) -> CalcResult<()> {
    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");
    let tmp_path = PathBuf::from(tmp_path);

    let mut tmp_file = File::create(&tmp_path).map_err(|e| {
        CalcError::file_error("create temp file", tmp_path.display().to_string(), e.to_string())
    })?;

    tmp_file.write_all(contents).map_err(|e| {
        CalcError::file_error("write temp file", tmp_path.display().to_string(), e.to_string())
    })?;

    tmp_file.sync_all().map_err(|e| {
        CalcError::file_error("sync temp file", tmp_path.display().to_string(), e.to_string())
    })?;

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        CalcError::file_error("rename to final", path.display().to_string(), e.to_string())
    })?;

    Ok(())
}

/// Read a whole file, or `None` if it does not exist
pub fn read_optional(path: &Path) -> CalcResult<Option<String>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(CalcError::file_error("open", path.display().to_string(), e.to_string()))
        }
    };

    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| CalcError::file_error("read", path.display().to_string(), e.to_string()))?;
    Ok(Some(contents))
}

/// Validate that a file's schema version is compatible with `expected`.
///
/// Major versions must match; for 0.x schemas a newer minor is rejected.
pub fn validate_version(file_version: &str, expected: &str) -> CalcResult<()> {
    let parse = |v: &str| -> Vec<u32> { v.split('.').filter_map(|p| p.parse().ok()).collect() };
    let file_parts = parse(file_version);
    let current_parts = parse(expected);

    let mismatch = || CalcError::VersionMismatch {
        file_version: file_version.to_string(),
        expected_version: expected.to_string(),
    };

    if file_parts.is_empty() || current_parts.is_empty() {
        return Err(mismatch());
    }

    if file_parts[0] != current_parts[0] {
        return Err(mismatch());
    }

    if current_parts[0] == 0
        && file_parts.len() > 1
        && current_parts.len() > 1
        && file_parts[1] > current_parts[1]
    {
        return Err(mismatch());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_path_generation() {
        let lock_path = lock_path_for(Path::new("/path/to/store.json"));
        assert_eq!(lock_path, Path::new("/path/to/store.json.lock"));
    }

    #[test]
    fn test_atomic_write_leaves_no_tmp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        write_atomic(&path, b"{\"a\":1}").unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("settings.json.tmp").exists());
        assert_eq!(read_optional(&path).unwrap().as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn test_read_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_optional(&dir.path().join("missing.json")).unwrap().is_none());
    }

    #[test]
    fn test_try_acquire_fails_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let held = FileLock::acquire(&path).unwrap();
        assert!(held.lock_path().exists());
        let err = FileLock::try_acquire(&path).unwrap_err();
        assert_eq!(err.error_code(), "FILE_LOCKED");

        drop(held);
        assert!(FileLock::try_acquire(&path).is_ok());
    }

    #[test]
    fn test_version_validation() {
        assert!(validate_version("0.1.0", "0.1.0").is_ok());
        assert!(validate_version("0.1.5", "0.1.0").is_ok());
        assert!(validate_version("1.0.0", "0.1.0").is_err());
        assert!(validate_version("0.2.0", "0.1.0").is_err());
        assert!(validate_version("garbage", "0.1.0").is_err());
    }
}
