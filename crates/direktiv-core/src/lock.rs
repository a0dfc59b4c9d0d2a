//! Advisory library lock
//!
//! One writer at a time: every mutating operation holds an exclusive lock
//! on `<library-root>/.lock` for its duration. The attempt is non-blocking,
//! so an accidental second invocation fails fast instead of waiting.
//!
//! Uses `fs2` (flock / LockFileEx). The lock is released when the guard is
//! dropped and the file handle closed.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::error::{LibraryError, LibraryResult};

/// Holds the library lock until dropped
pub struct LibraryLock {
    _file: File,
    path: PathBuf,
}

impl LibraryLock {
    /// Try to take the exclusive lock at `lock_path`
    pub fn acquire(lock_path: &Path) -> LibraryResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .map_err(|e| LibraryError::from_io(e, lock_path))?;

        // Fully qualified: std::fs::File grew an inherent try_lock_exclusive
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                debug!("Acquired library lock: {}", lock_path.display());
                Ok(Self {
                    _file: file,
                    path: lock_path.to_path_buf(),
                })
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || is_contended(&e) => {
                let root = lock_path.parent().unwrap_or(lock_path).to_path_buf();
                Err(LibraryError::Locked(root))
            }
            Err(e) => Err(LibraryError::from_io(e, lock_path)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LibraryLock {
    fn drop(&mut self) {
        debug!("Releasing library lock: {}", self.path.display());
    }
}

impl std::fmt::Debug for LibraryLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryLock")
            .field("path", &self.path)
            .finish()
    }
}

/// fs2 reports a held lock as its own platform error on some targets
fn is_contended(error: &io::Error) -> bool {
    error.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_acquire_creates_lock_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".lock");

        let lock = LibraryLock::acquire(&path).unwrap();

        assert!(path.exists());
        assert_eq!(lock.path(), path.as_path());
    }

    #[test]
    fn test_second_acquire_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".lock");

        let _held = LibraryLock::acquire(&path).unwrap();
        let err = LibraryLock::acquire(&path).unwrap_err();

        assert!(matches!(err, LibraryError::Locked(ref root) if root == temp_dir.path()));
    }

    #[test]
    fn test_released_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".lock");

        drop(LibraryLock::acquire(&path).unwrap());

        assert!(LibraryLock::acquire(&path).is_ok());
    }
}
