//! Advisory cross-process locking for a store.
//!
//! The lock file sits beside the store root (`.<name>.lock`) because the root
//! itself is renamed away and replaced on every write.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::{Error, Result};

/// Held advisory lock; released on drop.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Lock file path for the store at `root`.
    pub fn lock_path(root: &Path) -> PathBuf {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store".to_string());
        root.with_file_name(format!(".{name}.lock"))
    }

    /// Block until no other process holds any lock on the store.
    pub fn exclusive(root: &Path) -> Result<Self> {
        let path = Self::lock_path(root);
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::io(&path, e))?;

        file.lock_exclusive()
            .map_err(|e| Error::LockFailed { path: path.clone(), source: e })?;

        tracing::debug!("acquired exclusive lock {}", path.display());
        Ok(Self { file, path })
    }

    /// Block until no writer holds the store.
    ///
    /// Returns `None` when no writer has ever locked the store, in which case
    /// there is nothing to wait for.
    pub fn shared(root: &Path) -> Result<Option<Self>> {
        let path = Self::lock_path(root);
        let file = match OpenOptions::new().read(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(&path, e)),
        };

        file.lock_shared()
            .map_err(|e| Error::LockFailed { path: path.clone(), source: e })?;

        Ok(Some(Self { file, path }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!("failed to release lock {}: {}", self.path.display(), e);
        }
    }
}
