use crate::CoreError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Exclusive advisory lock serializing access to one cache file.
///
/// The lock lives on a sibling `.lock` file so the cache itself can be
/// replaced atomically while held. Released on drop.
pub struct CacheLock {
    file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Block until the lock is held.
    pub fn acquire(lock_path: &Path) -> Result<Self, CoreError> {
        let file = open_lock_file(lock_path)?;
        file.lock_exclusive().map_err(|e| lock_error(lock_path, e))?;
        debug!("acquired cache lock {}", lock_path.display());
        Ok(Self {
            file,
            path: lock_path.to_path_buf(),
        })
    }

    /// Take the lock if nobody holds it; `None` when another holder has it.
    pub fn try_acquire(lock_path: &Path) -> Result<Option<Self>, CoreError> {
        let file = open_lock_file(lock_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!("acquired cache lock {}", lock_path.display());
                Ok(Some(Self {
                    file,
                    path: lock_path.to_path_buf(),
                }))
            }
            Err(e) if is_contended(&e) => {
                debug!("cache lock {} is held elsewhere", lock_path.display());
                Ok(None)
            }
            Err(e) => Err(lock_error(lock_path, e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || (e.raw_os_error().is_some()
            && e.raw_os_error() == fs2::lock_contended_error().raw_os_error())
}

fn lock_error(path: &Path, source: io::Error) -> CoreError {
    CoreError::Lock {
        path: path.to_path_buf(),
        source,
    }
}

fn open_lock_file(lock_path: &Path) -> Result<File, CoreError> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| lock_error(lock_path, e))?;
    }
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(lock_path)
        .map_err(|e| lock_error(lock_path, e))
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            debug!("failed to release cache lock {}: {e}", self.path.display());
        } else {
            debug!("released cache lock {}", self.path.display());
        }
    }
}
