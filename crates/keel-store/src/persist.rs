//! Loading and storing the cache file.
//!
//! Loading is fail-safe: a missing, unreadable, or corrupt file yields an
//! empty cache and a warning, never a partially populated one. Storing is
//! atomic (temp file + rename) and skipped when nothing changed.

use crate::cache::ResolutionCache;
use crate::codec::{decode_cache, encode_cache};
use crate::{fsync_dir, StoreError};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Read and decode the cache file. `Ok(None)` when it does not exist.
pub fn try_load_cache(path: &Path) -> Result<Option<ResolutionCache>, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    decode_cache(&content).map(Some)
}

/// Load the cache, falling back to an empty one on any problem.
pub fn load_cache(path: &Path) -> ResolutionCache {
    match try_load_cache(path) {
        Ok(Some(cache)) => {
            debug!(
                "loaded {} cached features from {}",
                cache.len(),
                path.display()
            );
            cache
        }
        Ok(None) => {
            debug!("no resolution cache at {}", path.display());
            ResolutionCache::new()
        }
        Err(e) => {
            warn!(
                "discarding resolution cache {}: {e}; resolving from scratch",
                path.display()
            );
            ResolutionCache::new()
        }
    }
}

/// Write the cache if it is dirty. Returns `true` when a file was written.
///
/// The cache is marked clean after a successful write.
pub fn save_cache(cache: &mut ResolutionCache, path: &Path) -> Result<bool, StoreError> {
    if !cache.is_dirty() {
        debug!("resolution cache unchanged; not writing {}", path.display());
        return Ok(false);
    }

    let content = encode_cache(cache)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir()?,
    };
    fs::create_dir_all(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    fsync_dir(&dir)?;

    cache.mark_clean();
    info!(
        "wrote {} features to resolution cache {}",
        cache.len(),
        path.display()
    );
    Ok(true)
}

/// Delete the cache file. Returns `true` when a file was removed.
pub fn remove_cache(path: &Path) -> Result<bool, StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
