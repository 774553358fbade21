use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Modification time and size of a file, compared exactly for staleness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FileStamp {
    /// Milliseconds since the Unix epoch; negative before it.
    pub last_modified: i64,
    pub size: u64,
}

impl FileStamp {
    pub fn new(last_modified: i64, size: u64) -> Self {
        Self {
            last_modified,
            size,
        }
    }

    /// Read the stamp of a file from its metadata.
    pub fn probe(path: &Path) -> Result<Self, std::io::Error> {
        let meta = fs::metadata(path)?;
        let modified = meta.modified()?;
        let last_modified = match modified.duration_since(UNIX_EPOCH) {
            Ok(after) => i64::try_from(after.as_millis()).unwrap_or(i64::MAX),
            Err(before) => i64::try_from(before.duration().as_millis())
                .map(|ms| -ms)
                .unwrap_or(i64::MIN),
        };
        Ok(Self {
            last_modified,
            size: meta.len(),
        })
    }

    /// `true` when the file exists and its current stamp equals `self`.
    pub fn matches(&self, path: &Path) -> bool {
        Self::probe(path).is_ok_and(|live| live == *self)
    }
}
