//! Resolved-feature model, resolution cache, and cache persistence for Keel.
//!
//! This crate provides the storage layer: immutable `ResolvedFeature` records
//! built through `FeatureBuilder`, the `ResolutionCache` with its staleness
//! check against live file metadata (`FileStamp`), the line-oriented cache
//! file codec, and fail-safe load / atomic store of the cache file.

pub mod cache;
pub mod codec;
pub mod feature;
pub mod options;
pub mod persist;
pub mod stamp;

pub use cache::{FeatureStatus, ResolutionCache};
pub use codec::{
    decode_cache, encode_cache, COMPONENT_PREFIX, FEATURES_IN_USE_PREFIX, OPTIONS_PREFIX,
};
pub use feature::{feature_name_of, FeatureBuilder, ResolvedComponent, ResolvedFeature};
pub use options::ReaderOptions;
pub use persist::{load_cache, remove_cache, save_cache, try_load_cache};
pub use stamp::FileStamp;

use std::path::Path;
use thiserror::Error;

/// Fsync a directory to ensure that a preceding `rename()` is durable.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt cache at line {line}: {reason}")]
    Corrupt { line: usize, reason: String },
    #[error("cannot encode {field} '{value}': contains a reserved character")]
    Unencodable { field: &'static str, value: String },
}
