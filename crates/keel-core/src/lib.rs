//! Core resolution engine for Keel kernel bootstrap.
//!
//! This crate ties the descriptor grammar and the resolution cache together:
//! the `DescriptorReader` resolves one feature descriptor (recursively through
//! its inclusions) against an `ArtifactSelector`, and the `KernelResolver`
//! resolves the log provider, kernel, and OS extension descriptors into a boot
//! classpath, a start-ordered component list, and a clean-start decision. It
//! also provides the TOML `KernelConfig` and the cross-process `CacheLock`.

pub mod concurrency;
pub mod config;
pub mod kernel;
pub mod reader;
pub mod selector;

pub use concurrency::CacheLock;
pub use config::KernelConfig;
pub use kernel::{bootstrap, KernelDescriptors, KernelResolution, KernelResolver};
pub use reader::{DescriptorReader, FeatureResolution, ReaderOptions};
pub use selector::{Artifact, ArtifactSelector, RepositoryIndex, SelectionError};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("descriptor error in {}: {source}", .path.display())]
    Descriptor {
        path: PathBuf,
        #[source]
        source: keel_schema::DescriptorError,
    },
    #[error("failed to resolve feature '{feature}': {source}")]
    Resolution {
        feature: String,
        #[source]
        source: SelectionError,
    },
    #[error("feature descriptor not found: {}", .0.display())]
    DescriptorNotFound(PathBuf),
    #[error("inclusion cycle: {} includes itself", .0.display())]
    InclusionCycle(PathBuf),
    #[error("cache lock: failed to lock {}: {source}", .path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cache lock: {} is held by another process", .0.display())]
    LockHeld(PathBuf),
    #[error("store error: {0}")]
    Store(#[from] keel_store::StoreError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for CoreError {
    fn from(e: toml::de::Error) -> Self {
        CoreError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_error_names_component_and_range() {
        let e = CoreError::Resolution {
            feature: "kernelCore-1.0.mf".to_owned(),
            source: SelectionError::NotFound {
                id: "org.example.logging".to_owned(),
                range: Some("[1,2)".to_owned()),
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("kernelCore-1.0.mf"));
        assert!(msg.contains("org.example.logging"));
        assert!(msg.contains("[1,2)"));
    }

    #[test]
    fn cycle_error_names_descriptor() {
        let e = CoreError::InclusionCycle(PathBuf::from("/opt/keel/lib/a.mf"));
        assert!(e.to_string().contains("/opt/keel/lib/a.mf"));
    }

    #[test]
    fn lock_errors_name_the_lock_file() {
        let held = CoreError::LockHeld(PathBuf::from("/opt/keel/workarea/kernel.cache.lock"));
        assert_eq!(
            held.to_string(),
            "cache lock: /opt/keel/workarea/kernel.cache.lock is held by another process"
        );

        let failed = CoreError::Lock {
            path: PathBuf::from("/opt/keel/workarea/kernel.cache.lock"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        let msg = failed.to_string();
        assert!(msg.starts_with("cache lock: failed to lock /opt/keel/workarea/kernel.cache.lock"));
    }

    #[test]
    fn toml_error_becomes_config_error() {
        let err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let e: CoreError = err.into();
        assert!(matches!(e, CoreError::Config(_)));
    }
}
