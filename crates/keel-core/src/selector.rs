use keel_schema::{Version, VersionError, VersionRange};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("no artifact for '{id}' matching version range {}", .range.as_deref().unwrap_or("(any)"))]
    NotFound { id: String, range: Option<String> },
    #[error(transparent)]
    InvalidRange(#[from] VersionError),
}

/// Picks the artifact that satisfies a requirement.
///
/// Implementations must be deterministic: the same id and range against the
/// same repository always yield the same path.
pub trait ArtifactSelector {
    fn select(&self, id: &str, range: Option<&str>) -> Result<PathBuf, SelectionError>;
}

impl<S: ArtifactSelector + ?Sized> ArtifactSelector for &S {
    fn select(&self, id: &str, range: Option<&str>) -> Result<PathBuf, SelectionError> {
        (**self).select(id, range)
    }
}

/// One indexed artifact file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub id: String,
    pub version: Version,
    pub path: PathBuf,
}

/// In-memory index of the `*.jar` files in a set of repository directories.
///
/// `<id>_<version>.jar` is indexed as `id` at `version`; any other stem is
/// indexed as itself at `0.0.0`.
#[derive(Debug, Clone, Default)]
pub struct RepositoryIndex {
    artifacts: BTreeMap<String, Vec<Artifact>>,
}

impl RepositoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every directory in `dirs`. Missing directories are skipped.
    pub fn scan<P: AsRef<Path>>(dirs: &[P]) -> Result<Self, std::io::Error> {
        let mut index = Self::new();
        for dir in dirs {
            let dir = dir.as_ref();
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!("repository directory {} does not exist", dir.display());
                    continue;
                }
                Err(e) => return Err(e),
            };
            for entry in entries {
                let path = entry?.path();
                if path.is_file() && path.extension().is_some_and(|ext| ext == "jar") {
                    index.add(path);
                }
            }
        }
        debug!("indexed {} artifacts", index.len());
        Ok(index)
    }

    /// Add one artifact by path. Returns `false` when the path has no stem.
    pub fn add(&mut self, path: PathBuf) -> bool {
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            return false;
        };
        let (id, version) = split_stem(&stem);
        let versions = self.artifacts.entry(id.to_owned()).or_default();
        versions.push(Artifact {
            id: id.to_owned(),
            version,
            path,
        });
        versions.sort_by(|a, b| a.path.cmp(&b.path));
        true
    }

    pub fn len(&self) -> usize {
        self.artifacts.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Every indexed version of `id`, in path order.
    pub fn versions(&self, id: &str) -> &[Artifact] {
        self.artifacts.get(id).map(Vec::as_slice).unwrap_or_default()
    }
}

fn split_stem(stem: &str) -> (&str, Version) {
    if let Some((id, version)) = stem.rsplit_once('_') {
        if !id.is_empty() {
            if let Ok(version) = version.parse() {
                return (id, version);
            }
        }
    }
    (stem, Version::default())
}

impl ArtifactSelector for RepositoryIndex {
    fn select(&self, id: &str, range: Option<&str>) -> Result<PathBuf, SelectionError> {
        let constraint = match range {
            Some(text) => text.parse::<VersionRange>()?,
            None => VersionRange::any(),
        };

        // Candidates are in path order; only a strictly higher version displaces
        // the current best, so equal versions resolve to the first path.
        let mut best: Option<&Artifact> = None;
        for artifact in self.versions(id) {
            if !constraint.includes(&artifact.version) {
                continue;
            }
            match best {
                Some(current) if artifact.version <= current.version => {}
                _ => best = Some(artifact),
            }
        }

        best.map(|a| a.path.clone())
            .ok_or_else(|| SelectionError::NotFound {
                id: id.to_owned(),
                range: range.map(str::to_owned),
            })
    }
}
