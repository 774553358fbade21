use crate::feature::{feature_name_of, ResolvedFeature};
use crate::options::ReaderOptions;
use keel_schema::FeatureName;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Outcome of checking one cached feature against the file system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureStatus {
    pub name: FeatureName,
    pub source_path: PathBuf,
    pub current: bool,
}

/// Descriptor name → resolved feature, plus the previous run's top-level
/// feature set and the reader options every entry was resolved with.
///
/// Owned by a single bootstrap pass; not meant for concurrent mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionCache {
    features: BTreeMap<FeatureName, ResolvedFeature>,
    features_in_use: Vec<FeatureName>,
    options: ReaderOptions,
    dirty: bool,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty cache for features read with `options`.
    pub fn with_options(options: ReaderOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Rebuild a cache from persisted parts. The result is clean.
    pub(crate) fn from_parts(
        features: BTreeMap<FeatureName, ResolvedFeature>,
        features_in_use: Vec<FeatureName>,
        options: ReaderOptions,
    ) -> Self {
        Self {
            features,
            features_in_use,
            options,
            dirty: false,
        }
    }

    pub fn options(&self) -> ReaderOptions {
        self.options
    }

    /// Switch the cache to `options`. Entries and the features-in-use record
    /// were produced under other options, so a switch empties the cache.
    ///
    /// Returns `true` when the cache was reset.
    pub fn adopt_options(&mut self, options: ReaderOptions) -> bool {
        if self.options == options {
            return false;
        }
        if !self.features.is_empty() || !self.features_in_use.is_empty() {
            info!(
                "reader options changed ({:?} -> {:?}); discarding {} cached features",
                self.options.flags(),
                options.flags(),
                self.features.len()
            );
        }
        *self = Self::with_options(options);
        self.dirty = true;
        true
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> impl Iterator<Item = &ResolvedFeature> {
        self.features.values()
    }

    /// Cached entry by name, without any staleness check.
    pub fn get(&self, name: &str) -> Option<&ResolvedFeature> {
        self.features.get(name)
    }

    /// Cached feature for `path`, only if it is still current.
    pub fn lookup(&self, path: &Path) -> Option<&ResolvedFeature> {
        let entry = self.entry_for(path)?;
        if self.is_current(entry) {
            debug!("cache hit for {}", path.display());
            Some(entry)
        } else {
            debug!("cache entry for {} is stale", path.display());
            None
        }
    }

    /// Whether a feature still matches the file system: its own file stamp,
    /// and every included descriptor recursively. Only reads metadata.
    pub fn is_current(&self, feature: &ResolvedFeature) -> bool {
        let mut visiting = Vec::new();
        self.is_current_inner(feature, &mut visiting)
    }

    fn is_current_inner(&self, feature: &ResolvedFeature, visiting: &mut Vec<PathBuf>) -> bool {
        let source = feature.source_path();
        // An inclusion cycle in persisted data can only come from a corrupt file.
        if visiting.iter().any(|p| p == source) {
            return false;
        }
        if !feature.stamp().matches(source) {
            return false;
        }

        visiting.push(source.to_path_buf());
        let includes_current = feature.included_descriptors().iter().all(|included| {
            self.entry_for(included)
                .is_some_and(|child| self.is_current_inner(child, visiting))
        });
        visiting.pop();
        includes_current
    }

    fn entry_for(&self, path: &Path) -> Option<&ResolvedFeature> {
        self.features
            .get(&feature_name_of(path))
            .filter(|f| f.source_path() == path)
    }

    /// Store a feature, replacing any entry with the same name.
    pub fn insert(&mut self, feature: ResolvedFeature) -> Option<ResolvedFeature> {
        self.dirty = true;
        self.features.insert(feature.name().clone(), feature)
    }

    /// Set the best match of one component of the feature read from
    /// `source`, replacing the feature record. An entry of the same name from
    /// another file is left alone.
    ///
    /// Returns `true` when the cache changed.
    pub fn update_best_match(&mut self, source: &Path, component: &str, path: &Path) -> bool {
        let Some(updated) = self
            .entry_for(source)
            .and_then(|f| f.with_best_match(component, path))
        else {
            return false;
        };
        self.insert(updated);
        true
    }

    pub fn features_in_use(&self) -> &[FeatureName] {
        &self.features_in_use
    }

    /// Whether `names` differs from the recorded top-level set. Order is
    /// ignored; size and membership are not.
    pub fn features_in_use_changed(&self, names: &[FeatureName]) -> bool {
        sorted(names) != sorted(&self.features_in_use)
    }

    /// Record the top-level feature set. Returns `true` when it changed.
    pub fn set_features_in_use(&mut self, names: Vec<FeatureName>) -> bool {
        if !self.features_in_use_changed(&names) {
            return false;
        }
        self.features_in_use = names;
        self.dirty = true;
        true
    }

    /// Current/stale status of every cached feature, in name order.
    pub fn verify(&self) -> Vec<FeatureStatus> {
        self.features
            .values()
            .map(|f| FeatureStatus {
                name: f.name().clone(),
                source_path: f.source_path().to_path_buf(),
                current: self.is_current(f),
            })
            .collect()
    }
}

fn sorted(names: &[FeatureName]) -> Vec<&FeatureName> {
    let mut out: Vec<&FeatureName> = names.iter().collect();
    out.sort();
    out
}
