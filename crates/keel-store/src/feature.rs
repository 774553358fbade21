use crate::stamp::FileStamp;
use keel_schema::{ComponentId, FeatureName, RequirementLine};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Cache key of a descriptor: its file name.
pub fn feature_name_of(path: &Path) -> FeatureName {
    match path.file_name() {
        Some(name) => FeatureName::new(name.to_string_lossy()),
        None => FeatureName::new(path.to_string_lossy()),
    }
}

/// One ordinary or boot component declared by a feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedComponent {
    pub requirement: RequirementLine,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_match_path: Option<PathBuf>,
}

impl ResolvedComponent {
    pub fn new(requirement: RequirementLine) -> Self {
        Self {
            requirement,
            best_match_path: None,
        }
    }

    #[must_use]
    pub fn with_best_match(mut self, path: PathBuf) -> Self {
        self.best_match_path = Some(path);
        self
    }

    pub fn id(&self) -> &ComponentId {
        &self.requirement.id
    }

    pub fn start_level(&self) -> i32 {
        self.requirement.start_level()
    }
}

/// Resolution result of one feature descriptor.
///
/// Immutable once built; changes produce a new record through
/// [`FeatureBuilder`] or [`ResolvedFeature::with_best_match`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedFeature {
    name: FeatureName,
    source_path: PathBuf,
    stamp: FileStamp,
    boot_artifacts: Vec<PathBuf>,
    included_descriptors: Vec<PathBuf>,
    log_provider_class: Option<String>,
    components: BTreeMap<ComponentId, ResolvedComponent>,
}

impl ResolvedFeature {
    pub fn name(&self) -> &FeatureName {
        &self.name
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn stamp(&self) -> FileStamp {
        self.stamp
    }

    pub fn boot_artifacts(&self) -> &[PathBuf] {
        &self.boot_artifacts
    }

    pub fn included_descriptors(&self) -> &[PathBuf] {
        &self.included_descriptors
    }

    pub fn log_provider_class(&self) -> Option<&str> {
        self.log_provider_class.as_deref()
    }

    pub fn components(&self) -> &BTreeMap<ComponentId, ResolvedComponent> {
        &self.components
    }

    pub fn component(&self, id: &str) -> Option<&ResolvedComponent> {
        self.components.get(id)
    }

    /// Copy of this feature with one component's best match set.
    ///
    /// `None` when the component does not exist or already has that match.
    pub fn with_best_match(&self, id: &str, path: &Path) -> Option<ResolvedFeature> {
        let current = self.components.get(id)?;
        if current.best_match_path.as_deref() == Some(path) {
            return None;
        }
        let mut next = self.clone();
        let updated = current.clone().with_best_match(path.to_path_buf());
        next.components.insert(updated.id().clone(), updated);
        Some(next)
    }
}

/// Accumulates a feature while its descriptor is read.
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    name: FeatureName,
    source_path: PathBuf,
    boot_artifacts: Vec<PathBuf>,
    included_descriptors: Vec<PathBuf>,
    log_provider_class: Option<String>,
    components: BTreeMap<ComponentId, ResolvedComponent>,
}

impl FeatureBuilder {
    /// Builder keyed by the descriptor's file name.
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        let source_path = source_path.into();
        Self::named(feature_name_of(&source_path), source_path)
    }

    pub fn named(name: FeatureName, source_path: impl Into<PathBuf>) -> Self {
        Self {
            name,
            source_path: source_path.into(),
            boot_artifacts: Vec::new(),
            included_descriptors: Vec::new(),
            log_provider_class: None,
            components: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &FeatureName {
        &self.name
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Record the log provider class unless one is already set.
    pub fn log_provider_class(&mut self, class: Option<String>) -> &mut Self {
        if self.log_provider_class.is_none() {
            self.log_provider_class = class;
        }
        self
    }

    pub fn boot_artifact(&mut self, path: PathBuf) -> &mut Self {
        self.boot_artifacts.push(path);
        self
    }

    pub fn included_descriptor(&mut self, path: PathBuf) -> &mut Self {
        self.included_descriptors.push(path);
        self
    }

    /// Roll an included feature up: its boot artifacts, its own inclusions,
    /// then its path. Its components are not rolled up.
    pub fn include(&mut self, child: &ResolvedFeature) -> &mut Self {
        self.boot_artifacts
            .extend(child.boot_artifacts.iter().cloned());
        self.included_descriptors
            .extend(child.included_descriptors.iter().cloned());
        self.included_descriptors.push(child.source_path.clone());
        self
    }

    /// Insert a component; an existing entry with the same id is replaced.
    pub fn component(&mut self, component: ResolvedComponent) -> &mut Self {
        self.components.insert(component.id().clone(), component);
        self
    }

    pub fn build(self, stamp: FileStamp) -> ResolvedFeature {
        ResolvedFeature {
            name: self.name,
            source_path: self.source_path,
            stamp,
            boot_artifacts: self.boot_artifacts,
            included_descriptors: self.included_descriptors,
            log_provider_class: self.log_provider_class,
            components: self.components,
        }
    }
}
