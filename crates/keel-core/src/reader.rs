use crate::selector::ArtifactSelector;
use crate::CoreError;
use keel_schema::{scan_descriptor_file, ComponentKind, RequirementLine};
use keel_store::{FeatureBuilder, FileStamp, ResolutionCache, ResolvedComponent, ResolvedFeature};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub use keel_store::ReaderOptions;

/// A resolved feature and whether it came straight from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureResolution {
    pub feature: ResolvedFeature,
    pub from_cache: bool,
}

/// Resolves feature descriptors against a cache and an artifact selector.
///
/// Only complete features are ever stored in the cache: a syntax error or an
/// unresolvable requirement anywhere in a descriptor (or its inclusions)
/// aborts that descriptor without touching its cache entry.
pub struct DescriptorReader<'a, S: ArtifactSelector + ?Sized> {
    selector: &'a S,
    install_dir: PathBuf,
    options: ReaderOptions,
    /// Descriptors currently being read, outermost first.
    reading: Vec<PathBuf>,
}

impl<'a, S: ArtifactSelector + ?Sized> DescriptorReader<'a, S> {
    pub fn new(selector: &'a S, install_dir: impl Into<PathBuf>, options: ReaderOptions) -> Self {
        Self {
            selector,
            install_dir: install_dir.into(),
            options,
            reading: Vec::new(),
        }
    }

    pub fn options(&self) -> ReaderOptions {
        self.options
    }

    /// Resolve one descriptor, reusing the cached result while it is current.
    ///
    /// A cache filled under other reader options is emptied first.
    pub fn resolve(
        &mut self,
        cache: &mut ResolutionCache,
        path: &Path,
    ) -> Result<FeatureResolution, CoreError> {
        cache.adopt_options(self.options);
        let path = std::path::absolute(path)?;
        if self.reading.contains(&path) {
            return Err(CoreError::InclusionCycle(path));
        }

        if let Some(feature) = cache.lookup(&path) {
            return Ok(FeatureResolution {
                feature: feature.clone(),
                from_cache: true,
            });
        }
        if !path.is_file() {
            return Err(CoreError::DescriptorNotFound(path));
        }

        info!("resolving feature descriptor {}", path.display());
        cache.mark_dirty();
        self.reading.push(path.clone());
        let result = self.read(cache, &path);
        self.reading.pop();

        let feature = result?;
        cache.insert(feature.clone());
        Ok(FeatureResolution {
            feature,
            from_cache: false,
        })
    }

    fn read(
        &mut self,
        cache: &mut ResolutionCache,
        path: &Path,
    ) -> Result<ResolvedFeature, CoreError> {
        let stamp = FileStamp::probe(path)?;
        let scan = scan_descriptor_file(path).map_err(|source| CoreError::Descriptor {
            path: path.to_path_buf(),
            source,
        })?;

        let mut builder = FeatureBuilder::new(path);
        builder.log_provider_class(scan.log_provider_class);

        for requirement in scan.requirements {
            match requirement.kind {
                ComponentKind::BootArtifact if self.options.boot_mode => {
                    builder.boot_artifact(self.install_location(&requirement));
                    builder.component(ResolvedComponent::new(requirement));
                }
                ComponentKind::BootArtifact => {
                    let jar = self.select(&builder, &requirement)?;
                    debug!("boot artifact {} -> {}", requirement.id, jar.display());
                    builder.boot_artifact(jar);
                }
                ComponentKind::FeatureInclusion if self.options.follow_includes => {
                    let Some(child_path) = self.included_path(&requirement) else {
                        continue;
                    };
                    let child = self.resolve(cache, &child_path)?;
                    builder.include(&child.feature);
                }
                _ => {
                    builder.component(ResolvedComponent::new(requirement));
                }
            }
        }

        Ok(builder.build(stamp))
    }

    fn select(
        &self,
        builder: &FeatureBuilder,
        requirement: &RequirementLine,
    ) -> Result<PathBuf, CoreError> {
        self.selector
            .select(&requirement.id, requirement.version_range.as_deref())
            .map_err(|source| CoreError::Resolution {
                feature: builder.name().to_string(),
                source,
            })
    }

    /// Boot-mode location of a boot artifact: its `location`, or
    /// `lib/<id>.jar`, under the install directory.
    fn install_location(&self, requirement: &RequirementLine) -> PathBuf {
        match requirement.location.as_deref() {
            Some(location) => self.install_dir.join(location),
            None => self
                .install_dir
                .join("lib")
                .join(format!("{}.jar", requirement.id)),
        }
    }

    /// Descriptor path of an inclusion, or `None` when it has no location or
    /// the file does not exist.
    fn included_path(&self, requirement: &RequirementLine) -> Option<PathBuf> {
        let Some(location) = requirement.location.as_deref() else {
            debug!("inclusion '{}' has no location; ignored", requirement.id);
            return None;
        };
        let path = self.install_dir.join(location);
        if path.is_file() {
            Some(path)
        } else {
            debug!(
                "included descriptor {} does not exist; ignored",
                path.display()
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::SelectionError;
    use keel_schema::{StartPhase, BOOT_SENTINEL_LEVEL};
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::fs;

    struct MapSelector {
        jars: HashMap<&'static str, PathBuf>,
        calls: Cell<usize>,
    }

    impl MapSelector {
        fn new(entries: &[(&'static str, &str)]) -> Self {
            Self {
                jars: entries
                    .iter()
                    .map(|(id, path)| (*id, PathBuf::from(path)))
                    .collect(),
                calls: Cell::new(0),
            }
        }
    }

    impl ArtifactSelector for MapSelector {
        fn select(&self, id: &str, range: Option<&str>) -> Result<PathBuf, SelectionError> {
            self.calls.set(self.calls.get() + 1);
            self.jars.get(id).cloned().ok_or_else(|| SelectionError::NotFound {
                id: id.to_owned(),
                range: range.map(str::to_owned),
            })
        }
    }

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn boot_artifacts_are_selected() {
        let dir = tempfile::tempdir().unwrap();
        let core = dir.path().join("core.mf");
        write(
            &core,
            "Subsystem-Content: logging-1.0; version=\"[1,2)\"; type=\"boot.jar\",\n widget; version=\"[1,1]\"\n",
        );
        let selector = MapSelector::new(&[("logging-1.0", "/lib/logging-1.5.jar")]);
        let mut cache = ResolutionCache::new();

        let mut reader = DescriptorReader::new(&selector, dir.path(), ReaderOptions::default());
        let resolved = reader.resolve(&mut cache, &core).unwrap();
        assert!(!resolved.from_cache);
        assert_eq!(
            resolved.feature.boot_artifacts(),
            &[PathBuf::from("/lib/logging-1.5.jar")]
        );
        assert_eq!(resolved.feature.components().len(), 1);
        assert_eq!(selector.calls.get(), 1);
        assert!(cache.is_dirty());
    }

    #[test]
    fn boot_mode_records_sentinel_components() {
        let dir = tempfile::tempdir().unwrap();
        let core = dir.path().join("core.mf");
        write(
            &core,
            "Subsystem-Content: launcher; location:=\"lib/launcher.jar\"; type=\"boot.jar\",\n \
             agent; type=\"boot.jar\",\n \
             early; type=\"boot.jar\"\n",
        );
        let selector = MapSelector::new(&[]);
        let mut cache = ResolutionCache::new();
        let options = ReaderOptions {
            boot_mode: true,
            follow_includes: true,
        };

        let mut reader = DescriptorReader::new(&selector, dir.path(), options);
        let feature = reader.resolve(&mut cache, &core).unwrap().feature;
        assert_eq!(
            feature.boot_artifacts(),
            &[
                dir.path().join("lib/launcher.jar"),
                dir.path().join("lib/agent.jar"),
                dir.path().join("lib/early.jar"),
            ]
        );
        assert_eq!(
            feature.component("launcher").unwrap().start_level(),
            BOOT_SENTINEL_LEVEL
        );
        assert_eq!(selector.calls.get(), 0);
    }

    #[test]
    fn cache_from_other_options_is_not_reused() {
        let dir = tempfile::tempdir().unwrap();
        let core = dir.path().join("core.mf");
        write(
            &core,
            "Subsystem-Content: launcher; version=\"[1,2)\"; type=\"boot.jar\"\n",
        );
        let selector = MapSelector::new(&[("launcher", "/repo/launcher_1.4.0.jar")]);
        let mut cache = ResolutionCache::new();
        let boot = ReaderOptions {
            boot_mode: true,
            follow_includes: true,
        };
        DescriptorReader::new(&selector, dir.path(), boot)
            .resolve(&mut cache, &core)
            .unwrap();
        assert_eq!(selector.calls.get(), 0);

        let mut reader = DescriptorReader::new(&selector, dir.path(), ReaderOptions::default());
        let resolved = reader.resolve(&mut cache, &core).unwrap();
        assert!(!resolved.from_cache);
        assert_eq!(
            resolved.feature.boot_artifacts(),
            &[PathBuf::from("/repo/launcher_1.4.0.jar")]
        );
        assert_eq!(selector.calls.get(), 1);
        assert_eq!(cache.options(), ReaderOptions::default());
    }

    #[test]
    fn unfollowed_inclusion_is_a_component() {
        let dir = tempfile::tempdir().unwrap();
        let core = dir.path().join("core.mf");
        write(&dir.path().join("ext.mf"), "Subsystem-Content: a; version=\"1\"\n");
        write(
            &core,
            "Subsystem-Content: ext; location:=\"ext.mf\"; type=\"osgi.subsystem.feature\"\n",
        );
        let selector = MapSelector::new(&[]);
        let mut cache = ResolutionCache::new();
        let options = ReaderOptions {
            boot_mode: false,
            follow_includes: false,
        };

        let mut reader = DescriptorReader::new(&selector, dir.path(), options);
        let feature = reader.resolve(&mut cache, &core).unwrap().feature;
        assert!(feature.included_descriptors().is_empty());
        assert_eq!(
            feature.component("ext").unwrap().requirement.kind,
            ComponentKind::FeatureInclusion
        );
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn missing_inclusion_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let core = dir.path().join("core.mf");
        write(
            &core,
            "Subsystem-Content: ext; location:=\"nowhere.mf\"; type=\"osgi.subsystem.feature\",\n \
             bare; type=\"osgi.subsystem.feature\",\n w; start-phase:=\"SERVICE\"\n",
        );
        let selector = MapSelector::new(&[]);
        let mut cache = ResolutionCache::new();

        let mut reader = DescriptorReader::new(&selector, dir.path(), ReaderOptions::default());
        let feature = reader.resolve(&mut cache, &core).unwrap().feature;
        assert!(feature.included_descriptors().is_empty());
        assert_eq!(feature.components().len(), 1);
        assert_eq!(
            feature.component("w").unwrap().requirement.start_phase,
            Some(StartPhase::Service)
        );
    }

    #[test]
    fn unresolvable_boot_artifact_stores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let core = dir.path().join("core.mf");
        write(
            &core,
            "Subsystem-Content: missing; version=\"[3,4)\"; type=\"boot.jar\"\n",
        );
        let selector = MapSelector::new(&[]);
        let mut cache = ResolutionCache::new();

        let mut reader = DescriptorReader::new(&selector, dir.path(), ReaderOptions::default());
        let err = reader.resolve(&mut cache, &core).unwrap_err();
        assert!(matches!(err, CoreError::Resolution { .. }));
        let msg = err.to_string();
        assert!(msg.contains("missing"));
        assert!(msg.contains("[3,4)"));
        assert!(cache.is_empty());
    }

    #[test]
    fn missing_descriptor_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let selector = MapSelector::new(&[]);
        let mut cache = ResolutionCache::new();

        let mut reader = DescriptorReader::new(&selector, dir.path(), ReaderOptions::default());
        assert!(matches!(
            reader.resolve(&mut cache, &dir.path().join("absent.mf")),
            Err(CoreError::DescriptorNotFound(_))
        ));
    }

    #[test]
    fn self_inclusion_is_a_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let core = dir.path().join("core.mf");
        write(
            &core,
            "Subsystem-Content: me; location:=\"core.mf\"; type=\"osgi.subsystem.feature\"\n",
        );
        let selector = MapSelector::new(&[]);
        let mut cache = ResolutionCache::new();

        let mut reader = DescriptorReader::new(&selector, dir.path(), ReaderOptions::default());
        assert!(matches!(
            reader.resolve(&mut cache, &core),
            Err(CoreError::InclusionCycle(_))
        ));
        assert!(cache.is_empty());
    }
}
