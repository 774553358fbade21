use crate::concurrency::CacheLock;
use crate::config::KernelConfig;
use crate::reader::{DescriptorReader, ReaderOptions};
use crate::selector::{ArtifactSelector, RepositoryIndex};
use crate::CoreError;
use keel_schema::{ComponentId, ComponentKind, FeatureName, BOOT_SENTINEL_LEVEL};
use keel_store::{load_cache, save_cache, ResolutionCache, ResolvedComponent, ResolvedFeature};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// The top-level descriptors of a kernel, as absolute or install-relative paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelDescriptors {
    pub log_provider: PathBuf,
    pub kernel: PathBuf,
    pub os_extension: Option<PathBuf>,
}

/// Everything the hosting runtime needs to start the kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KernelResolution {
    /// Boot artifacts of the kernel, log provider, and OS extension, in that
    /// order, without duplicates.
    pub boot_classpath: Vec<PathBuf>,
    pub log_provider_class: Option<String>,
    /// Components to activate, ordered by start level then id.
    pub components: Vec<ResolvedComponent>,
    /// Names of the top-level features, in resolution order.
    pub features_in_use: Vec<FeatureName>,
    /// The previously activated state must be discarded.
    pub clean_start: bool,
}

/// Resolves the kernel's top-level descriptors against one cache.
pub struct KernelResolver<'a, S: ArtifactSelector + ?Sized> {
    selector: &'a S,
    install_dir: PathBuf,
    options: ReaderOptions,
}

impl<'a, S: ArtifactSelector + ?Sized> KernelResolver<'a, S> {
    pub fn new(selector: &'a S, install_dir: impl Into<PathBuf>, options: ReaderOptions) -> Self {
        Self {
            selector,
            install_dir: install_dir.into(),
            options,
        }
    }

    /// Resolve the log provider, then the kernel, then the OS extension.
    ///
    /// With `force_clean` the cache is emptied first, which always yields a
    /// clean start. A cache filled under other reader options is emptied too.
    pub fn resolve(
        &self,
        cache: &mut ResolutionCache,
        descriptors: &KernelDescriptors,
        force_clean: bool,
    ) -> Result<KernelResolution, CoreError> {
        if force_clean {
            *cache = ResolutionCache::with_options(self.options);
        } else {
            cache.adopt_options(self.options);
        }
        let previous_empty = cache.features_in_use().is_empty();

        let mut reader = DescriptorReader::new(self.selector, &self.install_dir, self.options);
        let mut resolutions = vec![
            reader.resolve(cache, &descriptors.log_provider)?,
            reader.resolve(cache, &descriptors.kernel)?,
        ];
        if let Some(path) = &descriptors.os_extension {
            resolutions.push(reader.resolve(cache, path)?);
        }
        let from_cache = resolutions.iter().all(|r| r.from_cache);
        debug!("kernel descriptors served from cache: {from_cache}");

        // features[0] is the log provider, features[1] the kernel.
        let mut features: Vec<ResolvedFeature> =
            resolutions.into_iter().map(|r| r.feature).collect();
        for feature in &mut features {
            self.complete_best_matches(cache, feature)?;
        }

        let names: Vec<FeatureName> = features.iter().map(|f| f.name().clone()).collect();
        let changed = cache.set_features_in_use(names.clone());
        let clean_start = changed || (force_clean && previous_empty);
        if clean_start {
            info!("kernel feature set changed; a clean start is required");
        }

        let features: Vec<&ResolvedFeature> = features.iter().collect();
        Ok(KernelResolution {
            boot_classpath: boot_classpath(&classpath_order(&features)),
            log_provider_class: features
                .iter()
                .find_map(|f| f.log_provider_class())
                .map(str::to_owned),
            components: exported_components(&features),
            features_in_use: names,
            clean_start,
        })
    }

    /// Select an artifact for every exported component of `feature` whose best
    /// match is unset or no longer on disk. Both the feature and its cache
    /// entry are updated.
    fn complete_best_matches(
        &self,
        cache: &mut ResolutionCache,
        feature: &mut ResolvedFeature,
    ) -> Result<(), CoreError> {
        let pending: Vec<(ComponentId, Option<String>)> = feature
            .components()
            .values()
            .filter(|c| {
                is_exported(c) && !c.best_match_path.as_deref().is_some_and(Path::exists)
            })
            .map(|c| (c.id().clone(), c.requirement.version_range.clone()))
            .collect();

        for (id, range) in pending {
            let path = self
                .selector
                .select(&id, range.as_deref())
                .map_err(|source| CoreError::Resolution {
                    feature: feature.name().to_string(),
                    source,
                })?;
            debug!("best match for {id} in {}: {}", feature.name(), path.display());
            cache.update_best_match(feature.source_path(), &id, &path);
            if let Some(updated) = feature.with_best_match(&id, &path) {
                *feature = updated;
            }
        }
        Ok(())
    }
}

/// Boot artifacts of `features` in order, without duplicates.
fn boot_classpath(features: &[&ResolvedFeature]) -> Vec<PathBuf> {
    let mut classpath: Vec<PathBuf> = Vec::new();
    for path in features.iter().flat_map(|f| f.boot_artifacts()) {
        if !classpath.contains(path) {
            classpath.push(path.clone());
        }
    }
    classpath
}

/// Kernel first, then log provider, then any extension.
fn classpath_order<'f>(features: &[&'f ResolvedFeature]) -> Vec<&'f ResolvedFeature> {
    let mut ordered = features.to_vec();
    if ordered.len() >= 2 {
        ordered.swap(0, 1);
    }
    ordered
}

fn is_exported(component: &ResolvedComponent) -> bool {
    component.start_level() != BOOT_SENTINEL_LEVEL
        && component.requirement.kind != ComponentKind::FeatureInclusion
}

/// Union of exported components; the first feature declaring an id wins.
fn exported_components(features: &[&ResolvedFeature]) -> Vec<ResolvedComponent> {
    let mut union: BTreeMap<&ComponentId, &ResolvedComponent> = BTreeMap::new();
    for feature in features {
        for (id, component) in feature.components() {
            if is_exported(component) {
                union.entry(id).or_insert(component);
            }
        }
    }
    let mut components: Vec<ResolvedComponent> = union.into_values().cloned().collect();
    components.sort_by(|a, b| {
        a.start_level()
            .cmp(&b.start_level())
            .then_with(|| a.id().cmp(b.id()))
    });
    components
}

/// Resolve the kernel described by `config`, owning the cache for the run.
///
/// Holds the cache lock for the whole pass. Without `force_clean` the
/// previous cache is loaded (a corrupt one is discarded); the updated cache is
/// written back when it changed. A failed write is logged and ignored.
pub fn bootstrap(config: &KernelConfig, force_clean: bool) -> Result<KernelResolution, CoreError> {
    let cache_path = config.cache_path();
    let _lock = CacheLock::acquire(&config.lock_path())?;

    let index = RepositoryIndex::scan(&config.repository_paths())?;
    let mut cache = if force_clean {
        info!("clean start requested; ignoring {}", cache_path.display());
        ResolutionCache::new()
    } else {
        load_cache(&cache_path)
    };

    let resolver = KernelResolver::new(&index, &config.install_dir, config.reader_options());
    let resolution = resolver.resolve(&mut cache, &config.descriptors(), force_clean)?;

    if let Err(e) = save_cache(&mut cache, &cache_path) {
        warn!(
            "failed to write resolution cache {}: {e}",
            cache_path.display()
        );
    }
    Ok(resolution)
}
