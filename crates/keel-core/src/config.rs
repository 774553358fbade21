use crate::kernel::KernelDescriptors;
use crate::reader::ReaderOptions;
use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the install directory.
pub const CONFIG_FILE_NAME: &str = "keel.toml";

/// Where the kernel descriptors, the repository, and the cache live.
///
/// Relative paths are resolved against `install_dir`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KernelConfig {
    #[serde(default = "default_install_dir")]
    pub install_dir: PathBuf,
    #[serde(default = "default_cache_file")]
    pub cache_file: PathBuf,
    #[serde(default = "default_kernel_descriptor")]
    pub kernel_descriptor: PathBuf,
    #[serde(default = "default_log_provider_descriptor")]
    pub log_provider_descriptor: PathBuf,
    #[serde(default)]
    pub os_extension_descriptor: Option<PathBuf>,
    #[serde(default = "default_repository_dirs")]
    pub repository_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub boot_mode: bool,
    #[serde(default = "default_follow_includes")]
    pub follow_includes: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            install_dir: default_install_dir(),
            cache_file: default_cache_file(),
            kernel_descriptor: default_kernel_descriptor(),
            log_provider_descriptor: default_log_provider_descriptor(),
            os_extension_descriptor: None,
            repository_dirs: default_repository_dirs(),
            boot_mode: false,
            follow_includes: default_follow_includes(),
        }
    }
}

fn default_install_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_cache_file() -> PathBuf {
    PathBuf::from("workarea/kernel.cache")
}

fn default_kernel_descriptor() -> PathBuf {
    PathBuf::from("lib/platform/kernelCore-1.0.mf")
}

fn default_log_provider_descriptor() -> PathBuf {
    PathBuf::from("lib/platform/defaultLogging-1.0.mf")
}

fn default_repository_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("lib")]
}

fn default_follow_includes() -> bool {
    true
}

impl KernelConfig {
    /// Defaults rooted at `install_dir`.
    pub fn for_install_dir(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(input: &str) -> Result<Self, CoreError> {
        Ok(toml::from_str(input)?)
    }

    /// Load a configuration file. A relative `install_dir` inside it is taken
    /// relative to the file's directory.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let mut config = Self::from_toml_str(&content)?;
        if config.install_dir.is_relative() {
            if let Some(base) = path.parent() {
                config.install_dir = base.join(&config.install_dir);
            }
        }
        Ok(config)
    }

    /// Resolve a configured path against the install directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.install_dir.join(path)
        }
    }

    pub fn cache_path(&self) -> PathBuf {
        self.resolve_path(&self.cache_file)
    }

    /// `<cache_file>.lock`, next to the cache file.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.cache_path().into_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    pub fn repository_paths(&self) -> Vec<PathBuf> {
        self.repository_dirs
            .iter()
            .map(|dir| self.resolve_path(dir))
            .collect()
    }

    pub fn descriptors(&self) -> KernelDescriptors {
        KernelDescriptors {
            log_provider: self.resolve_path(&self.log_provider_descriptor),
            kernel: self.resolve_path(&self.kernel_descriptor),
            os_extension: self
                .os_extension_descriptor
                .as_deref()
                .map(|p| self.resolve_path(p)),
        }
    }

    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            boot_mode: self.boot_mode,
            follow_includes: self.follow_includes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = KernelConfig::from_toml_str("").unwrap();
        assert_eq!(config, KernelConfig::default());
        assert!(config.follow_includes);
        assert!(!config.boot_mode);
        assert_eq!(config.repository_dirs, vec![PathBuf::from("lib")]);
    }

    #[test]
    fn parses_all_fields() {
        let config = KernelConfig::from_toml_str(
            r#"
install_dir = "/opt/keel"
cache_file = "/var/cache/keel/kernel.cache"
kernel_descriptor = "lib/platform/kernelCore-2.0.mf"
log_provider_descriptor = "lib/platform/logging.mf"
os_extension_descriptor = "lib/platform/zos.mf"
repository_dirs = ["lib", "/usr/share/keel/lib"]
boot_mode = true
follow_includes = false
"#,
        )
        .unwrap();

        assert_eq!(config.cache_path(), PathBuf::from("/var/cache/keel/kernel.cache"));
        let descriptors = config.descriptors();
        assert_eq!(
            descriptors.kernel,
            PathBuf::from("/opt/keel/lib/platform/kernelCore-2.0.mf")
        );
        assert_eq!(
            descriptors.os_extension,
            Some(PathBuf::from("/opt/keel/lib/platform/zos.mf"))
        );
        assert_eq!(
            config.repository_paths(),
            vec![
                PathBuf::from("/opt/keel/lib"),
                PathBuf::from("/usr/share/keel/lib")
            ]
        );
        let options = config.reader_options();
        assert!(options.boot_mode);
        assert!(!options.follow_includes);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = KernelConfig::from_toml_str("cache_dir = \"x\"").unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn lock_path_sits_next_to_cache() {
        let config = KernelConfig::for_install_dir("/opt/keel");
        assert_eq!(
            config.lock_path(),
            PathBuf::from("/opt/keel/workarea/kernel.cache.lock")
        );
    }

    #[test]
    fn load_resolves_install_dir_against_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "install_dir = \"server\"\n").unwrap();

        let config = KernelConfig::load(&path).unwrap();
        assert_eq!(config.install_dir, dir.path().join("server"));
        assert_eq!(
            config.cache_path(),
            dir.path().join("server/workarea/kernel.cache")
        );
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = KernelConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }
}
