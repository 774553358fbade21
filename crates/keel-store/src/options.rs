use serde::{Deserialize, Serialize};

/// How descriptors were read. Features resolved under different options are
/// not interchangeable, so a cache only ever holds one set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// Record boot artifacts at their install locations instead of
    /// selecting their jars.
    pub boot_mode: bool,
    /// Recurse into nested feature inclusions.
    pub follow_includes: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            boot_mode: false,
            follow_includes: true,
        }
    }
}

impl ReaderOptions {
    pub const BOOT_MODE_FLAG: &'static str = "boot-mode";
    pub const NO_INCLUDES_FLAG: &'static str = "no-includes";

    /// Flags that differ from the defaults, in a fixed order.
    pub fn flags(self) -> Vec<&'static str> {
        let mut flags = Vec::new();
        if self.boot_mode {
            flags.push(Self::BOOT_MODE_FLAG);
        }
        if !self.follow_includes {
            flags.push(Self::NO_INCLUDES_FLAG);
        }
        flags
    }

    /// Inverse of [`ReaderOptions::flags`]. `None` on an unknown flag.
    pub fn from_flags<'f>(flags: impl IntoIterator<Item = &'f str>) -> Option<Self> {
        let mut options = Self::default();
        for flag in flags {
            match flag {
                Self::BOOT_MODE_FLAG => options.boot_mode = true,
                Self::NO_INCLUDES_FLAG => options.follow_includes = false,
                _ => return None,
            }
        }
        Some(options)
    }
}
