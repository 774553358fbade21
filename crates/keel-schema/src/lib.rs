//! Feature descriptor grammar, start phases, and version ranges for Keel.
//!
//! This crate defines the schema layer: the shared attribute-line tokenizer
//! (`tokenize`), requirement-line parsing (`RequirementLine`), descriptor
//! scanning (`scan_descriptor_file`), the closed start-phase enumeration
//! (`StartPhase`), and interval-notation version ranges (`VersionRange`).

pub mod descriptor;
pub mod requirement;
pub mod tokenizer;
pub mod types;
pub mod version;

pub use descriptor::{
    scan_descriptor_file, scan_descriptor_str, DescriptorScan, LOG_PROVIDER_HEADER,
    REQUIREMENTS_HEADER,
};
pub use requirement::{
    parse_requirement_line, ComponentKind, DescriptorError, RequirementLine, StartPhase,
    BOOT_SENTINEL_LEVEL,
};
pub use tokenizer::{tokenize, unquote, Attribute, TokenizedLine};
pub use types::{ComponentId, FeatureName};
pub use version::{Version, VersionError, VersionRange};
