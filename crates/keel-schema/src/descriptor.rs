use crate::requirement::{parse_requirement_line, DescriptorError, RequirementLine};
use std::fs;
use std::path::Path;

/// Header opening the requirements block.
pub const REQUIREMENTS_HEADER: &str = "Subsystem-Content:";
/// Header naming the log provider class.
pub const LOG_PROVIDER_HEADER: &str = "Log-Provider-Class:";

/// Everything a feature descriptor declares, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorScan {
    pub log_provider_class: Option<String>,
    pub requirements: Vec<RequirementLine>,
}

/// Scan descriptor text.
///
/// The requirements block starts at [`REQUIREMENTS_HEADER`] and runs while
/// lines end with `,`. Blank and `#` comment lines close it. Only the first
/// [`LOG_PROVIDER_HEADER`] is honored.
pub fn scan_descriptor_str(input: &str) -> Result<DescriptorScan, DescriptorError> {
    let mut scan = DescriptorScan::default();
    let mut in_block = false;

    for raw in input.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            in_block = false;
            continue;
        }

        if let Some(value) = line.strip_prefix(LOG_PROVIDER_HEADER) {
            let value = value.trim();
            if scan.log_provider_class.is_none() && !value.is_empty() {
                scan.log_provider_class = Some(value.to_owned());
            }
            in_block = false;
            continue;
        }

        let body = if let Some(rest) = line.strip_prefix(REQUIREMENTS_HEADER) {
            in_block = true;
            let rest = rest.trim();
            if rest.is_empty() {
                // Header on its own line; entries follow.
                continue;
            }
            rest
        } else if in_block {
            line
        } else {
            continue;
        };

        let continues = body.ends_with(',');
        let entry = body.strip_suffix(',').unwrap_or(body).trim();
        if let Some(requirement) = parse_requirement_line(entry)? {
            scan.requirements.push(requirement);
        }
        if !continues {
            in_block = false;
        }
    }

    Ok(scan)
}

pub fn scan_descriptor_file(path: impl AsRef<Path>) -> Result<DescriptorScan, DescriptorError> {
    let content = fs::read_to_string(path)?;
    scan_descriptor_str(&content)
}
