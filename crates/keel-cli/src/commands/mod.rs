pub mod completions;
pub mod inspect;
pub mod purge;
pub mod resolve;
pub mod verify;

use keel_store::{try_load_cache, ResolutionCache};
use std::path::Path;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_DESCRIPTOR_ERROR: u8 = 2;
pub const EXIT_CACHE_ERROR: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn colorize_status(current: bool) -> String {
    use console::Style;
    if current {
        Style::new().green().apply_to("current").to_string()
    } else {
        Style::new().yellow().bold().apply_to("stale").to_string()
    }
}

pub fn yes_no(value: bool) -> String {
    use console::Style;
    if value {
        Style::new().cyan().bold().apply_to("yes").to_string()
    } else {
        Style::new().dim().apply_to("no").to_string()
    }
}

pub fn join_names(names: &[impl AsRef<str>]) -> String {
    names
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(", ")
}

/// RFC 3339 rendering of a millisecond timestamp, or the raw number when it
/// is out of range.
pub fn format_millis(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map_or_else(|| millis.to_string(), |t| t.to_rfc3339())
}

/// Strict cache load for the read-only commands: a corrupt file is an error
/// here rather than an empty cache.
pub fn open_cache(path: &Path) -> Result<Option<ResolutionCache>, String> {
    try_load_cache(path).map_err(|e| format!("store error: {e}"))
}
