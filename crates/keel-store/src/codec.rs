//! Line-oriented cache file format.
//!
//! ```text
//! %=boot-mode;no-includes
//! NAME=LOCATION;LAST_MODIFIED;SIZE;boot1,boot2,...;included1,included2,...;logProviderClass
//! --|NAME|COMPONENT_LINE
//! @=feature1;feature2;...
//! ```
//!
//! Component lines follow their feature's header and use the descriptor
//! requirement grammar, plus a `best-match:=` directive when the component's
//! artifact has been selected. The `@=` line is always last. The `%=` line
//! names the non-default reader options the features were resolved with; it
//! is omitted for the defaults and, when present, comes first.

use crate::cache::ResolutionCache;
use crate::feature::{FeatureBuilder, ResolvedComponent, ResolvedFeature};
use crate::options::ReaderOptions;
use crate::stamp::FileStamp;
use crate::StoreError;
use keel_schema::{parse_requirement_line, tokenize, FeatureName};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const COMPONENT_PREFIX: &str = "--|";
pub const FEATURES_IN_USE_PREFIX: &str = "@=";
pub const OPTIONS_PREFIX: &str = "%=";
const BEST_MATCH_DIRECTIVE: &str = "best-match";

const HEADER_RESERVED: &[char] = &[';', ',', '\n', '\r'];
const NAME_RESERVED: &[char] = &['=', '|', ';', ',', '\n', '\r'];
const VALUE_RESERVED: &[char] = &['"', ';', '\n', '\r'];

/// Serialize every feature, in name order, then the features-in-use line.
pub fn encode_cache(cache: &ResolutionCache) -> Result<String, StoreError> {
    let mut lines = Vec::new();
    let flags = cache.options().flags();
    if !flags.is_empty() {
        lines.push(format!("{OPTIONS_PREFIX}{}", flags.join(";")));
    }
    for feature in cache.features() {
        encode_feature(feature, &mut lines)?;
    }

    let mut in_use = Vec::with_capacity(cache.features_in_use().len());
    for name in cache.features_in_use() {
        in_use.push(checked("feature in use", name, NAME_RESERVED)?);
    }
    lines.push(format!("{FEATURES_IN_USE_PREFIX}{}", in_use.join(";")));

    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}

fn encode_feature(feature: &ResolvedFeature, lines: &mut Vec<String>) -> Result<(), StoreError> {
    let name = checked("feature name", feature.name(), NAME_RESERVED)?;
    let location = checked_path("feature location", feature.source_path(), HEADER_RESERVED)?;
    let boot = joined_paths("boot artifact", feature.boot_artifacts())?;
    let included = joined_paths("included descriptor", feature.included_descriptors())?;
    let log_provider = checked(
        "log provider class",
        feature.log_provider_class().unwrap_or(""),
        HEADER_RESERVED,
    )?;
    let stamp = feature.stamp();
    lines.push(format!(
        "{name}={location};{};{};{boot};{included};{log_provider}",
        stamp.last_modified, stamp.size
    ));

    for component in feature.components().values() {
        let requirement = &component.requirement;
        checked("component id", &requirement.id, NAME_RESERVED)?;
        for value in [
            requirement.version_range.as_deref(),
            requirement.location.as_deref(),
            Some(requirement.kind.type_tag()),
        ]
        .into_iter()
        .flatten()
        {
            checked("component attribute", value, VALUE_RESERVED)?;
        }

        let mut line = format!("{COMPONENT_PREFIX}{name}|{requirement}");
        if let Some(best) = &component.best_match_path {
            let best = checked_path("best match", best, VALUE_RESERVED)?;
            line.push_str(&format!("; {BEST_MATCH_DIRECTIVE}:=\"{best}\""));
        }
        lines.push(line);
    }
    Ok(())
}

fn checked<'a>(
    field: &'static str,
    value: &'a str,
    reserved: &[char],
) -> Result<&'a str, StoreError> {
    if value.contains(reserved) {
        return Err(StoreError::Unencodable {
            field,
            value: value.to_owned(),
        });
    }
    Ok(value)
}

fn checked_path(field: &'static str, path: &Path, reserved: &[char]) -> Result<String, StoreError> {
    let text = path.to_string_lossy().into_owned();
    checked(field, &text, reserved)?;
    Ok(text)
}

fn joined_paths(field: &'static str, paths: &[PathBuf]) -> Result<String, StoreError> {
    let mut parts = Vec::with_capacity(paths.len());
    for path in paths {
        parts.push(checked_path(field, path, HEADER_RESERVED)?);
    }
    Ok(parts.join(","))
}

struct Pending {
    builder: FeatureBuilder,
    stamp: FileStamp,
}

/// Parse a cache file. Any malformed line fails the whole decode.
pub fn decode_cache(input: &str) -> Result<ResolutionCache, StoreError> {
    let mut features: BTreeMap<FeatureName, ResolvedFeature> = BTreeMap::new();
    let mut pending: Option<Pending> = None;
    let mut features_in_use: Option<Vec<FeatureName>> = None;
    let mut options: Option<ReaderOptions> = None;
    let mut seen_content = false;

    for (index, line) in input.lines().enumerate() {
        let line_no = index + 1;
        let corrupt = |reason: &str| StoreError::Corrupt {
            line: line_no,
            reason: reason.to_owned(),
        };

        if line.is_empty() {
            continue;
        }
        if features_in_use.is_some() {
            return Err(corrupt("content after the features-in-use line"));
        }

        if let Some(rest) = line.strip_prefix(OPTIONS_PREFIX) {
            if seen_content {
                return Err(corrupt("reader options line is not the first line"));
            }
            seen_content = true;
            options = Some(
                ReaderOptions::from_flags(rest.split(';').filter(|s| !s.is_empty()))
                    .ok_or_else(|| corrupt("unknown reader option"))?,
            );
            continue;
        }
        seen_content = true;

        if let Some(rest) = line.strip_prefix(FEATURES_IN_USE_PREFIX) {
            finish(&mut features, pending.take(), line_no)?;
            features_in_use = Some(
                rest.split(';')
                    .filter(|s| !s.is_empty())
                    .map(FeatureName::from)
                    .collect(),
            );
        } else if let Some(rest) = line.strip_prefix(COMPONENT_PREFIX) {
            let (name, body) = rest
                .split_once('|')
                .ok_or_else(|| corrupt("component line without feature name"))?;
            let current = pending
                .as_mut()
                .ok_or_else(|| corrupt("component line before any feature"))?;
            if current_name(current) != name {
                return Err(corrupt("component line does not belong to the preceding feature"));
            }
            current.builder.component(decode_component(body).ok_or_else(|| {
                corrupt("malformed component line")
            })?);
        } else {
            finish(&mut features, pending.take(), line_no)?;
            pending = Some(decode_header(line).ok_or_else(|| corrupt("malformed feature line"))?);
        }
    }

    finish(&mut features, pending.take(), input.lines().count())?;
    Ok(ResolutionCache::from_parts(
        features,
        features_in_use.unwrap_or_default(),
        options.unwrap_or_default(),
    ))
}

fn current_name(pending: &Pending) -> &str {
    pending.builder.name().as_str()
}

fn finish(
    features: &mut BTreeMap<FeatureName, ResolvedFeature>,
    pending: Option<Pending>,
    line_no: usize,
) -> Result<(), StoreError> {
    let Some(Pending { builder, stamp }) = pending else {
        return Ok(());
    };
    let feature = builder.build(stamp);
    if features.contains_key(feature.name()) {
        return Err(StoreError::Corrupt {
            line: line_no,
            reason: format!("duplicate feature '{}'", feature.name()),
        });
    }
    features.insert(feature.name().clone(), feature);
    Ok(())
}

fn decode_header(line: &str) -> Option<Pending> {
    let (name, rest) = line.split_once('=')?;
    if name.is_empty() {
        return None;
    }
    let fields: Vec<&str> = rest.split(';').collect();
    let [location, last_modified, size, boot, included, log_provider] = fields.as_slice() else {
        return None;
    };
    if location.is_empty() {
        return None;
    }

    let stamp = FileStamp::new(last_modified.parse().ok()?, size.parse().ok()?);
    let mut builder = FeatureBuilder::named(FeatureName::new(name), *location);
    for path in split_list(boot) {
        builder.boot_artifact(PathBuf::from(path));
    }
    for path in split_list(included) {
        builder.included_descriptor(PathBuf::from(path));
    }
    if !log_provider.is_empty() {
        builder.log_provider_class(Some((*log_provider).to_owned()));
    }
    Some(Pending { builder, stamp })
}

fn decode_component(body: &str) -> Option<ResolvedComponent> {
    let requirement = parse_requirement_line(body).ok()??;
    let best_match = tokenize(body)?
        .directive(BEST_MATCH_DIRECTIVE)
        .map(PathBuf::from);
    Some(ResolvedComponent {
        requirement,
        best_match_path: best_match,
    })
}

fn split_list(field: &str) -> impl Iterator<Item = &str> {
    field.split(',').filter(|s| !s.is_empty())
}
