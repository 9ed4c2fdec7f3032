//! Path steps: export prefix stripping, path filtering and id normalization.

use anyhow::Result;
use percent_encoding::percent_decode_str;
use serde_json::Value;

use crate::engine::tools::fix_short_id;
use crate::pipeline::RunState;
use crate::settings::Settings;
use crate::steps::{StepOutput, drop_item, keep};
use crate::{Item, ItemExt, Keys};

/// Strip the configured export prefixes from `@id` and record the result as `_@id`.
pub fn process_export_prefix(
    mut item: Item,
    _state: &mut RunState,
    settings: &Settings,
) -> Result<StepOutput> {
    let mut path = item.path()?.to_string();
    for prefix in &settings.paths.export_prefixes {
        if !prefix.is_empty() && path.starts_with(prefix.as_str()) {
            path = path.replace(prefix.as_str(), "");
        }
    }
    item.insert(Keys::PATH.to_string(), Value::String(path.clone()));
    item.insert(Keys::REPORT_PATH.to_string(), Value::String(path));
    keep(item)
}

/// Drop items outside the allowed prefixes or under a dropped one.
pub fn process_paths(item: Item, state: &mut RunState, _settings: &Settings) -> Result<StepOutput> {
    if state.drops.is_valid_path(item.path()?) {
        keep(item)
    } else {
        drop_item()
    }
}

/// Normalized form of `path`: spaces to `_`, percent-decoded, cleanup replacements applied in
/// order and the last segment fixed with [`fix_short_id`].
pub fn normalize_path(path: &str, settings: &Settings) -> String {
    let underscored = path.replace(' ', "_");
    let mut path = percent_decode_str(&underscored)
        .decode_utf8_lossy()
        .into_owned();
    for (src, replacement) in &settings.paths.cleanup {
        if !src.is_empty() && path.contains(src.as_str()) {
            path = path.replace(src.as_str(), replacement);
        }
    }
    match path.rsplit_once('/') {
        Some((parent, last)) => format!("{parent}/{}", fix_short_id(last)),
        None => fix_short_id(&path),
    }
}

/// Normalize `@id` and set `id` to its last segment.
pub fn process_ids(
    mut item: Item,
    _state: &mut RunState,
    settings: &Settings,
) -> Result<StepOutput> {
    let path = normalize_path(item.path()?, settings);
    let id = path.rsplit('/').next().unwrap_or_default().to_string();
    item.insert(Keys::PATH.to_string(), Value::String(path));
    item.insert(Keys::ID.to_string(), Value::String(id));
    keep(item)
}
