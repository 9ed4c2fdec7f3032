//! Metadata tidying steps.

use anyhow::Result;
use serde_json::Value;

use crate::pipeline::RunState;
use crate::settings::Settings;
use crate::steps::{StepOutput, keep};
use crate::{Item, ItemExt, Keys};

/// Python-style truthiness for JSON values.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

pub fn process_title_description(
    mut item: Item,
    _state: &mut RunState,
    _settings: &Settings,
) -> Result<StepOutput> {
    for field in ["title", "description"] {
        if let Some(Value::String(value)) = item.get_mut(field) {
            *value = value.trim().to_string();
        }
    }
    keep(item)
}

/// Fill an empty title from the blob file name, else from `id`.
pub fn process_no_title(
    mut item: Item,
    _state: &mut RunState,
    _settings: &Settings,
) -> Result<StepOutput> {
    if item.get("title").is_some_and(is_truthy) {
        return keep(item);
    }
    let blob_filename = ["image", "file"]
        .iter()
        .filter_map(|field| item.get(*field))
        .find(|blob| is_truthy(blob))
        .and_then(|blob| blob.get("filename"))
        .cloned();
    let title = match blob_filename {
        Some(filename) => filename,
        None => item.get(Keys::ID).cloned().unwrap_or(Value::Null),
    };
    item.insert("title".to_string(), title);
    keep(item)
}

/// Remove configured principals from `creators`; fall back to the default principal.
pub fn process_creators(
    mut item: Item,
    _state: &mut RunState,
    settings: &Settings,
) -> Result<StepOutput> {
    let principals = &settings.principals;
    let mut creators: Vec<Value> = match item.get("creators") {
        Some(Value::Array(current)) => current
            .iter()
            .filter(|c| c.as_str().is_none_or(|c| !principals.remove.contains(c)))
            .cloned()
            .collect(),
        _ => Vec::new(),
    };
    if creators.is_empty() {
        creators.push(Value::String(principals.default.clone()));
    }
    item.insert("creators".to_string(), Value::Array(creators));
    keep(item)
}

/// Overwrite keys of the item whose `@id` has an entry in `data_override`.
pub fn process_data_override(
    mut item: Item,
    _state: &mut RunState,
    settings: &Settings,
) -> Result<StepOutput> {
    if let Some(overrides) = settings.data_override.get(item.path()?) {
        for (key, value) in overrides {
            item.insert(key.clone(), value.clone());
        }
    }
    keep(item)
}
