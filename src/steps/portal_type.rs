//! Type mapping, preceded by a per-type processor.
//!
//! `default` passes the item through. `collection` cleans the item's querystring and queues
//! [`POST_PROCESSING_STEP`] when the query references uids.

use anyhow::{Result, bail};
use serde_json::Value;

use crate::pipeline::RunState;
use crate::settings::Settings;
use crate::steps::querystring::{POST_PROCESSING_STEP, cleanup_querystring};
use crate::steps::{StepOutput, drop_item, keep};
use crate::{Item, ItemExt, Keys};

fn collection_processor(
    mut item: Item,
    state: &mut RunState,
    settings: &Settings,
) -> Result<Option<Item>> {
    let query = match item.get("query") {
        Some(Value::Array(query)) if !query.is_empty() => query,
        _ => return Ok(Some(item)),
    };
    let (query, needs_post_processing) =
        cleanup_querystring(query, &settings.site_root.src, &settings.types)?;
    item.insert("query".to_string(), Value::Array(query));
    if needs_post_processing {
        state.enqueue_post_processing(item.uid()?, POST_PROCESSING_STEP);
    }
    Ok(Some(item))
}

fn run_processor(
    name: &str,
    item: Item,
    state: &mut RunState,
    settings: &Settings,
) -> Result<Option<Item>> {
    match name {
        "default" => Ok(Some(item)),
        "collection" => collection_processor(item, state, settings),
        other => bail!("unknown type processor '{other}' for {}", item.label()),
    }
}

/// Map `@type` through `types.<T>.portal_type`, overridden per path by `paths.portal_type`.
/// Items without a mapping are dropped. The source type is kept as `_orig_type`.
pub fn process_type(item: Item, state: &mut RunState, settings: &Settings) -> Result<StepOutput> {
    let type_ = item.portal_type()?.to_string();
    let processor = settings.types.processor_for(&type_).to_string();
    let Some(mut item) = run_processor(&processor, item, state, settings)? else {
        return drop_item();
    };
    let type_ = item.portal_type()?.to_string();
    let new_type = settings
        .paths
        .portal_type
        .get(item.path()?)
        .map(String::as_str)
        .or_else(|| settings.types.portal_type_for(&type_))
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    let Some(new_type) = new_type else {
        return drop_item();
    };
    item.insert(Keys::TYPE.to_string(), Value::String(new_type));
    item.insert(Keys::ORIG_TYPE.to_string(), Value::String(type_));
    keep(item)
}
