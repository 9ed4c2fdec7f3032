//! Block layout for the destination site.
//!
//! Default blocks come from `types.<T>.override_blocks` or `types.<T>.blocks`, followed by blocks
//! left in `_blocks_` by earlier steps. Collections and folders also get a listing block.

use anyhow::Result;
use serde_json::{Map, Value, json};

use crate::engine::tools::block_uid;
use crate::pipeline::RunState;
use crate::settings::Settings;
use crate::steps::basic_metadata::is_truthy;
use crate::steps::{StepOutput, keep};
use crate::{Item, ItemExt, Keys};

type Block = Map<String, Value>;

fn block_type(block: &Block) -> &str {
    block.get(Keys::TYPE).and_then(Value::as_str).unwrap_or_default()
}

fn default_blocks(item: &Item, settings: &Settings) -> Result<Vec<Block>> {
    let has_image = item.get("image").is_some_and(is_truthy);
    let has_description = item
        .get("description")
        .and_then(Value::as_str)
        .is_some_and(|d| !d.trim().is_empty());
    let blocks = settings
        .types
        .blocks_for(item.portal_type()?)
        .iter()
        .filter(|block| match block_type(block) {
            "leadimage" => has_image,
            "description" => has_description,
            _ => true,
        })
        .cloned()
        .collect();
    Ok(blocks)
}

/// Listing block over the collection's query. Nothing when the query is empty.
fn collection_listing(item: &Item) -> Option<Block> {
    let query = item.get("query").filter(|q| is_truthy(q))?;
    let mut querystring = Map::new();
    querystring.insert("query".to_string(), query.clone());
    if let Some(sort_on) = item.get("sort_on") {
        querystring.insert("sort_on".to_string(), sort_on.clone());
    }
    let sort_order = match (item.get("sort_order"), item.get("sort_reversed")) {
        (Some(order), _) => Some(order.clone()),
        (None, Some(reversed)) if reversed.as_str() == Some("") => Some(json!("ascending")),
        (None, Some(_)) => Some(json!("descending")),
        (None, None) => None,
    };
    if let Some(sort_order) = sort_order {
        querystring.insert("sort_order".to_string(), sort_order);
        querystring.insert("sort_order_boolean".to_string(), Value::Bool(true));
    }
    let block = json!({
        "@type": "listing",
        "headline": "",
        "headlineTag": "h2",
        "querystring": querystring,
        "b_size": item.get("item_count").cloned().unwrap_or(json!(10)),
        "limit": item.get("limit").cloned().unwrap_or(json!(1000)),
        "styles": {},
        "variation": "summary",
    });
    block.as_object().cloned()
}

/// Listing variation matching a folder's display layout.
pub fn folder_variation(layout: Option<&str>) -> &'static str {
    match layout {
        Some("summary_view" | "full_view") => "summary",
        Some("album_view" | "galeria_de_fotos" | "galeria_de_albuns") => "imageGallery",
        _ => "listing",
    }
}

fn folder_listing(item: &Item) -> Option<Block> {
    let variation = folder_variation(item.str_field("layout"));
    let block = json!({
        "@type": "listing",
        "headline": "",
        "headlineTag": "h2",
        "styles": {},
        "variation": variation,
    });
    block.as_object().cloned()
}

fn listing_for(item: &Item) -> Option<Block> {
    match item.str_field(Keys::ORIG_TYPE)? {
        "Collection" | "Topic" => collection_listing(item),
        "Folder" => folder_listing(item),
        _ => None,
    }
}

/// Rich text body kept as a raw html block.
fn text_block(item: &Item) -> Option<Block> {
    let data = item
        .get("text")
        .and_then(|text| text.get("data"))
        .and_then(Value::as_str)
        .filter(|data| !data.trim().is_empty())?;
    json!({"@type": "html", "html": data}).as_object().cloned()
}

/// Build `blocks` and `blocks_layout` for items whose type has default blocks or that carry
/// `_blocks_`. Items with neither are left as they are.
pub fn process_blocks(
    mut item: Item,
    _state: &mut RunState,
    settings: &Settings,
) -> Result<StepOutput> {
    let mut blocks = default_blocks(&item, settings)?;
    let pending = match item.remove(Keys::PENDING_BLOCKS) {
        Some(Value::Array(pending)) => pending,
        _ => Vec::new(),
    };
    blocks.extend(pending.into_iter().filter_map(|block| match block {
        Value::Object(block) => Some(block),
        _ => None,
    }));
    if blocks.is_empty() {
        return keep(item);
    }
    blocks.extend(listing_for(&item));
    blocks.extend(text_block(&item));

    let uid = item.uid()?.to_string();
    let mut by_id = Map::new();
    let mut layout = Vec::with_capacity(blocks.len());
    for (index, block) in blocks.into_iter().enumerate() {
        let id = block_uid(&uid, index);
        layout.push(Value::String(id.clone()));
        by_id.insert(id, Value::Object(block));
    }
    item.insert("blocks".to_string(), Value::Object(by_id));
    item.insert("blocks_layout".to_string(), json!({ "items": layout }));
    keep(item)
}
