use anyhow::Result;
use serde_json::Value;

use crate::engine::metadata::Relation;
use crate::engine::tools::{generate_uid, normalize_filename};
use crate::pipeline::RunState;
use crate::settings::Settings;
use crate::steps::{StepOutput, keep};
use crate::{Item, ItemExt, Keys};

/// Relation attribute linking an item to its extracted image.
pub const PREVIEW_IMAGE_LINK: &str = "preview_image_link";

/// New `Image` item placed inside `parent`, built from the parent's image blob.
fn create_image_from_item(parent: &mut Item, image: Value) -> Result<Item> {
    let caption = parent
        .remove("image_caption")
        .unwrap_or_else(|| Value::String(String::new()));
    let filename = image
        .get("filename")
        .and_then(Value::as_str)
        .unwrap_or("image")
        .to_string();
    let image_id = normalize_filename(&filename);
    let path = format!("{}/{}", parent.path()?, image_id);

    let mut item = Item::new();
    item.insert(Keys::PATH.to_string(), Value::String(path));
    item.insert(Keys::TYPE.to_string(), Value::String("Image".to_string()));
    item.insert("image".to_string(), image);
    item.insert(Keys::ID.to_string(), Value::String(image_id));
    item.insert("title".to_string(), Value::String(filename));
    item.insert("image_caption".to_string(), caption);
    item.insert("exclude_from_nav".to_string(), Value::Bool(true));
    item.insert(Keys::UID.to_string(), Value::String(generate_uid()));
    item.insert(Keys::IS_NEW_ITEM.to_string(), Value::Bool(true));
    Ok(item)
}

/// For types in `images.to_preview_image_link`, move the image blob into a new `Image` item and
/// link it back with a `preview_image_link` relation. The new item comes first.
pub fn process_image_to_preview_image_link(
    mut item: Item,
    state: &mut RunState,
    settings: &Settings,
) -> Result<StepOutput> {
    if !settings
        .images
        .to_preview_image_link
        .contains(item.portal_type()?)
    {
        return keep(item);
    }
    match item.remove("image") {
        Some(image @ Value::Object(_)) => {
            let image = create_image_from_item(&mut item, image)?;
            state.metadata.relations.push(Relation::new(
                PREVIEW_IMAGE_LINK,
                item.uid()?,
                image.uid()?,
            ));
            Ok(vec![Some(image), Some(item)])
        }
        _ => {
            item.remove("image_caption");
            keep(item)
        }
    }
}
