use anyhow::Result;
use serde_json::{Map, Value};

use crate::pipeline::RunState;
use crate::settings::Settings;
use crate::steps::{StepOutput, keep};
use crate::{Item, Keys};

/// Move blob fields (`steps.blobs.field_names`) into `_blob_files_`. Non-object values are
/// removed from the item and ignored.
pub fn process_blobs(
    mut item: Item,
    _state: &mut RunState,
    settings: &Settings,
) -> Result<StepOutput> {
    let mut blobs = Map::new();
    for field in &settings.steps.blobs.field_names {
        if let Some(data @ Value::Object(_)) = item.remove(field) {
            blobs.insert(field.clone(), data);
        }
    }
    item.insert(Keys::BLOB_FILES.to_string(), Value::Object(blobs));
    keep(item)
}
