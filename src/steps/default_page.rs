//! Folders with a default page are folded into that page.
//!
//! The folder is held back (dropped, without cascading) until its default page arrives. The
//! page then takes the folder's place: it keeps its own uid as `_UID`, inherits
//! `default_pages.keys_from_parent` from the folder and uses the folder title as `nav_title`.

use anyhow::Result;
use serde_json::Value;

use crate::pipeline::RunState;
use crate::settings::Settings;
use crate::steps::{StepOutput, drop_item, keep};
use crate::{Item, ItemExt, Keys};

fn merge_into_page(parent: Item, mut page: Item, settings: &Settings) -> Item {
    if let Some(uid) = page.remove(Keys::UID) {
        page.insert(Keys::OLD_UID.to_string(), uid);
    }
    let nav_title = parent
        .get("title")
        .or_else(|| page.get("nav_title"))
        .or_else(|| page.get("title"))
        .cloned()
        .unwrap_or_else(|| Value::String(String::new()));
    page.insert("nav_title".to_string(), nav_title);
    for (key, value) in parent {
        if settings.default_pages.keys_from_parent.contains(&key) {
            page.insert(key, value);
        }
    }
    page
}

pub fn process_default_page(
    item: Item,
    state: &mut RunState,
    settings: &Settings,
) -> Result<StepOutput> {
    let uid = item.uid()?.to_string();
    let metadata = &mut state.metadata;
    if let Some(parent) = metadata.processing_default_page.remove(&uid) {
        let parent_uid = parent.uid()?.to_string();
        metadata.fix_relations.insert(uid, parent_uid);
        return keep(merge_into_page(parent, item, settings));
    }
    if let Some(page_uid) = metadata.default_page.shift_remove(&uid) {
        metadata.processing_default_page.insert(page_uid, item);
        return drop_item();
    }
    keep(item)
}
