use anyhow::Result;

use crate::Item;
use crate::pipeline::RunState;
use crate::settings::Settings;
use crate::steps::{StepOutput, keep};

/// Remove `sanitize.drop_keys`, plus `sanitize.block_keys` when the item has blocks.
pub fn process_cleanup(
    item: Item,
    _state: &mut RunState,
    settings: &Settings,
) -> Result<StepOutput> {
    let drop_keys = settings.drop_keys(item.contains_key("blocks"));
    let item: Item = item
        .into_iter()
        .filter(|(key, _)| !drop_keys.contains(key))
        .collect();
    keep(item)
}
