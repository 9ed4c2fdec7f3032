use anyhow::Result;
use serde_json::Value;

use crate::pipeline::RunState;
use crate::settings::Settings;
use crate::steps::{StepOutput, drop_item, keep};
use crate::{Item, ItemExt, Keys};

/// Items without a state, or with no filter configured, are always valid.
fn is_valid_state(settings: &Settings, review_state: &str) -> bool {
    let allowed = &settings.review_state.filter.allowed;
    review_state.is_empty() || allowed.is_empty() || allowed.contains(review_state)
}

/// Drop items whose review state is filtered out; rename states per `review_state.rewrite`.
pub fn process_review_state(
    mut item: Item,
    _state: &mut RunState,
    settings: &Settings,
) -> Result<StepOutput> {
    let review_state = item.str_field(Keys::REVIEW_STATE).unwrap_or_default();
    if !is_valid_state(settings, review_state) {
        return drop_item();
    }
    if let Some(new_state) = settings.review_state.rewrite.states.get(review_state) {
        let new_state = Value::String(new_state.clone());
        item.insert(Keys::REVIEW_STATE.to_string(), new_state);
    }
    keep(item)
}
