//! One step applied to one item: interprets drops and fan-out.

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::VecDeque;

use crate::pipeline::RunState;
use crate::settings::Settings;
use crate::steps::Step;
use crate::{Item, ItemExt, Keys};

/// What happened next while draining a step's outputs.
pub(crate) enum StepEvent {
    /// A fan-out item, already stripped of its marker.
    NewItem(Item),
    /// All outputs drained; `result` is the running item after the step.
    Done { result: Option<Item> },
}

/// A step that ran and whose outputs are being drained.
pub(crate) struct StepRun {
    name: String,
    outputs: VecDeque<Option<Item>>,
    result: Option<Item>,
    input_path: String,
    /// Input was folder-like and the step is not exempt from drop cascading.
    cascade: bool,
}

impl StepRun {
    pub(crate) fn start(
        step: &dyn Step,
        item: Item,
        state: &mut RunState,
        settings: &Settings,
    ) -> Result<Self> {
        let name = step.name().to_string();
        let input_path = item.path()?.to_string();
        let cascade = item.is_folderish() && !settings.is_drop_exempt(&name);
        let label = item.label();
        let outputs = step
            .process(item, state, settings)
            .with_context(|| format!("step {name} failed on {label}"))?;
        Ok(Self {
            name,
            outputs: outputs.into(),
            result: None,
            input_path,
            cascade,
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn next_event(&mut self, state: &mut RunState) -> StepEvent {
        while let Some(output) = self.outputs.pop_front() {
            match output {
                None => {
                    if self.cascade {
                        state.drops.register_drop(&self.input_path);
                    }
                    self.result = None;
                }
                Some(mut item) => {
                    if matches!(item.remove(Keys::IS_NEW_ITEM), Some(Value::Bool(true))) {
                        return StepEvent::NewItem(item);
                    }
                    self.result = Some(item);
                }
            }
        }
        StepEvent::Done {
            result: self.result.take(),
        }
    }
}
