//! Chains the configured steps over one item and every item it fans out into.
//!
//! Pending chains live on an explicit work stack. A fan-out pushes a new chain that restarts at
//! the first step; it runs to completion before the chain that spawned it continues. Terminal
//! items are handed out one at a time through [`PipelineRun::next_terminal`], so the caller
//! applies each one to the run state before the next step runs.

use anyhow::Result;
use log::{debug, info};
use std::sync::Arc;

use crate::pipeline::RunState;
use crate::pipeline::step_runner::{StepEvent, StepRun};
use crate::settings::Settings;
use crate::steps::Step;
use crate::{Item, ItemExt, Keys};

/// An item that left the pipeline.
#[derive(Clone, Debug)]
pub struct Terminal {
    /// `None` when dropped.
    pub item: Option<Item>,
    /// Last step that ran, empty when none did.
    pub last_step: String,
    /// Produced by fan-out.
    pub is_new: bool,
    /// Uid of the running item when it was last present.
    pub uid: Option<String>,
}

struct Frame {
    item: Option<Item>,
    next_step: usize,
    last_step: String,
    is_new: bool,
    label: String,
    uid: Option<String>,
    active: Option<StepRun>,
}

impl Frame {
    fn new(item: Item, is_new: bool) -> Self {
        Self {
            label: item.label(),
            uid: item.str_field(Keys::UID).map(str::to_string),
            item: Some(item),
            next_step: 0,
            last_step: String::new(),
            is_new,
            active: None,
        }
    }
}

/// Lazy run of `steps` over one source item.
pub struct PipelineRun<'a> {
    steps: &'a [Arc<dyn Step>],
    stack: Vec<Frame>,
    report_path: Option<String>,
}

impl<'a> PipelineRun<'a> {
    pub fn new(steps: &'a [Arc<dyn Step>], item: Item) -> Self {
        Self {
            steps,
            stack: vec![Frame::new(item, false)],
            report_path: None,
        }
    }

    /// Source path of the item this run started from, once a step recorded it as `_@id`.
    pub fn report_path(&self) -> Option<&str> {
        self.report_path.as_deref()
    }

    /// Advance until the next terminal item. `Ok(None)` once every chain finished.
    pub fn next_terminal(
        &mut self,
        state: &mut RunState,
        settings: &Settings,
    ) -> Result<Option<Terminal>> {
        let steps = self.steps;
        loop {
            let depth = self.stack.len();
            let Some(frame) = self.stack.last_mut() else {
                return Ok(None);
            };

            if let Some(active) = frame.active.as_mut() {
                match active.next_event(state) {
                    StepEvent::NewItem(item) => {
                        info!(
                            " - New: {} (from {}/{})",
                            item.label(),
                            frame.label,
                            active.name()
                        );
                        self.stack.push(Frame::new(item, true));
                    }
                    StepEvent::Done { result } => {
                        let step_name = active.name().to_string();
                        debug!("({}) - Step {} - finished", frame.label, step_name);
                        if let Some(item) = result.as_ref() {
                            if let Some(uid) = item.str_field(Keys::UID) {
                                frame.uid = Some(uid.to_string());
                            }
                            if depth == 1
                                && let Some(path) = item.str_field(Keys::REPORT_PATH)
                            {
                                self.report_path = Some(path.to_string());
                            }
                        }
                        frame.item = result;
                        frame.last_step = step_name;
                        frame.active = None;
                        frame.next_step += 1;
                    }
                }
                continue;
            }

            let Some(step) = steps.get(frame.next_step) else {
                let Some(done) = self.stack.pop() else {
                    return Ok(None);
                };
                return Ok(Some(Terminal {
                    item: done.item,
                    last_step: done.last_step,
                    is_new: done.is_new,
                    uid: done.uid,
                }));
            };

            match frame.item.take() {
                None => {
                    debug!("({}) - Step {} - skipped", frame.label, step.name());
                    frame.next_step += 1;
                }
                Some(item) => {
                    debug!("({}) - Step {} - started", frame.label, step.name());
                    frame.active = Some(StepRun::start(step.as_ref(), item, state, settings)?);
                }
            }
        }
    }
}
