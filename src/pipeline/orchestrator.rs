//! Primary pass: runs each source item through the configured steps and records what it
//! produced, then hands the queued work to post-processing.

use anyhow::Result;
use log::{debug, warn};
use serde_json::Value;
use std::sync::Arc;

use crate::engine::progress::{ProgressBar, set_bar_total, update_progress_bar};
use crate::engine::storage::Storage;
use crate::pipeline::RunState;
use crate::pipeline::post_process::post_process;
use crate::pipeline::runner::{PipelineRun, Terminal};
use crate::settings::Settings;
use crate::steps::{Step, StepRegistry};
use crate::{ItemExt, Keys, ReportRow, SourceItem};

/// Drives a run: primary pass over source items in order, then post-processing.
/// Single writer of the [`RunState`].
pub struct Orchestrator<'a> {
    registry: &'a StepRegistry,
    settings: &'a Settings,
    storage: &'a mut dyn Storage,
    bar: Option<ProgressBar>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        registry: &'a StepRegistry,
        settings: &'a Settings,
        storage: &'a mut dyn Storage,
    ) -> Self {
        Self {
            registry,
            settings,
            storage,
            bar: None,
        }
    }

    pub fn with_progress(mut self, bar: Option<ProgressBar>) -> Self {
        self.bar = bar;
        self
    }

    /// Resolve the configured steps, run the primary pass over `items`, then drain the
    /// post-processing queue. A source error aborts the run.
    pub fn run<I>(&mut self, items: I, state: &mut RunState) -> Result<()>
    where
        I: IntoIterator<Item = Result<SourceItem>>,
    {
        let steps = self.registry.resolve_all(&self.settings.pipeline.steps)?;
        debug!("Starting pipeline processing of {} items", state.total);
        for source in items {
            self.process_source_item(&steps, source?, state)?;
        }
        debug!("Finished pipeline processing of {} items", state.total);
        if !state.post_processing.is_empty() {
            post_process(self.registry, state, self.settings, &mut *self.storage)?;
        }
        Ok(())
    }

    fn process_source_item(
        &mut self,
        steps: &[Arc<dyn Step>],
        source: SourceItem,
        state: &mut RunState,
    ) -> Result<()> {
        let SourceItem { filename, item } = source;
        let skeleton = ReportRow::from_source(&filename, &item);
        debug!(
            "({}) - Filename {} ({} / {})",
            skeleton.src_uid,
            filename,
            state.processed + 1,
            state.total
        );
        let mut run = PipelineRun::new(steps, item);
        while let Some(terminal) = run.next_terminal(state, self.settings)? {
            let mut row = skeleton.clone();
            if let Some(path) = run.report_path() {
                row.src_path = path.to_string();
            }
            self.apply_terminal(terminal, row, state)?;
        }
        Ok(())
    }

    /// Apply one terminal item: report row, counters, persistence and identifier bookkeeping.
    fn apply_terminal(
        &mut self,
        terminal: Terminal,
        mut row: ReportRow,
        state: &mut RunState,
    ) -> Result<()> {
        let Terminal {
            item,
            last_step,
            is_new,
            uid,
        } = terminal;
        state.processed += 1;
        if let Some(bar) = &self.bar {
            update_progress_bar(bar, 1);
        }
        row.last_step = last_step;

        let Some(mut item) = item else {
            *state.dropped.entry(row.last_step.clone()).or_default() += 1;
            state.path_transforms.push(row);
            if let Some(uid) = uid
                && state.post_processing.shift_remove(&uid).is_some()
            {
                debug!("({uid}) - Dropped, post-processing discarded");
            }
            return Ok(());
        };

        if is_new {
            state.total += 1;
            row.mark_new();
            if let Some(bar) = &self.bar {
                set_bar_total(bar, state.total);
            }
        }
        item.remove(Keys::REPORT_PATH);
        let old_uid = match item.remove(Keys::OLD_UID) {
            Some(Value::String(old)) => Some(old),
            _ => None,
        };
        row.set_destination(&item);
        state.path_transforms.push(row);

        let stored = self.storage.persist(&item)?;
        state.metadata.blob_files.extend(stored.blob_files);
        let (uid, path) = (item.uid()?, item.path()?);
        if state.seen.contains(uid) {
            warn!("({uid}) - Exported more than once, keeping {path}");
        }
        state.record_export(uid, path, item.portal_type()?, stored.key);
        if let Some(old_uid) = old_uid
            && old_uid != uid
        {
            state.remap_uid(&old_uid, uid, path);
        }
        Ok(())
    }
}
