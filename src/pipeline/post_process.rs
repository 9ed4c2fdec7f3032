//! Second pass: re-runs queued steps on exported items once identifiers are final.

use anyhow::Result;
use log::{debug, info, warn};

use crate::engine::storage::Storage;
use crate::pipeline::RunState;
use crate::pipeline::runner::PipelineRun;
use crate::settings::Settings;
use crate::steps::StepRegistry;
use crate::{Item, ItemExt, Keys};

fn strip_markers(item: &mut Item) {
    item.remove(Keys::REPORT_PATH);
    item.remove(Keys::OLD_UID);
}

/// Drain the post-processing queue in insertion order. Each entry is taken out exactly once.
pub fn post_process(
    registry: &StepRegistry,
    state: &mut RunState,
    settings: &Settings,
    storage: &mut dyn Storage,
) -> Result<()> {
    let queue = std::mem::take(&mut state.post_processing);
    debug!("Starting pipeline post-processing of {} items", queue.len());
    for (queued_uid, step_names) in queue {
        let Some(uid) = state.uids.get(&queued_uid).cloned() else {
            warn!("({queued_uid}) - Not exported, post-processing skipped");
            continue;
        };
        let steps = registry.resolve_all(&step_names)?;
        let keys: Vec<String> = state
            .paths
            .iter()
            .filter(|entry| entry.uid == uid)
            .map(|entry| entry.storage_key.clone())
            .collect();
        for key in keys {
            let item = storage.read(&key)?;
            let type_ = item.portal_type()?.to_string();
            let mut run = PipelineRun::new(&steps, item);
            while let Some(terminal) = run.next_terminal(state, settings)? {
                let Some(mut item) = terminal.item else {
                    for stored in state.forget_export(&uid, &type_) {
                        storage.remove(&stored)?;
                    }
                    *state.dropped.entry(terminal.last_step.clone()).or_default() += 1;
                    state.mark_row_removed(&uid, &terminal.last_step);
                    info!("({uid}) - Dropped during post-processing by {}", terminal.last_step);
                    continue;
                };
                strip_markers(&mut item);
                let stored = storage.persist(&item)?;
                if terminal.is_new {
                    let (new_uid, path) = (item.uid()?, item.path()?);
                    warn!("({uid}) - New item {new_uid} produced during post-processing");
                    state.metadata.blob_files.extend(stored.blob_files);
                    state.record_export(new_uid, path, item.portal_type()?, stored.key);
                }
                debug!("Post-processing: Item {uid} last step {}", terminal.last_step);
            }
        }
    }
    Ok(())
}
