//! Whole-run glue: discovery, metadata, primary pass, post-processing, reports and metadata.

use anyhow::Result;
use kdam::Animation;
use log::debug;
use std::path::Path;

use crate::engine::metadata::{finalize_data_files, initialize_metadata, write_metadata};
use crate::engine::progress::{
    ProgressBar, ProgressBarConfig, create_progress_bar, finish_progress_bar,
};
use crate::engine::report::final_reports;
use crate::engine::storage::{FsStorage, MemoryStorage, Storage};
use crate::pipeline::{
    Orchestrator, ReaderHandles, RunState, discover_source_files, spawn_source_reader,
};
use crate::settings::Settings;
use crate::steps::StepRegistry;
use crate::utils::config::OutputLayout;
use crate::{Opts, RunSummary};

fn setup_progress(show: bool, total: usize) -> Option<ProgressBar> {
    show.then(|| {
        create_progress_bar(ProgressBarConfig::new(
            total,
            "Transmuting",
            Animation::Classic,
        ))
    })
}

fn open_storage(src: &Path, dst: &Path, opts: &Opts) -> Result<Box<dyn Storage>> {
    if opts.dry_run {
        return Ok(Box::new(MemoryStorage::default()));
    }
    let storage = FsStorage::new(dst.join(OutputLayout::CONTENT_DIR), src.to_path_buf());
    if opts.clean_up {
        storage.clean()?;
    }
    Ok(Box::new(storage))
}

/// Transform the export at `src` into `dst` with the steps of `registry` named in `settings`.
pub fn transmute_dir_with(
    src: &Path,
    dst: &Path,
    opts: &Opts,
    settings: &Settings,
    registry: &StepRegistry,
) -> Result<RunSummary> {
    // Unknown step names fail before anything is read or written.
    registry.resolve_all(&settings.pipeline.steps)?;

    let files = discover_source_files(src)?;
    let metadata = initialize_metadata(&files.metadata)?;
    let mut state = RunState::new(files.content.len(), settings, metadata);
    let mut storage = open_storage(src, dst, opts)?;
    let bar = setup_progress(opts.progress, state.total);

    let ReaderHandles { item_rx, handle } = spawn_source_reader(files.content, src.to_path_buf());
    Orchestrator::new(registry, settings, storage.as_mut())
        .with_progress(bar.clone())
        .run(item_rx, &mut state)?;
    let sent = handle
        .join()
        .map_err(|_| anyhow::anyhow!("source reader thread panicked"))?;
    debug!("Source reader sent {sent} items");
    if let Some(bar) = &bar {
        finish_progress_bar(bar);
    }

    let report_file = final_reports(&state, opts, settings.is_debug())?;
    let metadata_file = if opts.dry_run {
        finalize_data_files(&mut state);
        None
    } else {
        Some(write_metadata(&mut state, dst, settings)?)
    };

    Ok(RunSummary {
        total: state.total,
        processed: state.processed,
        exported: state.exported.values().sum(),
        dropped: state.dropped.values().sum(),
        metadata_file,
        report_file,
    })
}
