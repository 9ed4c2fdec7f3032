//! Source reader thread: parses content files ahead of the orchestrator.
//!
//! Files are parsed in parallel batches and sent in source order over a bounded channel.
//! The first parse error is forwarded and ends the reader.

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, bounded};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crate::engine::tools::{path_relative_to, path_to_report_string, read_json_file};
use crate::utils::config::ReaderConsts;
use crate::{Item, SourceItem};

/// Receiver side of the reader. Join `handle` after the channel is drained or dropped.
pub struct ReaderHandles {
    pub item_rx: Receiver<Result<SourceItem>>,
    pub handle: JoinHandle<usize>,
}

/// Parse one content file. The file name is reported relative to `root`.
pub fn read_source_item(path: &Path, root: &Path) -> Result<SourceItem> {
    let item: Item = read_json_file(path)?;
    let rel = path_relative_to(path, root).unwrap_or_else(|| path.to_path_buf());
    Ok(SourceItem {
        filename: path_to_report_string(&rel),
        item,
    })
}

/// Spawn the reader over `files`. Returns once the thread is started; the thread returns the
/// number of items it sent.
pub fn spawn_source_reader(files: Vec<PathBuf>, root: PathBuf) -> ReaderHandles {
    let (item_tx, item_rx) = bounded::<Result<SourceItem>>(ReaderConsts::CHANNEL_CAP);
    let handle = thread::spawn(move || {
        let mut sent = 0_usize;
        for batch in files.chunks(ReaderConsts::PARSE_BATCH_SIZE) {
            let parsed: Vec<Result<SourceItem>> = batch
                .par_iter()
                .map(|path| {
                    read_source_item(path, &root)
                        .with_context(|| format!("read source item {}", path.display()))
                })
                .collect();
            for result in parsed {
                let failed = result.is_err();
                if item_tx.send(result).is_err() || failed {
                    return sent;
                }
                sent += 1;
            }
        }
        sent
    });
    ReaderHandles { item_rx, handle }
}
