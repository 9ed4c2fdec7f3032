//! Run-scoped bookkeeping shared by the orchestrator, the post-processor and the steps.

use indexmap::IndexMap;
use log::debug;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::engine::metadata::Metadata;
use crate::pipeline::drop_registry::DropRegistry;
use crate::settings::Settings;
use crate::{PathEntry, ReportRow};

/// One instance per run, owned by the orchestrating thread.
#[derive(Clone, Debug, Default)]
pub struct RunState {
    /// Source items plus every item produced by fan-out.
    pub total: usize,
    /// Terminal items handled, drops included.
    pub processed: usize,
    /// Exported items per destination type.
    pub exported: BTreeMap<String, usize>,
    /// Dropped items per step name.
    pub dropped: BTreeMap<String, usize>,
    /// Uids of exported items.
    pub seen: BTreeSet<String>,
    /// Any identifier, canonical or superseded, to its canonical uid.
    pub uids: HashMap<String, String>,
    pub uid_path: HashMap<String, String>,
    /// Report rows in production order.
    pub path_transforms: Vec<ReportRow>,
    pub paths: Vec<PathEntry>,
    /// Deferred step names per uid, in insertion order.
    pub post_processing: IndexMap<String, Vec<String>>,
    pub metadata: Metadata,
    pub drops: DropRegistry,
}

impl RunState {
    /// Fresh state for `total` source items. The drop registry is seeded from `paths.filter`.
    pub fn new(total: usize, settings: &Settings, metadata: Metadata) -> Self {
        let filter = &settings.paths.filter;
        Self {
            total,
            metadata,
            drops: DropRegistry::new(filter.allowed.clone(), filter.drop.clone()),
            ..Default::default()
        }
    }

    /// Queue `step_name` to run on `uid` after the primary pass.
    pub fn enqueue_post_processing(&mut self, uid: &str, step_name: &str) {
        let steps = self.post_processing.entry(uid.to_string()).or_default();
        if !steps.iter().any(|s| s == step_name) {
            debug!("({uid}) - Queued {step_name} for post-processing");
            steps.push(step_name.to_string());
        }
    }

    /// Record an exported item. A uid exported again replaces its earlier `paths` entry.
    pub fn record_export(&mut self, uid: &str, path: &str, type_: &str, storage_key: String) {
        *self.exported.entry(type_.to_string()).or_default() += 1;
        if !self.seen.insert(uid.to_string()) {
            self.paths.retain(|entry| entry.uid != uid);
        }
        self.uids.insert(uid.to_string(), uid.to_string());
        self.uid_path.insert(uid.to_string(), path.to_string());
        self.paths.push(PathEntry {
            path: path.to_string(),
            uid: uid.to_string(),
            storage_key,
        });
    }

    /// Point a superseded identifier at its canonical uid and move its queued work along.
    pub fn remap_uid(&mut self, old_uid: &str, uid: &str, path: &str) {
        self.uids.insert(old_uid.to_string(), uid.to_string());
        self.uid_path.insert(old_uid.to_string(), path.to_string());
        if let Some(steps) = self.post_processing.shift_remove(old_uid) {
            debug!("({uid}) - Post-processing moved from {old_uid}");
            let queued = self.post_processing.entry(uid.to_string()).or_default();
            for step in steps {
                if !queued.contains(&step) {
                    queued.push(step);
                }
            }
        }
    }

    /// Undo the export of `uid`: drop its `paths` entries, `seen` membership and export count.
    /// Returns the storage keys that were indexed for it.
    pub fn forget_export(&mut self, uid: &str, type_: &str) -> Vec<String> {
        let mut keys = Vec::new();
        self.paths.retain(|entry| {
            if entry.uid == uid {
                keys.push(entry.storage_key.clone());
                false
            } else {
                true
            }
        });
        self.seen.remove(uid);
        if let Some(count) = self.exported.get_mut(type_) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.exported.remove(type_);
            }
        }
        keys
    }

    /// Mark the latest report row of `uid` as removed by `step_name`.
    pub fn mark_row_removed(&mut self, uid: &str, step_name: &str) {
        if let Some(row) = self
            .path_transforms
            .iter_mut()
            .rev()
            .find(|row| row.dst_uid == uid)
        {
            row.clear_destination();
            row.last_step = step_name.to_string();
        }
    }
}
