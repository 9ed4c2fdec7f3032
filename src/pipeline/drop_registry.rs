//! Allowed and dropped path prefixes, with cascading exclusion for folder-like items.

use log::debug;
use std::collections::BTreeSet;

use crate::engine::tools::all_parents_for;

/// `path` is `prefix` itself or lies below it. `/site/news` covers `/site/news/a` but not
/// `/site/newsletter`.
fn is_under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

/// Owned by the run state. The drop set only grows during a run.
#[derive(Clone, Debug, Default)]
pub struct DropRegistry {
    allowed: BTreeSet<String>,
    drop: BTreeSet<String>,
}

impl DropRegistry {
    pub fn new(allowed: BTreeSet<String>, drop: BTreeSet<String>) -> Self {
        Self { allowed, drop }
    }

    /// Exclude everything under `path` when one of its ancestors is allowed and none is
    /// already dropped. Returns true when the drop set grew.
    pub fn register_drop(&mut self, path: &str) -> bool {
        let parents = all_parents_for(path);
        if parents.is_disjoint(&self.allowed) || !parents.is_disjoint(&self.drop) {
            return false;
        }
        debug!("Drop registered for {path}");
        self.drop.insert(path.to_string())
    }

    pub fn is_dropped(&self, path: &str) -> bool {
        self.drop.iter().any(|prefix| is_under(path, prefix))
    }

    pub fn is_allowed(&self, path: &str) -> bool {
        self.allowed.is_empty()
            || self
                .allowed
                .iter()
                .any(|prefix| is_under(path, prefix))
    }

    pub fn is_valid_path(&self, path: &str) -> bool {
        !self.is_dropped(path) && self.is_allowed(path)
    }

    pub fn allowed(&self) -> &BTreeSet<String> {
        &self.allowed
    }

    pub fn dropped(&self) -> &BTreeSet<String> {
        &self.drop
    }
}
