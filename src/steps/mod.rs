//! Step contract, the name-to-implementation registry, and the built-in steps.

pub mod basic_metadata;
pub mod blobs;
pub mod blocks;
pub mod default_page;
pub mod image;
pub mod paths;
pub mod portal_type;
pub mod querystring;
pub mod review_state;
pub mod sanitize;

use anyhow::Result;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::Item;
use crate::error::TransmuteError;
use crate::pipeline::RunState;
use crate::settings::Settings;

/// What a step produced: `None` drops, an item flagged `_is_new_item` fans out, any other item
/// replaces the running item.
pub type StepOutput = Vec<Option<Item>>;

/// A named transformation applied to one item.
pub trait Step: Send + Sync {
    /// Stable name used in settings, reports and drop counters.
    fn name(&self) -> &str;

    fn process(&self, item: Item, state: &mut RunState, settings: &Settings) -> Result<StepOutput>;
}

impl fmt::Debug for dyn Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Step").field(&self.name()).finish()
    }
}

/// Step backed by a function or closure.
pub struct FnStep<F> {
    name: String,
    func: F,
}

impl<F> FnStep<F>
where
    F: Fn(Item, &mut RunState, &Settings) -> Result<StepOutput> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Step for FnStep<F>
where
    F: Fn(Item, &mut RunState, &Settings) -> Result<StepOutput> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn process(&self, item: Item, state: &mut RunState, settings: &Settings) -> Result<StepOutput> {
        (self.func)(item, state, settings)
    }
}

/// Pass `item` on.
pub fn keep(item: Item) -> Result<StepOutput> {
    Ok(vec![Some(item)])
}

/// Drop the running item.
pub fn drop_item() -> Result<StepOutput> {
    Ok(vec![None])
}

/// Steps by name, built once at startup.
#[derive(Clone, Default)]
pub struct StepRegistry {
    steps: HashMap<String, Arc<dyn Step>>,
}

impl StepRegistry {
    /// Registry holding every built-in step.
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        registry
            .register_fn("process_export_prefix", paths::process_export_prefix)
            .register_fn("process_paths", paths::process_paths)
            .register_fn("process_ids", paths::process_ids)
            .register_fn("process_default_page", default_page::process_default_page)
            .register_fn("process_review_state", review_state::process_review_state)
            .register_fn(
                "process_image_to_preview_image_link",
                image::process_image_to_preview_image_link,
            )
            .register_fn("process_data_override", basic_metadata::process_data_override)
            .register_fn("process_type", portal_type::process_type)
            .register_fn(
                querystring::POST_PROCESSING_STEP,
                querystring::process_querystring,
            )
            .register_fn(
                "process_title_description",
                basic_metadata::process_title_description,
            )
            .register_fn("process_no_title", basic_metadata::process_no_title)
            .register_fn("process_creators", basic_metadata::process_creators)
            .register_fn("process_blocks", blocks::process_blocks)
            .register_fn("process_blobs", blobs::process_blobs)
            .register_fn("process_cleanup", sanitize::process_cleanup);
        registry
    }

    /// Add or replace a step under its own name.
    pub fn register(&mut self, step: Arc<dyn Step>) -> &mut Self {
        self.steps.insert(step.name().to_string(), step);
        self
    }

    pub fn register_fn<F>(&mut self, name: &str, func: F) -> &mut Self
    where
        F: Fn(Item, &mut RunState, &Settings) -> Result<StepOutput> + Send + Sync + 'static,
    {
        self.register(Arc::new(FnStep::new(name, func)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Step>, TransmuteError> {
        self.steps
            .get(name)
            .cloned()
            .ok_or_else(|| TransmuteError::UnknownStep(name.to_string()))
    }

    /// Resolve `names` in order; the first unknown name is an error.
    pub fn resolve_all<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<Arc<dyn Step>>, TransmuteError> {
        names.iter().map(|name| self.resolve(name.as_ref())).collect()
    }

    /// Resolution status of each name, in order.
    pub fn check<S: AsRef<str>>(&self, names: &[S]) -> Vec<(String, bool)> {
        names
            .iter()
            .map(|name| (name.as_ref().to_string(), self.contains(name.as_ref())))
            .collect()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.steps.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
