//! Typed run settings: bundled defaults merged with the user's `transmute.toml`.
//!
//! Derived values such as the drop-key sets are computed once in [`Settings::from_table`].

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use toml::Table;

use crate::Item;
use crate::error::TransmuteError;
use crate::utils::transmute_toml::{default_table, lowercase_sections, merge_tables};

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub config: ConfigSection,
    pub pipeline: PipelineSection,
    pub principals: PrincipalsSection,
    pub default_pages: DefaultPagesSection,
    pub review_state: ReviewStateSection,
    pub paths: PathsSection,
    pub images: ImagesSection,
    pub sanitize: SanitizeSection,
    pub site_root: SiteRootSection,
    /// Per-path key overrides, keyed by `@id`.
    pub data_override: IndexMap<String, Item>,
    pub types: TypesSection,
    pub steps: StepsSection,
    /// Merged settings as read, for the `settings` command.
    #[serde(skip)]
    pub raw: Table,
    #[serde(skip)]
    derived: Derived,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigSection {
    pub debug: bool,
    pub log_file: String,
    /// Write the CSV report by default.
    pub report: bool,
    /// Settings file the values were read from.
    #[serde(skip)]
    pub filepath: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub steps: Vec<String>,
    /// Steps whose drops never cascade to descendants.
    pub do_not_add_drop: BTreeSet<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct PrincipalsSection {
    pub default: String,
    pub remove: BTreeSet<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct DefaultPagesSection {
    /// Keep default page relationships in the emitted metadata.
    pub keep: bool,
    pub keys_from_parent: BTreeSet<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReviewStateSection {
    pub filter: ReviewStateFilter,
    pub rewrite: ReviewStateRewrite,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReviewStateFilter {
    pub allowed: BTreeSet<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReviewStateRewrite {
    pub states: HashMap<String, String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub export_prefixes: Vec<String>,
    /// Substring replacements applied to paths, in file order.
    pub cleanup: IndexMap<String, String>,
    pub filter: PathsFilter,
    /// Type mapping for specific paths, overriding the per-type mapping.
    pub portal_type: HashMap<String, String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct PathsFilter {
    pub allowed: BTreeSet<String>,
    /// Seed of the drop registry; grows at runtime inside the run state only.
    pub drop: BTreeSet<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ImagesSection {
    /// Types whose image field becomes a separate Image item.
    pub to_preview_image_link: BTreeSet<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SanitizeSection {
    pub drop_keys: BTreeSet<String>,
    /// Additionally dropped from items that carry blocks.
    pub block_keys: BTreeSet<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SiteRootSection {
    pub src: String,
    pub dst: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct TypesSection {
    /// Fallback type processor.
    pub processor: Option<String>,
    #[serde(flatten)]
    pub by_type: IndexMap<String, TypeSettings>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct TypeSettings {
    pub portal_type: Option<String>,
    pub processor: Option<String>,
    /// Default blocks for items of this (destination) type.
    pub blocks: Option<Vec<Item>>,
    /// Replaces `blocks` when set, even when empty.
    pub override_blocks: Option<Vec<Item>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct StepsSection {
    pub blobs: BlobsStepSettings,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct BlobsStepSettings {
    pub field_names: Vec<String>,
}

#[derive(Clone, Debug, Default)]
struct Derived {
    drop_keys: BTreeSet<String>,
    drop_keys_with_blocks: BTreeSet<String>,
}

impl TypesSection {
    /// Destination type for `type_`, if mapped.
    pub fn portal_type_for(&self, type_: &str) -> Option<&str> {
        self.by_type
            .get(type_)
            .and_then(|t| t.portal_type.as_deref())
            .filter(|t| !t.is_empty())
    }

    /// Configured default blocks for `type_`: `override_blocks`, else `blocks`.
    pub fn blocks_for(&self, type_: &str) -> &[Item] {
        self.by_type
            .get(type_)
            .and_then(|t| t.override_blocks.as_deref().or(t.blocks.as_deref()))
            .unwrap_or_default()
    }

    /// Processor name for `type_`: per-type, then the fallback, then `default`.
    pub fn processor_for(&self, type_: &str) -> &str {
        self.by_type
            .get(type_)
            .and_then(|t| t.processor.as_deref())
            .or(self.processor.as_deref())
            .unwrap_or("default")
    }
}

impl Settings {
    /// Bundled defaults only.
    pub fn defaults() -> Result<Self> {
        Self::from_table(Table::new())
    }

    /// Defaults merged with `user` TOML source.
    pub fn from_toml_str(user: &str) -> Result<Self> {
        let user: Table = toml::from_str(user).context("parse settings")?;
        Self::from_table(user)
    }

    /// Defaults merged with an already parsed user table; validates and computes derived values.
    pub fn from_table(user: Table) -> Result<Self> {
        let mut merged = default_table()?;
        merge_tables(&mut merged, lowercase_sections(user));
        let mut settings: Settings = toml::Value::Table(merged.clone())
            .try_into()
            .map_err(|e| TransmuteError::InvalidSettings(e.to_string()))?;
        if settings.pipeline.steps.is_empty() {
            return Err(TransmuteError::InvalidSettings(
                "pipeline.steps must list at least one step".to_string(),
            )
            .into());
        }
        settings.raw = merged;
        settings.derived = Derived {
            drop_keys: settings.sanitize.drop_keys.clone(),
            drop_keys_with_blocks: settings
                .sanitize
                .drop_keys
                .union(&settings.sanitize.block_keys)
                .cloned()
                .collect(),
        };
        Ok(settings)
    }

    pub fn is_debug(&self) -> bool {
        self.config.debug
    }

    /// Keys removed by the sanitize step.
    pub fn drop_keys(&self, has_blocks: bool) -> &BTreeSet<String> {
        if has_blocks {
            &self.derived.drop_keys_with_blocks
        } else {
            &self.derived.drop_keys
        }
    }

    /// True when drops by `step_name` must not cascade.
    pub fn is_drop_exempt(&self, step_name: &str) -> bool {
        self.pipeline.do_not_add_drop.contains(step_name)
    }
}
