//! Load `transmute.toml` from a directory and merge it over the bundled defaults.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use toml::{Table, Value};

use crate::error::TransmuteError;
use crate::settings::Settings;
use crate::utils::config::PackagePaths;

/// Defaults shipped with the binary.
const DEFAULT_SETTINGS: &str = include_str!("default.toml");

pub(crate) fn default_table() -> Result<Table> {
    toml::from_str(DEFAULT_SETTINGS).context("parse bundled default settings")
}

/// Merge `overrides` into `base`: tables merge recursively, any other value replaces.
pub fn merge_tables(base: &mut Table, overrides: Table) {
    for (key, value) in overrides {
        if let Value::Table(incoming) = value {
            if let Some(Value::Table(current)) = base.get_mut(&key) {
                merge_tables(current, incoming);
                continue;
            }
            base.insert(key, Value::Table(incoming));
        } else {
            base.insert(key, value);
        }
    }
}

/// Section names are case-insensitive; nested keys are not.
pub(crate) fn lowercase_sections(table: Table) -> Table {
    table
        .into_iter()
        .map(|(key, value)| (key.to_lowercase(), value))
        .collect()
}

/// Path of the settings file inside `dir`.
pub fn settings_path(dir: &Path) -> PathBuf {
    dir.join(PackagePaths::get().settings_filename())
}

/// Load `transmute.toml` from `dir`, merged over the defaults.
pub fn load_settings(dir: &Path) -> Result<Settings> {
    let path = settings_path(dir);
    if !path.is_file() {
        return Err(TransmuteError::SettingsNotFound {
            file: PackagePaths::get().settings_filename().to_string(),
            dir: dir.display().to_string(),
        }
        .into());
    }
    let s = std::fs::read_to_string(&path)
        .with_context(|| format!("read settings {}", path.display()))?;
    let user: Table = toml::from_str(&s).with_context(|| format!("parse {}", path.display()))?;
    let mut settings = Settings::from_table(user)?;
    settings.config.filepath = Some(path);
    Ok(settings)
}
