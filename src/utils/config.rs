//! Application configuration constants.
//! File names and tuning in one place.

use std::sync::OnceLock;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived file names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    settings_filename: String,
    report_filename: String,
    log_filename: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                settings_filename: format!("{pkg}.toml"),
                report_filename: format!("report_{pkg}.csv"),
                log_filename: format!("{pkg}.log"),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    /// User settings file looked up in the config directory.
    pub fn settings_filename(&self) -> &str {
        &self.settings_filename
    }

    pub fn report_filename(&self) -> &str {
        &self.report_filename
    }

    pub fn log_filename(&self) -> &str {
        &self.log_filename
    }
}

// ---- Destination layout ----

/// Names used in the destination tree.
pub struct OutputLayout;

impl OutputLayout {
    /// Folder under the destination holding one directory per item.
    pub const CONTENT_DIR: &'static str = "content";
    /// Per-item data file inside `content/<uid>/`.
    pub const DATA_FILE: &'static str = "data.json";
    pub const METADATA_FILE: &'static str = "__metadata__.json";
    pub const DEBUG_METADATA_FILE: &'static str = "__debug_metadata__.json";
    /// Written next to the content folder.
    pub const RELATIONS_FILE: &'static str = "relations.json";
    pub const METADATA_VERSION: &'static str = "1.0.0";
}

// ---- Source layout ----

/// Prefix of metadata files in a source export (`export_relations.json`, ...).
pub const METADATA_FILE_PREFIX: &str = "export_";

// ---- Reader ----

/// Source reader tuning: files parsed per parallel batch and channel capacity.
pub struct ReaderConsts;

impl ReaderConsts {
    /// Files parsed in parallel per batch; items are still sent in source order.
    pub const PARSE_BATCH_SIZE: usize = 64;
    /// Parsed items buffered ahead of the orchestrator.
    pub const CHANNEL_CAP: usize = 256;
}
