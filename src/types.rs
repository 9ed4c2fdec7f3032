//! Public and internal types for the transmute API and pipeline.

use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

use crate::error::TransmuteError;

/// One content item: an ordered JSON object. Required keys are `@id`, `@type` and `UID`.
pub type Item = serde_json::Map<String, Value>;

/// Well-known item keys.
pub struct Keys;

impl Keys {
    pub const PATH: &'static str = "@id";
    pub const TYPE: &'static str = "@type";
    pub const UID: &'static str = "UID";
    pub const ID: &'static str = "id";
    pub const REVIEW_STATE: &'static str = "review_state";
    pub const IS_FOLDERISH: &'static str = "is_folderish";
    /// Fan-out marker set by a step on an item it synthesized.
    pub const IS_NEW_ITEM: &'static str = "_is_new_item";
    /// Superseded identifier carried by an item whose uid was replaced.
    pub const OLD_UID: &'static str = "_UID";
    /// Source path after prefix stripping, used by the report only.
    pub const REPORT_PATH: &'static str = "_@id";
    /// Blob descriptors extracted from the item, consumed by storage.
    pub const BLOB_FILES: &'static str = "_blob_files_";
    pub const ORIG_TYPE: &'static str = "_orig_type";
    /// Blocks prepared by earlier steps, merged by the blocks step.
    pub const PENDING_BLOCKS: &'static str = "_blocks_";
}

/// Placeholder for absent values in reports.
pub const MISSING: &str = "--";

/// Non-empty, without separators and without `..`.
pub fn is_path_segment(value: &str) -> bool {
    !value.trim().is_empty() && !value.contains(['/', '\\']) && !value.contains("..")
}

/// Accessors for the keys the engine relies on.
pub trait ItemExt {
    /// `@id`, or a malformed-item error.
    fn path(&self) -> Result<&str, TransmuteError>;
    /// `UID`, or a malformed-item error. The uid names the item's storage directory, so it
    /// must also be a plain path segment.
    fn uid(&self) -> Result<&str, TransmuteError>;
    /// `@type`, or a malformed-item error.
    fn portal_type(&self) -> Result<&str, TransmuteError>;
    fn str_field(&self, key: &str) -> Option<&str>;
    fn is_folderish(&self) -> bool;
    /// Short label for log lines: the uid when present, else the path.
    fn label(&self) -> String;
}

fn required<'a>(item: &'a Item, key: &'static str) -> Result<&'a str, TransmuteError> {
    item.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| TransmuteError::MalformedItem {
            item: item.label(),
            key,
        })
}

impl ItemExt for Item {
    fn path(&self) -> Result<&str, TransmuteError> {
        required(self, Keys::PATH)
    }

    fn uid(&self) -> Result<&str, TransmuteError> {
        let uid = required(self, Keys::UID)?;
        if !is_path_segment(uid) {
            return Err(TransmuteError::MalformedItem {
                item: self.str_field(Keys::PATH).unwrap_or(uid).to_string(),
                key: Keys::UID,
            });
        }
        Ok(uid)
    }

    fn portal_type(&self) -> Result<&str, TransmuteError> {
        required(self, Keys::TYPE)
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn is_folderish(&self) -> bool {
        self.get(Keys::IS_FOLDERISH)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn label(&self) -> String {
        self.str_field(Keys::UID)
            .or_else(|| self.str_field(Keys::PATH))
            .unwrap_or("<unidentified>")
            .to_string()
    }
}

/// One row of the path transforms report. Column order is the CSV column order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub filename: String,
    pub src_path: String,
    pub src_uid: String,
    pub src_type: String,
    pub src_state: String,
    pub dst_path: String,
    pub dst_uid: String,
    pub dst_type: String,
    pub dst_state: String,
    pub last_step: String,
}

impl ReportRow {
    /// Skeleton with the source identity of `item`; destination fields are placeholders.
    pub fn from_source(filename: &str, item: &Item) -> Self {
        let field = |key: &str| item.str_field(key).unwrap_or(MISSING).to_string();
        Self {
            filename: filename.to_string(),
            src_path: field(Keys::PATH),
            src_uid: field(Keys::UID),
            src_type: field(Keys::TYPE),
            src_state: field(Keys::REVIEW_STATE),
            dst_path: MISSING.to_string(),
            dst_uid: MISSING.to_string(),
            dst_type: MISSING.to_string(),
            dst_state: MISSING.to_string(),
            last_step: String::new(),
        }
    }

    /// Source fields have no counterpart for items synthesized mid-pipeline.
    pub fn mark_new(&mut self) {
        self.src_uid = MISSING.to_string();
        self.src_type = MISSING.to_string();
        self.src_state = MISSING.to_string();
    }

    pub fn set_destination(&mut self, item: &Item) {
        let field = |key: &str| item.str_field(key).unwrap_or_default().to_string();
        self.dst_path = field(Keys::PATH);
        self.dst_uid = field(Keys::UID);
        self.dst_type = field(Keys::TYPE);
        self.dst_state = item
            .str_field(Keys::REVIEW_STATE)
            .unwrap_or(MISSING)
            .to_string();
    }

    pub fn clear_destination(&mut self) {
        self.dst_path = MISSING.to_string();
        self.dst_uid = MISSING.to_string();
        self.dst_type = MISSING.to_string();
        self.dst_state = MISSING.to_string();
    }
}

/// Exported item index entry: `(path, uid, storage key)`. Sorts by path first.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct PathEntry {
    pub path: String,
    pub uid: String,
    pub storage_key: String,
}

/// A parsed source file.
#[derive(Clone, Debug)]
pub struct SourceItem {
    pub filename: String,
    pub item: Item,
}

/// Source export layout: content item files and `export_*.json` metadata files.
#[derive(Clone, Debug, Default)]
pub struct SourceFiles {
    pub content: Vec<PathBuf>,
    pub metadata: Vec<PathBuf>,
}

/// Totals returned by [`transmute_dir`](crate::transmute_dir).
#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    pub total: usize,
    pub processed: usize,
    pub exported: usize,
    pub dropped: usize,
    /// `None` on dry runs.
    pub metadata_file: Option<PathBuf>,
    pub report_file: Option<PathBuf>,
}

/// Run options (CLI and lib).
#[derive(Clone, Debug, Default)]
pub struct Opts {
    /// Write the CSV path transforms report.
    pub write_report: bool,
    /// Report location. When None, `report_transmute.csv` in the working directory.
    pub report_path: Option<PathBuf>,
    /// Remove existing destination content before the run.
    pub clean_up: bool,
    /// Run against in-memory storage; only the report is written.
    pub dry_run: bool,
    /// Show the progress bar.
    pub progress: bool,
}
