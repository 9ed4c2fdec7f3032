//! Source export discovery: content item files and `export_*.json` metadata files.

use anyhow::{Context, Result};
use log::debug;
use std::path::Path;
use walkdir::WalkDir;

use crate::SourceFiles;
use crate::engine::tools::is_os_hidden_file;
use crate::utils::config::METADATA_FILE_PREFIX;

/// Walk `src` sorted by file name. Every `*.json` file is a content item except the
/// `export_*.json` metadata files.
pub fn discover_source_files(src: &Path) -> Result<SourceFiles> {
    if !src.is_dir() {
        anyhow::bail!("source {} is not a directory", src.display());
    }
    let mut files = SourceFiles::default();
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk {}", src.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || is_os_hidden_file(path) {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let is_metadata = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(METADATA_FILE_PREFIX));
        if is_metadata {
            files.metadata.push(entry.into_path());
        } else {
            files.content.push(entry.into_path());
        }
    }
    debug!(
        "Found {} content files and {} metadata files in {}",
        files.content.len(),
        files.metadata.len(),
        src.display()
    );
    Ok(files)
}
