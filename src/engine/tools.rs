//! Path, identifier and file utilities

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Convert absolute path to relative path from base
pub fn path_relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    path.strip_prefix(base).ok().map(|p| p.to_path_buf())
}

/// Relative path as a forward-slash string, for report file names on every platform.
pub fn path_to_report_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Check if a file should be excluded based on OS-specific hidden files
pub fn is_os_hidden_file(path: &Path) -> bool {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        match name {
            // macOS
            ".DS_Store" | ".AppleDouble" | ".LSOverride" => true,
            // Windows
            "Thumbs.db" | "ehthumbs.db" | "Desktop.ini" => true,
            // Linux
            ".directory" => true,
            // macOS resource fork files start with ._
            _ => name.starts_with("._"),
        }
    } else {
        false
    }
}

/// Every ancestor prefix of `path`: `/a/b/c` gives `{/a, /a/b}`. The path itself, the root
/// and empty prefixes are skipped.
pub fn all_parents_for(path: &str) -> BTreeSet<String> {
    let parts: Vec<&str> = path.split('/').collect();
    (0..parts.len())
        .map(|idx| parts[..idx].join("/"))
        .filter(|parent| !parent.trim().is_empty())
        .collect()
}

/// New 32-character hex identifier.
pub fn generate_uid() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Stable block id for the `index`-th block of item `uid`, so reruns give the same ids.
pub fn block_uid(uid: &str, index: usize) -> String {
    let name = format!("{uid}/blocks/{index}");
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, name.as_bytes())
        .hyphenated()
        .to_string()
}

/// Trim leading and trailing ` _-` from a path segment, then replace inner spaces with `_`.
pub fn fix_short_id(id: &str) -> String {
    id.trim_matches(|c| matches!(c, ' ' | '_' | '-'))
        .replace(' ', "_")
}

fn fold_accent(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => "a",
        'æ' => "ae",
        'ç' => "c",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'ñ' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => "o",
        'œ' => "oe",
        'ß' => "ss",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'ý' | 'ÿ' => "y",
        _ => return None,
    };
    Some(folded)
}

fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if let Some(folded) = fold_accent(c) {
            slug.push_str(folded);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// Normalize a file name into a URL-safe id: lowercase, accents folded,
/// other characters collapsed into single dashes. The extension is kept.
pub fn normalize_filename(filename: &str) -> String {
    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (filename, None),
    };
    let stem = slugify(stem);
    match ext.map(slugify).filter(|e| !e.is_empty()) {
        Some(ext) if !stem.is_empty() => format!("{stem}.{ext}"),
        Some(ext) => ext,
        None => stem,
    }
}

/// Counter entries sorted by count descending, then by name.
pub fn sort_by_value(data: &BTreeMap<String, usize>) -> Vec<(&str, usize)> {
    let mut sorted: Vec<(&str, usize)> = data.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    sorted
}

/// Read and deserialize a JSON file.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
}

/// Serialize `data` as pretty JSON into `path`, creating parent directories.
pub fn write_json_file<T: serde::Serialize + ?Sized>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let raw = serde_json::to_string_pretty(data)?;
    std::fs::write(path, raw).with_context(|| format!("write {}", path.display()))
}
