//! Persisted item records: one directory per item under the destination content folder,
//! or an in-memory map for dry runs.

use anyhow::{Context, Result, bail};
use log::{debug, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use crate::engine::tools::{read_json_file, write_json_file};
use crate::error::TransmuteError;
use crate::utils::config::OutputLayout;
use crate::{Item, ItemExt, Keys, is_path_segment};

/// Where a persisted item landed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StoredItem {
    /// Storage key of the data record, `<uid>/data.json`.
    pub key: String,
    /// Blob files written for the item, relative to the content folder.
    pub blob_files: Vec<String>,
}

pub trait Storage {
    /// Write `item`, replacing any previous record with the same key.
    fn persist(&mut self, item: &Item) -> Result<StoredItem>;
    fn read(&self, key: &str) -> Result<Item>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

fn data_key(uid: &str) -> String {
    format!("{uid}/{}", OutputLayout::DATA_FILE)
}

/// True when `path` is relative and made of plain segments only, so joining it onto a
/// directory stays inside that directory.
fn is_contained(path: &Path) -> bool {
    path.components().next().is_some()
        && path.components().all(|c| matches!(c, Component::Normal(_)))
}

type BlobDescriptor = (String, serde_json::Map<String, Value>, String);

/// `(field, descriptor, relative blob path)` for each blob descriptor in `_blob_files_`.
/// Field names become directory names and must be plain path segments.
fn blob_descriptors(uid: &str, blobs: Value) -> Result<Vec<BlobDescriptor>> {
    let Value::Object(blobs) = blobs else {
        return Ok(Vec::new());
    };
    let mut descriptors = Vec::with_capacity(blobs.len());
    for (field, descriptor) in blobs {
        if !is_path_segment(&field) {
            return Err(TransmuteError::MalformedItem {
                item: uid.to_string(),
                key: Keys::BLOB_FILES,
            }
            .into());
        }
        let Value::Object(descriptor) = descriptor else {
            continue;
        };
        let filename = descriptor
            .get("filename")
            .and_then(Value::as_str)
            .and_then(|f| Path::new(f).file_name().and_then(|n| n.to_str()))
            .unwrap_or(field.as_str())
            .to_string();
        let rel = format!("{uid}/{field}/{filename}");
        descriptors.push((field, descriptor, rel));
    }
    Ok(descriptors)
}

/// Files under `<dst>/content`.
#[derive(Clone, Debug)]
pub struct FsStorage {
    content_dir: PathBuf,
    src_root: PathBuf,
}

impl FsStorage {
    /// `src_root` resolves `blob_path` entries of blob descriptors.
    pub fn new(content_dir: PathBuf, src_root: PathBuf) -> Self {
        Self {
            content_dir,
            src_root,
        }
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    /// Remove everything under the content folder.
    pub fn clean(&self) -> Result<()> {
        if self.content_dir.exists() {
            debug!("Cleaning up {}", self.content_dir.display());
            std::fs::remove_dir_all(&self.content_dir)
                .with_context(|| format!("clean up {}", self.content_dir.display()))?;
        }
        std::fs::create_dir_all(&self.content_dir)
            .with_context(|| format!("create {}", self.content_dir.display()))
    }

    fn write_blob(
        &self,
        descriptor: &serde_json::Map<String, Value>,
        target: &Path,
    ) -> Result<bool> {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        if let Some(src) = descriptor
            .get("blob_path")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
        {
            if !is_contained(Path::new(src)) {
                bail!("blob path {src} points outside the source export");
            }
            let src = self.src_root.join(src);
            std::fs::copy(&src, target)
                .with_context(|| format!("copy blob {} to {}", src.display(), target.display()))?;
            return Ok(true);
        }
        if let Some(data) = descriptor.get("data").and_then(Value::as_str) {
            std::fs::write(target, data)
                .with_context(|| format!("write blob {}", target.display()))?;
            return Ok(true);
        }
        Ok(false)
    }
}

impl Storage for FsStorage {
    fn persist(&mut self, item: &Item) -> Result<StoredItem> {
        let uid = item.uid()?;
        let mut data = item.clone();
        let mut blob_files = Vec::new();
        if let Some(blobs) = data.remove(Keys::BLOB_FILES) {
            for (field, mut descriptor, rel) in blob_descriptors(uid, blobs)? {
                let target = self.content_dir.join(&rel);
                if !self.write_blob(&descriptor, &target)? {
                    warn!("({uid}) - Blob {field} has no content, skipped");
                    continue;
                }
                descriptor.remove("data");
                descriptor.insert("blob_path".to_string(), Value::String(rel.clone()));
                data.insert(field, Value::Object(descriptor));
                blob_files.push(rel);
            }
        }
        let key = data_key(uid);
        write_json_file(&self.content_dir.join(&key), &data)?;
        Ok(StoredItem { key, blob_files })
    }

    fn read(&self, key: &str) -> Result<Item> {
        read_json_file(&self.content_dir.join(key))
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if !is_contained(Path::new(key)) {
            bail!("storage key {key} points outside {}", self.content_dir.display());
        }
        let path = self.content_dir.join(key);
        let Some(dir) = path.parent().filter(|d| *d != self.content_dir.as_path()) else {
            return std::fs::remove_file(&path)
                .with_context(|| format!("remove {}", path.display()));
        };
        if dir.exists() {
            std::fs::remove_dir_all(dir).with_context(|| format!("remove {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Items kept in memory, keyed like [`FsStorage`].
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    items: BTreeMap<String, Item>,
}

impl MemoryStorage {
    pub fn items(&self) -> &BTreeMap<String, Item> {
        &self.items
    }

    pub fn get(&self, key: &str) -> Option<&Item> {
        self.items.get(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Storage for MemoryStorage {
    fn persist(&mut self, item: &Item) -> Result<StoredItem> {
        let uid = item.uid()?;
        let mut data = item.clone();
        let mut blob_files = Vec::new();
        if let Some(blobs) = data.remove(Keys::BLOB_FILES) {
            for (field, mut descriptor, rel) in blob_descriptors(uid, blobs)? {
                descriptor.remove("data");
                descriptor.insert("blob_path".to_string(), Value::String(rel.clone()));
                data.insert(field, Value::Object(descriptor));
                blob_files.push(rel);
            }
        }
        let key = data_key(uid);
        self.items.insert(key.clone(), data);
        Ok(StoredItem { key, blob_files })
    }

    fn read(&self, key: &str) -> Result<Item> {
        self.items
            .get(key)
            .cloned()
            .with_context(|| format!("no stored item under {key}"))
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.items.remove(key);
        Ok(())
    }
}
