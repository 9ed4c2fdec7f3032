//! Cross-item metadata: loaded from the `export_*.json` files of the source and
//! written next to the exported content once the run is over.

use anyhow::Result;
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::Item;
use crate::engine::tools::{read_json_file, write_json_file};
use crate::pipeline::RunState;
use crate::settings::Settings;
use crate::utils::config::{METADATA_FILE_PREFIX, OutputLayout};

/// One relation between two items.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Relation {
    #[serde(default, alias = "relationship")]
    pub from_attribute: String,
    #[serde(default)]
    pub from_uuid: String,
    #[serde(default)]
    pub to_uuid: String,
}

impl Relation {
    pub fn new(from_attribute: &str, from_uuid: &str, to_uuid: &str) -> Self {
        Self {
            from_attribute: from_attribute.to_string(),
            from_uuid: from_uuid.to_string(),
            to_uuid: to_uuid.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct DefaultPageRecord {
    uuid: String,
    default_page_uuid: String,
}

#[derive(Deserialize)]
struct LocalRolesRecord {
    uuid: String,
    localroles: Value,
}

#[derive(Deserialize)]
struct OrderingRecord {
    uuid: String,
    order: Value,
}

/// Shared metadata of a run. Held by [`RunState`] and mutated by steps.
#[derive(Clone, Debug, Default)]
pub struct Metadata {
    /// Folder uid to default page uid.
    pub default_page: IndexMap<String, String>,
    pub local_permissions: IndexMap<String, Value>,
    pub local_roles: IndexMap<String, Value>,
    pub ordering: IndexMap<String, Value>,
    pub relations: Vec<Relation>,
    pub blob_files: Vec<String>,
    pub data_files: Vec<String>,
    /// Folders held back until their default page arrives, keyed by the page uid.
    pub processing_default_page: HashMap<String, Item>,
    /// Superseded default page uid to the folder uid that replaced it.
    pub fix_relations: HashMap<String, String>,
}

/// Build [`Metadata`] from the source's `export_*.json` files.
pub fn initialize_metadata(files: &[PathBuf]) -> Result<Metadata> {
    let mut metadata = Metadata::default();
    for path in files {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let key = name
            .trim_start_matches(METADATA_FILE_PREFIX)
            .trim_end_matches(".json");
        match key {
            "defaultpages" => {
                let records: Vec<DefaultPageRecord> = read_json_file(path)?;
                metadata.default_page = records
                    .into_iter()
                    .map(|r| (r.uuid, r.default_page_uuid))
                    .collect();
            }
            "localroles" => {
                let records: Vec<LocalRolesRecord> = read_json_file(path)?;
                metadata.local_roles = records
                    .into_iter()
                    .map(|r| {
                        let mut roles = serde_json::Map::new();
                        roles.insert("local_roles".to_string(), r.localroles);
                        (r.uuid, Value::Object(roles))
                    })
                    .collect();
            }
            "ordering" => {
                let records: Vec<OrderingRecord> = read_json_file(path)?;
                metadata.ordering = records.into_iter().map(|r| (r.uuid, r.order)).collect();
            }
            "relations" => {
                metadata.relations = read_json_file(path)?;
            }
            _ => debug!("Ignoring metadata file {}", path.display()),
        }
    }
    debug!(
        "Metadata: {} default pages, {} local roles, {} ordering, {} relations",
        metadata.default_page.len(),
        metadata.local_roles.len(),
        metadata.ordering.len(),
        metadata.relations.len()
    );
    Ok(metadata)
}

#[derive(Serialize)]
struct MetadataFile<'a> {
    #[serde(rename = "__version__")]
    version: &'static str,
    #[serde(rename = "_blob_files_")]
    blob_files: &'a [String],
    #[serde(rename = "_data_files_")]
    data_files: &'a [String],
    default_page: IndexMap<&'a str, &'a str>,
    local_permissions: IndexMap<&'a str, &'a Value>,
    local_roles: IndexMap<&'a str, &'a Value>,
    ordering: IndexMap<&'a str, &'a Value>,
    relations: [Relation; 0],
}

#[derive(Serialize)]
struct DebugMetadataFile<'a> {
    #[serde(rename = "__version__")]
    version: &'static str,
    #[serde(rename = "_blob_files_")]
    blob_files: &'a [String],
    #[serde(rename = "_data_files_")]
    data_files: &'a [String],
    default_page: &'a IndexMap<String, String>,
    local_permissions: &'a IndexMap<String, Value>,
    local_roles: &'a IndexMap<String, Value>,
    ordering: &'a IndexMap<String, Value>,
    relations: &'a [Relation],
    #[serde(rename = "__processing_default_page__")]
    processing_default_page: BTreeSet<&'a str>,
    #[serde(rename = "__fix_relations__")]
    fix_relations: &'a HashMap<String, String>,
    #[serde(rename = "__seen__")]
    seen: &'a BTreeSet<String>,
}

fn filter_seen<'a, V>(
    data: &'a IndexMap<String, V>,
    seen: &BTreeSet<String>,
) -> IndexMap<&'a str, &'a V> {
    data.iter()
        .filter(|(uid, _)| seen.contains(uid.as_str()))
        .map(|(uid, v)| (uid.as_str(), v))
        .collect()
}

/// Relations with both endpoints resolved to distinct exported uids.
pub fn resolve_relations(state: &RunState) -> Vec<Relation> {
    let fix = &state.metadata.fix_relations;
    let final_uid = |uid: &str| -> Option<String> {
        if uid.is_empty() {
            return None;
        }
        state
            .uids
            .get(uid)
            .or_else(|| fix.get(uid))
            .filter(|resolved| state.seen.contains(resolved.as_str()))
            .cloned()
    };
    state
        .metadata
        .relations
        .iter()
        .filter(|rel| !rel.from_attribute.is_empty())
        .filter_map(|rel| {
            let from_uuid = final_uid(&rel.from_uuid)?;
            let to_uuid = final_uid(&rel.to_uuid)?;
            (from_uuid != to_uuid).then(|| Relation {
                from_attribute: rel.from_attribute.clone(),
                from_uuid,
                to_uuid,
            })
        })
        .collect()
}

/// Sort the exported paths and record the data file list.
pub fn finalize_data_files(state: &mut RunState) {
    state.paths.sort();
    state.metadata.data_files = state
        .paths
        .iter()
        .map(|entry| entry.storage_key.clone())
        .collect();
}

/// Write `content/__metadata__.json`, `relations.json` and, when debugging,
/// `content/__debug_metadata__.json` under `dst`. Returns the metadata file path.
pub fn write_metadata(state: &mut RunState, dst: &Path, settings: &Settings) -> Result<PathBuf> {
    finalize_data_files(state);
    let content_dir = dst.join(OutputLayout::CONTENT_DIR);

    let relations = resolve_relations(state);
    let relations_path = dst.join(OutputLayout::RELATIONS_FILE);
    write_json_file(&relations_path, &relations)?;
    debug!(
        "Wrote {} relations to {}",
        relations.len(),
        relations_path.display()
    );

    let metadata = &state.metadata;
    if settings.is_debug() {
        let debug_path = content_dir.join(OutputLayout::DEBUG_METADATA_FILE);
        write_json_file(
            &debug_path,
            &DebugMetadataFile {
                version: OutputLayout::METADATA_VERSION,
                blob_files: &metadata.blob_files,
                data_files: &metadata.data_files,
                default_page: &metadata.default_page,
                local_permissions: &metadata.local_permissions,
                local_roles: &metadata.local_roles,
                ordering: &metadata.ordering,
                relations: &metadata.relations,
                processing_default_page: metadata
                    .processing_default_page
                    .keys()
                    .map(String::as_str)
                    .collect(),
                fix_relations: &metadata.fix_relations,
                seen: &state.seen,
            },
        )?;
        debug!("Wrote debug metadata to {}", debug_path.display());
    }

    let default_page = if settings.default_pages.keep {
        metadata
            .default_page
            .iter()
            .filter(|(uid, _)| state.seen.contains(uid.as_str()))
            .map(|(uid, page)| (uid.as_str(), page.as_str()))
            .collect()
    } else {
        IndexMap::new()
    };
    let path = content_dir.join(OutputLayout::METADATA_FILE);
    write_json_file(
        &path,
        &MetadataFile {
            version: OutputLayout::METADATA_VERSION,
            blob_files: &metadata.blob_files,
            data_files: &metadata.data_files,
            default_page,
            local_permissions: filter_seen(&metadata.local_permissions, &state.seen),
            local_roles: filter_seen(&metadata.local_roles, &state.seen),
            ordering: filter_seen(&metadata.ordering, &state.seen),
            relations: [],
        },
    )?;
    if !metadata.processing_default_page.is_empty() {
        warn!(
            "{} folders never met their default page",
            metadata.processing_default_page.len()
        );
    }
    info!("Wrote metadata to {}", path.display());
    Ok(path)
}
