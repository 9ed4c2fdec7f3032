//! Collection querystring cleanup and the post-processing step that resolves uid references.
//!
//! A query is a list of `{"i": index, "o": operation, "v": value}` objects.

use anyhow::{Result, bail};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::LazyLock;

use crate::Item;
use crate::pipeline::RunState;
use crate::settings::{Settings, TypesSection};
use crate::steps::basic_metadata::is_truthy;
use crate::steps::{StepOutput, keep};

/// Step queued by the collection processor.
pub const POST_PROCESSING_STEP: &str = "process_querystring";

const OPERATION_PREFIX: &str = "plone.app.querystring.operation";

static PATH_UID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"UID##(?P<UID>.*)##").expect("valid uid reference pattern"));

fn operation(name: &str) -> String {
    format!("{OPERATION_PREFIX}.{name}")
}

/// A 32 character id without `/` becomes a `UID##<id>##` reference; a path under the source
/// site root loses the root.
pub fn parse_path_value(value: &str, src_site_root: &str) -> String {
    let path = value.split(':').next().unwrap_or_default();
    if !path.contains('/') && path.chars().count() == 32 {
        value.replace(path, &format!("UID##{path}##"))
    } else if !src_site_root.is_empty() && path.starts_with(src_site_root) {
        value.replace(src_site_root, "")
    } else {
        value.to_string()
    }
}

/// Values in first-seen order without repeats.
fn deduplicate(values: Vec<Value>) -> Vec<Value> {
    let mut unique: Vec<Value> = Vec::with_capacity(values.len());
    for value in values {
        if !unique.contains(&value) {
            unique.push(value);
        }
    }
    unique
}

fn value_as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// The value an operation ends up with.
enum QueryValue {
    /// Keep whatever `v` the query item had.
    Keep,
    Set(Value),
}

fn date_part(value: &Value) -> Value {
    let raw = value_as_string(value);
    Value::String(raw.split('T').next().unwrap_or_default().to_string())
}

fn process_date_between(value: &Value) -> Result<(String, Value)> {
    let Some(values) = value.as_array().filter(|v| v.len() == 2) else {
        bail!("date between operation requires two values, got {value}");
    };
    let (from, to) = (&values[0], &values[1]);
    Ok(match (from.is_null(), to.is_null()) {
        (true, true) => (String::new(), Value::Array(Vec::new())),
        (true, false) => (operation("date.lessThan"), date_part(to)),
        (false, true) => (operation("date.largerThan"), date_part(from)),
        (false, false) => (
            operation("date.between"),
            Value::Array(vec![from.clone(), to.clone()]),
        ),
    })
}

fn process_operation(
    oper: String,
    value: Value,
    src_site_root: &str,
) -> Result<(String, QueryValue, bool)> {
    let oper_name = oper.strip_prefix(OPERATION_PREFIX).unwrap_or_default();
    let processed = match oper_name {
        ".date.afterToday" | ".date.beforeToday" => (oper, QueryValue::Keep, false),
        ".selection.is" | ".selection.any" => {
            let value = match value {
                Value::Array(values) => Value::Array(deduplicate(values)),
                other => other,
            };
            (operation("selection.any"), QueryValue::Set(value), false)
        }
        ".date.between" => {
            let (oper, value) = process_date_between(&value)?;
            (oper, QueryValue::Set(value), false)
        }
        ".string.path" => {
            let raw = value_as_string(&value);
            let oper = if !src_site_root.is_empty() && raw.starts_with(src_site_root) {
                operation("string.absolutePath")
            } else {
                oper
            };
            let parsed = parse_path_value(&raw, src_site_root);
            let needs_uid = parsed.starts_with("UID##");
            (oper, QueryValue::Set(Value::String(parsed)), needs_uid)
        }
        ".date.lessThanRelativeDate" => match value.as_i64() {
            Some(days) if days < 0 => (
                operation("date.largerThanRelativeDate"),
                QueryValue::Set(Value::from(days.unsigned_abs())),
                false,
            ),
            _ => (oper, QueryValue::Set(value), false),
        },
        _ => (oper, QueryValue::Set(value), false),
    };
    Ok(processed)
}

fn fix_portal_types(value: &Value, types: &TypesSection) -> Value {
    let mapped: Vec<Value> = value
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .filter_map(|t| types.portal_type_for(t))
        .filter(|t| !t.trim().is_empty())
        .map(|t| Value::String(t.to_string()))
        .collect();
    Value::Array(mapped)
}

fn process_subjects(value: &Value) -> Value {
    let subjects: BTreeSet<&str> = value
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .collect();
    Value::Array(
        subjects
            .into_iter()
            .map(|s| Value::String(s.to_string()))
            .collect(),
    )
}

/// Clean one query item. `None` when it ends up without an operation or a value.
/// The flag is true when the value references a uid that must be resolved later.
pub fn cleanup_querystring_item(
    mut item: Map<String, Value>,
    src_site_root: &str,
    types: &TypesSection,
) -> Result<(Option<Map<String, Value>>, bool)> {
    let index = item.get("i").and_then(Value::as_str).unwrap_or_default();
    let oper = item
        .get("o")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let raw_value = item.get("v").cloned().unwrap_or(Value::Null);
    let value = match index {
        "portal_type" => fix_portal_types(&raw_value, types),
        "section" => Value::Null,
        "Subject" => process_subjects(&raw_value),
        _ => raw_value,
    };
    let (oper, value, needs_uid) = process_operation(oper, value, src_site_root)?;
    let keep_item = match &value {
        QueryValue::Keep => !oper.is_empty(),
        QueryValue::Set(v) => !oper.is_empty() && is_truthy(v),
    };
    if !keep_item {
        return Ok((None, needs_uid));
    }
    if let QueryValue::Set(v) = value {
        item.insert("v".to_string(), v);
    }
    item.insert("o".to_string(), Value::String(oper));
    Ok((Some(item), needs_uid))
}

/// Clean a whole query. Returns the cleaned query and whether post-processing is needed.
pub fn cleanup_querystring(
    query: &[Value],
    src_site_root: &str,
    types: &TypesSection,
) -> Result<(Vec<Value>, bool)> {
    let mut needs_post_processing = false;
    let mut cleaned = Vec::with_capacity(query.len());
    for entry in query {
        let Value::Object(entry) = entry else {
            continue;
        };
        let (entry, needs_uid) = cleanup_querystring_item(entry.clone(), src_site_root, types)?;
        if let Some(entry) = entry {
            needs_post_processing |= needs_uid;
            cleaned.push(Value::Object(entry));
        }
    }
    Ok((cleaned, needs_post_processing))
}

/// Replace `UID##<uid>##` path references with the exported path of that uid, or the bare uid
/// when it was never exported.
pub fn post_process_querystring(query: &[Value], state: &RunState) -> Vec<Value> {
    let path_oper = operation("string.path");
    let mut processed = Vec::with_capacity(query.len());
    for entry in query {
        let Value::Object(entry) = entry else {
            continue;
        };
        let mut entry = entry.clone();
        let mut value = entry.get("v").cloned().unwrap_or(Value::Null);
        if entry.get("o").and_then(Value::as_str) == Some(path_oper.as_str()) {
            let raw = value_as_string(&value);
            if let Some(uid) = PATH_UID_PATTERN
                .captures(&raw)
                .filter(|c| c.get(0).is_some_and(|m| m.start() == 0))
                .and_then(|c| c.name("UID"))
                .map(|m| m.as_str().to_string())
            {
                let target = state.uid_path.get(&uid).cloned().unwrap_or(uid);
                let replaced = PATH_UID_PATTERN.replace_all(&raw, regex::NoExpand(&target));
                value = Value::String(replaced.into_owned());
            }
        }
        if is_truthy(&value) {
            entry.insert("v".to_string(), value);
            processed.push(Value::Object(entry));
        }
    }
    processed
}

fn post_process_query_at(target: &mut Value, state: &RunState) {
    if let Some(query) = target.as_array().filter(|q| !q.is_empty()) {
        *target = Value::Array(post_process_querystring(query, state));
    }
}

/// Resolve uid references in `query` and in the listing blocks' querystrings.
pub fn process_querystring(
    mut item: Item,
    state: &mut RunState,
    _settings: &Settings,
) -> Result<StepOutput> {
    if let Some(query) = item.get_mut("query") {
        post_process_query_at(query, state);
    }
    if let Some(Value::Object(blocks)) = item.get_mut("blocks") {
        for block in blocks.values_mut() {
            if let Some(query) = block
                .get_mut("querystring")
                .and_then(|qs| qs.get_mut("query"))
            {
                post_process_query_at(query, state);
            }
        }
    }
    keep(item)
}
