use serde_json::{Value, json};
use std::sync::Arc;
use transmute::engine::{Metadata, MemoryStorage};
use transmute::pipeline::{Orchestrator, PipelineRun, RunState};
use transmute::steps::{drop_item, keep};
use transmute::{Item, ItemExt, Keys, Settings, SourceItem, Step, StepRegistry, TransmuteError};

fn item_from(value: Value) -> Item {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

fn content(path: &str, uid: &str, folderish: bool) -> Item {
    item_from(json!({
        "@id": path,
        "@type": "Document",
        "UID": uid,
        "is_folderish": folderish,
    }))
}

fn settings_for(steps: &[&str], allowed: &[&str], exempt: &[&str]) -> Settings {
    let source = format!(
        "[pipeline]\nsteps = {steps:?}\ndo_not_add_drop = {exempt:?}\n\n\
         [paths.filter]\nallowed = {allowed:?}\n"
    );
    Settings::from_toml_str(&source).unwrap()
}

fn run_items(
    registry: &StepRegistry,
    settings: &Settings,
    items: Vec<Item>,
) -> anyhow::Result<(RunState, MemoryStorage)> {
    let mut state = RunState::new(items.len(), settings, Metadata::default());
    let mut storage = MemoryStorage::default();
    let sources = items.into_iter().enumerate().map(|(idx, item)| {
        Ok(SourceItem {
            filename: format!("{idx}.json"),
            item,
        })
    });
    Orchestrator::new(registry, settings, &mut storage).run(sources, &mut state)?;
    Ok((state, storage))
}

fn path_of(item: &Item) -> &str {
    item.path().unwrap()
}

/// Drops items outside the valid paths, and `/site/x` itself.
fn filter_registry() -> StepRegistry {
    let mut registry = StepRegistry::default();
    registry.register_fn("filter_x", |item, state, _settings| {
        if !state.drops.is_valid_path(path_of(&item)) || path_of(&item) == "/site/x" {
            return drop_item();
        }
        keep(item)
    });
    registry
}

#[test]
fn test_dropped_folder_cascades_to_descendants() {
    let settings = settings_for(&["filter_x"], &["/site"], &[]);
    let items = vec![
        content("/site/x", "a", true),
        content("/site/x/y", "b", false),
        content("/site/z", "c", false),
    ];
    let (state, storage) = run_items(&filter_registry(), &settings, items).unwrap();

    assert_eq!(state.seen.iter().collect::<Vec<_>>(), vec!["c"]);
    assert_eq!(state.dropped.get("filter_x"), Some(&2));
    assert_eq!(state.processed, 3);
    assert!(state.drops.is_dropped("/site/x/y"));
    assert_eq!(storage.len(), 1);
    let dropped_rows: Vec<&str> = state
        .path_transforms
        .iter()
        .filter(|row| row.dst_path == "--")
        .map(|row| row.src_uid.as_str())
        .collect();
    assert_eq!(dropped_rows, vec!["a", "b"]);
}

#[test]
fn test_exempt_step_does_not_cascade() {
    let settings = settings_for(&["filter_x"], &["/site"], &["filter_x"]);
    let items = vec![
        content("/site/x", "a", true),
        content("/site/x/y", "b", false),
    ];
    let (state, _) = run_items(&filter_registry(), &settings, items).unwrap();
    assert!(state.seen.contains("b"));
    assert!(!state.seen.contains("a"));
    assert!(state.drops.dropped().is_empty());
}

#[test]
fn test_non_folderish_drop_does_not_cascade() {
    let settings = settings_for(&["filter_x"], &["/site"], &[]);
    let items = vec![
        content("/site/x", "a", false),
        content("/site/x/y", "b", false),
    ];
    let (state, _) = run_items(&filter_registry(), &settings, items).unwrap();
    assert!(state.seen.contains("b"));
}

fn fan_out_registry() -> StepRegistry {
    let mut registry = StepRegistry::default();
    registry
        .register_fn("stamp", |mut item, _state, _settings| {
            let count = item.get("stamped").and_then(Value::as_u64).unwrap_or(0);
            item.insert("stamped".to_string(), json!(count + 1));
            keep(item)
        })
        .register_fn("split", |item, _state, _settings| {
            if item.uid()? != "d" {
                return keep(item);
            }
            let mut image = content("/site/d/e", "e", false);
            image.insert(Keys::IS_NEW_ITEM.to_string(), Value::Bool(true));
            Ok(vec![Some(image), Some(item)])
        })
        .register_fn("finish", |mut item, _state, _settings| {
            item.insert("finished".to_string(), Value::Bool(true));
            keep(item)
        });
    registry
}

#[test]
fn test_fan_out_accounting_and_order() {
    let settings = settings_for(&["stamp", "split", "finish"], &[], &[]);
    let items = vec![content("/site/d", "d", true)];
    let (state, storage) = run_items(&fan_out_registry(), &settings, items).unwrap();

    assert_eq!(state.total, 2);
    assert_eq!(state.processed, 2);
    assert_eq!(state.exported.get("Document"), Some(&2));

    let rows: Vec<(&str, &str, &str)> = state
        .path_transforms
        .iter()
        .map(|row| (row.src_uid.as_str(), row.dst_uid.as_str(), row.last_step.as_str()))
        .collect();
    assert_eq!(rows, vec![("--", "e", "finish"), ("d", "d", "finish")]);
    assert_eq!(state.path_transforms[0].src_path, "/site/d");
    assert_eq!(state.path_transforms[0].src_type, "--");

    let new_item = storage.get("e/data.json").unwrap();
    assert_eq!(new_item["stamped"], 1);
    assert_eq!(new_item["finished"], true);
    assert!(!new_item.contains_key(Keys::IS_NEW_ITEM));
    let parent = storage.get("d/data.json").unwrap();
    assert_eq!(parent["stamped"], 1);
}

#[test]
fn test_pipeline_run_yields_fan_out_before_parent() {
    let registry = fan_out_registry();
    let settings = settings_for(&["stamp", "split", "finish"], &[], &[]);
    let steps: Vec<Arc<dyn Step>> = registry.resolve_all(&settings.pipeline.steps).unwrap();
    let mut state = RunState::new(1, &settings, Metadata::default());
    let mut run = PipelineRun::new(&steps, content("/site/d", "d", true));

    let first = run.next_terminal(&mut state, &settings).unwrap().unwrap();
    assert!(first.is_new);
    assert_eq!(first.item.as_ref().map(path_of), Some("/site/d/e"));
    let second = run.next_terminal(&mut state, &settings).unwrap().unwrap();
    assert!(!second.is_new);
    assert_eq!(second.uid.as_deref(), Some("d"));
    assert!(run.next_terminal(&mut state, &settings).unwrap().is_none());
}

#[test]
fn test_steps_after_drop_are_skipped() {
    let mut registry = StepRegistry::default();
    registry
        .register_fn("drop_all", |_item, _state, _settings| drop_item())
        .register_fn("explode", |_item, _state, _settings| {
            anyhow::bail!("must not run on a dropped item")
        });
    let settings = settings_for(&["drop_all", "explode"], &[], &[]);
    let (state, storage) =
        run_items(&registry, &settings, vec![content("/site/a", "a", false)]).unwrap();
    assert!(storage.is_empty());
    assert_eq!(state.path_transforms[0].last_step, "drop_all");
    assert_eq!(state.dropped.get("drop_all"), Some(&1));
}

#[test]
fn test_superseded_uid_keeps_queued_work() {
    let mut registry = StepRegistry::default();
    registry
        .register_fn("queue", |item, state, _settings| {
            state.enqueue_post_processing(item.uid()?, "touch");
            keep(item)
        })
        .register_fn("rename", |mut item, _state, _settings| {
            if item.uid()? == "t" {
                item.insert(Keys::OLD_UID.to_string(), json!("t"));
                item.insert(Keys::UID.to_string(), json!("u"));
            }
            keep(item)
        })
        .register_fn("touch", |mut item, _state, _settings| {
            item.insert("touched".to_string(), Value::Bool(true));
            keep(item)
        });
    let settings = settings_for(&["queue", "rename"], &[], &[]);
    let (state, storage) =
        run_items(&registry, &settings, vec![content("/site/t", "t", false)]).unwrap();

    assert_eq!(state.uids.get("t").map(String::as_str), Some("u"));
    assert_eq!(state.uids.get("u").map(String::as_str), Some("u"));
    assert_eq!(state.uid_path.get("t").map(String::as_str), Some("/site/t"));
    assert!(state.post_processing.is_empty());
    let stored = storage.get("u/data.json").unwrap();
    assert_eq!(stored["touched"], true);
    assert!(!stored.contains_key(Keys::OLD_UID));
}

#[test]
fn test_post_processing_drop_removes_export() {
    let mut registry = StepRegistry::default();
    registry
        .register_fn("queue", |item, state, _settings| {
            if item.uid()? == "x" {
                state.enqueue_post_processing("x", "discard");
            }
            keep(item)
        })
        .register_fn("discard", |_item, _state, _settings| drop_item());
    let settings = settings_for(&["queue"], &[], &[]);
    let items = vec![content("/site/x", "x", false), content("/site/y", "y", false)];
    let (state, storage) = run_items(&registry, &settings, items).unwrap();

    assert!(!state.seen.contains("x"));
    assert!(state.paths.iter().all(|entry| entry.uid != "x"));
    assert!(storage.get("x/data.json").is_none());
    assert!(storage.get("y/data.json").is_some());
    assert_eq!(state.exported.get("Document"), Some(&1));
    assert_eq!(state.dropped.get("discard"), Some(&1));
    let row = &state.path_transforms[0];
    assert_eq!(row.src_uid, "x");
    assert_eq!(row.dst_uid, "--");
    assert_eq!(row.last_step, "discard");
}

#[test]
fn test_post_processing_fan_out_is_exported() {
    let mut registry = StepRegistry::default();
    registry
        .register_fn("queue", |item, state, _settings| {
            state.enqueue_post_processing(item.uid()?, "spawn");
            keep(item)
        })
        .register_fn("spawn", |mut item, _state, _settings| {
            let mut spawned = content("/site/a/n", "n", false);
            spawned.insert(Keys::IS_NEW_ITEM.to_string(), Value::Bool(true));
            item.insert("spawned".to_string(), Value::Bool(true));
            Ok(vec![Some(spawned), Some(item)])
        });
    let settings = settings_for(&["queue"], &[], &[]);
    let (state, storage) =
        run_items(&registry, &settings, vec![content("/site/a", "a", true)]).unwrap();

    assert!(state.seen.contains("a"));
    assert!(state.seen.contains("n"));
    let entry = state.paths.iter().find(|entry| entry.uid == "n").unwrap();
    assert_eq!(entry.path, "/site/a/n");
    assert_eq!(entry.storage_key, "n/data.json");
    assert_eq!(state.uid_path.get("n").map(String::as_str), Some("/site/a/n"));
    assert_eq!(state.exported.get("Document"), Some(&2));

    let spawned = storage.get("n/data.json").unwrap();
    assert!(!spawned.contains_key(Keys::IS_NEW_ITEM));
    assert_eq!(storage.get("a/data.json").unwrap()["spawned"], true);
    assert!(state.post_processing.is_empty());
}

#[test]
fn test_post_processing_skips_unexported_uid() {
    let mut registry = StepRegistry::default();
    registry.register_fn("queue", |item, state, _settings| {
        state.enqueue_post_processing("ghost", "touch");
        keep(item)
    });
    let settings = settings_for(&["queue"], &[], &[]);
    let (state, _) =
        run_items(&registry, &settings, vec![content("/site/a", "a", false)]).unwrap();
    assert!(state.post_processing.is_empty());
    assert!(state.seen.contains("a"));
}

#[test]
fn test_dropped_item_loses_queued_work() {
    let mut registry = StepRegistry::default();
    registry
        .register_fn("queue", |item, state, _settings| {
            state.enqueue_post_processing(item.uid()?, "not_registered");
            keep(item)
        })
        .register_fn("drop_all", |_item, _state, _settings| drop_item());
    let settings = settings_for(&["queue", "drop_all"], &[], &[]);
    let (state, _) =
        run_items(&registry, &settings, vec![content("/site/a", "a", false)]).unwrap();
    assert!(state.post_processing.is_empty());
}

#[test]
fn test_unknown_step_fails_before_processing() {
    let settings = settings_for(&["missing_step"], &[], &[]);
    let err = run_items(
        &StepRegistry::default(),
        &settings,
        vec![content("/a", "a", false)],
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<TransmuteError>(),
        Some(TransmuteError::UnknownStep(name)) if name == "missing_step"
    ));
}

#[test]
fn test_item_without_path_is_an_error() {
    let mut registry = StepRegistry::default();
    registry.register_fn("noop", |item, _state, _settings| keep(item));
    let settings = settings_for(&["noop"], &[], &[]);
    let broken = item_from(json!({"@type": "Document", "UID": "a"}));
    assert!(run_items(&registry, &settings, vec![broken]).is_err());
}

#[test]
fn test_runs_are_deterministic() {
    let settings = Settings::defaults().unwrap();
    let registry = StepRegistry::builtin();
    let items = || {
        vec![
            item_from(json!({
                "@id": "http://localhost:8080/Plone/news", "@type": "Folder", "UID": "n",
                "title": " News ", "is_folderish": true, "review_state": "published",
            })),
            item_from(json!({
                "@id": "http://localhost:8080/Plone/news/a b", "@type": "News Item", "UID": "a",
                "title": "", "creators": ["admin"],
            })),
            item_from(json!({
                "@id": "http://localhost:8080/Plone/odd", "@type": "Weird", "UID": "w",
            })),
        ]
    };
    let (first, first_storage) = run_items(&registry, &settings, items()).unwrap();
    let (second, second_storage) = run_items(&registry, &settings, items()).unwrap();

    assert_eq!(first.path_transforms, second.path_transforms);
    assert_eq!(first.seen, second.seen);
    assert_eq!(first_storage.items(), second_storage.items());
    assert_eq!(first.dropped.get("process_type"), Some(&1));

    let news = first_storage.get("a/data.json").unwrap();
    assert_eq!(news[Keys::PATH], "/news/a_b");
    assert_eq!(news["title"], "a_b");
    assert_eq!(news["creators"], json!(["Plone"]));
    assert!(!news.contains_key(Keys::REPORT_PATH));
    assert_eq!(first.path_transforms[1].src_path, "/news/a b");
}
