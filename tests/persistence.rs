//! Persistence tests: layout and view state surviving engine restarts on the
//! redb-backed store.

use std::collections::HashMap;

use intel_graph::config::EngineConfig;
use intel_graph::corpus::front_matter::FrontMatter;
use intel_graph::corpus::{Corpus, Document};
use intel_graph::engine::Engine;
use intel_graph::graph::NodeId;
use intel_graph::graph::filter::{ConfidenceRange, FilterSpec};
use intel_graph::graph::isolate::IsolateSnapshot;
use intel_graph::graph::metrics::SizingMode;
use intel_graph::layout::{
    LAST_VIEW_KEY, LayoutManager, PhysicsSettings, Position, VIEW_SCHEMA_VERSION, fingerprint,
    migration_flag_key, views_key,
};
use intel_graph::store::{DurableStore, KvStore};

fn corpus() -> Corpus {
    Corpus::new()
        .with_document(Document::new(
            "field/alpha.md",
            FrontMatter::new().with("confidence", 0.9),
            "Met with [[bravo]].",
        ))
        .with_document(Document::new(
            "field/bravo.md",
            FrontMatter::new().with("kind", "entity").with("confidence", 0.6),
            "",
        ))
        .with_document(Document::new(
            "field/charlie.md",
            FrontMatter::new().with("kind", "location").with("confidence", 0.3),
            "Near [alpha](alpha.md).",
        ))
}

fn open(dir: &std::path::Path) -> Engine {
    let config = EngineConfig::default().with_data_dir(dir);
    let mut engine = Engine::new(config);
    engine.rebuild(&corpus());
    engine
}

#[test]
fn view_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let saved_state;
    let view_id;
    {
        let mut engine = open(dir.path());
        engine.apply_filter(FilterSpec {
            confidence_range: ConfidenceRange::new(0.5, 1.0),
            search_query: Some("a".into()),
            ..Default::default()
        });
        engine.set_physics(PhysicsSettings {
            charge: -120.0,
            ..Default::default()
        });
        engine.set_sizing_mode(SizingMode::Confidence);
        engine.apply_isolate("field/alpha.md".into(), 2);
        view_id = engine.save_view("alpha area").unwrap().id;
        saved_state = engine.state().clone();
    }

    // Reopen: the last-applied view is silently restored.
    let mut engine = open(dir.path());
    assert_eq!(engine.views().len(), 1);
    assert_eq!(engine.state(), &saved_state);

    // And applying it explicitly after changes restores it again.
    engine.apply_filter(FilterSpec::default());
    engine.clear_isolate();
    engine.apply_view(&view_id).unwrap();
    assert_eq!(engine.state(), &saved_state);
}

#[test]
fn positions_survive_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut pos = HashMap::new();
    pos.insert(NodeId::from("field/alpha.md"), Position { x: 1.0, y: 2.0 });
    pos.insert(NodeId::from("field/bravo.md"), Position { x: -3.5, y: 0.25 });
    {
        let mut engine = open(dir.path());
        assert!(engine.freeze_layout(pos.clone()));
    }
    {
        let mut engine = open(dir.path());
        assert!(engine.state().layout_frozen);
        assert_eq!(engine.positions(), &pos);
        assert!(engine.reset_layout());
    }
    let engine = open(dir.path());
    assert!(!engine.state().layout_frozen);
    assert!(engine.positions().is_empty());
}

#[test]
fn corpus_change_uses_separate_namespace() {
    let dir = tempfile::TempDir::new().unwrap();
    {
        let mut engine = open(dir.path());
        engine.save_view("first corpus").unwrap();
    }
    let mut engine = Engine::new(EngineConfig::default().with_data_dir(dir.path()));
    let other = corpus().with_document(Document::new("field/delta.md", FrontMatter::new(), ""));
    engine.rebuild(&other);
    assert!(engine.views().is_empty());
    // The pointer names the other corpus, so nothing is re-applied.
    assert_eq!(engine.state().filter, FilterSpec::default());
}

#[test]
fn legacy_views_are_migrated_then_rewritten() {
    let dir = tempfile::TempDir::new().unwrap();
    let ids: Vec<NodeId> = ["field/alpha.md", "field/bravo.md", "field/charlie.md"]
        .iter()
        .map(|s| NodeId::from(*s))
        .collect();
    let fp = fingerprint(&ids);
    {
        let store = DurableStore::open(dir.path()).unwrap();
        let legacy = serde_json::json!([
            {"id": "v-old", "name": "Before upgrade", "filters": {"searchQuery": "bravo"}},
            "garbage",
            {"id": "v-new", "name": "Current", "version": 2,
             "filters": {}, "physics": {}, "sizingMode": "confidence",
             "layoutFrozen": true, "isolate": null,
             "createdAt": "2024-01-01T00:00:00Z"}
        ]);
        store
            .put(&views_key(&fp), legacy.to_string().as_bytes())
            .unwrap();
    }

    {
        let mut engine = open(dir.path());
        assert_eq!(engine.fingerprint(), fp);
        let views = engine.views();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].id, "v-old");
        assert_eq!(views[0].sizing_mode, SizingMode::Degree);
        assert_eq!(views[0].filters.search_query.as_deref(), Some("bravo"));
        assert_eq!(views[1].sizing_mode, SizingMode::Confidence);
        assert!(engine.views_pending_write());

        // Loading alone leaves the stored record untouched.
        assert!(!engine.layout().migration_done(&fp));
        let raw = engine.layout().store().get(&views_key(&fp)).unwrap().unwrap();
        let stored: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(stored.as_array().unwrap().len(), 3);

        // The next write of any kind persists the upgraded form first.
        engine.apply_view("v-old").unwrap();
        assert!(engine.layout().migration_done(&fp));
        assert!(!engine.views_pending_write());
        let raw = engine.layout().store().get(&views_key(&fp)).unwrap().unwrap();
        let stored: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(stored.as_array().unwrap().len(), 2);

        engine.delete_view("v-new").unwrap();
    }

    let store = DurableStore::open(dir.path()).unwrap();
    let raw: serde_json::Value =
        serde_json::from_slice(&store.get(&views_key(&fp)).unwrap().unwrap()).unwrap();
    let entries = raw.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["version"], VIEW_SCHEMA_VERSION);
    assert_eq!(entries[0]["sizingMode"], "degree");
    assert!(store.contains(&migration_flag_key(&fp)).unwrap());
    // Pointer still names the applied view.
    let pointer: serde_json::Value =
        serde_json::from_slice(&store.get(LAST_VIEW_KEY).unwrap().unwrap()).unwrap();
    assert_eq!(pointer["viewId"], "v-old");
}

#[test]
fn migration_adopts_active_isolation() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = DurableStore::open(dir.path()).unwrap();
    store
        .put("fp:views", br#"[{"id": "legacy-1"}]"#)
        .unwrap();
    let manager = LayoutManager::new(Box::new(store));
    let active = IsolateSnapshot {
        root_id: "field/bravo.md".into(),
        depth: 4,
    };
    let load = manager.load_views("fp", Some(&active));
    assert_eq!(load.migrated, 1);
    assert_eq!(load.views[0].isolate.as_ref(), Some(&active));

    // Writing back and reloading is a no-op migration.
    assert!(manager.save_views("fp", &load.views));
    let again = manager.load_views("fp", None);
    assert_eq!(again.migrated, 0);
    assert_eq!(again.views, load.views);
}

#[test]
fn corrupt_store_records_do_not_break_loading() {
    let dir = tempfile::TempDir::new().unwrap();
    let ids: Vec<NodeId> = ["field/alpha.md", "field/bravo.md", "field/charlie.md"]
        .iter()
        .map(|s| NodeId::from(*s))
        .collect();
    let fp = fingerprint(&ids);
    {
        let store = DurableStore::open(dir.path()).unwrap();
        store.put(&views_key(&fp), b"\x00\x01not json").unwrap();
        store.put(&format!("{fp}:positions"), b"[1, 2").unwrap();
        store.put(LAST_VIEW_KEY, b"{}").unwrap();
    }
    let engine = open(dir.path());
    assert!(engine.views().is_empty());
    assert!(engine.positions().is_empty());
    assert_eq!(engine.full_graph().node_count(), 3);
}

#[test]
fn unusable_data_dir_falls_back_to_memory() {
    let dir = tempfile::TempDir::new().unwrap();
    let file = dir.path().join("layout");
    std::fs::write(&file, b"not a directory").unwrap();

    let mut engine = Engine::new(EngineConfig::default().with_data_dir(&file));
    engine.rebuild(&corpus());
    assert_eq!(engine.full_graph().node_count(), 3);

    // Layout state still works for the session.
    let view = engine.save_view("session only").unwrap();
    assert_eq!(engine.views().len(), 1);
    engine.apply_view(&view.id).unwrap();
    assert!(std::fs::metadata(&file).unwrap().is_file());
}

#[test]
fn prefix_scan_lists_fingerprint_records() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut engine = open(dir.path());
    engine.save_view("listed").unwrap();
    let fp = engine.fingerprint().to_string();
    let keys = engine
        .layout()
        .store()
        .keys_with_prefix(&format!("{fp}:"))
        .unwrap();
    assert!(keys.contains(&views_key(&fp)));
    assert!(keys.iter().all(|k| k.starts_with(&fp)));
}

#[test]
fn upgrade_write_happens_once_per_corpus() {
    let dir = tempfile::TempDir::new().unwrap();
    let ids: Vec<NodeId> = ["field/alpha.md", "field/bravo.md", "field/charlie.md"]
        .iter()
        .map(|s| NodeId::from(*s))
        .collect();
    let fp = fingerprint(&ids);
    let legacy = br#"[{"id": "v-legacy", "name": "Legacy"}]"#;
    {
        let store = DurableStore::open(dir.path()).unwrap();
        store.put(&views_key(&fp), legacy).unwrap();
        store
            .put(&migration_flag_key(&fp), VIEW_SCHEMA_VERSION.to_string().as_bytes())
            .unwrap();
    }

    let mut engine = open(dir.path());
    assert_eq!(engine.views()[0].version, VIEW_SCHEMA_VERSION);
    assert!(engine.views_pending_write());

    // The flag is already set: layout writes leave the record alone.
    assert!(engine.reset_layout());
    engine.apply_view("v-legacy").unwrap();
    let raw = engine.layout().store().get(&views_key(&fp)).unwrap().unwrap();
    assert_eq!(raw, legacy.to_vec());
    assert!(engine.views_pending_write());
}
