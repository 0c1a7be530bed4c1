//! Engine facade: top-level API for intel-graph.
//!
//! The `Engine` owns the full graph derived from the current corpus, the
//! active [`ViewState`], the metrics cache, the layout manager and the
//! listener set. Every operation runs the pipeline synchronously:
//!
//! ```text
//! corpus ──build──▶ full graph ──filter──▶ filtered ──metrics──▶ sized
//!                                                        └──isolate──▶ visible
//! ```
//!
//! Persistence is best effort. In-memory state stays authoritative when the
//! layout store fails.
//!
//! ```no_run
//! use intel_graph::corpus::{CorpusSource, MarkdownDir};
//! use intel_graph::engine::Engine;
//! use intel_graph::config::EngineConfig;
//!
//! let corpus = MarkdownDir::new("notes").load().unwrap();
//! let mut engine = Engine::new(EngineConfig::default());
//! engine.rebuild(&corpus);
//! let view = engine.graph_view();
//! println!("{} nodes, {} edges", view.node_count, view.edge_count);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::corpus::Corpus;
use crate::error::EngineError;
use crate::events::{EventListener, GraphEvent, Listeners};
use crate::graph::builder::{BuildDiagnostics, build_graph};
use crate::graph::filter::{FilterSpec, FilteredGraph, TimeRange, apply_filter};
use crate::graph::isolate::{IsolationState, isolate};
use crate::graph::metrics::{MetricsCache, MetricsSummary, SizingMode, apply_sizes};
use crate::graph::{Edge, EdgeId, GraphData, Node, NodeId};
use crate::layout::{
    LastAppliedView, LayoutManager, PhysicsSettings, Position, SavedView, VIEW_SCHEMA_VERSION,
    fingerprint,
};
use crate::store::{KvStore, MemStore, open_store};

/// Everything a saved view captures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    pub filter: FilterSpec,
    pub physics: PhysicsSettings,
    pub sizing_mode: SizingMode,
    pub layout_frozen: bool,
    pub isolation: IsolationState,
}

/// Render payload: the visible graph plus what the host needs to draw it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphView {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub physics: PhysicsSettings,
    pub node_count: usize,
    pub edge_count: usize,
    /// Timestamps of the visible nodes, in node order.
    pub timestamps: Vec<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    pub isolation: IsolationState,
    pub sizing_mode: SizingMode,
    pub layout_frozen: bool,
}

/// The intel-graph engine.
pub struct Engine {
    config: EngineConfig,
    layout: LayoutManager,
    full: Arc<GraphData>,
    diagnostics: BuildDiagnostics,
    fingerprint: String,
    state: ViewState,
    filtered: FilteredGraph,
    isolated: Option<GraphData>,
    metrics: MetricsCache,
    views: Vec<SavedView>,
    /// Loaded views differ from the stored record (legacy or dropped entries).
    views_dirty: bool,
    positions: HashMap<NodeId, Position>,
    listeners: Listeners,
}

impl Engine {
    /// Create an engine, opening the layout store named by `config.data_dir`.
    ///
    /// A store that cannot be opened is replaced by an in-memory one, so layout
    /// state still works for the session but is not persisted.
    pub fn new(config: EngineConfig) -> Self {
        let store = open_store(config.data_dir.as_deref()).unwrap_or_else(|e| {
            tracing::warn!(
                data_dir = ?config.data_dir,
                error = %e,
                "layout store unavailable, falling back to memory"
            );
            Box::new(MemStore::new())
        });
        tracing::info!(
            data_dir = ?config.data_dir,
            max_nodes = config.build.max_nodes,
            "engine initialized"
        );
        Self::with_store(config, store)
    }

    /// Create an engine over an explicit store backend.
    pub fn with_store(config: EngineConfig, store: Box<dyn KvStore>) -> Self {
        Self {
            config,
            layout: LayoutManager::new(store),
            full: Arc::new(GraphData::default()),
            diagnostics: BuildDiagnostics::default(),
            fingerprint: fingerprint(std::iter::empty()),
            state: ViewState::default(),
            filtered: FilteredGraph::default(),
            isolated: None,
            metrics: MetricsCache::new(),
            views: Vec::new(),
            views_dirty: false,
            positions: HashMap::new(),
            listeners: Listeners::new(),
        }
    }

    pub fn subscribe(&mut self, listener: Arc<dyn EventListener>) {
        self.listeners.subscribe(listener);
    }

    // -----------------------------------------------------------------------
    // Corpus lifecycle
    // -----------------------------------------------------------------------

    /// Rebuild the full graph from `corpus` and reload its persisted state.
    ///
    /// When the last-applied view belongs to this corpus it is re-applied
    /// without touching the pointer.
    pub fn rebuild(&mut self, corpus: &Corpus) -> &BuildDiagnostics {
        let output = build_graph(corpus, &self.config.build);
        let previous = std::mem::take(&mut self.fingerprint);

        self.full = Arc::new(output.graph);
        self.diagnostics = output.diagnostics;
        self.fingerprint = fingerprint(self.full.node_ids());
        self.metrics.invalidate();

        let stored = self.layout.load_positions(&self.fingerprint);
        if !stored.is_empty() {
            self.positions = stored;
            self.state.layout_frozen = true;
        } else {
            self.state.layout_frozen = false;
            if previous != self.fingerprint {
                self.positions.clear();
            }
        }

        let load = self
            .layout
            .load_views(&self.fingerprint, self.state.isolation.snapshot().as_ref());
        self.views_dirty = load.needs_write();
        self.views = load.views;

        tracing::info!(
            fingerprint = %self.fingerprint,
            nodes = self.full.node_count(),
            edges = self.full.edge_count(),
            views = self.views.len(),
            "corpus loaded"
        );

        let restored = self
            .layout
            .last_applied()
            .filter(|p| p.fingerprint == self.fingerprint)
            .and_then(|p| {
                let view = self.views.iter().find(|v| v.id == p.view_id).cloned();
                if view.is_none() {
                    tracing::debug!(view_id = %p.view_id, "last-applied view no longer exists");
                }
                view
            });
        match restored {
            Some(view) => {
                tracing::debug!(view_id = %view.id, "re-applying last view");
                self.apply_view_state(&view);
            }
            None => self.recompute_filtered(),
        }

        &self.diagnostics
    }

    // -----------------------------------------------------------------------
    // Pipeline
    // -----------------------------------------------------------------------

    fn recompute_filtered(&mut self) {
        let mut filtered = apply_filter(&self.full, &self.state.filter);
        let recomputed =
            self.metrics
                .update(&mut filtered.graph, &self.state.filter, self.state.sizing_mode);
        self.filtered = filtered;
        if recomputed {
            self.listeners
                .emit(GraphEvent::MetricsUpdated(self.metrics.summary().clone()));
        }
        self.recompute_isolated();
    }

    fn recompute_isolated(&mut self) {
        self.isolated = match (&self.state.isolation.root_id, self.state.isolation.active) {
            (Some(root), true) => Some(isolate(
                &self.filtered.graph,
                root,
                self.state.isolation.depth as usize,
            )),
            _ => None,
        };
    }

    pub fn apply_filter(&mut self, spec: FilterSpec) {
        self.state.filter = spec;
        self.recompute_filtered();
    }

    /// Restrict the visible graph to `depth` hops around `root`.
    ///
    /// Depth is clamped to the supported range. An unknown root yields an
    /// empty visible graph.
    pub fn apply_isolate(&mut self, root: NodeId, depth: usize) {
        self.state.isolation = IsolationState::activate(root, depth);
        self.recompute_isolated();
        self.listeners.emit(GraphEvent::IsolateStateChanged(
            self.state.isolation.clone(),
        ));
    }

    /// Leave isolation, keeping the chosen depth for the next activation.
    pub fn clear_isolate(&mut self) {
        let depth = self.state.isolation.depth;
        self.state.isolation = IsolationState::from_snapshot(None, depth);
        self.isolated = None;
        self.listeners.emit(GraphEvent::IsolateStateChanged(
            self.state.isolation.clone(),
        ));
    }

    pub fn set_sizing_mode(&mut self, mode: SizingMode) {
        if self.state.sizing_mode == mode {
            return;
        }
        self.state.sizing_mode = mode;
        apply_sizes(&mut self.filtered.graph, mode);
        if let Some(iso) = self.isolated.as_mut() {
            apply_sizes(iso, mode);
        }
    }

    pub fn set_physics(&mut self, physics: PhysicsSettings) {
        self.state.physics = physics;
    }

    // -----------------------------------------------------------------------
    // Layout
    // -----------------------------------------------------------------------

    /// Replace the in-memory positions and persist them. Returns whether the write landed.
    pub fn save_layout(&mut self, positions: HashMap<NodeId, Position>) -> bool {
        self.positions = positions;
        self.flush_view_upgrade();
        self.layout.save_positions(&self.fingerprint, &self.positions)
    }

    /// Persist `positions` and pin the layout.
    pub fn freeze_layout(&mut self, positions: HashMap<NodeId, Position>) -> bool {
        self.state.layout_frozen = true;
        self.save_layout(positions)
    }

    /// Unpin the layout and clear the stored record. Coordinates stay in memory as a seed.
    pub fn reset_layout(&mut self) -> bool {
        self.state.layout_frozen = false;
        self.flush_view_upgrade();
        self.layout.clear_positions(&self.fingerprint)
    }

    // -----------------------------------------------------------------------
    // Saved views
    // -----------------------------------------------------------------------

    /// Capture the current view state under `name` and make it the last-applied view.
    pub fn save_view(&mut self, name: &str) -> Result<SavedView, EngineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::EmptyViewName);
        }
        let now = Utc::now();
        let view = SavedView {
            id: self.next_view_id(now),
            name: name.to_string(),
            filters: self.state.filter.clone(),
            physics: self.state.physics,
            sizing_mode: self.state.sizing_mode,
            layout_frozen: self.state.layout_frozen,
            isolate: self.state.isolation.snapshot(),
            created_at: now,
            version: VIEW_SCHEMA_VERSION,
        };
        self.views.push(view.clone());
        self.persist_views();
        self.layout.set_last_applied(&LastAppliedView {
            fingerprint: self.fingerprint.clone(),
            view_id: view.id.clone(),
        });
        tracing::info!(view_id = %view.id, name = %view.name, "saved view");
        Ok(view)
    }

    /// Restore a saved view. All of its state is applied before the pipeline reruns.
    pub fn apply_view(&mut self, view_id: &str) -> Result<(), EngineError> {
        let view = self
            .views
            .iter()
            .find(|v| v.id == view_id)
            .cloned()
            .ok_or_else(|| EngineError::ViewNotFound {
                view_id: view_id.to_string(),
            })?;
        self.apply_view_state(&view);
        self.flush_view_upgrade();
        self.layout.set_last_applied(&LastAppliedView {
            fingerprint: self.fingerprint.clone(),
            view_id: view.id,
        });
        Ok(())
    }

    pub fn delete_view(&mut self, view_id: &str) -> Result<(), EngineError> {
        let before = self.views.len();
        self.views.retain(|v| v.id != view_id);
        if self.views.len() == before {
            return Err(EngineError::ViewNotFound {
                view_id: view_id.to_string(),
            });
        }
        self.persist_views();
        let points_here = self
            .layout
            .last_applied()
            .is_some_and(|p| p.fingerprint == self.fingerprint && p.view_id == view_id);
        if points_here {
            self.layout.clear_last_applied();
        }
        Ok(())
    }

    fn apply_view_state(&mut self, view: &SavedView) {
        let isolation =
            IsolationState::from_snapshot(view.isolate.as_ref(), self.state.isolation.depth);
        let isolation_changed = isolation != self.state.isolation;

        self.state = ViewState {
            filter: view.filters.clone(),
            physics: view.physics,
            sizing_mode: view.sizing_mode,
            layout_frozen: view.layout_frozen,
            isolation,
        };
        self.recompute_filtered();

        if isolation_changed {
            self.listeners.emit(GraphEvent::IsolateStateChanged(
                self.state.isolation.clone(),
            ));
        }
    }

    /// Write views upgraded at load time, once per corpus.
    ///
    /// Runs ahead of any other store write. Once the migration flag is set the
    /// upgrade is not written again; later collection writes still persist it.
    fn flush_view_upgrade(&mut self) {
        if self.views_dirty && !self.layout.migration_done(&self.fingerprint) {
            tracing::info!(fingerprint = %self.fingerprint, "writing upgraded saved views");
            self.persist_views();
        }
    }

    fn persist_views(&mut self) {
        if self.layout.save_views(&self.fingerprint, &self.views) {
            self.views_dirty = false;
        }
    }

    fn next_view_id(&self, now: DateTime<Utc>) -> String {
        let base = format!("view-{}", now.timestamp_millis());
        if !self.views.iter().any(|v| v.id == base) {
            return base;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{base}-{n}");
            if !self.views.iter().any(|v| v.id == candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Announce a node selection. Returns `false` for ids not in the full graph.
    pub fn select_node(&self, id: &NodeId) -> bool {
        if !self.full.contains_node(id) {
            return false;
        }
        self.listeners.emit(GraphEvent::NodeSelected(id.clone()));
        true
    }

    pub fn select_edge(&self, id: &EdgeId) -> bool {
        if !self.full.edges.iter().any(|e| &e.id == id) {
            return false;
        }
        self.listeners.emit(GraphEvent::EdgeSelected(id.clone()));
        true
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The graph currently shown: the isolated subgraph while isolation is active.
    pub fn visible(&self) -> &GraphData {
        self.isolated.as_ref().unwrap_or(&self.filtered.graph)
    }

    pub fn graph_view(&self) -> GraphView {
        let visible = self.visible();
        GraphView {
            nodes: visible.nodes.clone(),
            edges: visible.edges.clone(),
            physics: self.state.physics,
            node_count: visible.node_count(),
            edge_count: visible.edge_count(),
            timestamps: visible.timestamps(),
            time_range: self.filtered.time_range,
            isolation: self.state.isolation.clone(),
            sizing_mode: self.state.sizing_mode,
            layout_frozen: self.state.layout_frozen,
        }
    }

    pub fn full_graph(&self) -> Arc<GraphData> {
        Arc::clone(&self.full)
    }

    pub fn filtered_graph(&self) -> &GraphData {
        &self.filtered.graph
    }

    /// Summary for the filtered graph.
    pub fn metrics(&self) -> &MetricsSummary {
        self.metrics.summary()
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn views(&self) -> &[SavedView] {
        &self.views
    }

    /// Whether the loaded views still need their upgrade write.
    pub fn views_pending_write(&self) -> bool {
        self.views_dirty
    }

    pub fn positions(&self) -> &HashMap<NodeId, Position> {
        &self.positions
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn diagnostics(&self) -> &BuildDiagnostics {
        &self.diagnostics
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn layout(&self) -> &LayoutManager {
        &self.layout
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("fingerprint", &self.fingerprint)
            .field("nodes", &self.full.node_count())
            .field("edges", &self.full.edge_count())
            .field("views", &self.views.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::front_matter::FrontMatter;
    use crate::corpus::{Document, Relationship};
    use crate::graph::NodeKind;
    use crate::graph::isolate::IsolateSnapshot;
    use crate::layout::views_key;
    use crate::store::MemStore;
    use std::sync::Mutex;

    fn corpus() -> Corpus {
        Corpus::new()
            .with_document(Document::new(
                "a.md",
                FrontMatter::new().with("kind", "entity").with("confidence", 0.9),
                "Links to [[b]].",
            ))
            .with_document(Document::new(
                "b.md",
                FrontMatter::new().with("confidence", 0.7),
                "See [c](c.md).",
            ))
            .with_document(Document::new(
                "c.md",
                FrontMatter::new().with("kind", "location").with("confidence", 0.4),
                "",
            ))
            .with_document(Document::new("lonely.md", FrontMatter::new(), ""))
    }

    fn engine() -> Engine {
        let mut engine = Engine::with_store(EngineConfig::default(), Box::new(MemStore::new()));
        engine.rebuild(&corpus());
        engine
    }

    #[test]
    fn rebuild_runs_full_pipeline() {
        let engine = engine();
        assert_eq!(engine.full_graph().node_count(), 4);
        assert_eq!(engine.full_graph().edge_count(), 2);
        let b = engine.visible().node(&"b.md".into()).unwrap();
        assert_eq!(b.degree, 2);
        assert!(b.size > 8.0);
        assert_eq!(engine.metrics().max_degree, 2);
    }

    #[test]
    fn filter_then_isolate() {
        let mut engine = engine();
        engine.apply_filter(FilterSpec {
            confidence_range: crate::graph::filter::ConfidenceRange::new(0.5, 1.0),
            ..Default::default()
        });
        // c.md (0.4) is gone, and so is b->c.
        assert_eq!(engine.visible().node_count(), 3);
        assert_eq!(engine.visible().edge_count(), 1);

        engine.apply_isolate("a.md".into(), 3);
        let ids: Vec<&str> = engine.visible().nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a.md", "b.md"]);

        engine.clear_isolate();
        assert_eq!(engine.visible().node_count(), 3);
        assert_eq!(engine.state().isolation.depth, 3);
    }

    #[test]
    fn isolate_unknown_root_is_empty() {
        let mut engine = engine();
        engine.apply_isolate("nope.md".into(), 2);
        assert!(engine.visible().is_empty());
        assert!(engine.graph_view().edges.is_empty());
    }

    #[test]
    fn sizing_mode_switch() {
        let mut engine = engine();
        engine.set_sizing_mode(SizingMode::Confidence);
        let a = engine.visible().node(&"a.md".into()).unwrap();
        assert!((a.size - (8.0 + 0.9 * 26.0)).abs() < 1e-4);
    }

    #[test]
    fn events_are_emitted() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut engine = Engine::with_store(EngineConfig::default(), Box::new(MemStore::new()));
        let log = Arc::clone(&seen);
        engine.subscribe(Arc::new(move |e: &GraphEvent| {
            let tag = match e {
                GraphEvent::NodeSelected(_) => "node",
                GraphEvent::EdgeSelected(_) => "edge",
                GraphEvent::IsolateStateChanged(_) => "isolate",
                GraphEvent::MetricsUpdated(_) => "metrics",
            };
            log.lock().unwrap().push(tag);
        }));
        engine.rebuild(&corpus());
        assert!(engine.select_node(&"a.md".into()));
        assert!(!engine.select_node(&"zzz.md".into()));
        let edge = engine.full_graph().edges[0].id.clone();
        assert!(engine.select_edge(&edge));
        engine.apply_isolate("a.md".into(), 1);

        assert_eq!(*seen.lock().unwrap(), vec!["metrics", "node", "edge", "isolate"]);
    }

    #[test]
    fn metrics_cache_skips_identical_filter() {
        let count = Arc::new(Mutex::new(0usize));
        let mut engine = Engine::with_store(EngineConfig::default(), Box::new(MemStore::new()));
        let c = Arc::clone(&count);
        engine.subscribe(Arc::new(move |e: &GraphEvent| {
            if matches!(e, GraphEvent::MetricsUpdated(_)) {
                *c.lock().unwrap() += 1;
            }
        }));
        engine.rebuild(&corpus());
        engine.apply_filter(FilterSpec::default());
        assert_eq!(*count.lock().unwrap(), 1);
        engine.apply_filter(FilterSpec {
            node_kinds: [NodeKind::Entity].into_iter().collect(),
            ..Default::default()
        });
        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[test]
    fn view_round_trip() {
        let mut engine = engine();
        engine.apply_filter(FilterSpec {
            search_query: Some("a".into()),
            ..Default::default()
        });
        engine.set_sizing_mode(SizingMode::Confidence);
        engine.apply_isolate("a.md".into(), 2);
        let saved = engine.save_view("focus").unwrap();
        let captured = engine.state().clone();

        engine.apply_filter(FilterSpec::default());
        engine.set_sizing_mode(SizingMode::Degree);
        engine.clear_isolate();

        engine.apply_view(&saved.id).unwrap();
        assert_eq!(engine.state(), &captured);
        assert_eq!(
            engine.layout().last_applied().unwrap().view_id,
            saved.id
        );
    }

    #[test]
    fn view_errors() {
        let mut engine = engine();
        assert!(matches!(engine.save_view("   "), Err(EngineError::EmptyViewName)));
        assert!(matches!(
            engine.apply_view("missing"),
            Err(EngineError::ViewNotFound { .. })
        ));
        assert!(matches!(
            engine.delete_view("missing"),
            Err(EngineError::ViewNotFound { .. })
        ));
    }

    #[test]
    fn view_ids_are_unique() {
        let mut engine = engine();
        let a = engine.save_view("one").unwrap();
        let b = engine.save_view("two").unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(engine.views().len(), 2);
    }

    #[test]
    fn delete_clears_pointer() {
        let mut engine = engine();
        let keep = engine.save_view("keep").unwrap();
        let gone = engine.save_view("gone").unwrap();
        engine.delete_view(&gone.id).unwrap();
        assert!(engine.layout().last_applied().is_none());

        engine.apply_view(&keep.id).unwrap();
        let extra = engine.save_view("extra").unwrap();
        engine.apply_view(&keep.id).unwrap();
        engine.delete_view(&extra.id).unwrap();
        assert_eq!(engine.layout().last_applied().unwrap().view_id, keep.id);
    }

    #[test]
    fn last_view_reapplied_on_reload() {
        let mut engine = engine();
        engine.apply_filter(FilterSpec {
            node_kinds: [NodeKind::Entity, NodeKind::Report].into_iter().collect(),
            ..Default::default()
        });
        let view = engine.save_view("people").unwrap();
        engine.apply_filter(FilterSpec::default());

        engine.rebuild(&corpus());
        assert_eq!(engine.state().filter, view.filters);
        assert_eq!(engine.visible().node_count(), 3);
    }

    #[test]
    fn layout_freeze_and_reset() {
        let mut engine = engine();
        let mut pos = HashMap::new();
        pos.insert(NodeId::from("a.md"), Position { x: 10.0, y: 20.0 });
        assert!(engine.freeze_layout(pos.clone()));
        assert!(engine.state().layout_frozen);

        // Reload picks up the stored positions and the pin.
        engine.rebuild(&corpus());
        assert!(engine.state().layout_frozen);
        assert_eq!(engine.positions(), &pos);

        assert!(engine.reset_layout());
        assert!(!engine.state().layout_frozen);
        assert_eq!(engine.positions(), &pos);
        assert!(engine.layout().load_positions(engine.fingerprint()).is_empty());

        // Same corpus again: the seed survives, unpinned.
        engine.rebuild(&corpus());
        assert!(!engine.state().layout_frozen);
        assert_eq!(engine.positions(), &pos);
    }

    #[test]
    fn legacy_views_migrate_and_persist_on_next_write() {
        let store = MemStore::new();
        let fp = fingerprint(
            ["a.md", "b.md", "c.md", "lonely.md"]
                .iter()
                .map(|s| NodeId::from(*s))
                .collect::<Vec<_>>()
                .iter(),
        );
        let legacy = serde_json::json!([{"id": "old", "name": "Old", "layoutFrozen": false}]);
        store
            .put(&views_key(&fp), legacy.to_string().as_bytes())
            .unwrap();

        let mut engine = Engine::with_store(EngineConfig::default(), Box::new(store));
        engine.apply_isolate("b.md".into(), 1);
        engine.rebuild(&corpus());
        assert_eq!(engine.fingerprint(), fp);
        assert!(engine.views_pending_write());
        let view = &engine.views()[0];
        assert_eq!(view.version, VIEW_SCHEMA_VERSION);
        assert_eq!(view.sizing_mode, SizingMode::Degree);
        assert_eq!(
            view.isolate,
            Some(IsolateSnapshot {
                root_id: "b.md".into(),
                depth: 1
            })
        );
        assert!(!engine.layout().migration_done(&fp));

        engine.save_view("new").unwrap();
        assert!(!engine.views_pending_write());
        assert!(engine.layout().migration_done(&fp));
    }

    #[test]
    fn pointer_for_other_corpus_is_ignored() {
        let mut engine = engine();
        engine
            .layout()
            .set_last_applied(&LastAppliedView {
                fingerprint: "someone-else".into(),
                view_id: "x".into(),
            });
        engine.rebuild(&corpus());
        assert_eq!(engine.state().filter, FilterSpec::default());
    }

    #[test]
    fn silent_reapply_does_not_rewrite_pointer() {
        let mut engine = engine();
        let first = engine.save_view("first").unwrap();
        // Point at a view that belongs to this corpus but no longer exists.
        engine.layout().set_last_applied(&LastAppliedView {
            fingerprint: engine.fingerprint().to_string(),
            view_id: "ghost".into(),
        });
        engine.rebuild(&corpus());
        assert_eq!(engine.layout().last_applied().unwrap().view_id, "ghost");
        assert_ne!(first.id, "ghost");
    }
}
