//! Layout and view persistence.
//!
//! Persisted state is namespaced by a corpus [`fingerprint`]:
//!
//! | key                          | record                               |
//! |------------------------------|--------------------------------------|
//! | `<fp>:positions`             | node id → `{x, y}`                   |
//! | `<fp>:views`                 | ordered list of saved views          |
//! | `<fp>:views:migrated`        | one-time legacy migration flag       |
//! | `last-applied-view`          | `{fingerprint, viewId}` (global)     |
//!
//! Every operation here is best effort. Store and decode failures are
//! logged and reported as "nothing stored" / "not written"; they never
//! propagate into the graph pipeline.

pub mod views;

use std::collections::{BTreeMap, HashMap};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::graph::NodeId;
use crate::graph::isolate::IsolateSnapshot;
use crate::store::KvStore;

pub use views::{LastAppliedView, SavedView, StoredView, VIEW_SCHEMA_VERSION, ViewLoad};

/// Global key of the last-applied-view pointer.
pub const LAST_VIEW_KEY: &str = "last-applied-view";

/// Hex characters kept from the SHA-256 digest.
const FINGERPRINT_LEN: usize = 16;

/// Stable, order-independent fingerprint of a node-id set.
pub fn fingerprint<'a>(ids: impl IntoIterator<Item = &'a NodeId>) -> String {
    let mut sorted: Vec<&str> = ids.into_iter().map(NodeId::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut hasher = Sha256::new();
    for id in sorted {
        hasher.update(id.as_bytes());
        hasher.update(b"\n");
    }
    let mut hex = hex::encode(hasher.finalize());
    hex.truncate(FINGERPRINT_LEN);
    hex
}

/// A node coordinate in layout space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Renderer physics parameters. Stored and persisted, never interpreted here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhysicsSettings {
    pub charge: f64,
    pub link_distance: f64,
    pub link_strength: f64,
    pub friction: f64,
    pub gravity: f64,
    pub theta: f64,
    pub alpha: f64,
    pub alpha_decay: f64,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            charge: -300.0,
            link_distance: 80.0,
            link_strength: 0.7,
            friction: 0.9,
            gravity: 0.05,
            theta: 0.8,
            alpha: 1.0,
            alpha_decay: 0.0228,
        }
    }
}

pub fn positions_key(fingerprint: &str) -> String {
    format!("{fingerprint}:positions")
}

pub fn views_key(fingerprint: &str) -> String {
    format!("{fingerprint}:views")
}

pub fn migration_flag_key(fingerprint: &str) -> String {
    format!("{fingerprint}:views:migrated")
}

/// Best-effort persistence of positions, views and the last-view pointer.
pub struct LayoutManager {
    store: Box<dyn KvStore>,
}

impl LayoutManager {
    pub fn new(store: Box<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }

    fn read_bytes(&self, key: &str) -> Option<Vec<u8>> {
        match self.store.get(key) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(%key, error = %e, "layout store read failed, ignoring");
                None
            }
        }
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.read_bytes(key)?;
        match serde_json::from_slice(&bytes) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(%key, error = %e, "corrupt layout record, ignoring");
                None
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let bytes = match serde_json::to_vec(value) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(%key, error = %e, "failed to encode layout record");
                return false;
            }
        };
        match self.store.put(key, &bytes) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%key, error = %e, "layout store write failed, ignoring");
                false
            }
        }
    }

    fn remove(&self, key: &str) -> bool {
        match self.store.remove(key) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(%key, error = %e, "layout store delete failed, ignoring");
                false
            }
        }
    }

    /// Persisted node positions for a corpus; empty when none or unreadable.
    pub fn load_positions(&self, fingerprint: &str) -> HashMap<NodeId, Position> {
        self.read_json::<BTreeMap<NodeId, Position>>(&positions_key(fingerprint))
            .map(|m| m.into_iter().collect())
            .unwrap_or_default()
    }

    pub fn save_positions(&self, fingerprint: &str, positions: &HashMap<NodeId, Position>) -> bool {
        // Sorted so identical layouts produce identical bytes.
        let sorted: BTreeMap<&NodeId, &Position> = positions.iter().collect();
        self.write_json(&positions_key(fingerprint), &sorted)
    }

    pub fn clear_positions(&self, fingerprint: &str) -> bool {
        self.remove(&positions_key(fingerprint))
    }

    /// Load and migrate the saved views of a corpus. The stored record is not rewritten.
    pub fn load_views(&self, fingerprint: &str, current: Option<&IsolateSnapshot>) -> ViewLoad {
        let Some(bytes) = self.read_bytes(&views_key(fingerprint)) else {
            return ViewLoad::default();
        };
        let load = views::load_collection(&bytes, current, chrono::Utc::now());
        if load.migrated > 0 || load.dropped > 0 {
            tracing::info!(
                %fingerprint,
                migrated = load.migrated,
                dropped = load.dropped,
                "upgraded legacy saved views in memory"
            );
        }
        load
    }

    /// Write the full view collection and mark the corpus as migrated.
    pub fn save_views(&self, fingerprint: &str, views: &[SavedView]) -> bool {
        if !self.write_json(&views_key(fingerprint), views) {
            return false;
        }
        if !self.migration_done(fingerprint) {
            self.write_json(&migration_flag_key(fingerprint), &VIEW_SCHEMA_VERSION);
        }
        true
    }

    /// Whether the one-time upgrade write has happened for this corpus.
    ///
    /// The engine checks this before writing views upgraded at load time.
    pub fn migration_done(&self, fingerprint: &str) -> bool {
        self.read_json::<u32>(&migration_flag_key(fingerprint))
            .is_some_and(|v| v >= VIEW_SCHEMA_VERSION)
    }

    pub fn last_applied(&self) -> Option<LastAppliedView> {
        self.read_json(LAST_VIEW_KEY)
    }

    pub fn set_last_applied(&self, pointer: &LastAppliedView) -> bool {
        self.write_json(LAST_VIEW_KEY, pointer)
    }

    pub fn clear_last_applied(&self) -> bool {
        self.remove(LAST_VIEW_KEY)
    }
}

impl std::fmt::Debug for LayoutManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutManager").finish()
    }
}
