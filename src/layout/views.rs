//! Saved views and their on-disk schema history.
//!
//! Views written before schema version 2 carry no sizing mode and no
//! isolation snapshot. They are upgraded in memory when a collection is
//! loaded; the stored record stays as-is until the engine next writes the
//! collection back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::graph::filter::FilterSpec;
use crate::graph::isolate::IsolateSnapshot;
use crate::graph::metrics::SizingMode;

use super::PhysicsSettings;

pub const VIEW_SCHEMA_VERSION: u32 = 2;

/// A named snapshot of filters, physics, sizing, freeze flag and isolation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedView {
    pub id: String,
    pub name: String,
    pub filters: FilterSpec,
    pub physics: PhysicsSettings,
    pub sizing_mode: SizingMode,
    pub layout_frozen: bool,
    pub isolate: Option<IsolateSnapshot>,
    pub created_at: DateTime<Utc>,
    pub version: u32,
}

/// Pre-v2 view record. Everything except `id` may be missing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyView {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub filters: Option<FilterSpec>,
    #[serde(default)]
    pub physics: Option<PhysicsSettings>,
    #[serde(default)]
    pub layout_frozen: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// One stored entry, resolved once at load.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredView {
    Current(SavedView),
    Legacy(LegacyView),
}

impl StoredView {
    /// Interpret a raw entry. `None` when it matches neither schema.
    pub fn parse(value: serde_json::Value) -> Option<Self> {
        let version = value.get("version").and_then(serde_json::Value::as_u64);
        if version == Some(VIEW_SCHEMA_VERSION as u64) {
            match serde_json::from_value::<SavedView>(value.clone()) {
                Ok(view) => return Some(StoredView::Current(view)),
                Err(e) => {
                    tracing::debug!(error = %e, "v2-tagged view failed to decode, trying legacy schema");
                }
            }
        }
        match serde_json::from_value::<LegacyView>(value) {
            Ok(legacy) => Some(StoredView::Legacy(legacy)),
            Err(e) => {
                tracing::warn!(error = %e, "dropping uninterpretable saved view");
                None
            }
        }
    }

    /// Upgrade to the current schema. Current views pass through unchanged.
    ///
    /// Legacy views get `SizingMode::Degree` and adopt `active_isolate`, the
    /// isolation in effect at load time.
    pub fn migrate(self, active_isolate: Option<&IsolateSnapshot>, now: DateTime<Utc>) -> SavedView {
        match self {
            StoredView::Current(view) => view,
            StoredView::Legacy(legacy) => SavedView {
                name: legacy.name.unwrap_or_else(|| legacy.id.clone()),
                id: legacy.id,
                filters: legacy.filters.unwrap_or_default(),
                physics: legacy.physics.unwrap_or_default(),
                sizing_mode: SizingMode::Degree,
                layout_frozen: legacy.layout_frozen,
                isolate: active_isolate.cloned(),
                created_at: legacy.created_at.unwrap_or(now),
                version: VIEW_SCHEMA_VERSION,
            },
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, StoredView::Legacy(_))
    }
}

/// Result of loading a view collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewLoad {
    pub views: Vec<SavedView>,
    /// Entries upgraded from a legacy schema.
    pub migrated: usize,
    /// Entries that could not be interpreted.
    pub dropped: usize,
}

impl ViewLoad {
    pub fn needs_write(&self) -> bool {
        self.migrated > 0 || self.dropped > 0
    }
}

/// Decode and migrate a stored collection, keeping stored order.
///
/// A blob that is not a JSON array yields an empty load.
pub fn load_collection(
    raw: &[u8],
    active_isolate: Option<&IsolateSnapshot>,
    now: DateTime<Utc>,
) -> ViewLoad {
    let entries: Vec<serde_json::Value> = match serde_json::from_slice(raw) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "saved view collection is corrupt, ignoring");
            return ViewLoad::default();
        }
    };

    let mut load = ViewLoad::default();
    for entry in entries {
        match StoredView::parse(entry) {
            Some(stored) => {
                if stored.is_legacy() {
                    load.migrated += 1;
                }
                load.views.push(stored.migrate(active_isolate, now));
            }
            None => load.dropped += 1,
        }
    }
    load
}

/// Global pointer to the view last applied by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastAppliedView {
    pub fingerprint: String,
    pub view_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn current(id: &str) -> SavedView {
        SavedView {
            id: id.into(),
            name: format!("view {id}"),
            filters: FilterSpec::default(),
            physics: PhysicsSettings::default(),
            sizing_mode: SizingMode::Confidence,
            layout_frozen: true,
            isolate: Some(IsolateSnapshot {
                root_id: "b.md".into(),
                depth: 3,
            }),
            created_at: now(),
            version: VIEW_SCHEMA_VERSION,
        }
    }

    #[test]
    fn legacy_entry_is_upgraded() {
        let raw = json!([{
            "id": "old",
            "name": "Old view",
            "filters": {"nodeKinds": ["entity"]},
            "layoutFrozen": true
        }]);
        let active = IsolateSnapshot {
            root_id: "a.md".into(),
            depth: 2,
        };
        let load = load_collection(raw.to_string().as_bytes(), Some(&active), now());
        assert_eq!(load.migrated, 1);
        let view = &load.views[0];
        assert_eq!(view.version, VIEW_SCHEMA_VERSION);
        assert_eq!(view.sizing_mode, SizingMode::Degree);
        assert_eq!(view.isolate.as_ref(), Some(&active));
        assert_eq!(view.created_at, now());
        assert!(view.layout_frozen);
        assert_eq!(view.filters.node_kinds.len(), 1);
        assert!(view.filters.node_kinds.contains(&NodeKind::Entity));
        assert_eq!(view.physics, PhysicsSettings::default());
    }

    #[test]
    fn legacy_without_active_isolation() {
        let raw = json!([{"id": "v1", "version": 1}]);
        let load = load_collection(raw.to_string().as_bytes(), None, now());
        assert_eq!(load.views[0].isolate, None);
        assert_eq!(load.views[0].name, "v1");
    }

    #[test]
    fn migration_is_idempotent() {
        let raw = json!([{"id": "old", "name": "Old"}]);
        let first = load_collection(raw.to_string().as_bytes(), None, now());
        let reencoded = serde_json::to_vec(&first.views).unwrap();
        let second = load_collection(&reencoded, None, now());
        assert_eq!(second.migrated, 0);
        assert_eq!(second.views, first.views);
    }

    #[test]
    fn current_views_pass_through() {
        let views = vec![current("a"), current("b")];
        let raw = serde_json::to_vec(&views).unwrap();
        let load = load_collection(&raw, None, now());
        assert_eq!(load.views, views);
        assert!(!load.needs_write());
    }

    #[test]
    fn bad_entries_are_dropped_individually() {
        let good = serde_json::to_value(current("good")).unwrap();
        let raw = json!([good, 17, {"name": "no id"}, {"id": "legacy"}]);
        let load = load_collection(raw.to_string().as_bytes(), None, now());
        assert_eq!(load.dropped, 2);
        assert_eq!(load.migrated, 1);
        let ids: Vec<&str> = load.views.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["good", "legacy"]);
    }

    #[test]
    fn corrupt_collection_is_empty() {
        let load = load_collection(b"{\"not\": \"a list\"}", None, now());
        assert!(load.views.is_empty());
    }

    #[test]
    fn pointer_wire_format() {
        let p = LastAppliedView {
            fingerprint: "abc".into(),
            view_id: "v".into(),
        };
        assert_eq!(
            serde_json::to_value(&p).unwrap(),
            json!({"fingerprint": "abc", "viewId": "v"})
        );
    }
}
