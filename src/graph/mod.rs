//! Relationship graph: typed nodes and edges derived from a document corpus.
//!
//! - **Builder** ([`builder`]): corpus → deduplicated [`GraphData`]
//! - **Filter** ([`filter`]): declarative, non-mutating subset selection
//! - **Metrics** ([`metrics`]): degree, summary statistics, visual size
//! - **Isolation** ([`isolate`]): bounded-depth neighborhood extraction
//!
//! Every stage takes a graph value and returns a fresh one. Node and edge
//! order is the insertion order of the builder, which is stable for a given
//! corpus.

pub mod builder;
pub mod filter;
pub mod isolate;
pub mod metrics;
pub mod references;

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable node identifier, derived from the normalized document path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Composite edge identifier: `source->target:key`.
///
/// The key is the relationship predicate when one exists, otherwise the edge
/// kind, so rebuilding the same corpus always yields the same ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(String);

impl EdgeId {
    pub fn composite(source: &NodeId, target: &NodeId, key: &str) -> Self {
        Self(format!("{source}->{target}:{key}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Report,
    Entity,
    Location,
    Event,
    Source,
}

impl NodeKind {
    pub const ALL: [NodeKind; 5] = [
        NodeKind::Report,
        NodeKind::Entity,
        NodeKind::Location,
        NodeKind::Event,
        NodeKind::Source,
    ];

    /// Parse a front-matter kind label. Case-insensitive; `None` if unrecognized.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "report" => Some(NodeKind::Report),
            "entity" => Some(NodeKind::Entity),
            "location" => Some(NodeKind::Location),
            "event" => Some(NodeKind::Event),
            "source" => Some(NodeKind::Source),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Report => "report",
            NodeKind::Entity => "entity",
            NodeKind::Location => "location",
            NodeKind::Event => "event",
            NodeKind::Source => "source",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of edge kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Reference,
    Temporal,
    Spatial,
    Causal,
    Similar,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 5] = [
        EdgeKind::Reference,
        EdgeKind::Temporal,
        EdgeKind::Spatial,
        EdgeKind::Causal,
        EdgeKind::Similar,
    ];

    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "reference" => Some(EdgeKind::Reference),
            "temporal" => Some(EdgeKind::Temporal),
            "spatial" => Some(EdgeKind::Spatial),
            "causal" => Some(EdgeKind::Causal),
            "similar" => Some(EdgeKind::Similar),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::Reference => "reference",
            EdgeKind::Temporal => "temporal",
            EdgeKind::Spatial => "spatial",
            EdgeKind::Causal => "causal",
            EdgeKind::Similar => "similar",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geographic coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Where an edge came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Listed in the corpus' explicit relationship list.
    ExplicitRelationship,
    /// Resolved from a `[[Name]]` or `[label](path)` reference in content.
    DerivedReference,
}

/// Metadata attached to nodes and edges.
///
/// The known keys are typed; anything else a document carries lands in
/// `extra` so round-tripping front-matter loses nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_document: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A graph node, one per source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Confidence in [0.0, 1.0].
    pub confidence: f32,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Metadata,
    /// Undirected degree in the currently filtered graph. Recomputed.
    #[serde(default)]
    pub degree: usize,
    /// Visual size under the current sizing mode. Recomputed.
    #[serde(default)]
    pub size: f32,
}

/// A graph edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
    /// Weight in [0.0, 1.0].
    pub weight: f32,
    /// Confidence in [0.0, 1.0]; the weaker endpoint unless stated explicitly.
    pub confidence: f32,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Edge {
    pub fn touches(&self, id: &NodeId) -> bool {
        &self.source == id || &self.target == id
    }
}

/// A materialized graph: nodes and edges in stable order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl GraphData {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.iter().any(|n| &n.id == id)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.iter().map(|n| &n.id)
    }

    /// Node timestamps in node order, for external histogram / time-window UI.
    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.nodes.iter().filter_map(|n| n.timestamp).collect()
    }

    /// Drop every edge whose endpoints are not both present.
    pub fn retain_valid_edges(&mut self) -> usize {
        let ids: HashSet<&NodeId> = self.nodes.iter().map(|n| &n.id).collect();
        let before = self.edges.len();
        let mut kept = Vec::with_capacity(before);
        for edge in self.edges.drain(..) {
            if ids.contains(&edge.source) && ids.contains(&edge.target) {
                kept.push(edge);
            }
        }
        self.edges = kept;
        before - self.edges.len()
    }

    /// True if every edge's endpoints are present in the node set.
    pub fn endpoints_valid(&self) -> bool {
        let ids: HashSet<&NodeId> = self.nodes.iter().map(|n| &n.id).collect();
        self.edges
            .iter()
            .all(|e| ids.contains(&e.source) && ids.contains(&e.target))
    }
}
