//! Declarative filter pipeline.
//!
//! [`apply_filter`] is a pure function of `(graph, spec)`: it never mutates
//! its input, preserves source order, and re-validates the edge-endpoint
//! invariant after node filtering. The time range is deliberately not a node
//! predicate; it is passed through for the renderer to dim out-of-window
//! nodes.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Edge, EdgeKind, GraphData, Node, NodeId, NodeKind};

/// Closed confidence interval within [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceRange {
    pub min: f32,
    pub max: f32,
}

impl ConfidenceRange {
    pub const FULL: ConfidenceRange = ConfidenceRange { min: 0.0, max: 1.0 };

    /// Clamp both bounds into [0, 1], swapping them if reversed.
    pub fn new(min: f32, max: f32) -> Self {
        let (a, b) = (min.clamp(0.0, 1.0), max.clamp(0.0, 1.0));
        if a <= b {
            Self { min: a, max: b }
        } else {
            Self { min: b, max: a }
        }
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

impl Default for ConfidenceRange {
    fn default() -> Self {
        Self::FULL
    }
}

/// Soft time window, surfaced to the renderer but never used to drop nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at <= self.end
    }
}

/// Filter specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    #[serde(default)]
    pub confidence_range: ConfidenceRange,
    #[serde(default = "all_node_kinds")]
    pub node_kinds: BTreeSet<NodeKind>,
    #[serde(default = "all_edge_kinds")]
    pub edge_kinds: BTreeSet<EdgeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
}

fn all_node_kinds() -> BTreeSet<NodeKind> {
    NodeKind::ALL.into_iter().collect()
}

fn all_edge_kinds() -> BTreeSet<EdgeKind> {
    EdgeKind::ALL.into_iter().collect()
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            confidence_range: ConfidenceRange::FULL,
            node_kinds: all_node_kinds(),
            edge_kinds: all_edge_kinds(),
            search_query: None,
            time_range: None,
        }
    }
}

impl FilterSpec {
    /// The search query, trimmed and lowercased; `None` when blank.
    pub fn normalized_query(&self) -> Option<String> {
        self.search_query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase)
    }

    fn node_matches(&self, node: &Node, query: Option<&str>) -> bool {
        if !self.confidence_range.contains(node.confidence) || !self.node_kinds.contains(&node.kind)
        {
            return false;
        }
        match query {
            None => true,
            Some(q) => {
                node.title.to_lowercase().contains(q)
                    || node
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(q))
                    || node.tags.iter().any(|t| t.to_lowercase().contains(q))
            }
        }
    }

    fn edge_matches(&self, edge: &Edge, kept: &HashSet<&NodeId>) -> bool {
        kept.contains(&edge.source)
            && kept.contains(&edge.target)
            && self.edge_kinds.contains(&edge.kind)
            && self.confidence_range.contains(edge.confidence)
    }
}

/// Output of the filter pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilteredGraph {
    pub graph: GraphData,
    /// Echo of the filter's time range for the rendering layer.
    pub time_range: Option<TimeRange>,
}

/// Apply `spec` to `graph`, returning a new graph.
pub fn apply_filter(graph: &GraphData, spec: &FilterSpec) -> FilteredGraph {
    let query = spec.normalized_query();
    let nodes: Vec<Node> = graph
        .nodes
        .iter()
        .filter(|n| spec.node_matches(n, query.as_deref()))
        .cloned()
        .collect();

    let edges: Vec<Edge> = {
        let kept: HashSet<&NodeId> = nodes.iter().map(|n| &n.id).collect();
        graph
            .edges
            .iter()
            .filter(|e| spec.edge_matches(e, &kept))
            .cloned()
            .collect()
    };

    FilteredGraph {
        graph: GraphData { nodes, edges },
        time_range: spec.time_range,
    }
}
