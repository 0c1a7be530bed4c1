//! Structural metrics over a filtered graph.
//!
//! Degree is undirected: an edge contributes one to each endpoint. Node size
//! is derived from degree or confidence depending on the [`SizingMode`].
//! [`MetricsCache`] memoizes degree computation behind a composite key so
//! unrelated re-renders do not recount edges.

use std::collections::{BTreeMap, HashMap};

use petgraph::algo::connected_components;
use petgraph::graph::UnGraph;
use serde::{Deserialize, Serialize};

use super::filter::FilterSpec;
use super::{EdgeKind, GraphData, Node, NodeId, NodeKind};

pub const DEGREE_BASE: f32 = 8.0;
pub const DEGREE_SLOPE: f32 = 6.0;
pub const CONFIDENCE_BASE: f32 = 8.0;
pub const CONFIDENCE_SCALE: f32 = 26.0;
pub const MIN_SIZE: f32 = 8.0;
pub const MAX_SIZE: f32 = 34.0;
/// Length of the ranked top-degree list.
pub const TOP_N: usize = 5;

/// Policy used to derive a node's visual size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizingMode {
    #[default]
    Degree,
    Confidence,
}

impl SizingMode {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "degree" => Some(SizingMode::Degree),
            "confidence" => Some(SizingMode::Confidence),
            _ => None,
        }
    }
}

/// Visual size of `node` under `mode`, clamped to [`MIN_SIZE`, `MAX_SIZE`].
pub fn node_size(node: &Node, mode: SizingMode) -> f32 {
    let raw = match mode {
        SizingMode::Degree => DEGREE_BASE + ((node.degree + 1) as f32).log2() * DEGREE_SLOPE,
        SizingMode::Confidence => CONFIDENCE_BASE + node.confidence * CONFIDENCE_SCALE,
    };
    raw.clamp(MIN_SIZE, MAX_SIZE)
}

/// Undirected degree of every node, aligned with `graph.nodes`.
pub fn degrees(graph: &GraphData) -> Vec<usize> {
    let index: HashMap<&NodeId, usize> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (&n.id, i))
        .collect();
    let mut out = vec![0usize; graph.nodes.len()];
    for edge in &graph.edges {
        if let (Some(&s), Some(&t)) = (index.get(&edge.source), index.get(&edge.target)) {
            out[s] += 1;
            out[t] += 1;
        }
    }
    out
}

/// A node in the top-degree ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedNode {
    pub id: NodeId,
    pub title: String,
    pub degree: usize,
}

/// Summary statistics over a filtered graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub node_count: usize,
    pub edge_count: usize,
    pub min_degree: usize,
    pub max_degree: usize,
    pub avg_degree: f32,
    /// Highest-degree nodes, ties in input order.
    pub top: Vec<RankedNode>,
    /// Nodes with no edges in the filtered graph.
    pub isolated_nodes: usize,
    /// Connected components, treating edges as undirected.
    pub components: usize,
    pub kind_counts: BTreeMap<NodeKind, usize>,
}

/// Summarize `graph` given per-node degrees aligned with its node list.
pub fn summarize(graph: &GraphData, degrees: &[usize]) -> MetricsSummary {
    let n = graph.nodes.len();
    if n == 0 {
        return MetricsSummary {
            edge_count: graph.edges.len(),
            ..Default::default()
        };
    }

    let mut order: Vec<usize> = (0..n).collect();
    // Stable sort keeps input order among equal degrees.
    order.sort_by(|&a, &b| degrees[b].cmp(&degrees[a]));
    let top = order
        .iter()
        .take(TOP_N)
        .map(|&i| RankedNode {
            id: graph.nodes[i].id.clone(),
            title: graph.nodes[i].title.clone(),
            degree: degrees[i],
        })
        .collect();

    let mut kind_counts = BTreeMap::new();
    for node in &graph.nodes {
        *kind_counts.entry(node.kind).or_insert(0) += 1;
    }

    MetricsSummary {
        node_count: n,
        edge_count: graph.edges.len(),
        min_degree: degrees.iter().copied().min().unwrap_or(0),
        max_degree: degrees.iter().copied().max().unwrap_or(0),
        avg_degree: degrees.iter().sum::<usize>() as f32 / n as f32,
        top,
        isolated_nodes: degrees.iter().filter(|&&d| d == 0).count(),
        components: component_count(graph),
        kind_counts,
    }
}

fn component_count(graph: &GraphData) -> usize {
    let index: HashMap<&NodeId, usize> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (&n.id, i))
        .collect();
    let mut ug: UnGraph<(), ()> = UnGraph::with_capacity(graph.nodes.len(), graph.edges.len());
    let handles: Vec<_> = graph.nodes.iter().map(|_| ug.add_node(())).collect();
    for edge in &graph.edges {
        if let (Some(&s), Some(&t)) = (index.get(&edge.source), index.get(&edge.target)) {
            ug.add_edge(handles[s], handles[t], ());
        }
    }
    connected_components(&ug)
}

/// Write degree and size into every node and return the summary.
pub fn apply_metrics(graph: &mut GraphData, mode: SizingMode) -> MetricsSummary {
    let degs = degrees(graph);
    for (node, &d) in graph.nodes.iter_mut().zip(&degs) {
        node.degree = d;
        node.size = node_size(node, mode);
    }
    summarize(graph, &degs)
}

/// Re-derive sizes only, leaving degrees as they are.
pub fn apply_sizes(graph: &mut GraphData, mode: SizingMode) {
    for node in &mut graph.nodes {
        node.size = node_size(node, mode);
    }
}

/// Memoization key for degree computation.
///
/// Extends `(nodeCount, edgeCount, searchQuery, nodeKinds, edgeKinds)` with
/// the confidence bounds, which change the node set without necessarily
/// changing the counts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricsKey {
    node_count: usize,
    edge_count: usize,
    search_query: Option<String>,
    node_kinds: Vec<NodeKind>,
    edge_kinds: Vec<EdgeKind>,
    confidence_bits: (u32, u32),
}

impl MetricsKey {
    pub fn new(graph: &GraphData, spec: &FilterSpec) -> Self {
        Self {
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            search_query: spec.normalized_query(),
            // BTreeSet iteration is already sorted.
            node_kinds: spec.node_kinds.iter().copied().collect(),
            edge_kinds: spec.edge_kinds.iter().copied().collect(),
            confidence_bits: (
                spec.confidence_range.min.to_bits(),
                spec.confidence_range.max.to_bits(),
            ),
        }
    }
}

/// Degree cache keyed by [`MetricsKey`].
#[derive(Debug, Default)]
pub struct MetricsCache {
    key: Option<MetricsKey>,
    degrees: HashMap<NodeId, usize>,
    summary: MetricsSummary,
}

impl MetricsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate derived fields of `graph`. Returns `true` if degrees were
    /// recomputed, `false` if the cached result was reused.
    pub fn update(&mut self, graph: &mut GraphData, spec: &FilterSpec, mode: SizingMode) -> bool {
        let key = MetricsKey::new(graph, spec);
        let hit = self.key.as_ref() == Some(&key);
        if hit {
            for node in &mut graph.nodes {
                node.degree = self.degrees.get(&node.id).copied().unwrap_or(0);
            }
            apply_sizes(graph, mode);
        } else {
            self.summary = apply_metrics(graph, mode);
            self.degrees = graph
                .nodes
                .iter()
                .map(|n| (n.id.clone(), n.degree))
                .collect();
            self.key = Some(key);
        }
        !hit
    }

    pub fn summary(&self) -> &MetricsSummary {
        &self.summary
    }

    /// Forget the cached result; the next update recomputes.
    pub fn invalidate(&mut self) {
        self.key = None;
        self.degrees.clear();
    }
}
