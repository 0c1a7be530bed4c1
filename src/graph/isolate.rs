//! Bounded-depth neighborhood isolation.
//!
//! Provides BFS-based extraction of the subgraph within `depth` hops of a
//! root node. Edges are treated as undirected for reachability. The result is
//! the induced subgraph: every visited node plus every input edge whose
//! endpoints were both visited.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};

use super::{GraphData, NodeId};

pub const MIN_DEPTH: u8 = 1;
pub const MAX_DEPTH: u8 = 6;
pub const DEFAULT_DEPTH: u8 = 2;

/// Clamp a requested depth into [`MIN_DEPTH`, `MAX_DEPTH`].
pub fn clamp_depth(depth: usize) -> u8 {
    depth.clamp(MIN_DEPTH as usize, MAX_DEPTH as usize) as u8
}

/// Active isolation root and depth, as stored in saved views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsolateSnapshot {
    pub root_id: NodeId,
    pub depth: u8,
}

/// Isolation state owned by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsolationState {
    pub root_id: Option<NodeId>,
    pub depth: u8,
    pub active: bool,
}

impl Default for IsolationState {
    fn default() -> Self {
        Self {
            root_id: None,
            depth: DEFAULT_DEPTH,
            active: false,
        }
    }
}

impl IsolationState {
    pub fn activate(root: NodeId, depth: usize) -> Self {
        Self {
            root_id: Some(root),
            depth: clamp_depth(depth),
            active: true,
        }
    }

    /// The persisted form: `Some` only while isolation is active.
    pub fn snapshot(&self) -> Option<IsolateSnapshot> {
        match (&self.root_id, self.active) {
            (Some(root), true) => Some(IsolateSnapshot {
                root_id: root.clone(),
                depth: self.depth,
            }),
            _ => None,
        }
    }

    /// Restore from a persisted snapshot, keeping the current depth when inactive.
    pub fn from_snapshot(snapshot: Option<&IsolateSnapshot>, current_depth: u8) -> Self {
        match snapshot {
            Some(s) => Self::activate(s.root_id.clone(), s.depth as usize),
            None => Self {
                root_id: None,
                depth: current_depth,
                active: false,
            },
        }
    }
}

/// Extract the subgraph within `depth` hops of `root`.
///
/// A node at exactly `depth` hops is included but not expanded. Returns an
/// empty graph when `root` is not in `graph`. Runs in O(V + E).
pub fn isolate(graph: &GraphData, root: &NodeId, depth: usize) -> GraphData {
    let index: HashMap<&NodeId, NodeIndex> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (&n.id, NodeIndex::new(i)))
        .collect();
    let Some(&start) = index.get(root) else {
        tracing::debug!(root = %root, "isolation root not in graph");
        return GraphData::default();
    };

    let mut adjacency: UnGraph<(), ()> =
        UnGraph::with_capacity(graph.nodes.len(), graph.edges.len());
    for _ in &graph.nodes {
        adjacency.add_node(());
    }
    for edge in &graph.edges {
        if let (Some(&s), Some(&t)) = (index.get(&edge.source), index.get(&edge.target)) {
            adjacency.add_edge(s, t, ());
        }
    }

    let mut visited: HashSet<NodeIndex> = HashSet::new();
    let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::new();
    visited.insert(start);
    queue.push_back((start, 0));

    while let Some((node, hops)) = queue.pop_front() {
        if hops >= depth {
            continue;
        }
        for next in adjacency.neighbors(node) {
            if visited.insert(next) {
                queue.push_back((next, hops + 1));
            }
        }
    }

    let nodes: Vec<_> = graph
        .nodes
        .iter()
        .enumerate()
        .filter(|(i, _)| visited.contains(&NodeIndex::new(*i)))
        .map(|(_, n)| n.clone())
        .collect();
    let kept: HashSet<&NodeId> = nodes.iter().map(|n| &n.id).collect();
    let edges = graph
        .edges
        .iter()
        .filter(|e| kept.contains(&e.source) && kept.contains(&e.target))
        .cloned()
        .collect();

    GraphData { nodes, edges }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::testing::{chain, edge, node};
    use crate::graph::{EdgeKind, NodeKind};

    fn ids(g: &GraphData) -> Vec<&str> {
        g.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn depth_one_from_end_of_chain() {
        let g = isolate(&chain(), &"a".into(), 1);
        assert_eq!(ids(&g), vec!["a", "b"]);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn traversal_ignores_edge_direction() {
        // Edges point a->b->c->d; starting from d must still reach c and b.
        let g = isolate(&chain(), &"d".into(), 2);
        assert_eq!(ids(&g), vec!["b", "c", "d"]);
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn frontier_node_is_included_but_not_expanded() {
        let g = isolate(&chain(), &"b".into(), 1);
        assert_eq!(ids(&g), vec!["a", "b", "c"]);
        assert!(!g.contains_node(&"d".into()));
    }

    #[test]
    fn large_depth_covers_component_only() {
        let g = isolate(&chain(), &"c".into(), 99);
        assert_eq!(ids(&g), vec!["a", "b", "c", "d"]);
        assert_eq!(g.edge_count(), 3);
    }

    #[test]
    fn unknown_root_yields_empty_graph() {
        let g = isolate(&chain(), &"nope".into(), 3);
        assert!(g.is_empty());
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn induced_edges_include_chords() {
        // Triangle x-y-z plus tail z-w; depth 1 from x visits y and z and keeps y-z.
        let g = GraphData {
            nodes: ["x", "y", "z", "w"]
                .iter()
                .map(|id| node(id, NodeKind::Event, 0.9))
                .collect(),
            edges: vec![
                edge("x", "y", EdgeKind::Temporal, 0.9),
                edge("y", "z", EdgeKind::Temporal, 0.9),
                edge("z", "x", EdgeKind::Temporal, 0.9),
                edge("z", "w", EdgeKind::Temporal, 0.9),
            ],
        };
        let out = isolate(&g, &"x".into(), 1);
        assert_eq!(ids(&out), vec!["x", "y", "z"]);
        assert_eq!(out.edge_count(), 3);
    }

    #[test]
    fn depth_is_clamped() {
        assert_eq!(clamp_depth(0), MIN_DEPTH);
        assert_eq!(clamp_depth(42), MAX_DEPTH);
        assert_eq!(IsolationState::activate("a".into(), 9).depth, MAX_DEPTH);
    }

    #[test]
    fn snapshot_only_when_active() {
        let active = IsolationState::activate("a".into(), 3);
        let snap = active.snapshot().unwrap();
        assert_eq!(IsolationState::from_snapshot(Some(&snap), 2), active);

        let inactive = IsolationState::default();
        assert_eq!(inactive.snapshot(), None);
        assert_eq!(IsolationState::from_snapshot(None, 4).depth, 4);
    }
}
