//! Graph derivation: corpus → deduplicated node/edge graph.
//!
//! Edges come from two sources, applied in order:
//!
//! 1. the corpus' explicit relationship list, kind chosen by [`predicate_kind`];
//! 2. cross-references found in document content ([`super::references`]).
//!
//! Both passes share one composite-key set `(source, target, predicate-or-kind)`,
//! so a reference already covered by an explicit relationship is not added
//! twice and rebuilding the same corpus yields the same edge ids. Malformed
//! input never fails the build: unresolvable references and relationships are
//! counted in [`BuildDiagnostics`] and skipped.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::corpus::{Corpus, Document, Relationship, normalize_path};

use super::references::{Reference, extract_references};
use super::{Edge, EdgeId, EdgeKind, GraphData, Metadata, Node, NodeId, NodeKind, Provenance};

/// Fallback confidence for documents without a usable `confidence` value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ConfidencePolicy {
    /// One value when the provider reports a modification time, another when not.
    ModifiedAware {
        with_modified: f32,
        without_modified: f32,
    },
    /// The same value for every document.
    Fixed { value: f32 },
}

impl ConfidencePolicy {
    pub fn fallback(&self, has_modified: bool) -> f32 {
        match *self {
            ConfidencePolicy::ModifiedAware {
                with_modified,
                without_modified,
            } => {
                if has_modified {
                    with_modified
                } else {
                    without_modified
                }
            }
            ConfidencePolicy::Fixed { value } => value,
        }
    }

    pub fn is_valid(&self) -> bool {
        let unit = |v: f32| (0.0..=1.0).contains(&v);
        match *self {
            ConfidencePolicy::ModifiedAware {
                with_modified,
                without_modified,
            } => unit(with_modified) && unit(without_modified),
            ConfidencePolicy::Fixed { value } => unit(value),
        }
    }
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        ConfidencePolicy::ModifiedAware {
            with_modified: 0.8,
            without_modified: 0.5,
        }
    }
}

/// Graph derivation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Node ceiling; larger corpora are truncated in path order.
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,
    #[serde(default)]
    pub confidence_policy: ConfidencePolicy,
    /// Weight for edges without an explicit strength.
    #[serde(default = "default_edge_weight")]
    pub default_edge_weight: f32,
}

fn default_max_nodes() -> usize {
    5_000
}
fn default_edge_weight() -> f32 {
    0.5
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_nodes: default_max_nodes(),
            confidence_policy: ConfidencePolicy::default(),
            default_edge_weight: default_edge_weight(),
        }
    }
}

/// Emitted when the corpus exceeds the node ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Truncation {
    pub total: usize,
    pub kept: usize,
}

/// What the builder skipped, and why.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDiagnostics {
    pub truncated: Option<Truncation>,
    /// Relationship entries naming an unknown document.
    pub skipped_relationships: usize,
    /// Content references that resolve to no document.
    pub unresolved_references: usize,
    /// References or relationships pointing at a document removed by truncation.
    pub truncated_references: usize,
    pub self_references: usize,
    /// Edges whose composite key was already present.
    pub duplicate_edges: usize,
}

/// Result of a graph build.
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    pub graph: GraphData,
    pub diagnostics: BuildDiagnostics,
}

/// Map a relationship predicate to an edge kind.
///
/// Predicates are compared case-insensitively with `-` and spaces treated as
/// `_`. An edge-kind label (`causal`, `similar`, ...) maps to itself; anything
/// unlisted is a reference.
pub fn predicate_kind(predicate: &str) -> EdgeKind {
    let norm = predicate.trim().to_ascii_lowercase().replace(['-', ' '], "_");
    if let Some(kind) = EdgeKind::parse(&norm) {
        return kind;
    }
    match norm.as_str() {
        "located_in" | "located_at" | "near" | "based_in" | "operates_in" | "adjacent_to" => {
            EdgeKind::Spatial
        }
        "before" | "after" | "during" | "precedes" | "follows" | "concurrent_with"
        | "occurred_on" => EdgeKind::Temporal,
        _ => EdgeKind::Reference,
    }
}

/// Build the graph for `corpus`.
pub fn build_graph(corpus: &Corpus, config: &BuildConfig) -> BuildOutput {
    let mut diagnostics = BuildDiagnostics::default();

    let all: Vec<&Document> = corpus.documents().collect();
    let kept = all.len().min(config.max_nodes);
    if kept < all.len() {
        tracing::warn!(
            total = all.len(),
            kept,
            "corpus exceeds node ceiling, truncating"
        );
        diagnostics.truncated = Some(Truncation {
            total: all.len(),
            kept,
        });
    }
    let docs = &all[..kept];

    // Node construction and reference scanning are independent per document.
    let parsed: Vec<(Node, Vec<Reference>)> = docs
        .par_iter()
        .map(|doc| (node_from_document(doc, config), extract_references(&doc.content)))
        .collect();

    let resolver = Resolver::new(docs, &all[kept..]);
    let confidences: HashMap<&NodeId, f32> =
        parsed.iter().map(|(n, _)| (&n.id, n.confidence)).collect();

    let mut edges = EdgeSet::default();

    if let Some(relationships) = corpus.relationships() {
        for rel in relationships {
            add_relationship(rel, &resolver, &confidences, config, &mut edges, &mut diagnostics);
        }
    }

    for (node, refs) in &parsed {
        for reference in refs {
            let target = match resolver.resolve_reference(&node.id, reference) {
                Resolution::Found(id) => id,
                Resolution::Truncated => {
                    diagnostics.truncated_references += 1;
                    continue;
                }
                Resolution::Missing => {
                    diagnostics.unresolved_references += 1;
                    continue;
                }
            };
            if target == node.id {
                diagnostics.self_references += 1;
                continue;
            }
            let confidence = node.confidence.min(confidences[&target]);
            let edge = Edge {
                id: EdgeId::composite(&node.id, &target, EdgeKind::Reference.as_str()),
                source: node.id.clone(),
                target,
                kind: EdgeKind::Reference,
                weight: config.default_edge_weight,
                confidence,
                metadata: Metadata {
                    provenance: Some(Provenance::DerivedReference),
                    source_document: Some(node.id.to_string()),
                    ..Default::default()
                },
            };
            if !edges.insert(edge) {
                diagnostics.duplicate_edges += 1;
            }
        }
    }

    let graph = GraphData {
        nodes: parsed.into_iter().map(|(n, _)| n).collect(),
        edges: edges.into_vec(),
    };

    tracing::debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        unresolved = diagnostics.unresolved_references,
        skipped_relationships = diagnostics.skipped_relationships,
        "built graph"
    );

    BuildOutput { graph, diagnostics }
}

fn add_relationship(
    rel: &Relationship,
    resolver: &Resolver<'_>,
    confidences: &HashMap<&NodeId, f32>,
    config: &BuildConfig,
    edges: &mut EdgeSet,
    diagnostics: &mut BuildDiagnostics,
) {
    let (source, target) = match (resolver.resolve_name(&rel.source), resolver.resolve_name(&rel.target)) {
        (Resolution::Found(s), Resolution::Found(t)) => (s, t),
        (Resolution::Truncated, _) | (_, Resolution::Truncated) => {
            diagnostics.truncated_references += 1;
            return;
        }
        _ => {
            tracing::debug!(
                source = %rel.source,
                target = %rel.target,
                "relationship references unknown document, skipping"
            );
            diagnostics.skipped_relationships += 1;
            return;
        }
    };
    if source == target {
        diagnostics.self_references += 1;
        return;
    }

    let predicate = rel
        .predicate
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());
    let kind = predicate.map_or(EdgeKind::Reference, predicate_kind);
    let key = predicate.unwrap_or(kind.as_str());
    let confidence = confidences[&source].min(confidences[&target]);
    let weight = rel
        .strength
        .filter(|s| s.is_finite())
        .map_or(config.default_edge_weight, |s| s.clamp(0.0, 1.0));

    let edge = Edge {
        id: EdgeId::composite(&source, &target, key),
        source,
        target,
        kind,
        weight,
        confidence,
        metadata: Metadata {
            predicate: predicate.map(str::to_string),
            provenance: Some(Provenance::ExplicitRelationship),
            ..Default::default()
        },
    };
    if !edges.insert(edge) {
        diagnostics.duplicate_edges += 1;
    }
}

fn node_from_document(doc: &Document, config: &BuildConfig) -> Node {
    let fm = &doc.front_matter;
    let kind = fm
        .first_str(&["kind", "type"])
        .and_then(NodeKind::parse)
        .unwrap_or(NodeKind::Report);
    let confidence = fm
        .number("confidence")
        .filter(|c| (0.0..=1.0).contains(c))
        .map(|c| c as f32)
        .unwrap_or_else(|| config.confidence_policy.fallback(doc.modified.is_some()));

    Node {
        id: NodeId::new(doc.path.clone()),
        kind,
        confidence,
        title: fm
            .first_str(&["title"])
            .unwrap_or_else(|| doc.stem())
            .to_string(),
        description: fm
            .first_str(&["description", "summary"])
            .map(str::to_string),
        timestamp: fm.timestamp(),
        location: fm.location(),
        tags: fm.tags(),
        metadata: Metadata {
            source_document: Some(doc.path.clone()),
            extra: fm.extra(),
            ..Default::default()
        },
        degree: 0,
        size: 0.0,
    }
}

/// Insertion-ordered edge list with composite-key dedup.
#[derive(Default)]
struct EdgeSet {
    seen: HashSet<EdgeId>,
    edges: Vec<Edge>,
}

impl EdgeSet {
    fn insert(&mut self, edge: Edge) -> bool {
        if !self.seen.insert(edge.id.clone()) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    fn into_vec(self) -> Vec<Edge> {
        self.edges
    }
}

enum Resolution {
    Found(NodeId),
    /// Names a document that exists but was cut by the node ceiling.
    Truncated,
    Missing,
}

/// Path and file-stem lookup over the kept documents, with the truncated
/// remainder tracked separately for diagnostics.
struct Resolver<'a> {
    by_path: HashSet<&'a str>,
    by_stem: HashMap<&'a str, &'a str>,
    cut_paths: HashSet<&'a str>,
    cut_stems: HashSet<&'a str>,
}

impl<'a> Resolver<'a> {
    fn new(kept: &[&'a Document], cut: &[&'a Document]) -> Self {
        let mut by_stem: HashMap<&'a str, &'a str> = HashMap::new();
        for &doc in kept {
            // Path order makes the first document win a stem collision.
            by_stem.entry(doc.stem()).or_insert(doc.path.as_str());
        }
        Self {
            by_path: kept.iter().map(|&d| d.path.as_str()).collect(),
            by_stem,
            cut_paths: cut.iter().map(|&d| d.path.as_str()).collect(),
            cut_stems: cut.iter().map(|&d| d.stem()).collect(),
        }
    }

    fn path(&self, path: &str) -> Option<Resolution> {
        if self.by_path.contains(path) {
            Some(Resolution::Found(NodeId::new(path)))
        } else if self.cut_paths.contains(path) {
            Some(Resolution::Truncated)
        } else {
            None
        }
    }

    fn stem(&self, stem: &str) -> Resolution {
        match self.by_stem.get(stem) {
            Some(path) => Resolution::Found(NodeId::new(*path)),
            None if self.cut_stems.contains(stem) => Resolution::Truncated,
            None => Resolution::Missing,
        }
    }

    /// Resolve a relationship endpoint: exact path first, then file stem.
    fn resolve_name(&self, name: &str) -> Resolution {
        let norm = normalize_path(name);
        self.path(&norm).unwrap_or_else(|| self.stem(link_stem(&norm)))
    }

    fn resolve_reference(&self, from: &NodeId, reference: &Reference) -> Resolution {
        match reference {
            Reference::WikiLink(target) => self.stem(link_stem(target)),
            Reference::PathLink(target) => {
                let direct = normalize_path(target);
                let relative = match from.as_str().rsplit_once('/') {
                    Some((dir, _)) => normalize_path(&format!("{dir}/{target}")),
                    None => direct.clone(),
                };
                let mut candidates = vec![direct, relative];
                if !target.ends_with(".md") {
                    let with_ext: Vec<String> =
                        candidates.iter().map(|c| format!("{c}.md")).collect();
                    candidates.extend(with_ext);
                }
                candidates
                    .iter()
                    .find_map(|c| self.path(c))
                    .unwrap_or(Resolution::Missing)
            }
        }
    }
}

/// Stem named by a link target: the last path segment minus a `.md` suffix.
///
/// Other dots belong to the name, so `Report v1.2` names `Report v1.2.md`.
fn link_stem(target: &str) -> &str {
    let name = target.rsplit(['/', '\\']).next().unwrap_or(target);
    name.strip_suffix(".md").unwrap_or(name)
}
