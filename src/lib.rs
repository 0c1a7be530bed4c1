// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # intel-graph
//!
//! Turns a corpus of intelligence documents into an interactive relationship
//! graph: typed nodes and edges, filtering, degree metrics, bounded-depth
//! isolation, and per-corpus persisted layouts and saved views.
//!
//! ## Architecture
//!
//! - **Corpus** (`corpus`): read-only document index plus optional relationship list
//! - **Graph** (`graph`): builder, filter pipeline, metrics engine, isolation engine
//! - **Layout** (`layout`): corpus fingerprint, positions, versioned saved views
//! - **Store** (`store`): key-value backends, in-memory (DashMap) or on-disk (redb)
//! - **Engine** (`engine`): facade owning the pipeline state and notifications
//! - **Worker** (`worker`): off-thread pipeline execution, newest request wins
//!
//! ## Library usage
//!
//! ```no_run
//! use intel_graph::config::EngineConfig;
//! use intel_graph::corpus::{CorpusSource, MarkdownDir};
//! use intel_graph::engine::Engine;
//! use intel_graph::graph::filter::FilterSpec;
//!
//! let corpus = MarkdownDir::new("reports").load().unwrap();
//! let mut engine = Engine::new(EngineConfig::default());
//! engine.rebuild(&corpus);
//! engine.apply_filter(FilterSpec {
//!     search_query: Some("harbor".into()),
//!     ..Default::default()
//! });
//! engine.apply_isolate("ops/harbor-watch.md".into(), 2);
//! let view = engine.save_view("harbor focus").unwrap();
//! println!("saved {} ({} nodes visible)", view.id, engine.graph_view().node_count);
//! ```

pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod events;
pub mod graph;
pub mod layout;
pub mod paths;
pub mod store;
pub mod worker;
