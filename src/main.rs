//! intel-graph CLI: build, filter, isolate and manage saved views over a
//! markdown document corpus.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use intel_graph::config::EngineConfig;
use intel_graph::corpus::{Corpus, CorpusSource, MarkdownDir};
use intel_graph::engine::Engine;
use intel_graph::graph::filter::{ConfidenceRange, FilterSpec, TimeRange};
use intel_graph::graph::metrics::SizingMode;
use intel_graph::graph::{EdgeKind, NodeId, NodeKind};
use intel_graph::layout::Position;
use intel_graph::paths::IntelPaths;

#[derive(Parser)]
#[command(name = "intel-graph", version, about = "Document corpus relationship graph")]
struct Cli {
    /// Directory of markdown documents.
    #[arg(long, global = true, default_value = ".")]
    corpus: PathBuf,

    /// Layout cache directory (overrides the config file).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Engine config file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Keep layout state in memory only.
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the graph and report counts and diagnostics.
    Build,

    /// Print the filtered graph as JSON.
    Graph {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Print degree metrics for the filtered graph.
    Metrics {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Print the neighborhood of a node as JSON.
    Isolate {
        /// Root node id (document path).
        #[arg(long)]
        root: String,

        /// Hop limit, clamped to 1..=6.
        #[arg(long, default_value = "2")]
        depth: usize,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Print the corpus fingerprint and the layout records stored for it.
    Fingerprint,

    /// Manage saved views.
    View {
        #[command(subcommand)]
        action: ViewAction,
    },

    /// Manage persisted node positions.
    Layout {
        #[command(subcommand)]
        action: LayoutAction,
    },
}

#[derive(Subcommand)]
enum LayoutAction {
    /// Print the stored positions as JSON.
    Show,
    /// Store positions from a JSON file and pin the layout.
    Freeze {
        /// JSON object mapping node id to `{"x": .., "y": ..}`.
        #[arg(long)]
        positions: PathBuf,
    },
    /// Unpin the layout and clear the stored positions.
    Reset,
}

#[derive(Subcommand)]
enum ViewAction {
    /// List saved views for the corpus.
    List,
    /// Save the current state, adjusted by any flags, as a named view.
    Save {
        name: String,

        #[command(flatten)]
        filter: FilterArgs,

        /// Isolate around this node before saving.
        #[arg(long)]
        isolate_root: Option<String>,

        #[arg(long, default_value = "2")]
        isolate_depth: usize,
    },
    /// Apply a saved view and print the resulting graph as JSON.
    Apply { view_id: String },
    /// Delete a saved view.
    Delete { view_id: String },
}

#[derive(Args, Default)]
struct FilterArgs {
    #[arg(long)]
    min_confidence: Option<f32>,

    #[arg(long)]
    max_confidence: Option<f32>,

    /// Node kinds to keep (repeatable).
    #[arg(long = "node-kind", value_parser = parse_node_kind)]
    node_kinds: Vec<NodeKind>,

    /// Edge kinds to keep (repeatable).
    #[arg(long = "edge-kind", value_parser = parse_edge_kind)]
    edge_kinds: Vec<EdgeKind>,

    /// Case-insensitive match on title, description and tags.
    #[arg(long)]
    search: Option<String>,

    /// Time window start (RFC 3339 or YYYY-MM-DD).
    #[arg(long, value_parser = parse_time)]
    since: Option<DateTime<Utc>>,

    /// Time window end (RFC 3339 or YYYY-MM-DD).
    #[arg(long, value_parser = parse_time)]
    until: Option<DateTime<Utc>>,

    /// Node sizing: degree or confidence.
    #[arg(long, value_parser = parse_sizing)]
    sizing: Option<SizingMode>,
}

impl FilterArgs {
    fn is_empty(&self) -> bool {
        self.min_confidence.is_none()
            && self.max_confidence.is_none()
            && self.node_kinds.is_empty()
            && self.edge_kinds.is_empty()
            && self.search.is_none()
            && self.since.is_none()
            && self.until.is_none()
    }

    /// Overlay the given flags onto `base`.
    fn to_spec(&self, base: &FilterSpec) -> FilterSpec {
        let mut spec = base.clone();
        if self.min_confidence.is_some() || self.max_confidence.is_some() {
            spec.confidence_range = ConfidenceRange::new(
                self.min_confidence.unwrap_or(spec.confidence_range.min),
                self.max_confidence.unwrap_or(spec.confidence_range.max),
            );
        }
        if !self.node_kinds.is_empty() {
            spec.node_kinds = self.node_kinds.iter().copied().collect::<BTreeSet<_>>();
        }
        if !self.edge_kinds.is_empty() {
            spec.edge_kinds = self.edge_kinds.iter().copied().collect::<BTreeSet<_>>();
        }
        if self.search.is_some() {
            spec.search_query = self.search.clone();
        }
        if let (Some(start), Some(end)) = (self.since, self.until) {
            spec.time_range = Some(TimeRange { start, end });
        } else if self.since.is_some() || self.until.is_some() {
            spec.time_range = Some(TimeRange {
                start: self.since.unwrap_or(DateTime::<Utc>::MIN_UTC),
                end: self.until.unwrap_or(DateTime::<Utc>::MAX_UTC),
            });
        }
        spec
    }

    fn apply(&self, engine: &mut Engine) {
        if !self.is_empty() {
            let spec = self.to_spec(&engine.state().filter);
            engine.apply_filter(spec);
        }
        if let Some(mode) = self.sizing {
            engine.set_sizing_mode(mode);
        }
    }
}

fn parse_node_kind(s: &str) -> std::result::Result<NodeKind, String> {
    NodeKind::parse(s).ok_or_else(|| {
        format!("unknown node kind \"{s}\" (expected report, entity, location, event or source)")
    })
}

fn parse_edge_kind(s: &str) -> std::result::Result<EdgeKind, String> {
    EdgeKind::parse(s).ok_or_else(|| {
        format!("unknown edge kind \"{s}\" (expected reference, temporal, spatial, causal or similar)")
    })
}

fn parse_sizing(s: &str) -> std::result::Result<SizingMode, String> {
    SizingMode::parse(s).ok_or_else(|| format!("unknown sizing mode \"{s}\" (expected degree or confidence)"))
}

fn parse_time(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("invalid time \"{s}\" (expected RFC 3339 or YYYY-MM-DD)"))
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    let corpus = MarkdownDir::new(&cli.corpus).load().into_diagnostic()?;

    match cli.command {
        Commands::Build => {
            let mut engine = Engine::new(config);
            let diag = engine.rebuild(&corpus).clone();
            let full = engine.full_graph();
            println!("Corpus:      {} ({} documents)", cli.corpus.display(), corpus.len());
            println!("Fingerprint: {}", engine.fingerprint());
            println!("Nodes:       {}", full.node_count());
            println!("Edges:       {}", full.edge_count());
            if let Some(t) = diag.truncated {
                println!("Truncated:   kept {} of {} documents", t.kept, t.total);
            }
            println!("Skipped relationships:  {}", diag.skipped_relationships);
            println!("Unresolved references:  {}", diag.unresolved_references);
            println!("Truncated references:   {}", diag.truncated_references);
            println!("Self references:        {}", diag.self_references);
            println!("Duplicate edges:        {}", diag.duplicate_edges);
        }

        Commands::Graph { filter } => {
            let mut engine = load_engine(config, &corpus)?;
            filter.apply(&mut engine);
            print_json(&engine.graph_view())?;
        }

        Commands::Metrics { filter } => {
            let mut engine = load_engine(config, &corpus)?;
            filter.apply(&mut engine);
            print_json(engine.metrics())?;
        }

        Commands::Isolate {
            root,
            depth,
            filter,
        } => {
            let mut engine = load_engine(config, &corpus)?;
            filter.apply(&mut engine);
            engine.apply_isolate(root.as_str().into(), depth);
            print_json(&engine.graph_view())?;
        }

        Commands::Fingerprint => {
            let engine = load_engine(config, &corpus)?;
            let fp = engine.fingerprint();
            println!("{fp}");
            let keys = engine
                .layout()
                .store()
                .keys_with_prefix(&format!("{fp}:"))
                .into_diagnostic()?;
            for key in keys {
                println!("  {key}");
            }
        }

        Commands::View { action } => {
            let mut engine = load_engine(config, &corpus)?;
            match action {
                ViewAction::List => {
                    let views = engine.views();
                    if views.is_empty() {
                        println!("No saved views for {}.", engine.fingerprint());
                    } else {
                        println!("Saved views ({}):", views.len());
                        for v in views {
                            println!(
                                "  {}  \"{}\"  sizing={:?} frozen={} isolate={} created={}",
                                v.id,
                                v.name,
                                v.sizing_mode,
                                v.layout_frozen,
                                v.isolate
                                    .as_ref()
                                    .map(|i| format!("{}@{}", i.root_id, i.depth))
                                    .unwrap_or_else(|| "-".into()),
                                v.created_at.to_rfc3339()
                            );
                        }
                    }
                }
                ViewAction::Save {
                    name,
                    filter,
                    isolate_root,
                    isolate_depth,
                } => {
                    filter.apply(&mut engine);
                    if let Some(root) = isolate_root {
                        engine.apply_isolate(root.as_str().into(), isolate_depth);
                    }
                    let view = engine.save_view(&name).into_diagnostic()?;
                    println!("Saved view \"{}\" as {}", view.name, view.id);
                }
                ViewAction::Apply { view_id } => {
                    engine.apply_view(&view_id).into_diagnostic()?;
                    print_json(&engine.graph_view())?;
                }
                ViewAction::Delete { view_id } => {
                    engine.delete_view(&view_id).into_diagnostic()?;
                    println!("Deleted view {view_id}");
                }
            }
        }

        Commands::Layout { action } => {
            let mut engine = load_engine(config, &corpus)?;
            match action {
                LayoutAction::Show => {
                    let sorted: std::collections::BTreeMap<_, _> = engine.positions().iter().collect();
                    print_json(&sorted)?;
                }
                LayoutAction::Freeze { positions } => {
                    let positions = read_positions(&positions)?;
                    let count = positions.len();
                    if engine.freeze_layout(positions) {
                        println!("Froze layout with {count} positions");
                    } else {
                        miette::bail!("positions could not be persisted; see log for details");
                    }
                }
                LayoutAction::Reset => {
                    engine.reset_layout();
                    println!("Layout unpinned for {}", engine.fingerprint());
                }
            }
        }
    }

    Ok(())
}

/// Config file, then `--data-dir`, then the XDG default cache directory.
fn resolve_config(cli: &Cli) -> Result<EngineConfig> {
    let paths = IntelPaths::resolve();
    let mut config = match (&cli.config, &paths) {
        (Some(path), _) => EngineConfig::load(path).into_diagnostic()?,
        (None, Ok(paths)) => EngineConfig::load_or_default(&paths.config_file()).into_diagnostic()?,
        (None, Err(_)) => EngineConfig::default(),
    };

    if cli.ephemeral {
        config.data_dir = None;
    } else if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.clone());
    } else if config.data_dir.is_none() {
        match paths {
            Ok(paths) => config.data_dir = Some(paths.layout_dir()),
            Err(e) => {
                tracing::warn!(error = %e, "no default data directory, layout state is not persisted");
            }
        }
    }
    Ok(config)
}

fn load_engine(config: EngineConfig, corpus: &Corpus) -> Result<Engine> {
    let mut engine = Engine::new(config);
    engine.rebuild(corpus);
    Ok(engine)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{json}");
    Ok(())
}

/// Read a `{"<node id>": {"x": .., "y": ..}}` JSON file.
fn read_positions(path: &Path) -> Result<HashMap<NodeId, Position>> {
    let text = std::fs::read_to_string(path).into_diagnostic()?;
    serde_json::from_str(&text).into_diagnostic()
}
