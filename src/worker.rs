//! Background pipeline execution.
//!
//! [`PipelineWorker`] owns one thread that runs build, filter and isolation
//! requests off the caller's thread. Each stage is a lane with its own
//! generation counter: submitting a request bumps the lane's generation, and
//! the worker discards any request or result whose generation is no longer
//! current. The newest request per lane wins.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::corpus::Corpus;
use crate::error::EngineError;
use crate::graph::builder::{BuildConfig, BuildOutput, build_graph};
use crate::graph::filter::{FilterSpec, FilteredGraph, apply_filter};
use crate::graph::isolate::{clamp_depth, isolate};
use crate::graph::metrics::{MetricsSummary, SizingMode, apply_metrics};
use crate::graph::{GraphData, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    Build,
    Filter,
    Isolate,
}

impl Lane {
    fn index(self) -> usize {
        match self {
            Lane::Build => 0,
            Lane::Filter => 1,
            Lane::Isolate => 2,
        }
    }
}

enum Request {
    Build {
        generation: u64,
        corpus: Arc<Corpus>,
        config: BuildConfig,
    },
    Filter {
        generation: u64,
        graph: Arc<GraphData>,
        spec: FilterSpec,
        sizing: SizingMode,
    },
    Isolate {
        generation: u64,
        graph: Arc<GraphData>,
        root: NodeId,
        depth: u8,
    },
}

impl Request {
    fn lane(&self) -> Lane {
        match self {
            Request::Build { .. } => Lane::Build,
            Request::Filter { .. } => Lane::Filter,
            Request::Isolate { .. } => Lane::Isolate,
        }
    }

    fn generation(&self) -> u64 {
        match self {
            Request::Build { generation, .. }
            | Request::Filter { generation, .. }
            | Request::Isolate { generation, .. } => *generation,
        }
    }
}

/// A completed stage, tagged with the generation it was computed for.
#[derive(Debug, Clone)]
pub enum PipelineResult {
    Built {
        generation: u64,
        output: BuildOutput,
    },
    /// Filtered graph with degrees and sizes applied.
    Filtered {
        generation: u64,
        filtered: FilteredGraph,
        summary: MetricsSummary,
    },
    Isolated {
        generation: u64,
        graph: GraphData,
    },
}

impl PipelineResult {
    pub fn lane(&self) -> Lane {
        match self {
            PipelineResult::Built { .. } => Lane::Build,
            PipelineResult::Filtered { .. } => Lane::Filter,
            PipelineResult::Isolated { .. } => Lane::Isolate,
        }
    }

    pub fn generation(&self) -> u64 {
        match self {
            PipelineResult::Built { generation, .. }
            | PipelineResult::Filtered { generation, .. }
            | PipelineResult::Isolated { generation, .. } => *generation,
        }
    }
}

type Generations = Arc<[AtomicU64; 3]>;

fn is_current(generations: &Generations, lane: Lane, generation: u64) -> bool {
    generations[lane.index()].load(Ordering::Acquire) == generation
}

/// Handle to the background pipeline thread.
pub struct PipelineWorker {
    tx: Option<mpsc::Sender<Request>>,
    rx: mpsc::Receiver<PipelineResult>,
    generations: Generations,
    handle: Option<thread::JoinHandle<()>>,
}

impl PipelineWorker {
    pub fn spawn() -> Result<Self, EngineError> {
        let (req_tx, req_rx) = mpsc::channel::<Request>();
        let (res_tx, res_rx) = mpsc::channel::<PipelineResult>();
        let generations: Generations = Arc::new([
            AtomicU64::new(0),
            AtomicU64::new(0),
            AtomicU64::new(0),
        ]);

        let worker_gens = Arc::clone(&generations);
        let handle = thread::Builder::new()
            .name("intel-graph-pipeline".into())
            .spawn(move || run(req_rx, res_tx, worker_gens))
            .map_err(|e| {
                tracing::warn!(error = %e, "failed to spawn pipeline thread");
                EngineError::WorkerGone
            })?;

        Ok(Self {
            tx: Some(req_tx),
            rx: res_rx,
            generations,
            handle: Some(handle),
        })
    }

    fn bump(&self, lane: Lane) -> u64 {
        self.generations[lane.index()].fetch_add(1, Ordering::AcqRel) + 1
    }

    fn send(&self, request: Request) -> Result<u64, EngineError> {
        let generation = request.generation();
        self.tx
            .as_ref()
            .ok_or(EngineError::WorkerGone)?
            .send(request)
            .map_err(|_| EngineError::WorkerGone)?;
        Ok(generation)
    }

    pub fn submit_build(&self, corpus: Arc<Corpus>, config: BuildConfig) -> Result<u64, EngineError> {
        let generation = self.bump(Lane::Build);
        self.send(Request::Build {
            generation,
            corpus,
            config,
        })
    }

    pub fn submit_filter(
        &self,
        graph: Arc<GraphData>,
        spec: FilterSpec,
        sizing: SizingMode,
    ) -> Result<u64, EngineError> {
        let generation = self.bump(Lane::Filter);
        self.send(Request::Filter {
            generation,
            graph,
            spec,
            sizing,
        })
    }

    pub fn submit_isolate(
        &self,
        graph: Arc<GraphData>,
        root: NodeId,
        depth: usize,
    ) -> Result<u64, EngineError> {
        let generation = self.bump(Lane::Isolate);
        self.send(Request::Isolate {
            generation,
            graph,
            root,
            depth: clamp_depth(depth),
        })
    }

    /// Latest generation issued for `lane`.
    pub fn generation(&self, lane: Lane) -> u64 {
        self.generations[lane.index()].load(Ordering::Acquire)
    }

    /// Next current result, if one is ready. Stale results are skipped.
    pub fn try_recv(&self) -> Result<Option<PipelineResult>, EngineError> {
        loop {
            match self.rx.try_recv() {
                Ok(result) if self.is_fresh(&result) => return Ok(Some(result)),
                Ok(stale) => {
                    tracing::debug!(lane = ?stale.lane(), generation = stale.generation(), "dropping stale result");
                }
                Err(mpsc::TryRecvError::Empty) => return Ok(None),
                Err(mpsc::TryRecvError::Disconnected) => return Err(EngineError::WorkerGone),
            }
        }
    }

    /// Wait up to `timeout` for the next current result.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<PipelineResult>, EngineError> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(result) if self.is_fresh(&result) => return Ok(Some(result)),
                Ok(_) => continue,
                Err(mpsc::RecvTimeoutError::Timeout) => return Ok(None),
                Err(mpsc::RecvTimeoutError::Disconnected) => return Err(EngineError::WorkerGone),
            }
        }
    }

    fn is_fresh(&self, result: &PipelineResult) -> bool {
        is_current(&self.generations, result.lane(), result.generation())
    }
}

impl Drop for PipelineWorker {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop.
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for PipelineWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineWorker")
            .field("build", &self.generation(Lane::Build))
            .field("filter", &self.generation(Lane::Filter))
            .field("isolate", &self.generation(Lane::Isolate))
            .finish()
    }
}

fn run(requests: mpsc::Receiver<Request>, results: mpsc::Sender<PipelineResult>, generations: Generations) {
    while let Ok(request) = requests.recv() {
        let lane = request.lane();
        let generation = request.generation();
        if !is_current(&generations, lane, generation) {
            tracing::debug!(?lane, generation, "skipping superseded request");
            continue;
        }

        let result = match request {
            Request::Build { corpus, config, .. } => PipelineResult::Built {
                generation,
                output: build_graph(&corpus, &config),
            },
            Request::Filter {
                graph, spec, sizing, ..
            } => {
                let mut filtered = apply_filter(&graph, &spec);
                let summary = apply_metrics(&mut filtered.graph, sizing);
                PipelineResult::Filtered {
                    generation,
                    filtered,
                    summary,
                }
            }
            Request::Isolate {
                graph, root, depth, ..
            } => PipelineResult::Isolated {
                generation,
                graph: isolate(&graph, &root, depth as usize),
            },
        };

        if !is_current(&generations, lane, generation) {
            tracing::debug!(?lane, generation, "discarding result superseded during compute");
            continue;
        }
        if results.send(result).is_err() {
            break;
        }
    }
}
