//! Rich diagnostic error types for the intel-graph engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. Only a few of these ever reach a
//! caller: graph derivation recovers locally from malformed input, and the
//! layout manager swallows store failures after logging them.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the intel-graph engine.
#[derive(Debug, Error, Diagnostic)]
pub enum IntelError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Corpus(#[from] CorpusError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Engine(#[from] EngineError),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(intel::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(intel::store::redb),
        help(
            "The embedded layout cache encountered a transaction error. \
             The cache is disposable: remove the data directory to start fresh."
        )
    )]
    Redb { message: String },
}

// ---------------------------------------------------------------------------
// Corpus errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum CorpusError {
    #[error("corpus root not found: {path}")]
    #[diagnostic(
        code(intel::corpus::root_not_found),
        help("Pass an existing directory of markdown documents with `--corpus`.")
    )]
    RootNotFound { path: String },

    #[error("failed to read {path}")]
    #[diagnostic(
        code(intel::corpus::read),
        help("Check that the file is readable and valid UTF-8.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid relationship list in {path}: {message}")]
    #[diagnostic(
        code(intel::corpus::relationships),
        help(
            "relationships.json must be a JSON array of \
             {{\"source\": .., \"target\": .., \"predicate\"?: .., \"strength\"?: ..}} objects."
        )
    )]
    Relationships { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(intel::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(
        code(intel::config::parse),
        help("Check the TOML syntax and field names in the config file.")
    )]
    Parse { path: String, message: String },

    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(intel::config::invalid),
        help("Confidence values must lie in [0, 1] and `max_nodes` must be > 0.")
    )]
    Invalid { message: String },

    #[error("cannot determine home directory")]
    #[diagnostic(
        code(intel::config::no_home),
        help("Set the HOME environment variable or pass `--data-dir` explicitly.")
    )]
    NoHome,
}

// ---------------------------------------------------------------------------
// Engine errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    #[error("saved view not found: {view_id}")]
    #[diagnostic(
        code(intel::engine::view_not_found),
        help("List the views saved for this corpus with `intel-graph view list`.")
    )]
    ViewNotFound { view_id: String },

    #[error("saved view name must not be empty")]
    #[diagnostic(
        code(intel::engine::empty_view_name),
        help("Give the view a short descriptive name.")
    )]
    EmptyViewName,

    #[error("pipeline worker is no longer running")]
    #[diagnostic(
        code(intel::engine::worker_gone),
        help("The background worker thread exited; create a new PipelineWorker.")
    )]
    WorkerGone,
}

/// Convenience result type for top-level operations.
pub type IntelResult<T> = std::result::Result<T, IntelError>;
