//! Error taxonomy for a benchmark run.
//!
//! Every failure is terminal for the run. Each category keeps the offending
//! field or path so the operator can fix the configuration and re-run.

use std::path::PathBuf;

/// Errors produced while building a [`RunConfig`](super::config::RunConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("batch size must be at least 1, got {0}")]
    InvalidBatchSize(usize),

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },
}

/// Errors produced while resolving a model class and identifier.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("unknown model class {name:?} (supported: {supported})")]
    UnknownModelClass { name: String, supported: String },

    #[error("model {identifier:?} not found as a local directory or registry name")]
    ModelNotFound { identifier: String },

    #[error("model {identifier:?} has no weights file in {}", .dir.display())]
    MissingWeights { identifier: String, dir: PathBuf },

    #[error("model class {model_class} cannot load {identifier:?} (model_type {model_type:?})")]
    IncompatibleArchitecture {
        model_class: String,
        identifier: String,
        model_type: String,
    },

    #[error("invalid model config {}: {source}", .path.display())]
    InvalidModelConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no tokenizer files for {identifier:?} in {}", .dir.display())]
    TokenizerNotFound { identifier: String, dir: PathBuf },

    #[error("io error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by a scoring engine during one invocation.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("failed to start scorer {program:?}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("scorer {program:?} exited with status {code}: {stderr}")]
    Exited {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("scorer produced invalid result JSON: {0}")]
    InvalidOutput(#[source] serde_json::Error),

    #[error("scorer io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure of the benchmark invocation.
#[derive(Debug, thiserror::Error)]
pub enum BenchmarkExecutionError {
    #[error("input corpus not found: {}", .path.display())]
    InputNotFound { path: PathBuf },

    #[error("cannot access input corpus {}: {source}", .path.display())]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stereoset scoring failed for {model_name_or_path:?}: {source}")]
    Scoring {
        model_name_or_path: String,
        #[source]
        source: ScoringError,
    },
}

/// Failure writing the output artifact.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to create results directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize result for {}: {source}", .path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stored result {} is not valid JSON: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Top-level error of one pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("benchmark execution error: {0}")]
    Execution(#[from] BenchmarkExecutionError),

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Result type for a pipeline run.
pub type Result<T> = std::result::Result<T, HarnessError>;
