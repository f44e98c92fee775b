//! biasbench core library
//!
//! Runs the StereoSet bias benchmark against a pretrained language model and
//! stores the result under an experiment id derived from the run parameters.

pub mod benchmark;
pub mod domain;
pub mod fakes;
pub mod model;
pub mod obs;
pub mod persist;
pub mod pipeline;
pub mod telemetry;

pub use benchmark::{
    BenchmarkAdapter, BenchmarkResult, CommandScoringEngine, ScoringEngine, ScoringRequest,
};
pub use domain::{
    make_id, BenchmarkExecutionError, ConfigError, ExperimentFields, ExperimentId, HarnessError,
    PersistenceError, ResolutionError, Result, RunConfig, ScoringError, BENCHMARK_NAME,
    DEFAULT_MODEL_CLASS, DEFAULT_MODEL_NAME_OR_PATH,
};
pub use model::{
    LanguageModel, ModelArchetype, ModelKind, ModelLibrary, ModelResolver, PretrainedLibrary,
    ResolvedModel, Tokenizer, TokenizerKind,
};
pub use persist::{PersistedArtifact, ResultPersister, StoredResult};
pub use pipeline::{Pipeline, RunOutcome};
pub use telemetry::init_tracing;

/// biasbench version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
