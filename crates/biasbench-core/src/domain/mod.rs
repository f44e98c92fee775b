//! Domain models for biasbench.
//!
//! - `RunConfig`: immutable parameters of one run
//! - `ExperimentId`: reproducible name derived from those parameters
//! - error taxonomy shared by every pipeline stage

pub mod config;
pub mod error;
pub mod experiment;

pub use config::{
    results_dir, RunConfig, BENCHMARK_NAME, DEFAULT_MODEL_CLASS, DEFAULT_MODEL_NAME_OR_PATH,
};
pub use error::{
    BenchmarkExecutionError, ConfigError, HarnessError, PersistenceError, ResolutionError, Result,
    ScoringError,
};
pub use experiment::{make_id, ExperimentFields, ExperimentId};
