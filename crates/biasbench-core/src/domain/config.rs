//! Immutable run configuration.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::error::ConfigError;

/// Name of the benchmark every run executes.
pub const BENCHMARK_NAME: &str = "stereoset";

/// Default model class when none is given.
pub const DEFAULT_MODEL_CLASS: &str = "AutoModelForMaskedLM";

/// Default model identifier when none is given.
pub const DEFAULT_MODEL_NAME_OR_PATH: &str = "distilroberta-base";

/// Parameters of a single benchmark run, built once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunConfig {
    benchmark: String,
    model_class: String,
    model_name_or_path: String,
    batch_size: NonZeroUsize,
    seed: Option<i64>,
    persistent_dir: PathBuf,
}

impl RunConfig {
    /// Create a config with batch size 1 and no seed.
    pub fn new(
        model_class: impl Into<String>,
        model_name_or_path: impl Into<String>,
        persistent_dir: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let model_class = model_class.into();
        let model_name_or_path = model_name_or_path.into();

        if model_class.is_empty() {
            return Err(ConfigError::EmptyField {
                field: "model class",
            });
        }
        if model_name_or_path.is_empty() {
            return Err(ConfigError::EmptyField {
                field: "model name or path",
            });
        }

        Ok(Self {
            benchmark: BENCHMARK_NAME.to_string(),
            model_class,
            model_name_or_path,
            batch_size: NonZeroUsize::MIN,
            seed: None,
            persistent_dir: persistent_dir.into(),
        })
    }

    /// Set the batch size used during intrasentence scoring.
    pub fn with_batch_size(mut self, batch_size: usize) -> Result<Self, ConfigError> {
        self.batch_size =
            NonZeroUsize::new(batch_size).ok_or(ConfigError::InvalidBatchSize(batch_size))?;
        Ok(self)
    }

    /// Set the seed recorded in the experiment id.
    pub fn with_seed(mut self, seed: Option<i64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn benchmark(&self) -> &str {
        &self.benchmark
    }

    pub fn model_class(&self) -> &str {
        &self.model_class
    }

    pub fn model_name_or_path(&self) -> &str {
        &self.model_name_or_path
    }

    pub fn batch_size(&self) -> NonZeroUsize {
        self.batch_size
    }

    pub fn seed(&self) -> Option<i64> {
        self.seed
    }

    pub fn persistent_dir(&self) -> &Path {
        &self.persistent_dir
    }

    /// `<persistent_dir>/data/stereoset/test.json`
    pub fn input_file(&self) -> PathBuf {
        self.persistent_dir
            .join("data")
            .join(&self.benchmark)
            .join("test.json")
    }

    /// `<persistent_dir>/results/stereoset`
    pub fn results_dir(&self) -> PathBuf {
        results_dir(&self.persistent_dir)
    }
}

/// Results directory for a persistent root.
pub fn results_dir(persistent_dir: &Path) -> PathBuf {
    persistent_dir.join("results").join(BENCHMARK_NAME)
}
