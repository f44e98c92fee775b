//! StereoSet invocation.
//!
//! The scoring itself lives behind [`ScoringEngine`]. The adapter hands the
//! engine the resolved model, its tokenizer, the corpus location, the batch
//! size and the generative flag that selects the engine's scoring strategy,
//! then returns whatever structured result the engine produced.

pub mod command;

use std::num::NonZeroUsize;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::error::{BenchmarkExecutionError, ScoringError};
use crate::model::{LanguageModel, ResolvedModel, Tokenizer};

pub use command::CommandScoringEngine;

/// Structured result of one scoring run, persisted verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BenchmarkResult(serde_json::Value);

impl BenchmarkResult {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

impl From<serde_json::Value> for BenchmarkResult {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Arguments of one scoring invocation.
#[derive(Debug, Clone, Copy)]
pub struct ScoringRequest<'a> {
    pub model: &'a dyn LanguageModel,
    pub tokenizer: &'a dyn Tokenizer,
    pub input_file: &'a Path,
    /// Label the engine records inside its result.
    pub model_name_or_path: &'a str,
    pub batch_size: NonZeroUsize,
    /// Token-by-token generation likelihood when `true`, masked-fill
    /// likelihood when `false`.
    pub is_generative: bool,
}

/// External component that computes StereoSet scores.
#[async_trait]
pub trait ScoringEngine: Send + Sync {
    /// Run the intrasentence evaluation once. Any batching happens inside.
    async fn score(&self, request: ScoringRequest<'_>) -> Result<BenchmarkResult, ScoringError>;
}

/// Invokes a [`ScoringEngine`] with a resolved model.
pub struct BenchmarkAdapter<E> {
    engine: E,
}

impl<E: ScoringEngine> BenchmarkAdapter<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Score `resolved` against the corpus at `input_file`.
    ///
    /// The model is consumed: it serves exactly this one invocation.
    pub async fn run(
        &self,
        resolved: ResolvedModel,
        input_file: &Path,
        batch_size: NonZeroUsize,
    ) -> Result<BenchmarkResult, BenchmarkExecutionError> {
        let corpus_present = tokio::fs::try_exists(input_file).await.map_err(|source| {
            BenchmarkExecutionError::InputUnreadable {
                path: input_file.to_path_buf(),
                source,
            }
        })?;
        if !corpus_present {
            return Err(BenchmarkExecutionError::InputNotFound {
                path: input_file.to_path_buf(),
            });
        }

        let request = ScoringRequest {
            model: resolved.model(),
            tokenizer: resolved.tokenizer(),
            input_file,
            model_name_or_path: resolved.name_or_path(),
            batch_size,
            is_generative: resolved.is_generative(),
        };
        debug!(
            input_file = %input_file.display(),
            batch_size = batch_size.get(),
            is_generative = request.is_generative,
            "invoking scoring engine"
        );

        self.engine
            .score(request)
            .await
            .map_err(|source| BenchmarkExecutionError::Scoring {
                model_name_or_path: resolved.name_or_path().to_string(),
                source,
            })
    }
}
