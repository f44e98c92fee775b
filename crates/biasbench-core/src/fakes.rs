//! In-memory fakes for the collaborator traits (testing only)
//!
//! Provides `StubModelLibrary` and `StubScoringEngine`, which satisfy the
//! trait contracts without touching disk, network or a scorer process.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::benchmark::{BenchmarkResult, ScoringEngine, ScoringRequest};
use crate::domain::error::{ResolutionError, ScoringError};
use crate::model::{LanguageModel, ModelArchetype, ModelLibrary, Tokenizer, TokenizerKind};

// ---------------------------------------------------------------------------
// StubModelLibrary
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct StubModel {
    archetype: ModelArchetype,
    name_or_path: String,
    training: bool,
}

impl LanguageModel for StubModel {
    fn archetype(&self) -> ModelArchetype {
        self.archetype
    }

    fn name_or_path(&self) -> &str {
        &self.name_or_path
    }

    fn eval(&mut self) {
        self.training = false;
    }

    fn is_training(&self) -> bool {
        self.training
    }
}

#[derive(Debug)]
struct StubTokenizer {
    name_or_path: String,
}

impl Tokenizer for StubTokenizer {
    fn name_or_path(&self) -> &str {
        &self.name_or_path
    }

    fn kind(&self) -> TokenizerKind {
        TokenizerKind::Fast
    }
}

/// Model library that loads any identifier except those marked missing.
#[derive(Debug, Default)]
pub struct StubModelLibrary {
    missing: HashSet<String>,
    load_calls: AtomicUsize,
}

impl StubModelLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `name_or_path` fail with `ModelNotFound`.
    pub fn missing(mut self, name_or_path: &str) -> Self {
        self.missing.insert(name_or_path.to_string());
        self
    }

    /// Number of model and tokenizer loads attempted.
    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    fn check(&self, name_or_path: &str) -> Result<(), ResolutionError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if self.missing.contains(name_or_path) {
            return Err(ResolutionError::ModelNotFound {
                identifier: name_or_path.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ModelLibrary for StubModelLibrary {
    async fn load_model(
        &self,
        archetype: ModelArchetype,
        name_or_path: &str,
    ) -> Result<Box<dyn LanguageModel>, ResolutionError> {
        self.check(name_or_path)?;
        Ok(Box::new(StubModel {
            archetype,
            name_or_path: name_or_path.to_string(),
            training: true,
        }))
    }

    async fn load_tokenizer(
        &self,
        name_or_path: &str,
    ) -> Result<Box<dyn Tokenizer>, ResolutionError> {
        self.check(name_or_path)?;
        Ok(Box::new(StubTokenizer {
            name_or_path: name_or_path.to_string(),
        }))
    }
}

// ---------------------------------------------------------------------------
// StubScoringEngine
// ---------------------------------------------------------------------------

/// What a [`StubScoringEngine`] saw in one call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub model_class: String,
    pub model_name_or_path: String,
    pub tokenizer_name_or_path: String,
    pub input_file: PathBuf,
    pub batch_size: usize,
    pub is_generative: bool,
    pub model_training: bool,
}

#[derive(Debug)]
enum StubOutcome {
    Return(serde_json::Value),
    Fail(String),
}

/// Scoring engine returning a canned result or a canned failure.
#[derive(Debug)]
pub struct StubScoringEngine {
    outcome: StubOutcome,
    calls: Mutex<Vec<RecordedRequest>>,
}

impl StubScoringEngine {
    pub fn returning(result: serde_json::Value) -> Self {
        Self {
            outcome: StubOutcome::Return(result),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: StubOutcome::Fail(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedRequest> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScoringEngine for StubScoringEngine {
    async fn score(&self, request: ScoringRequest<'_>) -> Result<BenchmarkResult, ScoringError> {
        self.calls.lock().unwrap().push(RecordedRequest {
            model_class: request.model.archetype().name().to_string(),
            model_name_or_path: request.model_name_or_path.to_string(),
            tokenizer_name_or_path: request.tokenizer.name_or_path().to_string(),
            input_file: request.input_file.to_path_buf(),
            batch_size: request.batch_size.get(),
            is_generative: request.is_generative,
            model_training: request.model.is_training(),
        });

        match &self.outcome {
            StubOutcome::Return(value) => Ok(BenchmarkResult::new(value.clone())),
            StubOutcome::Fail(message) => Err(anyhow::anyhow!("{message}").into()),
        }
    }
}
