//! One StereoSet run, end to end.
//!
//! experiment id -> model resolution -> scoring -> persistence. The pipeline
//! holds only its collaborators; every run is an independent linear pass and
//! the first error ends it.

use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::Instrument;

use crate::benchmark::{BenchmarkAdapter, ScoringEngine};
use crate::domain::config::RunConfig;
use crate::domain::error::{HarnessError, Result};
use crate::domain::experiment::ExperimentId;
use crate::model::{ModelLibrary, ModelResolver};
use crate::obs;
use crate::persist::{PersistedArtifact, ResultPersister};

/// Output of a successful run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub experiment_id: ExperimentId,
    pub is_generative: bool,
    pub artifact: PersistedArtifact,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

/// Wires model resolution, scoring and persistence together.
pub struct Pipeline<L, E> {
    resolver: ModelResolver<L>,
    adapter: BenchmarkAdapter<E>,
}

impl<L: ModelLibrary, E: ScoringEngine> Pipeline<L, E> {
    pub fn new(library: L, engine: E) -> Self {
        Self {
            resolver: ModelResolver::new(library),
            adapter: BenchmarkAdapter::new(engine),
        }
    }

    pub fn library(&self) -> &L {
        self.resolver.library()
    }

    pub fn engine(&self) -> &E {
        self.adapter.engine()
    }

    /// Run the benchmark described by `config` and persist its result.
    pub async fn run(&self, config: &RunConfig) -> Result<RunOutcome> {
        let experiment_id = ExperimentId::from_config(config);
        let span = obs::run_span(&experiment_id);

        let outcome = self.run_stages(config, &experiment_id).instrument(span.clone()).await;
        if let Err((stage, err)) = &outcome {
            let _guard = span.enter();
            obs::emit_run_failed(&experiment_id, stage, err);
        }
        outcome.map_err(|(_, err)| err)
    }

    async fn run_stages(
        &self,
        config: &RunConfig,
        experiment_id: &ExperimentId,
    ) -> std::result::Result<RunOutcome, (&'static str, HarnessError)> {
        let started = Instant::now();
        obs::emit_run_started(experiment_id, config);

        let resolved = self
            .resolver
            .resolve(config.model_class(), config.model_name_or_path())
            .await
            .map_err(|e| ("resolve", HarnessError::from(e)))?;
        let is_generative = resolved.is_generative();
        obs::emit_model_resolved(experiment_id, resolved.archetype().name(), is_generative);

        let result = self
            .adapter
            .run(resolved, &config.input_file(), config.batch_size())
            .await
            .map_err(|e| ("score", HarnessError::from(e)))?;

        let artifact = ResultPersister::new(config.persistent_dir())
            .persist(experiment_id, &result)
            .map_err(|e| ("persist", HarnessError::from(e)))?;
        obs::emit_result_persisted(experiment_id, &artifact.path, &artifact.digest);

        let duration_ms = started.elapsed().as_millis() as u64;
        obs::emit_run_finished(experiment_id, duration_ms);

        Ok(RunOutcome {
            experiment_id: experiment_id.clone(),
            is_generative,
            artifact,
            duration_ms,
            completed_at: Utc::now(),
        })
    }
}
