//! Structured lifecycle events for a benchmark run.
//!
//! Every run is instrumented with [`run_span`], so events emitted by any
//! stage carry the experiment id.

use std::path::Path;

use tracing::{info, warn};

use crate::domain::config::RunConfig;
use crate::domain::experiment::ExperimentId;

/// Run-scoped span tagged with the experiment id.
///
/// ```ignore
/// pipeline_future.instrument(run_span(&experiment_id)).await
/// ```
pub fn run_span(experiment_id: &ExperimentId) -> tracing::Span {
    tracing::info_span!("biasbench.run", experiment_id = %experiment_id)
}

/// Emit event: run started, with the full configuration.
pub fn emit_run_started(experiment_id: &ExperimentId, config: &RunConfig) {
    info!(
        event = "run.started",
        experiment_id = %experiment_id,
        persistent_dir = %config.persistent_dir().display(),
        model = %config.model_class(),
        model_name_or_path = %config.model_name_or_path(),
        batch_size = config.batch_size().get(),
        seed = ?config.seed(),
    );
}

/// Emit event: model and tokenizer loaded.
pub fn emit_model_resolved(experiment_id: &ExperimentId, model_class: &str, is_generative: bool) {
    info!(
        event = "model.resolved",
        experiment_id = %experiment_id,
        model = %model_class,
        is_generative = is_generative,
    );
}

/// Emit event: result artifact published.
pub fn emit_result_persisted(experiment_id: &ExperimentId, path: &Path, digest: &str) {
    info!(
        event = "result.persisted",
        experiment_id = %experiment_id,
        path = %path.display(),
        digest = %digest,
    );
}

/// Emit event: run finished successfully.
pub fn emit_run_finished(experiment_id: &ExperimentId, duration_ms: u64) {
    info!(
        event = "run.finished",
        experiment_id = %experiment_id,
        duration_ms = duration_ms,
    );
}

/// Emit event: run failed (warning level).
pub fn emit_run_failed(experiment_id: &ExperimentId, stage: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "run.failed",
        experiment_id = %experiment_id,
        stage = %stage,
        error = %error,
    );
}
