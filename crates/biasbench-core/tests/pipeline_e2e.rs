//! End-to-end pipeline scenarios: experiment identity, persistence and
//! fault isolation.

use std::path::Path;

use biasbench_core::fakes::{StubModelLibrary, StubScoringEngine};
use biasbench_core::{
    make_id, BenchmarkExecutionError, CommandScoringEngine, HarnessError, Pipeline,
    PretrainedLibrary, ResultPersister, RunConfig,
};
use serde_json::{json, Value};

fn seed_corpus(root: &Path) {
    let data = root.join("data/stereoset");
    std::fs::create_dir_all(&data).expect("create data dir");
    std::fs::write(
        data.join("test.json"),
        br#"{"version": "1.0-test", "data": {"intrasentence": []}}"#,
    )
    .expect("write corpus");
}

fn stereoset_result() -> Value {
    json!({
        "intrasentence": {
            "gender": {"Count": 2.0, "LM Score": 87.5, "SS Score": 62.5, "ICAT Score": 65.6},
            "overall": {"Count": 2.0, "LM Score": 87.5, "SS Score": 62.5, "ICAT Score": 65.6}
        },
        "model": "demo-model"
    })
}

fn demo_config(root: &Path) -> RunConfig {
    RunConfig::new("AutoModelForMaskedLM", "demo-model", root)
        .expect("config")
        .with_batch_size(2)
        .expect("batch size")
}

fn results_entries(root: &Path) -> Vec<String> {
    match std::fs::read_dir(root.join("results/stereoset")) {
        Ok(entries) => entries
            .map(|e| e.expect("entry").file_name().to_string_lossy().to_string())
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[tokio::test]
async fn masked_run_writes_result_at_deterministic_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_corpus(dir.path());
    let config = demo_config(dir.path());

    let pipeline = Pipeline::new(
        StubModelLibrary::new(),
        StubScoringEngine::returning(stereoset_result()),
    );
    let outcome = pipeline.run(&config).await.expect("run");

    let expected_id = make_id("stereoset", "AutoModelForMaskedLM", "demo-model", None);
    assert_eq!(outcome.experiment_id, expected_id);
    assert_eq!(
        expected_id.as_str(),
        "stereoset_m-AutoModelForMaskedLM_c-demo-model_s-none"
    );
    assert!(!outcome.is_generative);

    let path = dir
        .path()
        .join("results/stereoset")
        .join(format!("{}.json", expected_id));
    assert_eq!(outcome.artifact.path, path);

    let written: Value =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("read artifact"))
            .expect("artifact is JSON");
    assert_eq!(written, stereoset_result());

    let call = &pipeline.engine().calls()[0];
    assert!(!call.is_generative);
    assert_eq!(call.batch_size, 2);
    assert_eq!(call.model_name_or_path, "demo-model");
    assert_eq!(call.tokenizer_name_or_path, "demo-model");
}

#[tokio::test]
async fn identical_reruns_leave_one_byte_identical_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_corpus(dir.path());
    let config = demo_config(dir.path());
    let pipeline = Pipeline::new(
        StubModelLibrary::new(),
        StubScoringEngine::returning(stereoset_result()),
    );

    let first = pipeline.run(&config).await.expect("first run");
    let first_bytes = std::fs::read(&first.artifact.path).expect("read first");
    let second = pipeline.run(&config).await.expect("second run");
    let second_bytes = std::fs::read(&second.artifact.path).expect("read second");

    assert_eq!(first.artifact.path, second.artifact.path);
    assert_eq!(first_bytes, second_bytes);
    assert_eq!(first.artifact.digest, second.artifact.digest);
    assert_eq!(results_entries(dir.path()).len(), 1);
}

#[tokio::test]
async fn distinct_seeds_write_disjoint_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_corpus(dir.path());
    let pipeline = Pipeline::new(
        StubModelLibrary::new(),
        StubScoringEngine::returning(stereoset_result()),
    );

    for seed in [None, Some(0), Some(1)] {
        let config = demo_config(dir.path()).with_seed(seed);
        pipeline.run(&config).await.expect("run");
    }

    let mut entries = results_entries(dir.path());
    entries.sort();
    assert_eq!(
        entries,
        vec![
            "stereoset_m-AutoModelForMaskedLM_c-demo-model_s-0.json",
            "stereoset_m-AutoModelForMaskedLM_c-demo-model_s-1.json",
            "stereoset_m-AutoModelForMaskedLM_c-demo-model_s-none.json",
        ]
    );

    let listed = ResultPersister::new(dir.path()).list().expect("list");
    let seeds: Vec<_> = listed
        .iter()
        .map(|s| s.fields.as_ref().expect("decodable").seed)
        .collect();
    assert_eq!(seeds, vec![Some(0), Some(1), None]);
}

#[tokio::test]
async fn scoring_failure_writes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_corpus(dir.path());
    let pipeline = Pipeline::new(
        StubModelLibrary::new(),
        StubScoringEngine::failing("tokenizer/model mismatch"),
    );

    let err = pipeline
        .run(&demo_config(dir.path()))
        .await
        .expect_err("scoring fails");
    match err {
        HarnessError::Execution(BenchmarkExecutionError::Scoring { source, .. }) => {
            assert!(source.to_string().contains("tokenizer/model mismatch"));
        }
        other => panic!("expected Execution(Scoring), got {other:?}"),
    }
    assert!(results_entries(dir.path()).is_empty());
}

#[tokio::test]
async fn rerun_after_failure_replaces_stale_artifact() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_corpus(dir.path());
    let config = demo_config(dir.path());

    let stale = Pipeline::new(
        StubModelLibrary::new(),
        StubScoringEngine::returning(json!({"stale": true})),
    );
    stale.run(&config).await.expect("stale run");

    let broken = Pipeline::new(StubModelLibrary::new(), StubScoringEngine::failing("oom"));
    broken.run(&config).await.expect_err("broken run");
    let id = make_id("stereoset", "AutoModelForMaskedLM", "demo-model", None);
    let persister = ResultPersister::new(dir.path());
    assert_eq!(
        persister.load(&id).expect("load").into_value(),
        json!({"stale": true}),
        "failed run leaves the previous artifact untouched"
    );

    let fixed = Pipeline::new(
        StubModelLibrary::new(),
        StubScoringEngine::returning(stereoset_result()),
    );
    fixed.run(&config).await.expect("fixed run");
    assert_eq!(
        persister.load(&id).expect("load").into_value(),
        stereoset_result()
    );
}

#[tokio::test]
async fn long_checkpoint_path_still_persists() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_corpus(dir.path());
    let checkpoint = format!(
        "/scratch/users/researcher/{}/hf-export-fp32-merged/v2/extra-long-suffix",
        "checkpoints/".repeat(14)
    );
    assert!(checkpoint.len() >= 200);
    let config = RunConfig::new("RobertaForMaskedLM", checkpoint.clone(), dir.path())
        .expect("config")
        .with_seed(Some(7));
    let pipeline = Pipeline::new(
        StubModelLibrary::new(),
        StubScoringEngine::returning(stereoset_result()),
    );

    let outcome = pipeline.run(&config).await.expect("run");
    assert_eq!(pipeline.engine().calls().len(), 1);
    assert!(outcome.artifact.path.is_file());
    let file_name = outcome
        .artifact
        .path
        .file_name()
        .expect("file name")
        .to_string_lossy()
        .to_string();
    assert!(file_name.len() <= 255, "{} bytes", file_name.len());
    assert!(file_name.starts_with("stereoset_m-RobertaForMaskedLM_c-%2Fscratch"));

    let listed = ResultPersister::new(dir.path()).list().expect("list");
    assert_eq!(listed.len(), 1);
    assert!(listed[0].fields.is_none(), "digested ids are listed undecoded");
}

#[tokio::test]
async fn unknown_model_class_fails_before_loading() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_corpus(dir.path());
    let config = RunConfig::new("NotARealModelClass", "any-id", dir.path()).expect("config");
    let pipeline = Pipeline::new(
        StubModelLibrary::new(),
        StubScoringEngine::returning(json!({})),
    );

    let err = pipeline.run(&config).await.expect_err("unknown class");
    assert!(matches!(err, HarnessError::Resolution(_)));
    assert!(err.to_string().contains("NotARealModelClass"));
    assert_eq!(pipeline.library().load_calls(), 0);
}

#[cfg(unix)]
#[tokio::test]
async fn local_checkpoint_with_command_scorer() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_corpus(dir.path());

    let checkpoint = dir.path().join("models/tiny-gpt2");
    std::fs::create_dir_all(&checkpoint).expect("checkpoint dir");
    std::fs::write(checkpoint.join("config.json"), br#"{"model_type": "gpt2"}"#).expect("config");
    std::fs::write(checkpoint.join("model.safetensors"), b"weights").expect("weights");
    std::fs::write(checkpoint.join("tokenizer.json"), b"{}").expect("tokenizer");
    let checkpoint = checkpoint.to_str().expect("utf-8 path").to_string();

    // echo the request back so the artifact shows what the scorer received
    let engine = CommandScoringEngine::new("cat");
    let pipeline = Pipeline::new(PretrainedLibrary::new(), engine);
    let config = RunConfig::new("GPT2LMHeadModel", checkpoint.clone(), dir.path())
        .expect("config")
        .with_seed(Some(42));

    let outcome = pipeline.run(&config).await.expect("run");
    assert!(outcome.is_generative);
    assert!(!outcome.artifact.path.to_string_lossy().contains("models/tiny-gpt2"));

    let written: Value =
        serde_json::from_slice(&std::fs::read(&outcome.artifact.path).expect("read"))
            .expect("json");
    assert_eq!(written["model_class"], "GPT2LMHeadModel");
    assert_eq!(written["model_name_or_path"], checkpoint.as_str());
    assert_eq!(written["tokenizer"], "fast");
    assert_eq!(written["batch_size"], 1);
    assert_eq!(written["is_generative"], true);
}
