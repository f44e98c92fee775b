//! biasbench - StereoSet bias benchmark runner
//!
//! Running `biasbench` with no subcommand scores one model on the StereoSet
//! test split and writes the result to
//! `<persistent-dir>/results/stereoset/<experiment id>.json`.
//!
//! ## Commands
//!
//! - `id`: Print the experiment id for the given flags without running
//! - `models`: List the supported model classes
//! - `results`: List stored results with their decoded run parameters

use std::path::PathBuf;

use anyhow::{Context, Result};
use biasbench_core::{
    CommandScoringEngine, ExperimentId, ModelArchetype, Pipeline, PretrainedLibrary,
    ResultPersister, RunConfig, DEFAULT_MODEL_CLASS, DEFAULT_MODEL_NAME_OR_PATH,
};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::{info, Level};

/// Scorer program used when neither `--scorer` nor `BIASBENCH_SCORER` is set.
const DEFAULT_SCORER: &str = "stereoset-scorer";

#[derive(Parser, Debug)]
#[command(name = "biasbench")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Measure stereotypical bias of pretrained language models on StereoSet", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines and command output
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Directory holding `data/stereoset/test.json`; results are written below it
    #[arg(long, global = true, env = "BIASBENCH_PERSISTENT_DIR", default_value = ".")]
    persistent_dir: PathBuf,

    /// Model class to load (see `biasbench models`)
    #[arg(long, global = true, env = "BIASBENCH_MODEL", default_value = DEFAULT_MODEL_CLASS)]
    model: String,

    /// Hub model name or local checkpoint directory
    #[arg(
        long,
        global = true,
        env = "BIASBENCH_MODEL_NAME_OR_PATH",
        default_value = DEFAULT_MODEL_NAME_OR_PATH
    )]
    model_name_or_path: String,

    /// Batch size for intrasentence scoring
    #[arg(long, global = true, env = "BIASBENCH_BATCH_SIZE", default_value = "1")]
    batch_size: usize,

    /// Seed recorded in the experiment id
    #[arg(long, global = true, env = "BIASBENCH_SEED", allow_negative_numbers = true)]
    seed: Option<i64>,

    /// Scorer program; receives the request as JSON on stdin
    #[arg(long, global = true, env = "BIASBENCH_SCORER", default_value = DEFAULT_SCORER)]
    scorer: String,

    /// Extra argument passed to the scorer (repeatable)
    #[arg(long = "scorer-arg", global = true, allow_hyphen_values = true)]
    scorer_args: Vec<String>,
}

impl RunArgs {
    fn to_config(&self) -> Result<RunConfig> {
        let config = RunConfig::new(
            self.model.clone(),
            self.model_name_or_path.clone(),
            self.persistent_dir.clone(),
        )
        .context("Invalid run configuration")?
        .with_batch_size(self.batch_size)
        .context("Invalid run configuration")?
        .with_seed(self.seed);
        Ok(config)
    }

    fn engine(&self) -> CommandScoringEngine {
        CommandScoringEngine::new(self.scorer.clone()).with_args(self.scorer_args.iter().cloned())
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the experiment id for the given flags
    Id,

    /// List supported model classes
    Models,

    /// List stored StereoSet results
    Results,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    biasbench_core::init_tracing(cli.json, level);

    match cli.command {
        None => cmd_run(&cli.run, cli.json).await,
        Some(Commands::Id) => {
            println!("{}", cmd_id(&cli.run)?);
            Ok(())
        }
        Some(Commands::Models) => {
            cmd_models(cli.json);
            Ok(())
        }
        Some(Commands::Results) => cmd_results(&cli.run, cli.json),
    }
}

async fn cmd_run(args: &RunArgs, json: bool) -> Result<()> {
    let config = args.to_config()?;
    let experiment_id = ExperimentId::from_config(&config);
    let pipeline = Pipeline::new(PretrainedLibrary::new(), args.engine());

    let outcome = pipeline
        .run(&config)
        .await
        .with_context(|| format!("StereoSet run {experiment_id} failed"))?;

    info!(
        experiment_id = %outcome.experiment_id,
        duration_ms = outcome.duration_ms,
        "StereoSet run complete"
    );

    if json {
        let record = json!({
            "experiment_id": outcome.experiment_id,
            "is_generative": outcome.is_generative,
            "path": outcome.artifact.path,
            "digest": outcome.artifact.digest,
            "duration_ms": outcome.duration_ms,
            "completed_at": outcome.completed_at,
        });
        println!("{record}");
    } else {
        println!("{}", outcome.artifact.path.display());
    }
    Ok(())
}

fn cmd_id(args: &RunArgs) -> Result<ExperimentId> {
    Ok(ExperimentId::from_config(&args.to_config()?))
}

fn cmd_models(json: bool) {
    for archetype in ModelArchetype::all() {
        if json {
            let record = json!({
                "name": archetype.name(),
                "kind": archetype.kind(),
                "is_generative": archetype.is_generative(),
            });
            println!("{record}");
        } else {
            let kind = if archetype.is_generative() {
                "generative"
            } else {
                "masked"
            };
            println!("{:<24} {kind}", archetype.name());
        }
    }
}

fn cmd_results(args: &RunArgs, json: bool) -> Result<()> {
    let persister = ResultPersister::new(&args.persistent_dir);
    let stored = persister.list().with_context(|| {
        format!(
            "Failed to list results in {}",
            persister.results_dir().display()
        )
    })?;

    if stored.is_empty() && !json {
        println!("No results in {}", persister.results_dir().display());
        return Ok(());
    }

    for result in &stored {
        if json {
            println!("{}", serde_json::to_string(result)?);
            continue;
        }
        match &result.fields {
            Some(fields) => {
                let seed = fields
                    .seed
                    .map_or_else(|| "-".to_string(), |s| s.to_string());
                println!(
                    "{:<24} {:<40} seed={:<6} {}",
                    fields.model_class,
                    fields.model_name_or_path,
                    seed,
                    result.path.display()
                );
            }
            None => println!("{:<24} {}", "(unrecognized)", result.path.display()),
        }
    }
    Ok(())
}
