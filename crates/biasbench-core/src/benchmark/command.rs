//! Scoring through an external scorer process.
//!
//! The request is written to the scorer's stdin as one JSON object; the
//! scorer prints the result JSON on stdout and exits 0.

use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tracing::debug;

use super::{BenchmarkResult, ScoringEngine, ScoringRequest};
use crate::domain::error::ScoringError;
use crate::model::TokenizerKind;

/// Trailing stderr bytes kept in an exit error.
const STDERR_TAIL: usize = 2048;

/// Wire form of a [`ScoringRequest`].
#[derive(Debug, Serialize)]
struct ScorerInput<'a> {
    model_class: &'a str,
    model_name_or_path: &'a str,
    tokenizer: TokenizerKind,
    input_file: &'a Path,
    batch_size: usize,
    is_generative: bool,
}

impl<'a> From<&ScoringRequest<'a>> for ScorerInput<'a> {
    fn from(request: &ScoringRequest<'a>) -> Self {
        Self {
            model_class: request.model.archetype().name(),
            model_name_or_path: request.model_name_or_path,
            tokenizer: request.tokenizer.kind(),
            input_file: request.input_file,
            batch_size: request.batch_size.get(),
            is_generative: request.is_generative,
        }
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.chars().count() <= STDERR_TAIL {
        return text.to_string();
    }
    let start = text
        .char_indices()
        .rev()
        .nth(STDERR_TAIL - 1)
        .map_or(0, |(idx, _)| idx);
    format!("...{}", &text[start..])
}

async fn feed_request(stdin: &mut ChildStdin, payload: &[u8]) -> std::io::Result<()> {
    stdin.write_all(payload).await?;
    stdin.shutdown().await
}

/// [`ScoringEngine`] that runs an external program once per request.
#[derive(Debug, Clone)]
pub struct CommandScoringEngine {
    program: String,
    args: Vec<String>,
}

impl CommandScoringEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl ScoringEngine for CommandScoringEngine {
    async fn score(&self, request: ScoringRequest<'_>) -> Result<BenchmarkResult, ScoringError> {
        let payload = serde_json::to_vec(&ScorerInput::from(&request))
            .map_err(|e| ScoringError::Other(e.into()))?;

        debug!(program = %self.program, args = ?self.args, "spawning scorer");
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ScoringError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            match feed_request(&mut stdin, &payload).await {
                Ok(()) => {}
                // the exit status and stdout decide whether the run worked
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    debug!(program = %self.program, "scorer closed stdin before reading the request");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(ScoringError::Exited {
                program: self.program.clone(),
                code: output.status.code().unwrap_or(-1),
                stderr: stderr_tail(&output.stderr),
            });
        }

        let value: serde_json::Value =
            serde_json::from_slice(&output.stdout).map_err(ScoringError::InvalidOutput)?;
        Ok(BenchmarkResult::new(value))
    }
}
