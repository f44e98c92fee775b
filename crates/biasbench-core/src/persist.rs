//! Result persistence keyed by experiment id.
//!
//! Layout: `<persistent_dir>/results/stereoset/<experiment id>.json`
//!
//! Results are written to a temp file in the target directory and renamed
//! into place, so readers see either the previous artifact or the complete
//! new one. Same id, same path: a re-run overwrites.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::benchmark::BenchmarkResult;
use crate::domain::config::results_dir;
use crate::domain::error::PersistenceError;
use crate::domain::experiment::{ExperimentFields, ExperimentId};

const ARTIFACT_EXTENSION: &str = "json";

/// A result written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedArtifact {
    pub experiment_id: ExperimentId,
    pub path: PathBuf,
    /// SHA-256 hex of the written bytes.
    pub digest: String,
}

/// An artifact found in the results directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredResult {
    pub file_name: String,
    pub path: PathBuf,
    /// `None` when the file name is not an experiment id.
    pub fields: Option<ExperimentFields>,
}

/// Writes benchmark results under `results/stereoset/`.
#[derive(Debug, Clone)]
pub struct ResultPersister {
    results_dir: PathBuf,
}

impl ResultPersister {
    /// Nothing is created until the first [`persist`](Self::persist).
    pub fn new(persistent_dir: impl AsRef<Path>) -> Self {
        Self {
            results_dir: results_dir(persistent_dir.as_ref()),
        }
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    pub fn artifact_path(&self, experiment_id: &ExperimentId) -> PathBuf {
        self.results_dir.join(experiment_id.file_name())
    }

    /// Serialize `result` as indented JSON and publish it atomically.
    pub fn persist(
        &self,
        experiment_id: &ExperimentId,
        result: &BenchmarkResult,
    ) -> Result<PersistedArtifact, PersistenceError> {
        fs::create_dir_all(&self.results_dir).map_err(|source| PersistenceError::CreateDir {
            path: self.results_dir.clone(),
            source,
        })?;

        let path = self.artifact_path(experiment_id);
        let content =
            serde_json::to_string_pretty(result).map_err(|source| PersistenceError::Serialize {
                path: path.clone(),
                source,
            })?;

        let write_err = |source| PersistenceError::Write {
            path: path.clone(),
            source,
        };
        let mut tmp = NamedTempFile::new_in(&self.results_dir).map_err(write_err)?;
        tmp.write_all(content.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;

        Ok(PersistedArtifact {
            experiment_id: experiment_id.clone(),
            path,
            digest: hex::encode(Sha256::digest(content.as_bytes())),
        })
    }

    /// Read a stored result back.
    pub fn load(&self, experiment_id: &ExperimentId) -> Result<BenchmarkResult, PersistenceError> {
        let path = self.artifact_path(experiment_id);
        let raw = fs::read(&path).map_err(|source| PersistenceError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_slice(&raw).map_err(|source| PersistenceError::Corrupt { path, source })
    }

    /// Stored artifacts sorted by file name. A missing directory is empty.
    pub fn list(&self) -> Result<Vec<StoredResult>, PersistenceError> {
        let read_err = |source| PersistenceError::Read {
            path: self.results_dir.clone(),
            source,
        };
        let entries = match fs::read_dir(&self.results_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(read_err(e)),
        };

        let mut stored = Vec::new();
        for entry in entries {
            let path = entry.map_err(read_err)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ARTIFACT_EXTENSION) {
                continue;
            }
            let (Some(file_name), Some(stem)) = (
                path.file_name().and_then(|n| n.to_str()),
                path.file_stem().and_then(|s| s.to_str()),
            ) else {
                continue;
            };
            stored.push(StoredResult {
                file_name: file_name.to_string(),
                fields: ExperimentId::decode(stem),
                path: path.clone(),
            });
        }
        stored.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(stored)
    }
}
