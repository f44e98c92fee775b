//! Pretrained checkpoints on disk or in a model hub.
//!
//! A local directory must look loadable: a `config.json` whose `model_type`
//! the requested class accepts, a weights file, and a tokenizer file set.
//! Anything that is not an existing path but is a well-formed hub name
//! (`name` or `org/name`) is kept as a remote reference; fetching it is the
//! scoring engine's job.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{LanguageModel, ModelArchetype, ModelLibrary, Tokenizer, TokenizerKind};
use crate::domain::error::ResolutionError;

const CONFIG_FILE: &str = "config.json";

const WEIGHT_FILES: &[&str] = &[
    "model.safetensors",
    "model.safetensors.index.json",
    "pytorch_model.bin",
    "pytorch_model.bin.index.json",
    "tf_model.h5",
    "flax_model.msgpack",
];

const SENTENCEPIECE_FILES: &[&str] = &["spiece.model", "sentencepiece.bpe.model", "tokenizer.model"];

fn hub_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*(/[A-Za-z0-9][A-Za-z0-9._-]*)?$")
            .expect("hub name pattern is valid")
    })
}

/// Where a checkpoint comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    Local(PathBuf),
    Remote(String),
}

impl ModelSource {
    async fn locate(name_or_path: &str) -> Result<Self, ResolutionError> {
        let path = Path::new(name_or_path);
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => return Ok(Self::Local(path.to_path_buf())),
            Ok(_) => {
                return Err(ResolutionError::ModelNotFound {
                    identifier: name_or_path.to_string(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(ResolutionError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }

        if hub_name_pattern().is_match(name_or_path) {
            if let Some(dir) = shadowing_local_dir(name_or_path).await {
                warn!(
                    identifier = %name_or_path,
                    local_dir = %dir.display(),
                    "treating identifier as a hub name, but its first segment is a local directory; \
                     a mistyped checkpoint path will fail at scoring time"
                );
            }
            Ok(Self::Remote(name_or_path.to_string()))
        } else {
            Err(ResolutionError::ModelNotFound {
                identifier: name_or_path.to_string(),
            })
        }
    }
}

/// Local directory named like the organisation part of `org/name`.
async fn shadowing_local_dir(name_or_path: &str) -> Option<PathBuf> {
    let (first, _) = name_or_path.split_once('/')?;
    let dir = PathBuf::from(first);
    match tokio::fs::metadata(&dir).await {
        Ok(meta) if meta.is_dir() => Some(dir),
        _ => None,
    }
}

/// Subset of `config.json` the loader checks.
#[derive(Debug, Deserialize)]
struct CheckpointConfig {
    model_type: Option<String>,
    #[serde(default)]
    architectures: Vec<String>,
}

async fn exists(path: &Path) -> Result<bool, ResolutionError> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|source| ResolutionError::Io {
            path: path.to_path_buf(),
            source,
        })
}

async fn any_exists(dir: &Path, names: &[&str]) -> Result<bool, ResolutionError> {
    for name in names {
        if exists(&dir.join(name)).await? {
            return Ok(true);
        }
    }
    Ok(false)
}

async fn read_config(dir: &Path) -> Result<CheckpointConfig, ResolutionError> {
    let path = dir.join(CONFIG_FILE);
    let raw = tokio::fs::read(&path)
        .await
        .map_err(|source| ResolutionError::Io {
            path: path.clone(),
            source,
        })?;
    serde_json::from_slice(&raw).map_err(|source| ResolutionError::InvalidModelConfig { path, source })
}

async fn detect_tokenizer(dir: &Path) -> Result<Option<TokenizerKind>, ResolutionError> {
    if exists(&dir.join("tokenizer.json")).await? {
        return Ok(Some(TokenizerKind::Fast));
    }
    if exists(&dir.join("vocab.json")).await? && exists(&dir.join("merges.txt")).await? {
        return Ok(Some(TokenizerKind::Bpe));
    }
    if exists(&dir.join("vocab.txt")).await? {
        return Ok(Some(TokenizerKind::WordPiece));
    }
    if any_exists(dir, SENTENCEPIECE_FILES).await? {
        return Ok(Some(TokenizerKind::SentencePiece));
    }
    Ok(None)
}

/// A checkpoint handle produced by [`PretrainedLibrary`].
#[derive(Debug, Clone)]
pub struct PretrainedModel {
    archetype: ModelArchetype,
    name_or_path: String,
    source: ModelSource,
    model_type: Option<String>,
    training: bool,
}

impl PretrainedModel {
    pub fn source(&self) -> &ModelSource {
        &self.source
    }

    /// `model_type` from `config.json`; unknown for remote checkpoints.
    pub fn model_type(&self) -> Option<&str> {
        self.model_type.as_deref()
    }
}

impl LanguageModel for PretrainedModel {
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

/// Tokenizer handle produced by [`PretrainedLibrary`].
#[derive(Debug, Clone)]
pub struct PretrainedTokenizer {
    name_or_path: String,
    kind: TokenizerKind,
}

impl Tokenizer for PretrainedTokenizer {
    fn name_or_path(&self) -> &str {
        &self.name_or_path
    }

    fn kind(&self) -> TokenizerKind {
        self.kind
    }
}

/// [`ModelLibrary`] over pretrained checkpoints.
#[derive(Debug, Clone, Default)]
pub struct PretrainedLibrary;

impl PretrainedLibrary {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ModelLibrary for PretrainedLibrary {
    async fn load_model(
        &self,
        archetype: ModelArchetype,
        name_or_path: &str,
    ) -> Result<Box<dyn LanguageModel>, ResolutionError> {
        let source = ModelSource::locate(name_or_path).await?;

        let model_type = match &source {
            ModelSource::Remote(_) => None,
            ModelSource::Local(dir) => {
                let config = read_config(dir).await?;
                let compatible = match &config.model_type {
                    Some(model_type) => archetype.accepts_model_type(model_type),
                    None => config.architectures.iter().any(|a| a == archetype.name()),
                };
                if !compatible {
                    return Err(ResolutionError::IncompatibleArchitecture {
                        model_class: archetype.name().to_string(),
                        identifier: name_or_path.to_string(),
                        model_type: config
                            .model_type
                            .unwrap_or_else(|| config.architectures.join(",")),
                    });
                }
                if !any_exists(dir, WEIGHT_FILES).await? {
                    return Err(ResolutionError::MissingWeights {
                        identifier: name_or_path.to_string(),
                        dir: dir.clone(),
                    });
                }
                config.model_type
            }
        };

        debug!(model_class = %archetype, source = ?source, "checkpoint located");

        Ok(Box::new(PretrainedModel {
            archetype,
            name_or_path: name_or_path.to_string(),
            source,
            model_type,
            training: true,
        }))
    }

    async fn load_tokenizer(
        &self,
        name_or_path: &str,
    ) -> Result<Box<dyn Tokenizer>, ResolutionError> {
        let kind = match ModelSource::locate(name_or_path).await? {
            ModelSource::Remote(_) => TokenizerKind::Remote,
            ModelSource::Local(dir) => {
                detect_tokenizer(&dir)
                    .await?
                    .ok_or_else(|| ResolutionError::TokenizerNotFound {
                        identifier: name_or_path.to_string(),
                        dir: dir.clone(),
                    })?
            }
        };

        Ok(Box::new(PretrainedTokenizer {
            name_or_path: name_or_path.to_string(),
            kind,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_checkpoint(dir: &Path, config: serde_json::Value, files: &[&str]) {
        fs::write(dir.join(CONFIG_FILE), config.to_string()).unwrap();
        for name in files {
            fs::write(dir.join(name), b"stub").unwrap();
        }
    }

    fn dir_str(dir: &tempfile::TempDir) -> String {
        dir.path().to_str().unwrap().to_string()
    }

    #[test]
    fn test_hub_name_pattern() {
        assert!(hub_name_pattern().is_match("distilroberta-base"));
        assert!(hub_name_pattern().is_match("bert-base-uncased"));
        assert!(hub_name_pattern().is_match("openai-community/gpt2"));
        assert!(!hub_name_pattern().is_match("../escape"));
        assert!(!hub_name_pattern().is_match("a/b/c"));
        assert!(!hub_name_pattern().is_match(""));
        assert!(!hub_name_pattern().is_match("has space"));
    }

    #[tokio::test]
    async fn test_remote_reference_accepted() {
        let model = PretrainedLibrary::new()
            .load_model(ModelArchetype::AutoModelForMaskedLM, "distilroberta-base")
            .await
            .expect("remote reference");
        assert_eq!(model.name_or_path(), "distilroberta-base");
        assert!(model.is_training());

        let tokenizer = PretrainedLibrary::new()
            .load_tokenizer("distilroberta-base")
            .await
            .expect("remote tokenizer");
        assert_eq!(tokenizer.kind(), TokenizerKind::Remote);
    }

    #[tokio::test]
    async fn test_relative_path_typo_is_flagged() {
        // unit tests run from the package root, where `src/` exists
        assert_eq!(
            shadowing_local_dir("src/no-such-checkpoint").await,
            Some(PathBuf::from("src"))
        );
        assert_eq!(
            ModelSource::locate("src/no-such-checkpoint").await.unwrap(),
            ModelSource::Remote("src/no-such-checkpoint".to_string())
        );
        assert_eq!(shadowing_local_dir("openai-community/gpt2").await, None);
        assert_eq!(shadowing_local_dir("distilroberta-base").await, None);
    }

    #[tokio::test]
    async fn test_missing_local_path_not_found() {
        let err = PretrainedLibrary::new()
            .load_model(ModelArchetype::BertForMaskedLM, "/definitely/not/here")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::ModelNotFound { .. }));
    }

    #[tokio::test]
    async fn test_local_checkpoint_loads() {
        let dir = tempfile::tempdir().unwrap();
        write_checkpoint(
            dir.path(),
            serde_json::json!({"model_type": "bert", "architectures": ["BertForMaskedLM"]}),
            &["model.safetensors", "vocab.txt"],
        );
        let library = PretrainedLibrary::new();

        let model = library
            .load_model(ModelArchetype::BertForMaskedLM, &dir_str(&dir))
            .await
            .expect("local checkpoint");
        assert_eq!(model.archetype(), ModelArchetype::BertForMaskedLM);

        let tokenizer = library.load_tokenizer(&dir_str(&dir)).await.expect("tokenizer");
        assert_eq!(tokenizer.kind(), TokenizerKind::WordPiece);
    }

    #[tokio::test]
    async fn test_incompatible_architecture() {
        let dir = tempfile::tempdir().unwrap();
        write_checkpoint(
            dir.path(),
            serde_json::json!({"model_type": "gpt2"}),
            &["pytorch_model.bin", "vocab.json", "merges.txt"],
        );
        let err = PretrainedLibrary::new()
            .load_model(ModelArchetype::RobertaForMaskedLM, &dir_str(&dir))
            .await
            .unwrap_err();
        match err {
            ResolutionError::IncompatibleArchitecture { model_type, .. } => {
                assert_eq!(model_type, "gpt2")
            }
            other => panic!("expected IncompatibleArchitecture, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_auto_class_accepts_any_model_type() {
        let dir = tempfile::tempdir().unwrap();
        write_checkpoint(
            dir.path(),
            serde_json::json!({"model_type": "gpt2"}),
            &["pytorch_model.bin", "vocab.json", "merges.txt"],
        );
        let library = PretrainedLibrary::new();
        library
            .load_model(ModelArchetype::AutoModelForCausalLM, &dir_str(&dir))
            .await
            .expect("auto class");
        let tokenizer = library.load_tokenizer(&dir_str(&dir)).await.expect("tokenizer");
        assert_eq!(tokenizer.kind(), TokenizerKind::Bpe);
    }

    #[tokio::test]
    async fn test_missing_weights() {
        let dir = tempfile::tempdir().unwrap();
        write_checkpoint(dir.path(), serde_json::json!({"model_type": "bert"}), &[]);
        let err = PretrainedLibrary::new()
            .load_model(ModelArchetype::BertForMaskedLM, &dir_str(&dir))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::MissingWeights { .. }));
    }

    #[tokio::test]
    async fn test_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), b"{not json").unwrap();
        let err = PretrainedLibrary::new()
            .load_model(ModelArchetype::AutoModelForMaskedLM, &dir_str(&dir))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::InvalidModelConfig { .. }));
    }

    #[tokio::test]
    async fn test_missing_tokenizer() {
        let dir = tempfile::tempdir().unwrap();
        write_checkpoint(
            dir.path(),
            serde_json::json!({"model_type": "albert"}),
            &["model.safetensors"],
        );
        let err = PretrainedLibrary::new()
            .load_tokenizer(&dir_str(&dir))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::TokenizerNotFound { .. }));
    }
}
