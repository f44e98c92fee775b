//! Model resolution.
//!
//! A closed registry maps every supported model class name to its archetype.
//! The same table decides whether a class is generative (autoregressive
//! likelihoods) or masked (per-position fill distributions), so construction
//! and classification cannot disagree.

pub mod pretrained;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::error::ResolutionError;

pub use pretrained::{ModelSource, PretrainedLibrary, PretrainedModel, PretrainedTokenizer};

/// Scoring family of a model class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Masked language model head.
    Masked,
    /// Causal, sequence-generating head.
    Generative,
}

/// Supported model classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelArchetype {
    AutoModelForMaskedLM,
    BertForMaskedLM,
    RobertaForMaskedLM,
    AlbertForMaskedLM,
    DistilBertForMaskedLM,
    AutoModelForCausalLM,
    #[serde(rename = "GPT2LMHeadModel")]
    Gpt2LmHeadModel,
}

struct ArchetypeEntry {
    archetype: ModelArchetype,
    name: &'static str,
    kind: ModelKind,
    /// `model_type` values this class can load; empty accepts any.
    model_types: &'static [&'static str],
}

const REGISTRY: &[ArchetypeEntry] = &[
    ArchetypeEntry {
        archetype: ModelArchetype::AutoModelForMaskedLM,
        name: "AutoModelForMaskedLM",
        kind: ModelKind::Masked,
        model_types: &[],
    },
    ArchetypeEntry {
        archetype: ModelArchetype::BertForMaskedLM,
        name: "BertForMaskedLM",
        kind: ModelKind::Masked,
        model_types: &["bert"],
    },
    ArchetypeEntry {
        archetype: ModelArchetype::RobertaForMaskedLM,
        name: "RobertaForMaskedLM",
        kind: ModelKind::Masked,
        model_types: &["roberta"],
    },
    ArchetypeEntry {
        archetype: ModelArchetype::AlbertForMaskedLM,
        name: "AlbertForMaskedLM",
        kind: ModelKind::Masked,
        model_types: &["albert"],
    },
    ArchetypeEntry {
        archetype: ModelArchetype::DistilBertForMaskedLM,
        name: "DistilBertForMaskedLM",
        kind: ModelKind::Masked,
        model_types: &["distilbert"],
    },
    ArchetypeEntry {
        archetype: ModelArchetype::AutoModelForCausalLM,
        name: "AutoModelForCausalLM",
        kind: ModelKind::Generative,
        model_types: &[],
    },
    ArchetypeEntry {
        archetype: ModelArchetype::Gpt2LmHeadModel,
        name: "GPT2LMHeadModel",
        kind: ModelKind::Generative,
        model_types: &["gpt2"],
    },
];

impl ModelArchetype {
    fn entry(self) -> &'static ArchetypeEntry {
        // rows are stored in discriminant order
        &REGISTRY[self as usize]
    }

    /// Every registered archetype, in registry order.
    pub fn all() -> impl Iterator<Item = ModelArchetype> {
        REGISTRY.iter().map(|e| e.archetype)
    }

    /// Comma-separated class names, for error messages and listings.
    pub fn supported_names() -> String {
        REGISTRY
            .iter()
            .map(|e| e.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Look a class name up in the registry.
    pub fn from_name(name: &str) -> Result<Self, ResolutionError> {
        REGISTRY
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.archetype)
            .ok_or_else(|| ResolutionError::UnknownModelClass {
                name: name.to_string(),
                supported: Self::supported_names(),
            })
    }

    pub fn name(self) -> &'static str {
        self.entry().name
    }

    pub fn kind(self) -> ModelKind {
        self.entry().kind
    }

    pub fn is_generative(self) -> bool {
        self.kind() == ModelKind::Generative
    }

    /// Whether this class can load a checkpoint of the given `model_type`.
    pub fn accepts_model_type(self, model_type: &str) -> bool {
        let accepted = self.entry().model_types;
        accepted.is_empty() || accepted.contains(&model_type)
    }
}

impl fmt::Display for ModelArchetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelArchetype {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

/// Tokenization scheme found next to a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    /// `tokenizer.json`
    Fast,
    /// `vocab.json` + `merges.txt`
    Bpe,
    /// `vocab.txt`
    WordPiece,
    /// `spiece.model` and friends
    SentencePiece,
    /// Registry reference; files are fetched by the scoring engine.
    Remote,
}

/// A loaded language model, opaque to the pipeline.
pub trait LanguageModel: fmt::Debug + Send + Sync {
    fn archetype(&self) -> ModelArchetype;

    /// Identifier the model was loaded from.
    fn name_or_path(&self) -> &str;

    /// Switch to evaluation (non-training) mode.
    fn eval(&mut self);

    fn is_training(&self) -> bool;
}

/// A tokenizer paired with a model.
pub trait Tokenizer: fmt::Debug + Send + Sync {
    fn name_or_path(&self) -> &str;

    fn kind(&self) -> TokenizerKind;
}

/// Constructs models and tokenizers from an identifier.
#[async_trait]
pub trait ModelLibrary: Send + Sync {
    async fn load_model(
        &self,
        archetype: ModelArchetype,
        name_or_path: &str,
    ) -> Result<Box<dyn LanguageModel>, ResolutionError>;

    async fn load_tokenizer(
        &self,
        name_or_path: &str,
    ) -> Result<Box<dyn Tokenizer>, ResolutionError>;
}

/// Model and tokenizer ready for one scoring invocation.
#[derive(Debug)]
pub struct ResolvedModel {
    model: Box<dyn LanguageModel>,
    tokenizer: Box<dyn Tokenizer>,
    archetype: ModelArchetype,
}

impl ResolvedModel {
    pub fn model(&self) -> &dyn LanguageModel {
        self.model.as_ref()
    }

    pub fn tokenizer(&self) -> &dyn Tokenizer {
        self.tokenizer.as_ref()
    }

    pub fn archetype(&self) -> ModelArchetype {
        self.archetype
    }

    pub fn is_generative(&self) -> bool {
        self.archetype.is_generative()
    }

    pub fn name_or_path(&self) -> &str {
        self.model.name_or_path()
    }
}

/// Resolves model class names against the registry and a [`ModelLibrary`].
pub struct ModelResolver<L> {
    library: L,
}

impl<L: ModelLibrary> ModelResolver<L> {
    pub fn new(library: L) -> Self {
        Self { library }
    }

    pub fn library(&self) -> &L {
        &self.library
    }

    /// Resolve `model_class` and load `name_or_path` in evaluation mode.
    ///
    /// Unknown class names fail before the library is touched.
    pub async fn resolve(
        &self,
        model_class: &str,
        name_or_path: &str,
    ) -> Result<ResolvedModel, ResolutionError> {
        let archetype = ModelArchetype::from_name(model_class)?;

        let mut model = self.library.load_model(archetype, name_or_path).await?;
        model.eval();
        let tokenizer = self.library.load_tokenizer(name_or_path).await?;

        debug!(
            model_class = %archetype,
            name_or_path = %name_or_path,
            tokenizer = ?tokenizer.kind(),
            "model resolved"
        );

        Ok(ResolvedModel {
            model,
            tokenizer,
            archetype,
        })
    }
}
