//! Experiment identity derived from run parameters.
//!
//! Layout: `<benchmark>_m-<model class>_c-<model name or path>_s-<seed>`.
//! String fields are percent-encoded and `_` is escaped as `%5F`, so the
//! delimiter never occurs inside a field and `/` never reaches the file name.
//! A missing seed is written as `none`, which no integer renders to.
//!
//! An encoded field longer than [`FIELD_BUDGET`] bytes is replaced by a
//! readable prefix, the marker `%%` and a SHA-256 prefix of the raw value.
//! Percent-encoding never emits `%%`, so digested and plain fields cannot
//! collide, and the whole file name stays under the 255-byte limit common
//! to Linux, macOS and Windows filesystems. Digested ids do not decode.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::config::RunConfig;

const SEED_ABSENT: &str = "none";

/// Longest encoded string field kept verbatim in an id.
pub const FIELD_BUDGET: usize = 64;

const DIGEST_MARKER: &str = "%%";

/// Hex characters of the SHA-256 kept in a digested field (128 bits).
const DIGEST_HEX_LEN: usize = 32;

/// Stable, reproducible name of one benchmark configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExperimentId(String);

/// Fields an [`ExperimentId`] is computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentFields {
    pub benchmark: String,
    pub model_class: String,
    pub model_name_or_path: String,
    pub seed: Option<i64>,
}

/// Compute the experiment id for a run.
pub fn make_id(
    benchmark: &str,
    model_class: &str,
    model_name_or_path: &str,
    seed: Option<i64>,
) -> ExperimentId {
    let seed = match seed {
        Some(seed) => seed.to_string(),
        None => SEED_ABSENT.to_string(),
    };
    ExperimentId(format!(
        "{}_m-{}_c-{}_s-{}",
        encode_field(benchmark),
        encode_field(model_class),
        encode_field(model_name_or_path),
        seed
    ))
}

fn encode_field(value: &str) -> String {
    let encoded = urlencoding::encode(value).replace('_', "%5F");
    if encoded.len() <= FIELD_BUDGET {
        return encoded;
    }

    let digest = hex::encode(Sha256::digest(value.as_bytes()));
    let mut cut = FIELD_BUDGET - DIGEST_MARKER.len() - DIGEST_HEX_LEN;
    // never split a `%XX` escape
    if let Some(pos) = encoded[..cut].rfind('%') {
        if pos + 3 > cut {
            cut = pos;
        }
    }
    format!(
        "{}{DIGEST_MARKER}{}",
        &encoded[..cut],
        &digest[..DIGEST_HEX_LEN]
    )
}

fn decode_field(encoded: &str) -> Option<String> {
    if encoded.contains(DIGEST_MARKER) {
        return None;
    }
    urlencoding::decode(encoded).ok().map(|s| s.into_owned())
}

impl ExperimentId {
    pub fn from_config(config: &RunConfig) -> Self {
        make_id(
            config.benchmark(),
            config.model_class(),
            config.model_name_or_path(),
            config.seed(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the persisted result.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }

    /// Recover the fields from an id string.
    ///
    /// Returns `None` unless the string is exactly what [`make_id`] produces
    /// for the decoded fields, and for ids with a digested field.
    pub fn decode(raw: &str) -> Option<ExperimentFields> {
        let mut parts = raw.split('_');
        let benchmark = decode_field(parts.next()?)?;
        let model_class = decode_field(parts.next()?.strip_prefix("m-")?)?;
        let model_name_or_path = decode_field(parts.next()?.strip_prefix("c-")?)?;
        let seed = match parts.next()?.strip_prefix("s-")? {
            SEED_ABSENT => None,
            digits => Some(digits.parse::<i64>().ok()?),
        };
        if parts.next().is_some() {
            return None;
        }

        let fields = ExperimentFields {
            benchmark,
            model_class,
            model_name_or_path,
            seed,
        };
        (fields.to_id().as_str() == raw).then_some(fields)
    }
}

impl ExperimentFields {
    pub fn to_id(&self) -> ExperimentId {
        make_id(
            &self.benchmark,
            &self.model_class,
            &self.model_name_or_path,
            self.seed,
        )
    }
}

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ExperimentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
