//! Feature schema: ordered, deduplicated feature names with stable column indices

use crate::models::ExtractedSample;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// Serialized schema format version
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("feature `{0}` appears more than once in the schema")]
    DuplicateName(String),

    #[error("unsupported schema version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

/// On-disk representation of a [`FeatureSchema`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaFile {
    pub version: u32,
    pub names: Vec<String>,
}

/// Ordered feature names with a name -> column index mapping.
///
/// Indices are dense, contiguous and zero-based. A derived schema is sorted
/// lexicographically, so re-deriving it from the same names is reproducible.
/// A fixed schema keeps the order it was given (e.g. a trained model's columns).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "SchemaFile", into = "SchemaFile")]
pub struct FeatureSchema {
    names: Vec<String>,
    index: FxHashMap<String, usize>,
}

impl FeatureSchema {
    /// Sorted union of all feature names across a training batch.
    pub fn derive(samples: &[ExtractedSample]) -> Self {
        let names: BTreeSet<&str> = samples
            .iter()
            .flat_map(|s| s.record.names())
            .collect();
        Self::from_unique(names.into_iter().map(str::to_string).collect())
    }

    /// A schema supplied from outside, kept in the given order.
    pub fn fixed<I, S>(names: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut index = FxHashMap::default();
        for (i, name) in names.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateName(name.clone()));
            }
        }
        Ok(Self { names, index })
    }

    fn from_unique(names: Vec<String>) -> Self {
        let index = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        Self { names, index }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Hash of the ordered names; equal schemas have equal fingerprints.
    pub fn fingerprint(&self) -> u64 {
        let mut buf = Vec::with_capacity(self.names.iter().map(|n| n.len() + 1).sum());
        for name in &self.names {
            buf.extend_from_slice(name.as_bytes());
            buf.push(0);
        }
        xxh3_64(&buf)
    }
}

impl PartialEq for FeatureSchema {
    fn eq(&self, other: &Self) -> bool {
        self.names == other.names
    }
}

impl Eq for FeatureSchema {}

impl TryFrom<SchemaFile> for FeatureSchema {
    type Error = SchemaError;

    fn try_from(file: SchemaFile) -> Result<Self, Self::Error> {
        if file.version != SCHEMA_VERSION {
            return Err(SchemaError::UnsupportedVersion {
                found: file.version,
                expected: SCHEMA_VERSION,
            });
        }
        Self::fixed(file.names)
    }
}

impl From<FeatureSchema> for SchemaFile {
    fn from(schema: FeatureSchema) -> Self {
        SchemaFile {
            version: SCHEMA_VERSION,
            names: schema.names,
        }
    }
}
