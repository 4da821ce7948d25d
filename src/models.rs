//! Core data models for Stylometer
//!
//! These models are shared by the extraction, dataset and classifier stages.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One source-code snippet plus its identifying metadata.
///
/// Immutable once read; consumed once by extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Author/user identifier
    pub id: String,
    /// Optional secondary index (e.g. the row number in the source corpus)
    #[serde(default)]
    pub index: Option<usize>,
    /// Raw source text
    pub code: String,
}

impl Sample {
    pub fn new(id: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            index: None,
            code: code.into(),
        }
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    pub fn key(&self) -> SampleKey {
        SampleKey {
            sample_id: self.id.clone(),
            secondary_index: self.index,
        }
    }
}

/// Identity of a sample used to associate results with inputs.
///
/// Batch results are unordered, so callers match on this key, never on position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleKey {
    pub sample_id: String,
    #[serde(default)]
    pub secondary_index: Option<usize>,
}

impl std::fmt::Display for SampleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.secondary_index {
            Some(idx) => write!(f, "{}#{}", self.sample_id, idx),
            None => write!(f, "{}", self.sample_id),
        }
    }
}

/// Sparse named numeric features computed for exactly one sample.
///
/// Names are not pre-declared: open-vocabulary calculators make the name set
/// differ from sample to sample. Values may be NaN; JSON has no NaN, so NaN
/// round-trips through `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Option<f64>>", into = "BTreeMap<String, Option<f64>>")]
pub struct FeatureRecord {
    values: BTreeMap<String, f64>,
}

impl FeatureRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning the previous one if the name was already taken.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) -> Option<f64> {
        self.values.insert(name.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Feature names in lexicographic order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, f64)> for FeatureRecord {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl From<BTreeMap<String, Option<f64>>> for FeatureRecord {
    fn from(map: BTreeMap<String, Option<f64>>) -> Self {
        map.into_iter()
            .map(|(k, v)| (k, v.unwrap_or(f64::NAN)))
            .collect()
    }
}

impl From<FeatureRecord> for BTreeMap<String, Option<f64>> {
    fn from(record: FeatureRecord) -> Self {
        record
            .values
            .into_iter()
            .map(|(k, v)| (k, if v.is_nan() { None } else { Some(v) }))
            .collect()
    }
}

/// A successfully extracted sample: identifier, features, secondary index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSample {
    pub key: SampleKey,
    pub record: FeatureRecord,
}

impl ExtractedSample {
    pub fn new(key: SampleKey, record: FeatureRecord) -> Self {
        Self { key, record }
    }
}
