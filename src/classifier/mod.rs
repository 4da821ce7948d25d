//! Classifier boundary and top-k label extraction
//!
//! A [`Classifier`] is an explicitly constructed, immutable service: it
//! consumes a projected [`Dataset`] and returns one probability distribution
//! per row, ordered by the classifier's own class order. Top-k ranking is
//! computed here, on top of that distribution.

pub mod gbdt_model;

pub use gbdt_model::{GbdtClassifier, GbdtConfig};

use crate::dataset::Dataset;
use crate::models::SampleKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of labels returned per sample
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("dataset schema (fingerprint {found:016x}) does not match the model schema ({expected:016x})")]
    SchemaMismatch { expected: u64, found: u64 },

    #[error("{rows} dataset rows but {labels} labels")]
    LabelCountMismatch { rows: usize, labels: usize },

    #[error("no training rows provided")]
    EmptyTrainingSet,

    #[error("model has {classes} classes but {models} per-class models")]
    CorruptModel { classes: usize, models: usize },

    #[error("failed to parse model JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Class probabilities for one row, indexed like [`Classifier::classes`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDistribution {
    pub probabilities: Vec<f64>,
}

impl ClassDistribution {
    pub fn new(probabilities: Vec<f64>) -> Self {
        Self { probabilities }
    }

    /// Pair each probability with its class label
    pub fn labelled<'a>(&'a self, classes: &'a [String]) -> impl Iterator<Item = (&'a str, f64)> + 'a {
        classes
            .iter()
            .map(String::as_str)
            .zip(self.probabilities.iter().copied())
    }
}

pub trait Classifier: Send + Sync {
    /// Class labels in the classifier's native order
    fn classes(&self) -> &[String];

    fn predict_distribution(&self, dataset: &Dataset) -> Result<Vec<ClassDistribution>, ClassifierError>;
}

/// The k most probable labels of one sample, most probable first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopKResult {
    pub key: SampleKey,
    pub labels: Vec<String>,
}

/// Rank class labels by descending probability and keep the first `k`.
///
/// The sort is stable, so ties keep the classifier's class order. NaN ranks
/// last. `k` is clamped to the number of classes.
pub fn top_k(distribution: &ClassDistribution, classes: &[String], k: usize) -> Vec<String> {
    let n = classes.len().min(distribution.probabilities.len());
    let score = |i: usize| {
        let p = distribution.probabilities[i];
        if p.is_nan() {
            f64::NEG_INFINITY
        } else {
            p
        }
    };

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| score(b).total_cmp(&score(a)));
    order
        .into_iter()
        .take(k.min(n))
        .map(|i| classes[i].clone())
        .collect()
}

/// Predict and rank every row of a projected dataset.
pub fn top_k_labels(
    classifier: &dyn Classifier,
    dataset: &Dataset,
    k: usize,
) -> Result<Vec<TopKResult>, ClassifierError> {
    let distributions = classifier.predict_distribution(dataset)?;
    let classes = classifier.classes();

    Ok(dataset
        .keys()
        .iter()
        .zip(distributions.iter())
        .map(|(key, dist)| TopKResult {
            key: key.clone(),
            labels: top_k(dist, classes, k),
        })
        .collect())
}
