//! One-vs-rest GBDT classifier
//!
//! Wraps the `gbdt` crate to provide:
//! - Training one binary model per class label from a projected dataset
//! - Multi-class probability distributions from the per-class scores
//! - Model persistence as JSON, together with the schema it was trained on
//!
//! Each binary model uses the `LogLikelyhood` loss with label 1.0 for the
//! class and -1.0 for every other class. Scores are normalised to sum to 1.
//!
//! Note: the gbdt crate internally uses `f32` (`ValueType`) while datasets
//! store `f64`. Conversions happen transparently at the crate boundary.

use std::path::Path;

use gbdt::config::Config;
use gbdt::decision_tree::Data;
use gbdt::gradient_boost::GBDT;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ClassDistribution, Classifier, ClassifierError};
use crate::dataset::{Dataset, FeatureSchema};

// ---------------------------------------------------------------------------
// f64 <-> f32 helpers
// ---------------------------------------------------------------------------

/// Convert one dataset row for the gbdt crate. Non-finite cells become 0.
#[inline]
fn row_to_f32(dataset: &Dataset, row: usize) -> Vec<f32> {
    dataset
        .matrix()
        .row(row)
        .iter()
        .map(|&v| if v.is_finite() { v as f32 } else { 0.0 })
        .collect()
}

// ---------------------------------------------------------------------------
// Training configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbdtConfig {
    /// Boosting iterations per class
    pub num_trees: usize,
    pub max_depth: u32,
    /// Shrinkage / step size
    pub learning_rate: f64,
}

impl Default for GbdtConfig {
    fn default() -> Self {
        Self {
            num_trees: 50,
            max_depth: 6,
            learning_rate: 0.1,
        }
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Per-class binary GBDT models sharing one feature schema.
#[derive(Serialize, Deserialize)]
pub struct GbdtClassifier {
    schema: FeatureSchema,
    classes: Vec<String>,
    models: Vec<GBDT>,
}

impl std::fmt::Debug for GbdtClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GbdtClassifier")
            .field("schema", &self.schema)
            .field("classes", &self.classes)
            .field("models", &self.models.len())
            .finish()
    }
}

impl GbdtClassifier {
    /// Train one binary model per distinct label.
    ///
    /// `labels[i]` is the class of dataset row `i`. Classes are ordered
    /// lexicographically; that order is the classifier's native order.
    pub fn train(
        dataset: &Dataset,
        labels: &[String],
        config: &GbdtConfig,
    ) -> Result<Self, ClassifierError> {
        if dataset.is_empty() {
            return Err(ClassifierError::EmptyTrainingSet);
        }
        if dataset.n_rows() != labels.len() {
            return Err(ClassifierError::LabelCountMismatch {
                rows: dataset.n_rows(),
                labels: labels.len(),
            });
        }

        let mut classes: Vec<String> = labels.to_vec();
        classes.sort();
        classes.dedup();

        info!(
            "Training {} one-vs-rest models on {} rows x {} features",
            classes.len(),
            dataset.n_rows(),
            dataset.n_cols()
        );

        let rows: Vec<Vec<f32>> = (0..dataset.n_rows())
            .map(|r| row_to_f32(dataset, r))
            .collect();

        let models: Vec<GBDT> = classes
            .par_iter()
            .map(|class| {
                let mut training_data: Vec<Data> = rows
                    .iter()
                    .zip(labels)
                    .map(|(features, label)| {
                        let target = if label == class { 1.0 } else { -1.0 };
                        Data::new_training_data(features.clone(), 1.0_f32, target, None)
                    })
                    .collect();

                let mut gbdt = GBDT::new(&gbdt_config(dataset.n_cols(), config));
                gbdt.fit(&mut training_data);
                debug!("Trained model for class {}", class);
                gbdt
            })
            .collect();

        Ok(Self {
            schema: dataset.schema().clone(),
            classes,
            models,
        })
    }

    /// The schema inference data must be projected onto
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn from_json(json: &str) -> Result<Self, ClassifierError> {
        let model: Self = serde_json::from_str(json)?;
        if model.models.len() != model.classes.len() {
            return Err(ClassifierError::CorruptModel {
                classes: model.classes.len(),
                models: model.models.len(),
            });
        }
        Ok(model)
    }

    pub fn to_json(&self) -> Result<String, ClassifierError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn save(&self, path: &Path) -> Result<(), ClassifierError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

fn gbdt_config(feature_size: usize, config: &GbdtConfig) -> Config {
    let mut cfg = Config::new();
    cfg.set_feature_size(feature_size);
    cfg.set_max_depth(config.max_depth);
    cfg.set_iterations(config.num_trees);
    cfg.set_shrinkage(config.learning_rate as f32);
    cfg.set_loss("LogLikelyhood");
    cfg.set_debug(false);
    cfg.set_training_optimization_level(2);
    cfg.set_min_leaf_size(1);
    cfg
}

/// Normalise per-class scores into a distribution; uniform when nothing scores.
///
/// Negative and non-finite scores count as 0.
fn normalise(scores: Vec<f64>) -> Vec<f64> {
    let scores: Vec<f64> = scores
        .into_iter()
        .map(|s| if s.is_finite() { s.max(0.0) } else { 0.0 })
        .collect();
    let sum: f64 = scores.iter().sum();
    if sum > 0.0 {
        scores.into_iter().map(|s| s / sum).collect()
    } else {
        let n = scores.len();
        vec![1.0 / n as f64; n]
    }
}

impl Classifier for GbdtClassifier {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict_distribution(
        &self,
        dataset: &Dataset,
    ) -> Result<Vec<ClassDistribution>, ClassifierError> {
        if dataset.schema() != &self.schema {
            return Err(ClassifierError::SchemaMismatch {
                expected: self.schema.fingerprint(),
                found: dataset.schema().fingerprint(),
            });
        }
        if dataset.is_empty() {
            return Ok(Vec::new());
        }

        let data: Vec<Data> = (0..dataset.n_rows())
            .map(|r| Data::new_test_data(row_to_f32(dataset, r), None))
            .collect();

        // scores[class][row]
        let scores: Vec<Vec<f32>> = self.models.iter().map(|m| m.predict(&data)).collect();

        Ok((0..dataset.n_rows())
            .map(|row| {
                let per_class = scores
                    .iter()
                    .map(|s| s.get(row).copied().unwrap_or(0.0) as f64)
                    .collect();
                ClassDistribution::new(normalise(per_class))
            })
            .collect())
    }
}
