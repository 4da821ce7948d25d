//! Stylometer - stylometric feature extraction for source-code authorship
//!
//! Turns Java snippets into sparse, named feature records, unifies them into
//! dense datasets over a stable schema, and ranks candidate authors through a
//! pluggable classifier.

pub mod classifier;
pub mod config;
pub mod dataset;
pub mod extract;
pub mod features;
pub mod models;
pub mod source;

pub use classifier::{top_k, top_k_labels, ClassDistribution, Classifier, GbdtClassifier};
pub use dataset::{build_dataset, Dataset, FeatureSchema, InferenceProjector};
pub use extract::{BatchExtractor, BatchReport, ExtractError, SampleExtractor};
pub use features::Registry;
pub use models::{ExtractedSample, FeatureRecord, Sample, SampleKey};
