//! Training-time dataset builder

use super::{Dataset, FeatureSchema};
use crate::models::ExtractedSample;
use rayon::prelude::*;
use tracing::debug;

/// Build a dense dataset over the sorted union of all feature names.
///
/// Each row holds the sample's values at their schema columns; every other
/// cell is NaN. The derived schema travels with the dataset and must be kept
/// for inference-time projection.
pub fn build_dataset(samples: &[ExtractedSample]) -> Dataset {
    let schema = FeatureSchema::derive(samples);
    let width = schema.len();

    let rows: Vec<Vec<f64>> = samples
        .par_iter()
        .map(|sample| {
            let mut row = vec![f64::NAN; width];
            for (name, value) in sample.record.iter() {
                // Every name is in the schema: it was derived from these records
                if let Some(col) = schema.index_of(name) {
                    row[col] = value;
                }
            }
            row
        })
        .collect();

    debug!(
        "Built dataset: {} rows x {} features",
        samples.len(),
        width
    );

    let keys = samples.iter().map(|s| s.key.clone()).collect();
    Dataset::from_rows(schema, keys, rows.concat())
}
