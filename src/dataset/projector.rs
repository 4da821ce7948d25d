//! Inference-time projection onto a fixed schema
//!
//! At inference a missing feature means "inactive", not "unknown": absent
//! columns are filled with 0, names the schema does not know are dropped,
//! and every non-finite value is replaced by 0. The output is always a finite
//! matrix whose columns are exactly the schema's.

use super::{Dataset, FeatureSchema};
use crate::models::{ExtractedSample, FeatureRecord, SampleKey};
use rayon::prelude::*;
use tracing::{debug, warn};

/// Value written for a schema column the record does not provide
const FILL_VALUE: f64 = 0.0;

fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        FILL_VALUE
    }
}

/// Re-projects feature records onto a previously fixed schema.
#[derive(Debug, Clone)]
pub struct InferenceProjector {
    schema: FeatureSchema,
}

impl InferenceProjector {
    pub fn new(schema: FeatureSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Align one record to the schema.
    ///
    /// Returns the row and whether any record name matched a schema column.
    pub fn project_record(&self, record: &FeatureRecord) -> (Vec<f64>, bool) {
        let mut matched = false;
        let row = self
            .schema
            .names()
            .iter()
            .map(|name| match record.get(name) {
                Some(value) => {
                    matched = true;
                    sanitize(value)
                }
                None => FILL_VALUE,
            })
            .collect();
        (row, matched)
    }

    /// Project a batch of extracted samples.
    pub fn project(&self, samples: &[ExtractedSample]) -> Dataset {
        let rows: Vec<(Vec<f64>, bool)> = samples
            .par_iter()
            .map(|s| self.project_record(&s.record))
            .collect();

        let keys: Vec<SampleKey> = samples.iter().map(|s| s.key.clone()).collect();
        self.finish(keys, rows)
    }

    /// Re-project an existing dataset by column name.
    ///
    /// Projecting a dataset already aligned to this schema is the identity.
    pub fn project_dataset(&self, dataset: &Dataset) -> Dataset {
        let rows: Vec<(Vec<f64>, bool)> = (0..dataset.n_rows())
            .into_par_iter()
            .map(|r| self.project_row(dataset, r))
            .collect();

        self.finish(dataset.keys().to_vec(), rows)
    }

    /// Align one dataset row; NaN cells are absent features, not overlap.
    fn project_row(&self, dataset: &Dataset, row: usize) -> (Vec<f64>, bool) {
        let source = dataset.schema();
        let mut matched = false;
        let values = self
            .schema
            .names()
            .iter()
            .map(|name| match source.index_of(name) {
                Some(col) => {
                    let value = dataset.matrix()[(row, col)];
                    matched |= !value.is_nan();
                    sanitize(value)
                }
                None => FILL_VALUE,
            })
            .collect();
        (values, matched)
    }

    fn finish(&self, keys: Vec<SampleKey>, rows: Vec<(Vec<f64>, bool)>) -> Dataset {
        let mut cells = Vec::with_capacity(keys.len() * self.schema.len());
        for (key, (row, matched)) in keys.iter().zip(rows) {
            if !matched && !self.schema.is_empty() {
                warn!(
                    "{} shares no feature with the model schema; predicting from an all-zero row",
                    key
                );
            }
            cells.extend(row);
        }

        debug!(
            "Projected {} rows onto {} schema columns",
            keys.len(),
            self.schema.len()
        );

        Dataset::from_rows(self.schema.clone(), keys, cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::build_dataset;

    fn sample(id: &str, values: &[(&str, f64)]) -> ExtractedSample {
        let record: FeatureRecord = values.iter().map(|(n, v)| (n.to_string(), *v)).collect();
        ExtractedSample::new(
            SampleKey {
                sample_id: id.into(),
                secondary_index: None,
            },
            record,
        )
    }

    #[test]
    fn test_missing_filled_unknown_dropped() {
        let schema = FeatureSchema::fixed(["a", "b"]).unwrap();
        let projector = InferenceProjector::new(schema);
        let ds = projector.project(&[sample("x", &[("b", 2.0), ("unseen", 9.0)])]);

        assert_eq!(ds.schema().names(), &["a", "b"]);
        assert_eq!(ds.row_values(0), vec![0.0, 2.0]);
        assert_eq!(ds.column_index("unseen"), None);
    }

    #[test]
    fn test_non_finite_values_sanitized() {
        let schema = FeatureSchema::fixed(["a", "b", "c", "d"]).unwrap();
        let projector = InferenceProjector::new(schema);
        let ds = projector.project(&[sample(
            "x",
            &[
                ("a", f64::INFINITY),
                ("b", f64::NEG_INFINITY),
                ("c", f64::NAN),
                ("d", 1.5),
            ],
        )]);

        assert!(ds.is_finite());
        assert_eq!(ds.row_values(0), vec![0.0, 0.0, 0.0, 1.5]);
    }

    #[test]
    fn test_no_overlap_yields_default_row() {
        let schema = FeatureSchema::fixed(["a", "b"]).unwrap();
        let projector = InferenceProjector::new(schema);
        let record: FeatureRecord = [("z".to_string(), 1.0)].into_iter().collect();

        let (row, matched) = projector.project_record(&record);
        assert_eq!(row, vec![0.0, 0.0]);
        assert!(!matched);
    }

    #[test]
    fn test_projection_is_idempotent() {
        let training = vec![
            sample("a", &[("x", 1.0), ("y", f64::INFINITY)]),
            sample("b", &[("y", 3.0), ("z", 4.0)]),
        ];
        let built = build_dataset(&training);
        let projector = InferenceProjector::new(built.schema().clone());

        let once = projector.project(&training);
        let twice = projector.project_dataset(&once);
        assert_eq!(once, twice);

        let from_built = projector.project_dataset(&built);
        assert_eq!(from_built, once);
    }

    #[test]
    fn test_absent_cells_are_not_overlap() {
        let samples = vec![
            sample("a", &[("x", 1.0)]),
            sample("b", &[("y", 2.0)]),
        ];
        let built = build_dataset(&samples);
        let projector = InferenceProjector::new(FeatureSchema::fixed(["x", "w"]).unwrap());

        // Row "b" only has NaN under the shared column `x`
        let (_, matched_a) = projector.project_record(&samples[0].record);
        let (_, matched_b) = projector.project_record(&samples[1].record);
        assert!(matched_a);
        assert!(!matched_b);

        assert!(projector.project_row(&built, 0).1);
        assert!(!projector.project_row(&built, 1).1);

        let ds = projector.project_dataset(&built);
        assert_eq!(ds.row_values(0), vec![1.0, 0.0]);
        assert_eq!(ds.row_values(1), vec![0.0, 0.0]);
    }

    #[test]
    fn test_project_dataset_onto_other_schema() {
        let built = build_dataset(&[sample("a", &[("x", 1.0), ("y", 2.0)])]);
        let projector = InferenceProjector::new(FeatureSchema::fixed(["y", "w"]).unwrap());
        let ds = projector.project_dataset(&built);
        assert_eq!(ds.row_values(0), vec![2.0, 0.0]);
        assert_eq!(ds.keys(), built.keys());
    }
}
