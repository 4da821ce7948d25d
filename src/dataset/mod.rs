//! Dense datasets built from sparse feature records
//!
//! Two paths turn a batch of [`ExtractedSample`](crate::models::ExtractedSample)s into a [`Dataset`]:
//!
//! - training: [`build_dataset`] derives a sorted [`FeatureSchema`] from the
//!   union of all names; cells a sample did not emit are NaN
//! - inference: [`InferenceProjector`] re-projects records onto a previously
//!   fixed schema; missing cells are 0 and every value is finite
//!
//! A feature that was never computed and a feature computed as NaN are both
//! NaN once materialized by the builder. Callers that must tell them apart
//! need the `FeatureRecord`s themselves.

pub mod builder;
pub mod projector;
pub mod schema;

pub use builder::build_dataset;
pub use projector::InferenceProjector;
pub use schema::{FeatureSchema, SchemaError};

use crate::models::SampleKey;
use nalgebra::{DMatrix, RowDVector};
use serde::{Deserialize, Serialize};

/// Dense matrix: one row per sample, one column per schema entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    schema: FeatureSchema,
    keys: Vec<SampleKey>,
    values: DMatrix<f64>,
}

impl Dataset {
    /// Assemble from row-major cell values; `cells.len()` must equal rows x columns.
    pub(crate) fn from_rows(schema: FeatureSchema, keys: Vec<SampleKey>, cells: Vec<f64>) -> Self {
        let values = DMatrix::from_row_slice(keys.len(), schema.len(), &cells);
        Self {
            schema,
            keys,
            values,
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn keys(&self) -> &[SampleKey] {
        &self.keys
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_cols(&self) -> usize {
        self.values.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.values
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.schema.index_of(name)
    }

    /// Cell value by row number and feature name
    pub fn get(&self, row: usize, name: &str) -> Option<f64> {
        let col = self.schema.index_of(name)?;
        (row < self.n_rows()).then(|| self.values[(row, col)])
    }

    /// Row number of a sample
    pub fn row_of(&self, key: &SampleKey) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    pub fn row(&self, row: usize) -> RowDVector<f64> {
        self.values.row(row).into_owned()
    }

    /// Row values as a plain vector, in schema order
    pub fn row_values(&self, row: usize) -> Vec<f64> {
        self.values.row(row).iter().copied().collect()
    }

    /// Whether every cell is finite
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    /// Serializable copy (NaN becomes `null`)
    pub fn to_file(&self) -> DatasetFile {
        DatasetFile {
            schema: self.schema.clone(),
            rows: (0..self.n_rows())
                .map(|r| DatasetRow {
                    key: self.keys[r].clone(),
                    values: self
                        .values
                        .row(r)
                        .iter()
                        .map(|v| if v.is_nan() { None } else { Some(*v) })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// JSON form of a [`Dataset`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetFile {
    pub schema: FeatureSchema,
    pub rows: Vec<DatasetRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRow {
    pub key: SampleKey,
    pub values: Vec<Option<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str) -> SampleKey {
        SampleKey {
            sample_id: id.into(),
            secondary_index: None,
        }
    }

    #[test]
    fn test_from_rows_is_row_major() {
        let schema = FeatureSchema::fixed(["a", "b", "c"]).unwrap();
        let ds = Dataset::from_rows(
            schema,
            vec![key("x"), key("y")],
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        );
        assert_eq!(ds.n_rows(), 2);
        assert_eq!(ds.n_cols(), 3);
        assert_eq!(ds.get(0, "c"), Some(3.0));
        assert_eq!(ds.get(1, "a"), Some(4.0));
        assert_eq!(ds.get(2, "a"), None);
        assert_eq!(ds.get(0, "zzz"), None);
        assert_eq!(ds.row_values(1), vec![4.0, 5.0, 6.0]);
        assert_eq!(ds.row_of(&key("y")), Some(1));
    }

    #[test]
    fn test_file_maps_nan_to_null() {
        let schema = FeatureSchema::fixed(["a", "b"]).unwrap();
        let ds = Dataset::from_rows(schema, vec![key("x")], vec![f64::NAN, 1.0]);
        assert!(!ds.is_finite());
        let file = ds.to_file();
        assert_eq!(file.rows[0].values, vec![None, Some(1.0)]);
        let json = serde_json::to_string(&file).unwrap();
        assert!(json.contains("[null,1.0]"));
    }

    #[test]
    fn test_empty_dataset() {
        let schema = FeatureSchema::fixed(["a"]).unwrap();
        let ds = Dataset::from_rows(schema, vec![], vec![]);
        assert!(ds.is_empty());
        assert_eq!(ds.n_cols(), 1);
        assert!(ds.is_finite());
    }
}
