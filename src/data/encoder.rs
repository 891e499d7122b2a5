//! Categorical encoding and feature/label separation

use ndarray::{Array1, Array2};

use super::dataset::{Dataset, Value};
use crate::error::{FederatedError, Result};

/// Non-predictive identifier column removed from the features
pub const ID_COLUMN: &str = "ID";
/// Binary label column
pub const LABEL_COLUMN: &str = "smoking";

/// Fixed codes for the two-valued categorical columns
const CATEGORICAL_CODES: &[(&str, &[(&str, f64)])] = &[
    ("gender", &[("M", 1.0), ("F", 0.0)]),
    ("tartar", &[("Y", 1.0), ("N", 0.0)]),
];

/// Encoded features and labels of one shard
#[derive(Debug, Clone)]
pub struct EncodedShard {
    pub features: Array2<f64>,
    pub labels: Array1<f64>,
}

impl EncodedShard {
    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }
}

/// Maps dataset rows to numeric feature matrices
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    id_column: String,
    label_column: String,
}

impl Default for FeatureEncoder {
    fn default() -> Self {
        Self::new(ID_COLUMN, LABEL_COLUMN)
    }
}

impl FeatureEncoder {
    pub fn new(id_column: impl Into<String>, label_column: impl Into<String>) -> Self {
        Self {
            id_column: id_column.into(),
            label_column: label_column.into(),
        }
    }

    /// Encode a single cell of `column`
    pub fn encode_value(column: &str, value: &Value) -> Result<f64> {
        let table = CATEGORICAL_CODES
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, codes)| *codes);

        match (table, value) {
            (Some(codes), Value::Text(s)) => codes
                .iter()
                .find(|(literal, _)| *literal == s.as_str())
                .map(|(_, code)| *code)
                .ok_or_else(|| {
                    FederatedError::Encoding(format!(
                        "unrecognised value '{}' in column '{}'",
                        s, column
                    ))
                }),
            (Some(codes), Value::Number(v)) => codes
                .iter()
                .find(|(_, code)| *code == *v)
                .map(|(_, code)| *code)
                .ok_or_else(|| {
                    FederatedError::Encoding(format!(
                        "unrecognised value {} in column '{}'",
                        v, column
                    ))
                }),
            (None, Value::Number(v)) => Ok(*v),
            (None, Value::Text(s)) => Err(FederatedError::Encoding(format!(
                "non-numeric value '{}' in column '{}'",
                s, column
            ))),
            (_, Value::Missing) => Err(FederatedError::Encoding(format!(
                "missing value in column '{}'",
                column
            ))),
        }
    }

    /// Names of the encoded feature columns, in source order
    pub fn feature_names(&self, dataset: &Dataset) -> Vec<String> {
        dataset
            .columns()
            .iter()
            .filter(|c| **c != self.id_column && **c != self.label_column)
            .cloned()
            .collect()
    }

    /// Encode the given dataset rows into features and labels
    pub fn encode(&self, dataset: &Dataset, rows: &[usize]) -> Result<EncodedShard> {
        let label_idx = dataset.column_index(&self.label_column).ok_or_else(|| {
            FederatedError::Data(format!("label column '{}' not found", self.label_column))
        })?;

        let feature_cols: Vec<(usize, &str)> = dataset
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| **c != self.id_column && **c != self.label_column)
            .map(|(i, c)| (i, c.as_str()))
            .collect();

        let mut features = Vec::with_capacity(rows.len() * feature_cols.len());
        let mut labels = Vec::with_capacity(rows.len());

        for &r in rows {
            let row = dataset
                .row(r)
                .ok_or_else(|| FederatedError::Data(format!("row {} out of range", r)))?;

            for &(i, name) in &feature_cols {
                features.push(Self::encode_value(name, &row[i])?);
            }

            let label = Self::encode_value(&self.label_column, &row[label_idx])?;
            if label != 0.0 && label != 1.0 {
                return Err(FederatedError::Encoding(format!(
                    "label '{}' must be 0 or 1, got {}",
                    self.label_column, label
                )));
            }
            labels.push(label);
        }

        Ok(EncodedShard {
            features: Array2::from_shape_vec((rows.len(), feature_cols.len()), features)?,
            labels: Array1::from_vec(labels),
        })
    }
}
