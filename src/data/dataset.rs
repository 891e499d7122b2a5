//! In-memory tabular dataset shared by every hospital shard

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use crate::error::{FederatedError, Result};

/// A single cell of the dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number(f64),
    Text(String),
    Missing,
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

/// Immutable row-oriented table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Dataset {
    /// Build a dataset from column names and rows
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns.len()) {
            return Err(FederatedError::Data(format!(
                "row {} has {} values, expected {}",
                i,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Load a CSV file with a header row, removing `drop_columns` when present
    pub fn load_csv(path: impl AsRef<Path>, drop_columns: &[String]) -> Result<Self> {
        let path = path.as_ref();
        let start = Instant::now();
        let file = File::open(path).map_err(|e| {
            FederatedError::Data(format!("failed to open {}: {}", path.display(), e))
        })?;

        let mut df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(1000))
            .into_reader_with_file_handle(file)
            .finish()?;

        for name in drop_columns {
            let present = df.get_column_names().iter().any(|c| c.as_str() == name.as_str());
            if present {
                df = df.drop(name)?;
            } else {
                warn!(path = %path.display(), column = %name, "Column to drop not found in dataset");
            }
        }

        let dataset = Self::from_frame(&df)?;
        info!(
            path = %path.display(),
            rows = dataset.n_rows(),
            columns = dataset.n_columns(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Dataset loaded"
        );
        Ok(dataset)
    }

    /// Convert a polars frame into row-oriented values
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let columns: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        let mut rows: Vec<Vec<Value>> = vec![Vec::with_capacity(columns.len()); df.height()];

        for column in df.get_columns() {
            let series = column.as_materialized_series();
            match series.dtype() {
                DataType::String => {
                    for (row, value) in rows.iter_mut().zip(series.str()?.into_iter()) {
                        row.push(value.map(Value::text).unwrap_or(Value::Missing));
                    }
                }
                _ => {
                    let casted = series.cast(&DataType::Float64)?;
                    for (row, value) in rows.iter_mut().zip(casted.f64()?.into_iter()) {
                        row.push(value.map(Value::Number).unwrap_or(Value::Missing));
                    }
                }
            }
        }

        Self::from_rows(columns, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn row(&self, index: usize) -> Option<&[Value]> {
        self.rows.get(index).map(|r| r.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
