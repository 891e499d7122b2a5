//! Session state: shards, local models and the global model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::booster::{BoostedClassifier, BoosterConfig, Ensemble};
use crate::config::AggregationMode;
use crate::data::{DataPartitioner, HospitalId, ShardSet};
use crate::error::Result;

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No shards yet
    Uninitialized,
    /// Shards exist, no local model trained
    Partitioned,
    /// At least one local model, no global model
    Trained,
    /// A global model exists
    Aggregated,
}

/// Booster trained on a single hospital shard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalModel {
    pub hospital_id: HospitalId,
    pub classifier: BoostedClassifier,
    /// Accuracy on the held-out 30% of the shard
    pub accuracy: f64,
    pub n_train: usize,
    pub n_test: usize,
    pub trained_at: DateTime<Utc>,
}

/// Ensemble combined from all local models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalModel {
    classifier: BoostedClassifier,
    mode: AggregationMode,
    /// Per-tree element-wise mean of the local models' numeric node values
    averaged_values: Vec<Vec<f64>>,
    contributors: Vec<HospitalId>,
    created_at: DateTime<Utc>,
}

impl GlobalModel {
    /// Wrap an aggregated ensemble in a fresh classifier with default hyperparameters
    pub fn from_ensemble(
        ensemble: Ensemble,
        n_features: usize,
        mode: AggregationMode,
        averaged_values: Vec<Vec<f64>>,
        contributors: Vec<HospitalId>,
    ) -> Self {
        Self {
            classifier: BoostedClassifier::from_ensemble(BoosterConfig::default(), ensemble, n_features),
            mode,
            averaged_values,
            contributors,
            created_at: Utc::now(),
        }
    }

    pub fn classifier(&self) -> &BoostedClassifier {
        &self.classifier
    }

    pub fn mode(&self) -> AggregationMode {
        self.mode
    }

    pub fn averaged_values(&self) -> &[Vec<f64>] {
        &self.averaged_values
    }

    pub fn contributors(&self) -> &[HospitalId] {
        &self.contributors
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Mutable state of one federation run
#[derive(Debug, Default)]
pub struct Session {
    pub(crate) shards: Option<ShardSet>,
    pub(crate) local_models: BTreeMap<HospitalId, LocalModel>,
    pub(crate) global_model: Option<GlobalModel>,
}

impl Session {
    pub fn phase(&self) -> Phase {
        if self.global_model.is_some() {
            Phase::Aggregated
        } else if !self.local_models.is_empty() {
            Phase::Trained
        } else if self.shards.is_some() {
            Phase::Partitioned
        } else {
            Phase::Uninitialized
        }
    }

    pub fn shards(&self) -> Option<&ShardSet> {
        self.shards.as_ref()
    }

    pub fn local_models(&self) -> &BTreeMap<HospitalId, LocalModel> {
        &self.local_models
    }

    pub fn global_model(&self) -> Option<&GlobalModel> {
        self.global_model.as_ref()
    }

    /// Replace any existing shards with a fresh partition
    pub fn repartition(&mut self, n_rows: usize, n_hospitals: usize, seed: u64) -> Result<&ShardSet> {
        let shards = Self::partition(n_rows, n_hospitals, seed)?;
        Ok(self.shards.insert(shards))
    }

    /// Partition lazily; `seed` is only drawn when no shards exist
    pub fn ensure_partitioned(
        &mut self,
        n_rows: usize,
        n_hospitals: usize,
        seed: impl FnOnce() -> u64,
    ) -> Result<&ShardSet> {
        let shards = match self.shards.take() {
            Some(shards) => shards,
            None => Self::partition(n_rows, n_hospitals, seed())?,
        };
        Ok(self.shards.insert(shards))
    }

    fn partition(n_rows: usize, n_hospitals: usize, seed: u64) -> Result<ShardSet> {
        let shards = DataPartitioner::partition(n_rows, n_hospitals, seed)?;
        info!(
            hospitals = n_hospitals,
            rows = n_rows,
            seed,
            sizes = ?shards.sizes(),
            "Created hospital data splits"
        );
        Ok(shards)
    }

    /// Drop shards, local models and the global model
    pub fn clear(&mut self) {
        self.shards = None;
        self.local_models.clear();
        self.global_model = None;
    }
}
