//! Federated training workflow
//!
//! A [`Federation`] owns the dataset, the model store and one [`Session`]
//! behind a mutex. Every operation takes the lock for its whole duration:
//!
//! 1. `train_local(id)` fits a booster on the 70% split of hospital `id`
//! 2. `aggregate()` combines all local models into a global model
//! 3. `train_with_global(id)` fine-tunes a copy of the global model
//! 4. `reset_distribution()` re-partitions and drops every model

mod aggregator;
mod finetune;
mod session;
mod trainer;

pub use aggregator::{AggregationReport, EnsembleAggregator};
pub use finetune::FineTuner;
pub use session::{GlobalModel, LocalModel, Phase, Session};
pub use trainer::LocalTrainer;

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::booster::BoosterConfig;
use crate::config::{AggregationMode, FederationConfig, SPLIT_SEED};
use crate::data::{
    take_rows, train_test_split, Dataset, EncodedShard, FeatureEncoder, HospitalId,
    HospitalShard, ShardSet,
};
use crate::error::{FederatedError, Result};
use crate::storage::ModelStore;

/// Train and test matrices of one shard
pub(crate) struct ShardSplit {
    pub train_x: Array2<f64>,
    pub train_y: Array1<f64>,
    pub test_x: Array2<f64>,
    pub test_y: Array1<f64>,
}

/// Borrowed collaborators shared by the workflow steps
pub(crate) struct FederationContext<'a> {
    pub dataset: &'a Dataset,
    pub encoder: &'a FeatureEncoder,
    pub store: &'a dyn ModelStore,
    pub config: &'a FederationConfig,
}

impl FederationContext<'_> {
    pub fn check_hospital_id(&self, hospital_id: HospitalId) -> Result<()> {
        let n = self.config.n_hospitals;
        if hospital_id == 0 || hospital_id > n {
            return Err(FederatedError::Configuration(format!(
                "hospital id must be between 1 and {}, got {}",
                n, hospital_id
            )));
        }
        Ok(())
    }

    /// Configured partition seed, or a fresh random one
    pub fn draw_seed(&self) -> u64 {
        self.config.partition_seed.unwrap_or_else(rand::random)
    }

    pub fn encode_shard(&self, shard: &HospitalShard) -> Result<EncodedShard> {
        self.encoder.encode(self.dataset, shard.rows())
    }

    pub fn split(&self, shard: &EncodedShard, test_fraction: f64) -> Result<ShardSplit> {
        let split = train_test_split(shard.n_samples(), test_fraction, SPLIT_SEED)?;
        let (train_x, train_y) = take_rows(&shard.features, &shard.labels, &split.train_indices);
        let (test_x, test_y) = take_rows(&shard.features, &shard.labels, &split.test_indices);
        Ok(ShardSplit { train_x, train_y, test_x, test_y })
    }
}

/// Summary of the global model for status reports
#[derive(Debug, Clone, Serialize)]
pub struct GlobalModelStatus {
    pub mode: AggregationMode,
    pub contributors: Vec<HospitalId>,
    pub n_trees: usize,
    pub created_at: DateTime<Utc>,
}

/// Snapshot of the session
#[derive(Debug, Clone, Serialize)]
pub struct FederationStatus {
    pub phase: Phase,
    pub n_hospitals: usize,
    pub n_rows: usize,
    pub partition_seed: Option<u64>,
    pub shard_sizes: Vec<usize>,
    pub local_accuracies: BTreeMap<HospitalId, f64>,
    pub global_model: Option<GlobalModelStatus>,
    pub aggregation_mode: AggregationMode,
}

/// Federated training over hospital shards of one dataset
pub struct Federation {
    config: FederationConfig,
    dataset: Arc<Dataset>,
    encoder: FeatureEncoder,
    store: Box<dyn ModelStore>,
    trainer: LocalTrainer,
    aggregator: EnsembleAggregator,
    fine_tuner: FineTuner,
    session: Mutex<Session>,
}

impl Federation {
    pub fn new(
        config: FederationConfig,
        dataset: Arc<Dataset>,
        store: Box<dyn ModelStore>,
    ) -> Result<Self> {
        config.validate()?;
        if dataset.n_rows() < config.n_hospitals {
            return Err(FederatedError::Configuration(format!(
                "dataset has {} rows, fewer than {} hospitals",
                dataset.n_rows(),
                config.n_hospitals
            )));
        }

        info!(
            hospitals = config.n_hospitals,
            rows = dataset.n_rows(),
            mode = %config.aggregation_mode,
            "Federation initialized"
        );

        Ok(Self {
            aggregator: EnsembleAggregator::new(config.aggregation_mode),
            config,
            dataset,
            encoder: FeatureEncoder::default(),
            store,
            trainer: LocalTrainer::default(),
            fine_tuner: FineTuner::default(),
            session: Mutex::new(Session::default()),
        })
    }

    /// Replace the booster hyperparameters used by `train_local`
    pub fn with_booster(mut self, booster: BoosterConfig) -> Self {
        self.trainer = LocalTrainer::new(booster);
        self
    }

    pub fn config(&self) -> &FederationConfig {
        &self.config
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    fn context(&self) -> FederationContext<'_> {
        FederationContext {
            dataset: self.dataset.as_ref(),
            encoder: &self.encoder,
            store: self.store.as_ref(),
            config: &self.config,
        }
    }

    /// Train hospital `hospital_id` locally; returns its test accuracy
    pub fn train_local(&self, hospital_id: HospitalId) -> Result<f64> {
        let mut session = self.session.lock();
        self.trainer.train(&self.context(), &mut session, hospital_id)
    }

    /// Like `train_local` with explicit booster hyperparameters
    pub fn train_local_with(&self, hospital_id: HospitalId, booster: BoosterConfig) -> Result<f64> {
        let mut session = self.session.lock();
        LocalTrainer::new(booster).train(&self.context(), &mut session, hospital_id)
    }

    /// Aggregate all local models; returns the mean global accuracy
    pub fn aggregate(&self) -> Result<f64> {
        Ok(self.aggregate_report()?.global_accuracy)
    }

    pub fn aggregate_report(&self) -> Result<AggregationReport> {
        let mut session = self.session.lock();
        self.aggregator.aggregate(&self.context(), &mut session)
    }

    /// Fine-tune a copy of the global model for one hospital
    pub fn train_with_global(&self, hospital_id: HospitalId) -> Result<f64> {
        let mut session = self.session.lock();
        self.fine_tuner.fine_tune(&self.context(), &mut session, hospital_id)
    }

    /// Fine-tune for hospitals 1..=N in order, stopping at the first failure
    pub fn train_all_with_global(&self) -> Result<BTreeMap<HospitalId, f64>> {
        let mut session = self.session.lock();
        let ctx = self.context();
        let mut results = BTreeMap::new();
        for id in 1..=self.config.n_hospitals {
            let accuracy = self.fine_tuner.fine_tune(&ctx, &mut session, id)?;
            results.insert(id, accuracy);
        }
        info!(hospitals = results.len(), "Fine-tuned global model for all hospitals");
        Ok(results)
    }

    /// Accuracy of the current global model on every hospital's 20% test split
    pub fn evaluate_global(&self) -> Result<BTreeMap<HospitalId, f64>> {
        let mut session = self.session.lock();
        let ctx = self.context();
        let classifier = session
            .global_model()
            .map(|global| global.classifier().clone())
            .ok_or_else(|| {
                FederatedError::State("global model is not available; aggregate first".to_string())
            })?;
        let shards = session.ensure_partitioned(
            self.dataset.n_rows(),
            self.config.n_hospitals,
            || ctx.draw_seed(),
        )?;
        aggregator::evaluate_global(&ctx, shards, &classifier)
    }

    /// Drop all models and re-partition with the configured or a random seed
    pub fn reset_distribution(&self) -> Result<()> {
        let seed = self.context().draw_seed();
        self.reset_distribution_with_seed(seed)
    }

    pub fn reset_distribution_with_seed(&self, seed: u64) -> Result<()> {
        let mut fresh = Session::default();
        fresh.repartition(self.dataset.n_rows(), self.config.n_hospitals, seed)?;

        let mut session = self.session.lock();
        *session = fresh;
        info!(seed, "Hospital data distribution reset");
        Ok(())
    }

    pub fn status(&self) -> FederationStatus {
        let session = self.session.lock();
        FederationStatus {
            phase: session.phase(),
            n_hospitals: self.config.n_hospitals,
            n_rows: self.dataset.n_rows(),
            partition_seed: session.shards().map(ShardSet::seed),
            shard_sizes: session.shards().map(ShardSet::sizes).unwrap_or_default(),
            local_accuracies: session
                .local_models()
                .iter()
                .map(|(id, model)| (*id, model.accuracy))
                .collect(),
            global_model: session.global_model().map(|global| GlobalModelStatus {
                mode: global.mode(),
                contributors: global.contributors().to_vec(),
                n_trees: global.classifier().n_trees(),
                created_at: global.created_at(),
            }),
            aggregation_mode: self.config.aggregation_mode,
        }
    }

    pub fn phase(&self) -> Phase {
        self.session.lock().phase()
    }

    pub fn shards(&self) -> Option<ShardSet> {
        self.session.lock().shards().cloned()
    }

    pub fn local_model(&self, hospital_id: HospitalId) -> Option<LocalModel> {
        self.session.lock().local_models().get(&hospital_id).cloned()
    }

    pub fn global_model(&self) -> Option<GlobalModel> {
        self.session.lock().global_model().cloned()
    }
}
