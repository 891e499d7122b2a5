//! Per-hospital local training

use chrono::Utc;
use tracing::{info, warn};

use super::session::{LocalModel, Session};
use super::FederationContext;
use crate::booster::{BoostedClassifier, BoosterConfig};
use crate::config::LOCAL_TEST_FRACTION;
use crate::data::HospitalId;
use crate::error::Result;

/// Fits one booster per hospital shard
#[derive(Debug, Clone, Default)]
pub struct LocalTrainer {
    booster: BoosterConfig,
}

impl LocalTrainer {
    pub fn new(booster: BoosterConfig) -> Self {
        Self { booster }
    }

    /// Train hospital `hospital_id` on its 70% split and return the 30% test accuracy
    pub(crate) fn train(
        &self,
        ctx: &FederationContext<'_>,
        session: &mut Session,
        hospital_id: HospitalId,
    ) -> Result<f64> {
        ctx.check_hospital_id(hospital_id)?;

        let shards = session.ensure_partitioned(
            ctx.dataset.n_rows(),
            ctx.config.n_hospitals,
            || ctx.draw_seed(),
        )?;
        let encoded = ctx.encode_shard(shards.get(hospital_id)?)?;
        let split = ctx.split(&encoded, LOCAL_TEST_FRACTION)?;

        let mut classifier = BoostedClassifier::new(self.booster.clone());
        classifier.fit(&split.train_x, &split.train_y)?;
        let accuracy = classifier.score(&split.test_x, &split.test_y)?;

        info!(
            hospital_id,
            accuracy,
            n_train = split.train_y.len(),
            n_test = split.test_y.len(),
            n_trees = classifier.n_trees(),
            "Local model trained"
        );

        let model = LocalModel {
            hospital_id,
            classifier,
            accuracy,
            n_train: split.train_y.len(),
            n_test: split.test_y.len(),
            trained_at: Utc::now(),
        };

        // The in-memory model is kept even when persisting it fails
        let persisted = ctx.store.save_local(&model);
        session.local_models.insert(hospital_id, model);
        if let Err(e) = persisted {
            warn!(hospital_id, error = %e, "Local model kept in memory but not persisted");
            return Err(e);
        }

        Ok(accuracy)
    }
}
