//! Per-hospital fine-tuning from the global model

use tracing::info;

use super::session::Session;
use super::FederationContext;
use crate::config::{FINE_TUNE_LEARNING_RATE, LOCAL_TEST_FRACTION};
use crate::data::HospitalId;
use crate::error::{FederatedError, Result};

/// Continues boosting a private copy of the global model on one hospital shard.
///
/// The global model and the stored local models are never modified.
#[derive(Debug, Clone, Copy)]
pub struct FineTuner {
    learning_rate: f64,
}

impl Default for FineTuner {
    fn default() -> Self {
        Self::new(FINE_TUNE_LEARNING_RATE)
    }
}

impl FineTuner {
    pub fn new(learning_rate: f64) -> Self {
        Self { learning_rate }
    }

    /// Fine-tune on the 70% split of `hospital_id` and return the 30% test accuracy
    pub(crate) fn fine_tune(
        &self,
        ctx: &FederationContext<'_>,
        session: &mut Session,
        hospital_id: HospitalId,
    ) -> Result<f64> {
        let mut classifier = session
            .global_model
            .as_ref()
            .map(|global| global.classifier().clone())
            .ok_or_else(|| {
                FederatedError::State("global model is not available; aggregate first".to_string())
            })?;
        ctx.check_hospital_id(hospital_id)?;

        let shards = session.ensure_partitioned(
            ctx.dataset.n_rows(),
            ctx.config.n_hospitals,
            || ctx.draw_seed(),
        )?;
        let encoded = ctx.encode_shard(shards.get(hospital_id)?)?;
        let split = ctx.split(&encoded, LOCAL_TEST_FRACTION)?;

        let base_trees = classifier.n_trees();
        classifier.set_learning_rate(self.learning_rate);
        classifier.fit_continue(&split.train_x, &split.train_y)?;
        let accuracy = classifier.score(&split.test_x, &split.test_y)?;

        info!(
            hospital_id,
            accuracy,
            learning_rate = self.learning_rate,
            base_trees,
            n_trees = classifier.n_trees(),
            "Fine-tuned global model"
        );

        Ok(accuracy)
    }
}
