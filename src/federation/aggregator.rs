//! Combination of local ensembles into one global ensemble

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::session::{GlobalModel, LocalModel, Session};
use super::FederationContext;
use crate::booster::{BoostedClassifier, Ensemble, Node};
use crate::config::{AggregationMode, GLOBAL_TEST_FRACTION};
use crate::data::{HospitalId, ShardSet};
use crate::error::{FederatedError, Result};

/// Outcome of one aggregation
#[derive(Debug, Clone, Serialize)]
pub struct AggregationReport {
    /// Mean of the per-hospital accuracies
    pub global_accuracy: f64,
    pub hospital_accuracies: BTreeMap<HospitalId, f64>,
    pub contributors: Vec<HospitalId>,
    pub n_trees: usize,
    pub mode: AggregationMode,
}

/// Combines local ensembles tree by tree
#[derive(Debug, Clone, Copy, Default)]
pub struct EnsembleAggregator {
    mode: AggregationMode,
}

impl EnsembleAggregator {
    pub fn new(mode: AggregationMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> AggregationMode {
        self.mode
    }

    /// Every model must carry the same number of trees; returns that number
    pub fn check_tree_counts(models: &BTreeMap<HospitalId, LocalModel>) -> Result<usize> {
        let mut iter = models.values();
        let expected = match iter.next() {
            Some(first) => first.classifier.n_trees(),
            None => return Err(FederatedError::State("no local models available for aggregation".to_string())),
        };
        for model in iter {
            let found = model.classifier.n_trees();
            if found != expected {
                return Err(FederatedError::IncompatibleEnsembles {
                    expected,
                    found,
                    hospital: model.hospital_id,
                });
            }
        }
        Ok(expected)
    }

    /// Element-wise mean of the per-tree numeric node values.
    ///
    /// Values are aligned by tree position and by position inside each tree's
    /// value vector; a position missing from some ensembles is averaged over
    /// the ensembles that have it.
    pub fn average_numeric_values(ensembles: &[&Ensemble]) -> Vec<Vec<f64>> {
        let n_trees = ensembles.iter().map(|e| e.n_trees()).max().unwrap_or(0);
        (0..n_trees)
            .map(|t| {
                let vectors: Vec<Vec<f64>> = ensembles
                    .iter()
                    .filter_map(|e| e.trees.get(t))
                    .map(|tree| tree.numeric_values())
                    .collect();
                let len = vectors.iter().map(|v| v.len()).max().unwrap_or(0);
                (0..len)
                    .map(|p| mean(vectors.iter().filter_map(|v| v.get(p).copied())).unwrap_or(0.0))
                    .collect()
            })
            .collect()
    }

    /// Copy of the first ensemble with thresholds, leaf values and statistics
    /// replaced by their mean over all ensembles whose node at the same
    /// position has the same kind and split feature.
    pub fn apply_averaged_values(ensembles: &[&Ensemble]) -> Option<Ensemble> {
        let template = ensembles.first()?;
        let mut merged = (*template).clone();
        merged.base_score = mean(ensembles.iter().map(|e| e.base_score)).unwrap_or(template.base_score);

        for (t, tree) in merged.trees.iter_mut().enumerate() {
            for (p, node) in tree.nodes_mut().iter_mut().enumerate() {
                let peers: Vec<&Node> = ensembles
                    .iter()
                    .filter_map(|e| e.trees.get(t))
                    .filter_map(|tr| tr.nodes().get(p))
                    .filter(|peer| peer.same_shape(node))
                    .collect();

                match node {
                    Node::Split { threshold, gain, cover, .. } => {
                        let fields = |i: usize| peers.iter().map(move |n| n.numeric_values()[i]);
                        *threshold = mean(fields(0)).unwrap_or(*threshold);
                        *gain = mean(fields(1)).unwrap_or(*gain);
                        *cover = mean(fields(2)).unwrap_or(*cover);
                    }
                    Node::Leaf { value, cover } => {
                        let fields = |i: usize| peers.iter().map(move |n| n.numeric_values()[i]);
                        *value = mean(fields(0)).unwrap_or(*value);
                        *cover = mean(fields(1)).unwrap_or(*cover);
                    }
                }
            }
        }

        Some(merged)
    }

    /// Aggregate every local model of the session into a new global model
    pub(crate) fn aggregate(
        &self,
        ctx: &FederationContext<'_>,
        session: &mut Session,
    ) -> Result<AggregationReport> {
        if session.local_models.is_empty() {
            return Err(FederatedError::State(
                "no local models available for aggregation".to_string(),
            ));
        }
        session.ensure_partitioned(ctx.dataset.n_rows(), ctx.config.n_hospitals, || ctx.draw_seed())?;

        let n_trees = Self::check_tree_counts(&session.local_models)?;
        let contributors: Vec<HospitalId> = session.local_models.keys().copied().collect();
        let ensembles: Vec<&Ensemble> = session
            .local_models
            .values()
            .map(|m| m.classifier.ensemble())
            .collect();

        let averaged = Self::average_numeric_values(&ensembles);
        let template = session
            .local_models
            .values()
            .next()
            .map(|m| &m.classifier)
            .ok_or_else(|| FederatedError::State("no local models available for aggregation".to_string()))?;

        let ensemble = match self.mode {
            AggregationMode::FirstEnsemble => template.ensemble().clone(),
            AggregationMode::AveragedValues => Self::apply_averaged_values(&ensembles)
                .unwrap_or_else(|| template.ensemble().clone()),
        };
        if let Some(first_tree) = ensemble.trees.first() {
            debug!(dump = ?first_tree.dump(), "First tree of the global ensemble");
        }

        let global = GlobalModel::from_ensemble(
            ensemble,
            template.n_features(),
            self.mode,
            averaged,
            contributors.clone(),
        );

        let shards = session
            .shards()
            .ok_or_else(|| FederatedError::State("hospital data has not been split".to_string()))?;
        let hospital_accuracies = evaluate_global(ctx, shards, global.classifier())?;
        let global_accuracy = mean(hospital_accuracies.values().copied()).unwrap_or(0.0);

        // Nothing is committed unless the model was persisted
        let path = ctx.store.save_global(&global)?;
        session.global_model = Some(global);

        info!(
            models = contributors.len(),
            n_trees,
            mode = %self.mode,
            global_accuracy,
            path = %path.display(),
            "Central model aggregated"
        );

        Ok(AggregationReport {
            global_accuracy,
            hospital_accuracies,
            contributors,
            n_trees,
            mode: self.mode,
        })
    }
}

/// Accuracy of `classifier` on the 20% test split of every shard
pub(crate) fn evaluate_global(
    ctx: &FederationContext<'_>,
    shards: &ShardSet,
    classifier: &BoostedClassifier,
) -> Result<BTreeMap<HospitalId, f64>> {
    shards
        .iter()
        .map(|shard| -> Result<(HospitalId, f64)> {
            let encoded = ctx.encode_shard(shard)?;
            let split = ctx.split(&encoded, GLOBAL_TEST_FRACTION)?;
            Ok((shard.id(), classifier.score(&split.test_x, &split.test_y)?))
        })
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booster::{BoosterConfig, Tree};
    use chrono::Utc;

    fn stump(feature: usize, threshold: f64, left: f64, right: f64) -> Tree {
        Tree::new(vec![
            Node::Split { feature, threshold, gain: 1.0, cover: 10.0, left: 1, right: 2 },
            Node::Leaf { value: left, cover: 4.0 },
            Node::Leaf { value: right, cover: 6.0 },
        ])
    }

    fn local(id: HospitalId, trees: Vec<Tree>) -> LocalModel {
        LocalModel {
            hospital_id: id,
            classifier: BoostedClassifier::from_ensemble(
                BoosterConfig::default(),
                Ensemble { base_score: 0.0, trees },
                2,
            ),
            accuracy: 0.5,
            n_train: 7,
            n_test: 3,
            trained_at: Utc::now(),
        }
    }

    #[test]
    fn test_tree_count_mismatch() {
        let mut models = BTreeMap::new();
        models.insert(1, local(1, vec![Tree::leaf(0.1, 1.0), Tree::leaf(0.2, 1.0)]));
        models.insert(2, local(2, vec![Tree::leaf(0.1, 1.0)]));

        let err = EnsembleAggregator::check_tree_counts(&models).unwrap_err();
        assert!(matches!(
            err,
            FederatedError::IncompatibleEnsembles { expected: 2, found: 1, hospital: 2 }
        ));
    }

    #[test]
    fn test_tree_count_match() {
        let mut models = BTreeMap::new();
        models.insert(1, local(1, vec![Tree::leaf(0.1, 1.0)]));
        models.insert(4, local(4, vec![stump(0, 1.0, 0.0, 1.0)]));
        assert_eq!(EnsembleAggregator::check_tree_counts(&models).unwrap(), 1);
    }

    #[test]
    fn test_average_numeric_values_is_positional() {
        let a = Ensemble { base_score: 0.0, trees: vec![stump(0, 1.0, -1.0, 1.0)] };
        let b = Ensemble { base_score: 0.0, trees: vec![stump(1, 3.0, 1.0, 3.0)] };
        let avg = EnsembleAggregator::average_numeric_values(&[&a, &b]);
        assert_eq!(avg, vec![vec![2.0, 1.0, 10.0, 0.0, 4.0, 2.0, 6.0]]);
    }

    #[test]
    fn test_average_numeric_values_ragged_trees() {
        let a = Ensemble { base_score: 0.0, trees: vec![stump(0, 1.0, -1.0, 1.0)] };
        let b = Ensemble { base_score: 0.0, trees: vec![Tree::leaf(3.0, 2.0)] };
        let avg = EnsembleAggregator::average_numeric_values(&[&a, &b]);
        // Leaf values of b line up with the threshold and gain of a
        assert_eq!(avg[0][..2], [2.0, 1.5]);
        assert_eq!(avg[0].len(), 7);
        assert_eq!(avg[0][2], 10.0);
    }

    #[test]
    fn test_apply_averaged_values() {
        let a = Ensemble { base_score: 0.2, trees: vec![stump(0, 1.0, -1.0, 1.0)] };
        let b = Ensemble { base_score: 0.4, trees: vec![stump(0, 3.0, 1.0, 3.0)] };
        // Different split feature: excluded from the mean
        let c = Ensemble { base_score: 0.6, trees: vec![stump(1, 9.0, 9.0, 9.0)] };

        let merged = EnsembleAggregator::apply_averaged_values(&[&a, &b, &c]).unwrap();
        assert!((merged.base_score - 0.4).abs() < 1e-12);
        match &merged.trees[0].nodes()[0] {
            Node::Split { feature, threshold, .. } => {
                assert_eq!(*feature, 0);
                assert_eq!(*threshold, 2.0);
            }
            other => panic!("expected split, got {:?}", other),
        }
        // Leaves of c still share the leaf shape
        assert_eq!(merged.trees[0].nodes()[1], Node::Leaf { value: 3.0, cover: 4.0 });
        assert!(EnsembleAggregator::apply_averaged_values(&[]).is_none());
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean([1.0, 2.0, 3.0].into_iter()), Some(2.0));
        assert_eq!(mean(std::iter::empty()), None);
    }
}
