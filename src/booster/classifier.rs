//! Gradient-boosted binary classifier (logistic loss, second-order approximation)

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use super::grower::{grow_tree, GrowContext};
use super::tree::Ensemble;
use crate::error::{FederatedError, Result};

/// Booster hyperparameters; defaults follow XGBoost
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoosterConfig {
    /// Boosting rounds per call to `fit` / `fit_continue`
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub random_state: Option<u64>,
}

impl Default for BoosterConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.0,
            subsample: 1.0,
            colsample_bytree: 1.0,
            random_state: Some(0),
        }
    }
}

/// Boosted tree ensemble for 0/1 labels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostedClassifier {
    config: BoosterConfig,
    ensemble: Ensemble,
    n_features: usize,
}

impl BoostedClassifier {
    pub fn new(config: BoosterConfig) -> Self {
        Self {
            config,
            ensemble: Ensemble::new(0.0),
            n_features: 0,
        }
    }

    /// Build a fitted classifier around an existing ensemble
    pub fn from_ensemble(config: BoosterConfig, ensemble: Ensemble, n_features: usize) -> Self {
        Self { config, ensemble, n_features }
    }

    fn sigmoid(x: f64) -> f64 {
        1.0 / (1.0 + (-x).exp())
    }

    pub fn config(&self) -> &BoosterConfig {
        &self.config
    }

    pub fn ensemble(&self) -> &Ensemble {
        &self.ensemble
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.ensemble.n_trees()
    }

    pub fn is_fitted(&self) -> bool {
        self.n_features > 0
    }

    /// Only affects trees added afterwards
    pub fn set_learning_rate(&mut self, learning_rate: f64) {
        self.config.learning_rate = learning_rate;
    }

    /// Fit from scratch, discarding any existing trees
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        Self::check_inputs(x, y)?;

        // Base score in log-odds space
        let p = y.mean().unwrap_or(0.5).clamp(1e-7, 1.0 - 1e-7);
        self.ensemble = Ensemble::new((p / (1.0 - p)).ln());
        self.n_features = x.ncols();

        let raw_preds = Array1::from_elem(x.nrows(), self.ensemble.base_score);
        self.boost(x, y, raw_preds);
        Ok(())
    }

    /// Continue boosting from the existing trees
    pub fn fit_continue(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if !self.is_fitted() {
            return self.fit(x, y);
        }
        Self::check_inputs(x, y)?;
        if x.ncols() != self.n_features {
            return Err(FederatedError::Training(format!(
                "model was trained on {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }

        let raw_preds = self.predict_margin(x)?;
        self.boost(x, y, raw_preds);
        Ok(())
    }

    fn check_inputs(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(FederatedError::Training("empty training set".to_string()));
        }
        if x.nrows() != y.len() {
            return Err(FederatedError::Training(format!(
                "features have {} rows but labels have {}",
                x.nrows(),
                y.len()
            )));
        }
        Ok(())
    }

    fn boost(&mut self, x: &Array2<f64>, y: &Array1<f64>, mut raw_preds: Array1<f64>) {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        for _ in 0..self.config.n_estimators {
            // Logistic loss: grad = p - y, hess = p * (1 - p)
            let probs: Array1<f64> = raw_preds.mapv(Self::sigmoid);
            let grad: Array1<f64> = &probs - y;
            let hess: Array1<f64> = probs.mapv(|p| (p * (1.0 - p)).max(1e-7));

            let rows = subsample(&mut rng, n_samples, self.config.subsample);
            let features = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let ctx = GrowContext {
                x,
                grad: &grad,
                hess: &hess,
                features: &features,
                config: &self.config,
            };
            let tree = grow_tree(&ctx, &rows);

            for (i, row) in x.rows().into_iter().enumerate() {
                raw_preds[i] += tree.predict(row);
            }

            self.ensemble.trees.push(tree);
        }
    }

    fn check_features(&self, x: &Array2<f64>) -> Result<()> {
        if !self.is_fitted() {
            return Err(FederatedError::Training("model not fitted".to_string()));
        }
        if x.ncols() != self.n_features {
            return Err(FederatedError::Training(format!(
                "expected {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }
        Ok(())
    }

    /// Raw log-odds margins
    pub fn predict_margin(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_features(x)?;
        Ok(x.rows().into_iter().map(|row| self.ensemble.margin(row)).collect())
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict_margin(x)?.mapv(Self::sigmoid))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let probs = self.predict_proba(x)?;
        Ok(probs.mapv(|p| if p >= 0.5 { 1.0 } else { 0.0 }))
    }

    /// Fraction of exact label matches
    pub fn score(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<f64> {
        if y.is_empty() {
            return Err(FederatedError::Training("cannot score an empty set".to_string()));
        }
        let preds = self.predict(x)?;
        let correct = preds.iter().zip(y.iter()).filter(|(p, a)| p == a).count();
        Ok(correct as f64 / y.len() as f64)
    }
}

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = ((n as f64) * ratio).ceil().max(1.0) as usize;
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort();
    indices
}
