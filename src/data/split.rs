//! Seeded train/test splitting

use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{FederatedError, Result};

/// A single train/test split of row positions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTestSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

/// Shuffle `0..n_samples` with `seed` and hold out `ceil(test_fraction * n)` rows
pub fn train_test_split(n_samples: usize, test_fraction: f64, seed: u64) -> Result<TrainTestSplit> {
    if !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
        return Err(FederatedError::Configuration(format!(
            "test fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }

    let n_test = (test_fraction * n_samples as f64).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(FederatedError::Data(format!(
            "{} rows are too few for a {:.0}% test split",
            n_samples,
            test_fraction * 100.0
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train_indices = indices.split_off(n_test);
    Ok(TrainTestSplit {
        train_indices,
        test_indices: indices,
    })
}

/// Select rows of an encoded shard
pub fn take_rows(x: &Array2<f64>, y: &Array1<f64>, indices: &[usize]) -> (Array2<f64>, Array1<f64>) {
    (x.select(Axis(0), indices), y.select(Axis(0), indices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_split_sizes() {
        let split = train_test_split(100, 0.3, 2200).unwrap();
        assert_eq!(split.test_indices.len(), 30);
        assert_eq!(split.train_indices.len(), 70);

        let split = train_test_split(101, 0.2, 2200).unwrap();
        assert_eq!(split.test_indices.len(), 21);
        assert_eq!(split.train_indices.len(), 80);
    }

    #[test]
    fn test_split_is_reproducible_and_disjoint() {
        let a = train_test_split(50, 0.3, 2200).unwrap();
        let b = train_test_split(50, 0.3, 2200).unwrap();
        assert_eq!(a, b);

        let mut all: Vec<usize> = a.train_indices.iter().chain(&a.test_indices).copied().collect();
        all.sort();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_rejects_tiny_inputs() {
        assert!(matches!(train_test_split(1, 0.3, 1), Err(FederatedError::Data(_))));
        assert!(matches!(train_test_split(10, 0.0, 1), Err(FederatedError::Configuration(_))));
    }

    #[test]
    fn test_take_rows() {
        let x = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let y = array![0.0, 1.0, 0.0];
        let (xs, ys) = take_rows(&x, &y, &[2, 0]);
        assert_eq!(xs, array![[5.0, 6.0], [1.0, 2.0]]);
        assert_eq!(ys, array![0.0, 0.0]);
    }
}
