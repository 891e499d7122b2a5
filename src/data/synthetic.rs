//! Synthetic health-screening records with the same shape as the smoking dataset

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::dataset::{Dataset, Value};
use crate::error::Result;

/// Generate `n_rows` records with an `ID` column, two categorical columns,
/// numeric measurements and a `smoking` label that depends on them.
pub fn health_records(n_rows: usize, seed: u64) -> Result<Dataset> {
    let columns = [
        "ID", "gender", "age", "height(cm)", "weight(kg)", "hemoglobin", "Gtp", "tartar", "smoking",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let rows = (0..n_rows)
        .map(|i| {
            let male = rng.gen_bool(0.6);
            let age = (rng.gen_range(20..80) / 5 * 5) as f64;
            let height: f64 = if male { rng.gen_range(160.0..185.0) } else { rng.gen_range(150.0..170.0) };
            let weight: f64 = height - 105.0 + rng.gen_range(-10.0..15.0);
            let hemoglobin: f64 = if male { rng.gen_range(13.0..17.5) } else { rng.gen_range(11.5..15.0) };
            let gtp = rng.gen_range(10.0..120.0_f64);
            let tartar = rng.gen_bool(0.55);

            let score = (if male { 1.5 } else { -1.5 })
                + (hemoglobin - 14.0) * 0.6
                + (gtp - 40.0) / 30.0
                + (if tartar { 0.4 } else { -0.4 })
                + rng.gen_range(-1.0..1.0);
            let smoking = if score > 0.0 { 1.0 } else { 0.0 };

            vec![
                Value::Number(i as f64),
                Value::text(if male { "M" } else { "F" }),
                Value::Number(age),
                Value::Number(height.round()),
                Value::Number(weight.round()),
                Value::Number((hemoglobin * 10.0).round() / 10.0),
                Value::Number(gtp.round()),
                Value::text(if tartar { "Y" } else { "N" }),
                Value::Number(smoking),
            ]
        })
        .collect();

    Dataset::from_rows(columns, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FeatureEncoder;

    #[test]
    fn test_health_records_encode() {
        let dataset = health_records(200, 3).unwrap();
        assert_eq!(dataset.n_rows(), 200);

        let rows: Vec<usize> = (0..200).collect();
        let encoded = FeatureEncoder::default().encode(&dataset, &rows).unwrap();
        assert_eq!(encoded.features.ncols(), 7);

        let positives = encoded.labels.iter().filter(|&&y| y == 1.0).count();
        assert!(positives > 20 && positives < 180, "positives = {}", positives);
    }
}
