//! Partitioning of the dataset into disjoint hospital shards

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{FederatedError, Result};

/// Hospital identifier in `[1, N]`
pub type HospitalId = usize;

/// Disjoint slice of dataset row indices owned by one hospital
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HospitalShard {
    id: HospitalId,
    rows: Vec<usize>,
}

impl HospitalShard {
    pub fn id(&self) -> HospitalId {
        self.id
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Complete partition of a dataset, keyed by hospital id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardSet {
    seed: u64,
    shards: BTreeMap<HospitalId, HospitalShard>,
}

impl ShardSet {
    pub fn get(&self, id: HospitalId) -> Result<&HospitalShard> {
        self.shards.get(&id).ok_or_else(|| {
            FederatedError::Configuration(format!(
                "hospital id must be between 1 and {}, got {}",
                self.shards.len(),
                id
            ))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &HospitalShard> {
        self.shards.values()
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Seed the partition was drawn with
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.shards.values().map(|s| s.len()).collect()
    }
}

/// Splits row indices into N shuffled, as-equal-as-possible blocks
pub struct DataPartitioner;

impl DataPartitioner {
    pub fn partition(n_rows: usize, n_hospitals: usize, seed: u64) -> Result<ShardSet> {
        if n_hospitals == 0 {
            return Err(FederatedError::Configuration(
                "number of hospitals must be at least 1".to_string(),
            ));
        }
        if n_hospitals > n_rows {
            return Err(FederatedError::Configuration(format!(
                "cannot split {} rows across {} hospitals",
                n_rows, n_hospitals
            )));
        }

        let mut indices: Vec<usize> = (0..n_rows).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let base = n_rows / n_hospitals;
        let remainder = n_rows % n_hospitals;

        let mut shards = BTreeMap::new();
        let mut start = 0;
        for i in 0..n_hospitals {
            let size = if i < remainder { base + 1 } else { base };
            let id = i + 1;
            shards.insert(
                id,
                HospitalShard {
                    id,
                    rows: indices[start..start + size].to_vec(),
                },
            );
            start += size;
        }

        Ok(ShardSet { seed, shards })
    }
}
