//! Persistence of local and global models
//!
//! Models are written as opaque bincode blobs, one file per hospital plus one
//! file for the global model. Files are overwritten on every save.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::data::HospitalId;
use crate::error::{FederatedError, Result};
use crate::federation::{GlobalModel, LocalModel};

/// Storage backend for trained models
pub trait ModelStore: Send + Sync {
    fn save_local(&self, model: &LocalModel) -> Result<PathBuf>;

    fn save_global(&self, model: &GlobalModel) -> Result<PathBuf>;

    fn load_local(&self, hospital_id: HospitalId) -> Result<LocalModel>;

    fn load_global(&self) -> Result<GlobalModel>;
}

/// Local file system store
#[derive(Debug, Clone)]
pub struct FileModelStore {
    root: PathBuf,
}

impl FileModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn local_path(&self, hospital_id: HospitalId) -> PathBuf {
        self.root.join(format!("hospital_{}_model.bin", hospital_id))
    }

    pub fn global_path(&self) -> PathBuf {
        self.root.join("global_model.bin")
    }

    fn write<M: Serialize>(&self, path: &Path, model: &M) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| {
            FederatedError::Storage(format!("failed to create {}: {}", self.root.display(), e))
        })?;
        let file = File::create(path).map_err(|e| {
            FederatedError::Storage(format!("failed to create {}: {}", path.display(), e))
        })?;
        bincode::serialize_into(BufWriter::new(file), model).map_err(|e| {
            FederatedError::Storage(format!("failed to write {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Model persisted");
        Ok(())
    }

    fn read<M: DeserializeOwned>(&self, path: &Path) -> Result<M> {
        let file = File::open(path).map_err(|e| {
            FederatedError::Storage(format!("failed to open {}: {}", path.display(), e))
        })?;
        bincode::deserialize_from(BufReader::new(file)).map_err(|e| {
            FederatedError::Storage(format!("failed to read {}: {}", path.display(), e))
        })
    }
}

impl ModelStore for FileModelStore {
    fn save_local(&self, model: &LocalModel) -> Result<PathBuf> {
        let path = self.local_path(model.hospital_id);
        self.write(&path, model)?;
        Ok(path)
    }

    fn save_global(&self, model: &GlobalModel) -> Result<PathBuf> {
        let path = self.global_path();
        self.write(&path, model)?;
        Ok(path)
    }

    fn load_local(&self, hospital_id: HospitalId) -> Result<LocalModel> {
        self.read(&self.local_path(hospital_id))
    }

    fn load_global(&self) -> Result<GlobalModel> {
        self.read(&self.global_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booster::{BoostedClassifier, BoosterConfig, Ensemble, Tree};
    use crate::config::AggregationMode;
    use chrono::Utc;

    fn local_model(id: HospitalId) -> LocalModel {
        let ensemble = Ensemble { base_score: 0.1, trees: vec![Tree::leaf(0.2, 5.0)] };
        LocalModel {
            hospital_id: id,
            classifier: BoostedClassifier::from_ensemble(BoosterConfig::default(), ensemble, 4),
            accuracy: 0.75,
            n_train: 70,
            n_test: 30,
            trained_at: Utc::now(),
        }
    }

    #[test]
    fn test_local_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::new(dir.path().join("models"));

        let path = store.save_local(&local_model(3)).unwrap();
        assert!(path.ends_with("hospital_3_model.bin"));

        let loaded = store.load_local(3).unwrap();
        assert_eq!(loaded.hospital_id, 3);
        assert_eq!(loaded.accuracy, 0.75);
        assert_eq!(loaded.classifier.ensemble(), local_model(3).classifier.ensemble());
    }

    #[test]
    fn test_global_round_trip_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::new(dir.path());

        let first = GlobalModel::from_ensemble(Ensemble::new(0.0), 2, AggregationMode::FirstEnsemble, vec![], vec![1]);
        let second = GlobalModel::from_ensemble(Ensemble::new(1.0), 2, AggregationMode::AveragedValues, vec![], vec![1, 2]);
        store.save_global(&first).unwrap();
        store.save_global(&second).unwrap();

        let loaded = store.load_global().unwrap();
        assert_eq!(loaded.mode(), AggregationMode::AveragedValues);
        assert_eq!(loaded.contributors(), &[1, 2]);
        assert_eq!(loaded.classifier().ensemble().base_score, 1.0);
    }

    #[test]
    fn test_unwritable_root_is_storage_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let store = FileModelStore::new(file.path());
        let err = store.save_local(&local_model(1)).unwrap_err();
        assert!(matches!(err, FederatedError::Storage(_)));
    }

    #[test]
    fn test_missing_model_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileModelStore::new(dir.path());
        assert!(matches!(store.load_global(), Err(FederatedError::Storage(_))));
    }
}
