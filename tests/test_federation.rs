//! Integration test: federated workflow over a synthetic dataset

use kolosal_federated::booster::BoosterConfig;
use kolosal_federated::config::{AggregationMode, FederationConfig};
use kolosal_federated::data::{synthetic, Dataset, HospitalId, Value};
use kolosal_federated::federation::{Federation, GlobalModel, LocalModel, Phase};
use kolosal_federated::storage::{FileModelStore, ModelStore};
use kolosal_federated::FederatedError;
use std::path::PathBuf;
use std::sync::Arc;

fn config(dir: &std::path::Path) -> FederationConfig {
    FederationConfig::default()
        .with_models_dir(dir)
        .with_hospitals(10)
        .with_partition_seed(7)
        .with_aggregation_mode(AggregationMode::FirstEnsemble)
}

fn federation(dir: &std::path::Path) -> Federation {
    let dataset = synthetic::health_records(1000, 42).unwrap();
    let store = FileModelStore::new(dir);
    Federation::new(config(dir), Arc::new(dataset), Box::new(store)).unwrap()
}

fn small_booster(n_estimators: usize) -> BoosterConfig {
    BoosterConfig {
        n_estimators,
        max_depth: 3,
        ..Default::default()
    }
}

/// Store whose writes always fail
struct BrokenStore;

impl ModelStore for BrokenStore {
    fn save_local(&self, _model: &LocalModel) -> kolosal_federated::Result<PathBuf> {
        Err(FederatedError::Storage("disk full".to_string()))
    }

    fn save_global(&self, _model: &GlobalModel) -> kolosal_federated::Result<PathBuf> {
        Err(FederatedError::Storage("disk full".to_string()))
    }

    fn load_local(&self, _hospital_id: HospitalId) -> kolosal_federated::Result<LocalModel> {
        Err(FederatedError::Storage("missing".to_string()))
    }

    fn load_global(&self) -> kolosal_federated::Result<GlobalModel> {
        Err(FederatedError::Storage("missing".to_string()))
    }
}

#[test]
fn test_partition_covers_every_row_once() {
    let dir = tempfile::tempdir().unwrap();
    let fed = federation(dir.path());
    fed.train_local(1).unwrap();

    let shards = fed.shards().unwrap();
    assert_eq!(shards.len(), 10);
    let mut rows: Vec<usize> = shards.iter().flat_map(|s| s.rows().to_vec()).collect();
    rows.sort_unstable();
    assert_eq!(rows, (0..1000).collect::<Vec<_>>());
    assert!(shards.sizes().iter().all(|&n| n == 100));
}

#[test]
fn test_hospital_id_range() {
    let dir = tempfile::tempdir().unwrap();
    let fed = federation(dir.path());

    assert!(matches!(fed.train_local(0), Err(FederatedError::Configuration(_))));
    assert!(matches!(fed.train_local(11), Err(FederatedError::Configuration(_))));
    assert!(fed.local_model(11).is_none());
}

#[test]
fn test_aggregate_requires_local_models() {
    let dir = tempfile::tempdir().unwrap();
    let fed = federation(dir.path());

    assert!(matches!(fed.aggregate(), Err(FederatedError::State(_))));
    assert_eq!(fed.phase(), Phase::Uninitialized);
}

#[test]
fn test_fine_tune_requires_global_model() {
    let dir = tempfile::tempdir().unwrap();
    let fed = federation(dir.path());
    fed.train_local_with(1, small_booster(5)).unwrap();

    assert!(matches!(fed.train_with_global(1), Err(FederatedError::State(_))));
    assert!(matches!(fed.train_all_with_global(), Err(FederatedError::State(_))));
}

#[test]
fn test_tree_count_mismatch_leaves_state_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let fed = federation(dir.path());
    fed.train_local_with(1, small_booster(5)).unwrap();
    fed.train_local_with(2, small_booster(10)).unwrap();

    match fed.aggregate() {
        Err(FederatedError::IncompatibleEnsembles { expected, found, hospital }) => {
            assert_eq!((expected, found, hospital), (5, 10, 2));
        }
        other => panic!("expected incompatible ensembles, got {:?}", other),
    }
    assert!(fed.global_model().is_none());
    assert_eq!(fed.phase(), Phase::Trained);
}

#[test]
fn test_aggregate_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let fed = federation(dir.path());
    for id in [3, 1, 2] {
        fed.train_local_with(id, small_booster(8)).unwrap();
    }

    let first = fed.aggregate_report().unwrap();
    let second = fed.aggregate_report().unwrap();
    assert_eq!(first.global_accuracy, second.global_accuracy);
    assert_eq!(first.hospital_accuracies, second.hospital_accuracies);
    assert_eq!(first.contributors, vec![1, 2, 3]);
    assert_eq!(first.n_trees, 8);
    assert_eq!(first.hospital_accuracies.len(), 10);

    // First-ensemble mode uses the lowest hospital id verbatim
    let global = fed.global_model().unwrap();
    let local = fed.local_model(1).unwrap();
    assert_eq!(global.classifier().ensemble(), local.classifier.ensemble());
    assert_eq!(global.averaged_values().len(), 8);
    assert!(dir.path().join("global_model.bin").exists());
}

#[test]
fn test_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let fed = federation(dir.path());

    for id in 1..=10 {
        let accuracy = fed.train_local(id).unwrap();
        assert!((0.0..=1.0).contains(&accuracy));
        assert!(dir.path().join(format!("hospital_{}_model.bin", id)).exists());
    }
    assert_eq!(fed.phase(), Phase::Trained);

    let global_accuracy = fed.aggregate().unwrap();
    assert!((0.0..=1.0).contains(&global_accuracy));
    // Synthetic labels are learnable
    assert!(global_accuracy > 0.6, "global accuracy {}", global_accuracy);

    let before = fed.evaluate_global().unwrap();
    let tuned = fed.train_all_with_global().unwrap();
    let after = fed.evaluate_global().unwrap();

    assert_eq!(tuned.keys().copied().collect::<Vec<_>>(), (1..=10).collect::<Vec<_>>());
    assert!(tuned.values().all(|a| (0.0..=1.0).contains(a)));
    assert_eq!(before, after);
    assert_eq!(fed.global_model().unwrap().classifier().n_trees(), 100);
    assert_eq!(fed.phase(), Phase::Aggregated);

    let single = fed.train_with_global(4).unwrap();
    assert_eq!(single, tuned[&4]);
}

#[test]
fn test_local_training_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let fed = federation(dir.path());

    let first = fed.train_local_with(5, small_booster(6)).unwrap();
    let second = fed.train_local_with(5, small_booster(6)).unwrap();
    assert_eq!(first, second);
    assert_eq!(fed.status().local_accuracies.len(), 1);
}

#[test]
fn test_reset_distribution() {
    let dir = tempfile::tempdir().unwrap();
    let fed = federation(dir.path());
    fed.train_local_with(1, small_booster(4)).unwrap();
    fed.aggregate().unwrap();
    let before = fed.shards().unwrap();

    fed.reset_distribution_with_seed(99).unwrap();
    assert_eq!(fed.phase(), Phase::Partitioned);
    assert!(fed.local_model(1).is_none());
    assert!(fed.global_model().is_none());
    let after = fed.shards().unwrap();
    assert_eq!(after.seed(), 99);
    assert_ne!(before.get(1).unwrap(), after.get(1).unwrap());

    // Configured seed is reused on a plain reset
    fed.reset_distribution().unwrap();
    assert_eq!(fed.shards().unwrap().seed(), 7);
}

#[test]
fn test_averaged_values_mode() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = synthetic::health_records(1000, 42).unwrap();
    let config = config(dir.path()).with_aggregation_mode(AggregationMode::AveragedValues);
    let fed = Federation::new(config, Arc::new(dataset), Box::new(FileModelStore::new(dir.path()))).unwrap();

    for id in 1..=3 {
        fed.train_local_with(id, small_booster(5)).unwrap();
    }
    let report = fed.aggregate_report().unwrap();
    assert_eq!(report.mode, AggregationMode::AveragedValues);
    assert!((0.0..=1.0).contains(&report.global_accuracy));

    let status = fed.status();
    let global = status.global_model.unwrap();
    assert_eq!(global.mode, AggregationMode::AveragedValues);
    assert_eq!(global.n_trees, 5);
}

#[test]
fn test_storage_failure_semantics() {
    let dataset = synthetic::health_records(200, 1).unwrap();
    let config = FederationConfig::default().with_hospitals(2).with_partition_seed(3);
    let fed = Federation::new(config, Arc::new(dataset), Box::new(BrokenStore)).unwrap();

    // Local training keeps the in-memory model
    assert!(matches!(
        fed.train_local_with(1, small_booster(3)),
        Err(FederatedError::Storage(_))
    ));
    assert!(fed.local_model(1).is_some());

    // Aggregation commits nothing
    assert!(matches!(fed.aggregate(), Err(FederatedError::Storage(_))));
    assert!(fed.global_model().is_none());
    assert_eq!(fed.phase(), Phase::Trained);
}

#[test]
fn test_unknown_category_is_encoding_error() {
    let columns = ["ID", "gender", "age", "smoking"].iter().map(|s| s.to_string()).collect();
    let rows = (0..20)
        .map(|i| vec![Value::from(i as f64), Value::from("X"), Value::from(40.0), Value::from((i % 2) as f64)])
        .collect();
    let dataset = Dataset::from_rows(columns, rows).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let config = FederationConfig::default().with_hospitals(2).with_partition_seed(1);
    let fed = Federation::new(config, Arc::new(dataset), Box::new(FileModelStore::new(dir.path()))).unwrap();

    assert!(matches!(fed.train_local(1), Err(FederatedError::Encoding(_))));
}

#[test]
fn test_too_many_hospitals_rejected() {
    let dataset = synthetic::health_records(5, 1).unwrap();
    let config = FederationConfig::default().with_hospitals(10);
    let result = Federation::new(config, Arc::new(dataset), Box::new(BrokenStore));
    assert!(matches!(result, Err(FederatedError::Configuration(_))));
}
