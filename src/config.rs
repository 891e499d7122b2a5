//! Federation configuration

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::PathBuf;
use tracing::warn;

use crate::error::{FederatedError, Result};

/// Seed of every train/test split (local training, global evaluation, fine-tuning)
pub const SPLIT_SEED: u64 = 2200;
/// Held-out fraction for local training and fine-tuning
pub const LOCAL_TEST_FRACTION: f64 = 0.3;
/// Held-out fraction for global evaluation
pub const GLOBAL_TEST_FRACTION: f64 = 0.2;
/// Learning rate used when resuming from the global model (0.3 / 30)
pub const FINE_TUNE_LEARNING_RATE: f64 = 0.01;

/// How local ensembles are combined into the global ensemble
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// Use the first local ensemble verbatim; averaged values are diagnostics only
    #[default]
    FirstEnsemble,
    /// Write the averaged thresholds and leaf values into the template ensemble
    AveragedValues,
}

impl AggregationMode {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "first" | "first_ensemble" => Ok(AggregationMode::FirstEnsemble),
            "averaged" | "averaged_values" => Ok(AggregationMode::AveragedValues),
            other => Err(FederatedError::Configuration(format!(
                "unknown aggregation mode '{}', expected 'first' or 'averaged'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationMode::FirstEnsemble => write!(f, "first_ensemble"),
            AggregationMode::AveragedValues => write!(f, "averaged_values"),
        }
    }
}

/// Configuration of a federation session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederationConfig {
    /// CSV file holding the shared dataset
    pub data_path: PathBuf,
    /// Directory receiving persisted models
    pub models_dir: PathBuf,
    /// Number of simulated hospitals
    pub n_hospitals: usize,
    /// Fixed partition seed; `None` draws a fresh seed on every re-partition
    pub partition_seed: Option<u64>,
    pub aggregation_mode: AggregationMode,
    /// Columns removed unconditionally at load time
    pub drop_columns: Vec<String>,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            data_path: std::env::var("FED_DATA_PATH")
                .unwrap_or_else(|_| "smoking.csv".to_string())
                .into(),
            models_dir: std::env::var("FED_MODELS_DIR")
                .unwrap_or_else(|_| "./models".to_string())
                .into(),
            n_hospitals: env_setting("FED_HOSPITALS", |n| n.parse::<usize>()).unwrap_or(10),
            partition_seed: env_setting("FED_PARTITION_SEED", |s| s.parse::<u64>()),
            aggregation_mode: env_setting("FED_AGGREGATION_MODE", AggregationMode::parse)
                .unwrap_or_default(),
            drop_columns: vec!["oral".to_string()],
        }
    }
}

impl FederationConfig {
    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }

    pub fn with_models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.models_dir = dir.into();
        self
    }

    pub fn with_hospitals(mut self, n: usize) -> Self {
        self.n_hospitals = n;
        self
    }

    pub fn with_partition_seed(mut self, seed: u64) -> Self {
        self.partition_seed = Some(seed);
        self
    }

    pub fn with_aggregation_mode(mut self, mode: AggregationMode) -> Self {
        self.aggregation_mode = mode;
        self
    }

    /// Reject hospital counts that can never be partitioned
    pub fn validate(&self) -> Result<()> {
        if self.n_hospitals == 0 {
            return Err(FederatedError::Configuration(
                "number of hospitals must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

pub(crate) fn env_setting<T, E: Display>(
    name: &str,
    parse: impl FnOnce(&str) -> std::result::Result<T, E>,
) -> Option<T> {
    parse_setting(name, std::env::var(name).ok(), parse)
}

/// Parse an optional raw setting; invalid values are logged and ignored
fn parse_setting<T, E: Display>(
    name: &str,
    raw: Option<String>,
    parse: impl FnOnce(&str) -> std::result::Result<T, E>,
) -> Option<T> {
    let raw = raw?;
    match parse(raw.trim()) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(setting = name, value = %raw, error = %e, "Ignoring invalid setting, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aggregation_mode() {
        assert_eq!(AggregationMode::parse("first").unwrap(), AggregationMode::FirstEnsemble);
        assert_eq!(AggregationMode::parse("Averaged").unwrap(), AggregationMode::AveragedValues);
        assert!(AggregationMode::parse("median").is_err());
    }

    #[test]
    fn test_invalid_setting_falls_back() {
        let mode = parse_setting("FED_AGGREGATION_MODE", Some("median".to_string()), AggregationMode::parse);
        assert_eq!(mode, None);
        let hospitals = parse_setting("FED_HOSPITALS", Some("ten".to_string()), |n| n.parse::<usize>());
        assert_eq!(hospitals, None);
        let hospitals = parse_setting("FED_HOSPITALS", Some(" 4 ".to_string()), |n| n.parse::<usize>());
        assert_eq!(hospitals, Some(4));
        assert_eq!(parse_setting("FED_PARTITION_SEED", None, |s| s.parse::<u64>()), None);
    }

    #[test]
    fn test_builder() {
        let config = FederationConfig::default()
            .with_hospitals(4)
            .with_partition_seed(7)
            .with_models_dir("/tmp/models");
        assert_eq!(config.n_hospitals, 4);
        assert_eq!(config.partition_seed, Some(7));
        assert_eq!(config.models_dir, PathBuf::from("/tmp/models"));
        assert_eq!(config.drop_columns, vec!["oral".to_string()]);
    }

    #[test]
    fn test_validate_rejects_zero_hospitals() {
        let config = FederationConfig::default().with_hospitals(0);
        assert!(matches!(config.validate(), Err(FederatedError::Configuration(_))));
    }
}
