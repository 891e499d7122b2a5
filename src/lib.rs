//! Kolosal Federated - federated gradient boosting over hospital shards
//!
//! One tabular dataset is split into disjoint hospital shards. Each hospital
//! trains a boosted-tree classifier on its own shard, the local ensembles are
//! combined into one global ensemble, and every hospital can then fine-tune a
//! private copy of the global model.
//!
//! # Modules
//!
//! - [`data`] - CSV loading, hospital partitioning, categorical encoding
//! - [`booster`] - XGBoost-style gradient boosted trees
//! - [`federation`] - Local training, aggregation, fine-tuning and session state
//! - [`storage`] - Model persistence
//! - [`server`] - HTTP server with JSON API
//! - [`cli`] - Command-line interface

pub mod error;
pub mod config;

pub mod data;
pub mod booster;
pub mod federation;
pub mod storage;

pub mod server;
pub mod cli;

pub use error::{FederatedError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{FederatedError, Result};

    pub use crate::config::{AggregationMode, FederationConfig};

    pub use crate::data::{Dataset, FeatureEncoder, HospitalId, ShardSet};

    pub use crate::booster::{BoostedClassifier, BoosterConfig, Ensemble, Tree};

    pub use crate::federation::{
        AggregationReport, Federation, FederationStatus, GlobalModel, LocalModel, Phase,
    };

    pub use crate::storage::{FileModelStore, ModelStore};
}
