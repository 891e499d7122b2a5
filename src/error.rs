//! Error types for the federated simulation

use thiserror::Error;

/// Result type alias for federation operations
pub type Result<T> = std::result::Result<T, FederatedError>;

/// Main error type for the federated simulation
#[derive(Error, Debug)]
pub enum FederatedError {
    /// Invalid hospital count or hospital id outside `[1, N]`
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unrecognised categorical value or non-numeric cell
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Operation requires state that does not exist yet
    #[error("State error: {0}")]
    State(String),

    #[error("Incompatible ensembles: hospital {hospital} has {found} trees, expected {expected}")]
    IncompatibleEnsembles {
        expected: usize,
        found: usize,
        hospital: usize,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FederatedError {
    /// Stable machine-readable name of the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            FederatedError::Configuration(_) => "configuration_error",
            FederatedError::Encoding(_) => "encoding_error",
            FederatedError::State(_) => "state_error",
            FederatedError::IncompatibleEnsembles { .. } => "incompatible_ensembles_error",
            FederatedError::Storage(_) => "storage_error",
            FederatedError::Data(_) => "data_error",
            FederatedError::Training(_) => "training_error",
            FederatedError::Io(_) => "io_error",
        }
    }
}

impl From<polars::error::PolarsError> for FederatedError {
    fn from(err: polars::error::PolarsError) -> Self {
        FederatedError::Data(err.to_string())
    }
}

impl From<ndarray::ShapeError> for FederatedError {
    fn from(err: ndarray::ShapeError) -> Self {
        FederatedError::Data(format!("invalid shape: {}", err))
    }
}
