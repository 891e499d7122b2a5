//! Dataset loading, hospital partitioning and feature encoding

mod dataset;
mod encoder;
mod partition;
mod split;
pub mod synthetic;

pub use dataset::{Dataset, Value};
pub use encoder::{EncodedShard, FeatureEncoder, ID_COLUMN, LABEL_COLUMN};
pub use partition::{DataPartitioner, HospitalId, HospitalShard, ShardSet};
pub use split::{take_rows, train_test_split, TrainTestSplit};
