//! XGBoost-style gradient boosting for binary classification
//!
//! Key properties:
//! - Second-order (gradient + hessian) logistic loss
//! - Typed ensemble: trees are flat pre-order node vectors with typed split
//!   and leaf fields, so aggregation works on values rather than text dumps
//! - Shrinkage is applied to leaf values when a tree is grown, which lets a
//!   model resume boosting at a different learning rate

mod classifier;
mod grower;
mod tree;

pub use classifier::{BoostedClassifier, BoosterConfig};
pub use tree::{Ensemble, Node, Tree};
