//! Model training module
//!
//! Floating-point reference models and the shared estimator interface:
//! - Linear models (least squares, logistic regression)
//! - Decision tree classifier
//! - K-fold and stratified K-fold cross-validation

mod models;
pub mod cross_validation;
pub mod decision_tree;
pub mod linear_models;

pub use cross_validation::{CVResults, CVSplit, CVStrategy, CrossValidator};
pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use linear_models::{LinearRegression, LogisticRegression};
pub use models::{Estimator, TargetData, TaskType};
