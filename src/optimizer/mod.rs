//! Hyperparameter search
//!
//! Parameter grids and an exhaustive cross-validated grid search that works
//! with any [`Estimator`](crate::training::Estimator), pipelines included.

mod grid_search;
mod search_space;

pub use grid_search::{CandidateResult, GridSearchCV};
pub use search_space::{ParamGrid, ParamValue, TrialParams};
