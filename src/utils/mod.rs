//! Utility functions and types

pub mod logging;
pub mod metrics;

pub use logging::init_tracing;
pub use metrics::{accuracy_score, labels_to_targets, r2_score, r2_score_1d};
