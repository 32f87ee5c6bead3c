//! Kolosal FHE - quantized linear models with encrypted execution
//!
//! This crate trains linear and logistic regression with `n_bits` integer
//! arithmetic, compiles the integer layer into a bounded-width circuit and
//! runs it on secret-shared inputs.
//!
//! # Modules
//!
//! ## Models
//! - [`models`] - Quantized `LinearRegression` / `LogisticRegression`
//! - [`training`] - Floating-point reference models, decision tree, cross-validation
//! - [`quantization`] - Uniform affine quantizers
//!
//! ## Encrypted execution
//! - [`fhe`] - Circuit compilation, key generation, encrypted evaluation
//!
//! ## Workflow
//! - [`preprocessing`] - PCA and standard scaling
//! - [`pipeline`] - Named transform chains ending in an estimator
//! - [`optimizer`] - Exhaustive grid search with cross-validation
//! - [`datasets`] - Seeded synthetic regression/classification data
//! - [`utils`] - Metrics and tracing setup

pub mod error;

// Core
pub mod models;
pub mod quantization;
pub mod training;

// Encrypted execution
pub mod fhe;

// Workflow
pub mod datasets;
pub mod optimizer;
pub mod pipeline;
pub mod preprocessing;

pub mod utils;

pub use error::{KolosalError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{KolosalError, Result};

    // Data
    pub use crate::datasets::{make_classification, make_regression, ClassificationConfig, RegressionConfig};

    // Quantized models
    pub use crate::models::{LinearRegression, LogisticRegression, DEFAULT_N_BITS};
    pub use crate::quantization::{UniformQuantizer, MAX_N_BITS};

    // Encrypted execution
    pub use crate::fhe::{CompilationConfig, ExecutionMode, FheCircuit};

    // Workflow
    pub use crate::optimizer::{GridSearchCV, ParamGrid, ParamValue};
    pub use crate::pipeline::Pipeline;
    pub use crate::preprocessing::{Pca, StandardScaler, Transformer};
    pub use crate::training::{CVStrategy, CrossValidator, Estimator, TaskType};

    // Metrics
    pub use crate::utils::{accuracy_score, init_tracing, labels_to_targets, r2_score};
}
