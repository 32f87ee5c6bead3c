//! Quantized linear models
//!
//! Each model trains a floating-point twin, quantizes its parameters to
//! `n_bits` integers and can then be compiled for encrypted execution.
//!
//! ```no_run
//! use kolosal_fhe::datasets::{make_regression, RegressionConfig};
//! use kolosal_fhe::fhe::{CompilationConfig, ExecutionMode};
//! use kolosal_fhe::models::LinearRegression;
//!
//! # fn main() -> kolosal_fhe::Result<()> {
//! let (x, y) = make_regression(&RegressionConfig::new(200, 10).with_random_state(42))?;
//! let (mut model, reference) = LinearRegression::new(4).fit_benchmark(&x, &y)?;
//! model.compile(&x, &CompilationConfig::default())?;
//! let encrypted = model.predict_with(&x, ExecutionMode::Fhe)?;
//! assert_eq!(encrypted.dim(), reference.predict(&x)?.dim());
//! # Ok(())
//! # }
//! ```

mod layer;
mod linear;
mod logistic;

pub use layer::QuantizedLinearCore;
pub use linear::LinearRegression;
pub use logistic::LogisticRegression;

/// Bit width used by `Default`
pub const DEFAULT_N_BITS: u8 = 8;
