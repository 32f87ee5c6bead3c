//! Data preprocessing module
//!
//! Unsupervised feature transforms that can be chained in a
//! [`Pipeline`](crate::pipeline::Pipeline):
//! - Standard scaling
//! - PCA

mod pca;
mod scaler;

pub use pca::Pca;
pub use scaler::StandardScaler;

use crate::error::Result;
use crate::optimizer::ParamValue;
use ndarray::Array2;
use std::fmt;

/// A fitted-then-applied feature transform
pub trait Transformer: fmt::Debug + Send + Sync {
    /// Learn transform parameters from `x`
    fn fit(&mut self, x: &Array2<f64>) -> Result<()>;

    /// Apply the learned transform
    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Set a hyperparameter by name; clears the fitted state
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()>;

    fn is_fitted(&self) -> bool;

    fn clone_box(&self) -> Box<dyn Transformer>;
}

impl Clone for Box<dyn Transformer> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
