//! Estimator traits shared by reference models, quantized models and pipelines

use crate::error::Result;
use crate::optimizer::ParamValue;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Kind of supervised problem an estimator solves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskType {
    Regression,
    Classification,
}

/// Target containers that can be split into cross-validation folds
pub trait TargetData: Clone + Send + Sync {
    /// Number of samples (rows)
    fn n_samples(&self) -> usize;

    /// Rows at `indices`, in that order
    fn select(&self, indices: &[usize]) -> Self;

    /// Class label per sample, used for stratified splitting
    fn strata(&self) -> Option<Vec<usize>> {
        None
    }
}

impl TargetData for Array2<f64> {
    fn n_samples(&self) -> usize {
        self.nrows()
    }

    fn select(&self, indices: &[usize]) -> Self {
        self.select(Axis(0), indices)
    }
}

impl TargetData for Array1<f64> {
    fn n_samples(&self) -> usize {
        self.len()
    }

    fn select(&self, indices: &[usize]) -> Self {
        self.select(Axis(0), indices)
    }
}

impl TargetData for Array1<usize> {
    fn n_samples(&self) -> usize {
        self.len()
    }

    fn select(&self, indices: &[usize]) -> Self {
        self.select(Axis(0), indices)
    }

    fn strata(&self) -> Option<Vec<usize>> {
        Some(self.to_vec())
    }
}

/// Supervised model with a scikit-learn style fit/predict/score surface
pub trait Estimator: Clone + Send + Sync {
    /// Training target type
    type Target: TargetData;
    /// Prediction type
    type Output;

    /// Fit the model to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Self::Target) -> Result<()>;

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Self::Output>;

    /// Higher is better: R² for regressors, accuracy for classifiers
    fn score(&self, x: &Array2<f64>, y: &Self::Target) -> Result<f64>;

    /// Set a hyperparameter by name; invalidates any previous fit
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()>;

    /// Problem kind, decides the cross-validation strategy
    fn task(&self) -> TaskType;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_select_rows() {
        let y = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]];
        let picked = TargetData::select(&y, &[2, 0]);
        assert_eq!(picked, array![[3.0, 30.0], [1.0, 10.0]]);
    }

    #[test]
    fn test_label_strata() {
        let y = array![1usize, 0, 1];
        assert_eq!(y.strata(), Some(vec![1, 0, 1]));
        assert_eq!(TargetData::select(&y, &[1]), array![0usize]);
        assert!(array![1.0, 2.0].strata().is_none());
    }
}
