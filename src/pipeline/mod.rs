//! Preprocessing pipelines
//!
//! Chains named [`Transformer`] steps in front of a final estimator. A
//! pipeline is itself an [`Estimator`], so it can be cross-validated and
//! grid-searched; nested parameters use the `step__param` naming scheme.

use crate::error::{KolosalError, Result};
use crate::optimizer::ParamValue;
use crate::preprocessing::Transformer;
use crate::training::{Estimator, TaskType};
use ndarray::Array2;
use std::time::Instant;
use tracing::debug;

/// Ordered transforms followed by an estimator
#[derive(Debug, Clone)]
pub struct Pipeline<E: Estimator> {
    steps: Vec<(String, Box<dyn Transformer>)>,
    estimator_name: String,
    estimator: E,
    is_fitted: bool,
}

impl<E: Estimator> Pipeline<E> {
    /// Pipeline with no transforms yet
    pub fn new(estimator_name: impl Into<String>, estimator: E) -> Self {
        Self {
            steps: Vec::new(),
            estimator_name: estimator_name.into(),
            estimator,
            is_fitted: false,
        }
    }

    /// Append a transform; steps run in the order they are added
    pub fn with_step<T: Transformer + 'static>(mut self, name: impl Into<String>, transformer: T) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.contains("__") {
            return Err(KolosalError::invalid_param("step", &name, "names must be non-empty and free of \"__\""));
        }
        if name == self.estimator_name || self.steps.iter().any(|(n, _)| *n == name) {
            return Err(KolosalError::invalid_param("step", &name, "step names must be unique"));
        }
        self.steps.push((name, Box::new(transformer)));
        self.is_fitted = false;
        Ok(self)
    }

    /// Step names in execution order, estimator last
    pub fn step_names(&self) -> Vec<&str> {
        self.steps
            .iter()
            .map(|(n, _)| n.as_str())
            .chain(std::iter::once(self.estimator_name.as_str()))
            .collect()
    }

    pub fn step(&self, name: &str) -> Option<&dyn Transformer> {
        self.steps.iter().find(|(n, _)| n == name).map(|(_, t)| t.as_ref())
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Run `x` through every fitted transform
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(KolosalError::ModelNotFitted);
        }
        let mut current = x.to_owned();
        for (_, step) in &self.steps {
            current = step.transform(&current)?;
        }
        Ok(current)
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &E::Target) -> Result<&mut Self> {
        let start = Instant::now();
        self.is_fitted = false;

        let mut current = x.to_owned();
        for (_, step) in self.steps.iter_mut() {
            current = step.fit_transform(&current)?;
        }
        self.estimator.fit(&current, y)?;
        self.is_fitted = true;

        debug!(
            steps = ?self.step_names(),
            n_samples = x.nrows(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "pipeline fitted"
        );
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<E::Output> {
        self.estimator.predict(&self.transform(x)?)
    }

    pub fn score(&self, x: &Array2<f64>, y: &E::Target) -> Result<f64> {
        self.estimator.score(&self.transform(x)?, y)
    }
}

impl<E: Estimator> Estimator for Pipeline<E> {
    type Target = E::Target;
    type Output = E::Output;

    fn fit(&mut self, x: &Array2<f64>, y: &E::Target) -> Result<()> {
        Pipeline::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<E::Output> {
        Pipeline::predict(self, x)
    }

    fn score(&self, x: &Array2<f64>, y: &E::Target) -> Result<f64> {
        Pipeline::score(self, x, y)
    }

    /// Route `step__param` to the named step
    fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<()> {
        let (step, param) = name
            .split_once("__")
            .ok_or_else(|| KolosalError::invalid_param(name, value, "pipeline parameters are named step__param"))?;

        if step == self.estimator_name {
            self.estimator.set_param(param, value)?;
        } else {
            let (_, transformer) = self
                .steps
                .iter_mut()
                .find(|(n, _)| n == step)
                .ok_or_else(|| KolosalError::invalid_param(name, value, format!("no step named {:?}", step)))?;
            transformer.set_param(param, value)?;
        }
        self.is_fitted = false;
        Ok(())
    }

    fn task(&self) -> TaskType {
        self.estimator.task()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::{Pca, StandardScaler};
    use crate::training::LinearRegression;
    use ndarray::array;

    fn data() -> (Array2<f64>, Array2<f64>) {
        let x = array![[1.0, 0.0, 2.0], [2.0, 1.0, 0.0], [3.0, 0.5, 1.0], [4.0, 2.0, 3.0], [5.0, 1.5, 2.5]];
        let y = x.dot(&array![[1.0], [-2.0], [0.5]]) + 3.0;
        (x, y)
    }

    #[test]
    fn test_fit_predict_through_steps() {
        let (x, y) = data();
        let mut pipeline = Pipeline::new("alg", LinearRegression::new())
            .with_step("scaler", StandardScaler::new())
            .unwrap();
        pipeline.fit(&x, &y).unwrap();

        let pred = pipeline.predict(&x).unwrap();
        assert!((&pred - &y).mapv(f64::abs).sum() < 1e-6);
        assert_eq!(pipeline.step_names(), vec!["scaler", "alg"]);
        assert!(pipeline.step("scaler").unwrap().is_fitted());
    }

    #[test]
    fn test_duplicate_step_rejected() {
        let result = Pipeline::new("alg", LinearRegression::new())
            .with_step("pca", Pca::new(2))
            .and_then(|p| p.with_step("pca", StandardScaler::new()));
        assert!(result.is_err());
        assert!(Pipeline::new("alg", LinearRegression::new())
            .with_step("alg", StandardScaler::new())
            .is_err());
    }

    #[test]
    fn test_nested_params() {
        let (x, y) = data();
        let mut pipeline = Pipeline::new("alg", LinearRegression::new())
            .with_step("pca", Pca::new(3))
            .unwrap();
        pipeline.fit(&x, &y).unwrap();

        Estimator::set_param(&mut pipeline, "pca__n_components", &ParamValue::Int(2)).unwrap();
        assert!(!pipeline.is_fitted());
        Estimator::set_param(&mut pipeline, "alg__alpha", &ParamValue::Float(0.1)).unwrap();
        assert_eq!(pipeline.estimator().alpha, 0.1);

        pipeline.fit(&x, &y).unwrap();
        assert_eq!(pipeline.transform(&x).unwrap().ncols(), 2);

        assert!(Estimator::set_param(&mut pipeline, "nope__alpha", &ParamValue::Float(0.1)).is_err());
        assert!(Estimator::set_param(&mut pipeline, "alpha", &ParamValue::Float(0.1)).is_err());
        assert!(Estimator::set_param(&mut pipeline, "alg__nope", &ParamValue::Float(0.1)).is_err());
    }

    #[test]
    fn test_predict_before_fit() {
        let pipeline = Pipeline::new("alg", LinearRegression::new());
        assert!(matches!(pipeline.predict(&array![[1.0, 2.0, 3.0]]), Err(KolosalError::ModelNotFitted)));
    }
}
